//! Scanner Lifecycle Controller
//!
//! Owns the camera stream and the scan session. `run` drives the sampling
//! loop until a usable payload turns up, the session is stopped, or the
//! camera fails.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use log::{debug, info, warn};
use serde::Serialize;
use tokio::time::MissedTickBehavior;

use super::decoder::{DecodeOptions, DecodedPayload, QrDecoder, RqrrDecoder};
use super::sampler::{FrameSampler, DEFAULT_SCAN_INTERVAL, DEFAULT_SCAN_WIDTH};
use crate::error::{CameraError, ScanError};
use crate::guard::{classify, ClassificationResult, ThreatHeuristic, ThreatVerdict};
use crate::media::{
    CameraBackend, CameraRequest, CameraStream, CropRegion, Snapshot, VideoFrame,
};
use crate::ui::{RenderModel, ResultSurface, View, SEARCHING_STATUS};

/// Display-cadence tick of the sampling loop
pub const DEFAULT_TICK: Duration = Duration::from_millis(16);

/// Padding around the symbol when cropping the snapshot
pub const DEFAULT_SNAPSHOT_MARGIN: f32 = 15.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannerState {
    Idle,
    /// Waiting on camera access or stream metadata
    Acquiring,
    Active,
    Error(CameraError),
}

/// Cooperative cancellation for a running scan
#[derive(Debug, Clone)]
pub struct StopHandle {
    active: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct ScanSession {
    active: Arc<AtomicBool>,
    last_scan: Option<Instant>,
}

impl ScanSession {
    fn begin(&mut self) {
        self.active.store(true, Ordering::SeqCst);
        self.last_scan = None;
    }

    fn end(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        self.last_scan = None;
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Minimum time between decode attempts
    pub scan_interval: Duration,
    /// Loop cadence
    pub tick: Duration,
    /// Width of the raster handed to the decoder
    pub scan_width: u32,
    /// Padding in frame pixels around the snapshot crop
    pub snapshot_margin: f32,
    pub decode: DecodeOptions,
    pub camera: CameraRequest,
    /// Give up after this many decode attempts
    pub max_samples: Option<u32>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scan_interval: DEFAULT_SCAN_INTERVAL,
            tick: DEFAULT_TICK,
            scan_width: DEFAULT_SCAN_WIDTH,
            snapshot_margin: DEFAULT_SNAPSHOT_MARGIN,
            decode: DecodeOptions::default(),
            camera: CameraRequest::default(),
            max_samples: None,
        }
    }
}

/// Everything known about a successful scan
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub payload: DecodedPayload,
    pub classification: ClassificationResult,
    pub verdict: ThreatVerdict,
    pub snapshot: Option<Snapshot>,
    pub scanned_at: DateTime<Local>,
    pub frame_id: u64,
}

#[derive(Debug)]
pub enum ScanOutcome {
    Found(ScanReport),
    /// Session cleared through a [`StopHandle`]
    Stopped,
    /// Sample budget exhausted without a usable payload
    NotFound,
}

pub struct ScannerController {
    backend: Arc<dyn CameraBackend>,
    config: ScannerConfig,
    sampler: FrameSampler,
    decoder: Box<dyn QrDecoder>,
    heuristic: ThreatHeuristic,
    state: ScannerState,
    stream: Option<Box<dyn CameraStream>>,
    session: ScanSession,
}

impl ScannerController {
    pub fn new(backend: Arc<dyn CameraBackend>, config: ScannerConfig) -> Self {
        let sampler = FrameSampler::new(config.scan_interval, config.scan_width);
        Self {
            backend,
            config,
            sampler,
            decoder: Box::new(RqrrDecoder),
            heuristic: ThreatHeuristic::builtin().clone(),
            state: ScannerState::Idle,
            stream: None,
            session: ScanSession::default(),
        }
    }

    pub fn with_decoder(mut self, decoder: Box<dyn QrDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_heuristic(mut self, heuristic: ThreatHeuristic) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn state(&self) -> &ScannerState {
        &self.state
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            active: Arc::clone(&self.session.active),
        }
    }

    /// Acquire the camera and open a fresh session
    ///
    /// Does nothing when a session is already running.
    pub async fn start(&mut self) -> Result<(), CameraError> {
        if matches!(self.state, ScannerState::Active | ScannerState::Acquiring) {
            debug!("Scanner already running");
            return Ok(());
        }

        self.state = ScannerState::Acquiring;
        info!("Requesting camera ({} backend)", self.backend.name());

        match self.acquire().await {
            Ok(stream) => {
                self.stream = Some(stream);
                self.session.begin();
                self.state = ScannerState::Active;
                Ok(())
            }
            Err(e) => {
                warn!("Camera acquisition failed: {}", e);
                self.state = ScannerState::Error(e.clone());
                Err(e)
            }
        }
    }

    async fn acquire(&self) -> Result<Box<dyn CameraStream>, CameraError> {
        let mut stream = self.backend.open(&self.config.camera).await?;
        match stream.wait_ready().await {
            Ok(dims) => {
                info!("Scanner active: {}x{}", dims.width, dims.height);
                Ok(stream)
            }
            Err(e) => {
                stream.release();
                Err(e)
            }
        }
    }

    /// End the session and release the camera
    pub fn stop(&mut self) {
        self.session.end();
        if let Some(mut stream) = self.stream.take() {
            stream.release();
            info!("Scanner stopped");
        }
        self.state = ScannerState::Idle;
    }

    /// Start if needed, then sample until something conclusive happens
    pub async fn run(&mut self, surface: &mut dyn ResultSurface) -> Result<ScanOutcome, ScanError> {
        if let Err(e) = self.start().await {
            surface.show(&View::Error(e.user_message().to_string()));
            return Err(e.into());
        }
        surface.show(&View::Status(SEARCHING_STATUS.to_string()));

        // tokio intervals reject a zero period
        let mut ticker = tokio::time::interval(self.config.tick.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut samples = 0u32;

        loop {
            ticker.tick().await;

            if !self.session.is_active() {
                self.stop();
                return Ok(ScanOutcome::Stopped);
            }

            let now = Instant::now();
            if !self.sampler.is_due(self.session.last_scan, now) {
                continue;
            }
            self.session.last_scan = Some(now);
            samples += 1;

            match self.process_frame(surface) {
                Ok(Some(report)) => {
                    self.stop();
                    surface.show(&View::Result(Box::new(RenderModel::from_report(&report))));
                    return Ok(ScanOutcome::Found(report));
                }
                Ok(None) => {}
                Err(e) => {
                    self.stop();
                    let ScanError::Camera(camera) = &e;
                    surface.show(&View::Error(camera.user_message().to_string()));
                    self.state = ScannerState::Error(camera.clone());
                    return Err(e);
                }
            }

            if self.config.max_samples.is_some_and(|max| samples >= max) {
                info!("No QR code found after {} sample(s)", samples);
                self.stop();
                return Ok(ScanOutcome::NotFound);
            }
        }
    }

    /// One decode attempt on the current frame
    fn process_frame(
        &mut self,
        surface: &mut dyn ResultSurface,
    ) -> Result<Option<ScanReport>, ScanError> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        let frame = match stream.capture() {
            Ok(frame) => frame,
            Err(CameraError::BadFrame(reason)) => {
                warn!("Skipping unreadable frame: {}", reason);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let raster = self.sampler.raster(&frame);

        let decoded = match self.decoder.decode(
            raster.image.as_raw(),
            raster.image.width(),
            raster.image.height(),
            &self.config.decode,
        ) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("QR decode failed on frame {}: {}", frame.frame_id, e);
                return Ok(None);
            }
        };

        let Some(payload) = decoded else {
            surface.show(&View::Status(SEARCHING_STATUS.to_string()));
            return Ok(None);
        };
        debug!(
            "Decoded {} byte payload on frame {} ({:?} after capture)",
            payload.text.len(),
            frame.frame_id,
            frame.captured_at.elapsed()
        );

        let classification = classify(&payload.text);
        if !classification.valid {
            surface.show(&View::Status(format!("⚠️ {}", classification.message)));
            return Ok(None);
        }

        let corners = payload.corners.scaled(raster.scale_x, raster.scale_y);
        let snapshot = CropRegion::around(
            &corners,
            self.config.snapshot_margin,
            frame.width(),
            frame.height(),
        )
        .and_then(|region| snapshot_of(&frame, region));

        let verdict = self.heuristic.assess(&payload.text);
        if verdict.is_dangerous {
            warn!("Payload flagged: {}", verdict.warning);
        }

        Ok(Some(ScanReport {
            payload,
            classification,
            verdict,
            snapshot,
            scanned_at: Local::now(),
            frame_id: frame.frame_id,
        }))
    }
}

/// Crop and encode the symbol; encode failures are logged and dropped
fn snapshot_of(frame: &VideoFrame, region: CropRegion) -> Option<Snapshot> {
    match Snapshot::capture(&frame.image, region) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!("Snapshot encoding failed on frame {}: {}", frame.frame_id, e);
            None
        }
    }
}

impl Drop for ScannerController {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::guard::{ContentType, ThreatKind};
    use crate::media::camera::Dimensions;
    use crate::media::{StillCamera, UnavailableCamera};
    use crate::scanner::test_support::render_qr;
    use futures::future::{BoxFuture, FutureExt};
    use image::RgbaImage;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn blank() -> RgbaImage {
        RgbaImage::from_pixel(400, 300, image::Rgba([255, 255, 255, 255]))
    }

    fn fast_config() -> ScannerConfig {
        ScannerConfig {
            scan_interval: Duration::ZERO,
            tick: Duration::from_millis(1),
            max_samples: Some(5),
            ..Default::default()
        }
    }

    /// Fails with `NotFound` for the first `failures` opens
    struct FlakyCamera {
        opens: Arc<AtomicUsize>,
        failures: usize,
    }

    impl CameraBackend for FlakyCamera {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn open(
            &self,
            request: &CameraRequest,
        ) -> BoxFuture<'static, Result<Box<dyn CameraStream>, CameraError>> {
            let n = self.opens.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return futures::future::ready(Err(CameraError::NotFound)).boxed();
            }
            StillCamera::from_frames(vec![blank()]).open(request)
        }
    }

    /// Serves `bad_frames` unreadable frames before a blank one
    struct GlitchyCamera {
        bad_frames: usize,
    }

    struct GlitchyStream {
        bad_frames: usize,
    }

    impl CameraBackend for GlitchyCamera {
        fn name(&self) -> &'static str {
            "glitchy"
        }

        fn open(
            &self,
            _request: &CameraRequest,
        ) -> BoxFuture<'static, Result<Box<dyn CameraStream>, CameraError>> {
            let stream: Box<dyn CameraStream> = Box::new(GlitchyStream {
                bad_frames: self.bad_frames,
            });
            futures::future::ready(Ok(stream)).boxed()
        }
    }

    impl CameraStream for GlitchyStream {
        fn wait_ready(&mut self) -> BoxFuture<'_, Result<Dimensions, CameraError>> {
            futures::future::ready(Ok(Dimensions::new(400, 300))).boxed()
        }

        fn capture(&mut self) -> Result<VideoFrame, CameraError> {
            if self.bad_frames > 0 {
                self.bad_frames -= 1;
                return Err(CameraError::BadFrame("truncated MJPEG".to_string()));
            }
            Ok(VideoFrame::new(blank()))
        }

        fn release(&mut self) {}
    }

    enum Step {
        Fail,
        Nothing,
        Text(&'static str),
    }

    struct ScriptedDecoder {
        steps: Mutex<VecDeque<Step>>,
    }

    impl ScriptedDecoder {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
            }
        }
    }

    impl QrDecoder for ScriptedDecoder {
        fn decode(
            &self,
            _luma: &[u8],
            width: u32,
            height: u32,
            _options: &DecodeOptions,
        ) -> Result<Option<DecodedPayload>, DecodeError> {
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Fail) => Err(DecodeError::EmptyRaster { width, height }),
                Some(Step::Text(text)) => Ok(Some(DecodedPayload {
                    text: text.to_string(),
                    corners: Default::default(),
                })),
                Some(Step::Nothing) | None => Ok(None),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSurface {
        views: Vec<View>,
        stop_on_status: Option<StopHandle>,
    }

    impl ResultSurface for RecordingSurface {
        fn show(&mut self, view: &View) {
            if let (View::Status(_), Some(handle)) = (view, &self.stop_on_status) {
                handle.stop();
            }
            self.views.push(view.clone());
        }
    }

    #[tokio::test]
    async fn test_missing_camera_then_recovery() {
        let opens = Arc::new(AtomicUsize::new(0));
        let backend = Arc::new(FlakyCamera {
            opens: opens.clone(),
            failures: 1,
        });
        let mut controller = ScannerController::new(backend, fast_config());

        assert_eq!(controller.start().await, Err(CameraError::NotFound));
        assert_eq!(
            controller.state(),
            &ScannerState::Error(CameraError::NotFound)
        );

        controller.start().await.unwrap();
        assert_eq!(controller.state(), &ScannerState::Active);
        assert!(controller.stop_handle().is_active());
        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_start_while_active_is_noop() {
        let opens = Arc::new(AtomicUsize::new(0));
        let backend = Arc::new(FlakyCamera {
            opens: opens.clone(),
            failures: 0,
        });
        let mut controller = ScannerController::new(backend, fast_config());

        controller.start().await.unwrap();
        controller.start().await.unwrap();
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_twice() {
        let backend = Arc::new(StillCamera::from_frames(vec![blank()]));
        let mut controller = ScannerController::new(backend, fast_config());
        controller.start().await.unwrap();

        controller.stop();
        controller.stop();
        assert_eq!(controller.state(), &ScannerState::Idle);
        assert!(!controller.stop_handle().is_active());

        // Restartable after stopping
        controller.start().await.unwrap();
        assert_eq!(controller.state(), &ScannerState::Active);
    }

    #[tokio::test]
    async fn test_scans_generated_symbol() {
        let backend = Arc::new(StillCamera::from_frames(vec![render_qr(
            "https://example.com/menu",
            400,
        )]));
        let mut controller = ScannerController::new(backend, fast_config());
        let mut surface = RecordingSurface::default();

        let ScanOutcome::Found(report) = controller.run(&mut surface).await.unwrap() else {
            panic!("expected a scan result");
        };

        assert_eq!(report.payload.text, "https://example.com/menu");
        assert_eq!(report.classification.content_type, ContentType::Url);
        assert!(!report.verdict.is_dangerous);

        let snapshot = report.snapshot.expect("snapshot");
        assert!(snapshot.region.x + snapshot.region.width <= 400);
        assert!(snapshot.region.y + snapshot.region.height <= 400);

        assert_eq!(controller.state(), &ScannerState::Idle);
        assert!(matches!(surface.views.last(), Some(View::Result(_))));
    }

    #[tokio::test]
    async fn test_flagged_payload_still_reported() {
        let backend = Arc::new(StillCamera::from_frames(vec![blank()]));
        let mut controller = ScannerController::new(backend, fast_config()).with_decoder(
            Box::new(ScriptedDecoder::new(vec![Step::Text("http://bit.ly/x")])),
        );
        let mut surface = RecordingSurface::default();

        let ScanOutcome::Found(report) = controller.run(&mut surface).await.unwrap() else {
            panic!("expected a scan result");
        };
        assert_eq!(report.verdict.kind, Some(ThreatKind::SuspiciousLink));
    }

    #[tokio::test]
    async fn test_decode_failures_and_unknown_content_keep_scanning() {
        let backend = Arc::new(StillCamera::from_frames(vec![blank()]));
        let decoder = ScriptedDecoder::new(vec![
            Step::Fail,
            Step::Nothing,
            Step::Text("not a url!"),
            Step::Text("abc123"),
        ]);
        let mut controller =
            ScannerController::new(backend, fast_config()).with_decoder(Box::new(decoder));
        let mut surface = RecordingSurface::default();

        let ScanOutcome::Found(report) = controller.run(&mut surface).await.unwrap() else {
            panic!("expected a scan result");
        };
        assert_eq!(report.payload.text, "abc123");
        assert_eq!(report.classification.content_type, ContentType::Text);

        let statuses: Vec<&str> = surface
            .views
            .iter()
            .filter_map(|v| match v {
                View::Status(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        assert!(statuses.contains(&SEARCHING_STATUS));
        assert!(statuses.contains(&"⚠️ Unknown format"));
    }

    #[tokio::test]
    async fn test_unreadable_frame_is_skipped() {
        let backend = Arc::new(GlitchyCamera { bad_frames: 2 });
        let decoder = ScriptedDecoder::new(vec![Step::Text("abc123")]);
        let mut controller =
            ScannerController::new(backend, fast_config()).with_decoder(Box::new(decoder));
        let mut surface = RecordingSurface::default();

        let ScanOutcome::Found(report) = controller.run(&mut surface).await.unwrap() else {
            panic!("expected a scan result");
        };
        assert_eq!(report.payload.text, "abc123");
        assert_eq!(controller.state(), &ScannerState::Idle);
        assert!(!surface.views.iter().any(|v| matches!(v, View::Error(_))));
    }

    #[tokio::test]
    async fn test_unreadable_frames_count_against_budget() {
        let backend = Arc::new(GlitchyCamera { bad_frames: usize::MAX });
        let mut controller = ScannerController::new(backend, fast_config());
        let mut surface = RecordingSurface::default();

        let outcome = controller.run(&mut surface).await.unwrap();
        assert!(matches!(outcome, ScanOutcome::NotFound));
    }

    #[test]
    fn test_snapshot_encode_failure_is_dropped() {
        let frame = VideoFrame::new(blank());
        let empty = CropRegion {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        };
        assert!(snapshot_of(&frame, empty).is_none());

        let region = CropRegion {
            x: 10,
            y: 10,
            width: 50,
            height: 40,
        };
        let snapshot = snapshot_of(&frame, region).unwrap();
        assert_eq!(snapshot.region, region);
        assert!(!snapshot.png.is_empty());
    }

    #[tokio::test]
    async fn test_stop_handle_ends_run() {
        let backend = Arc::new(StillCamera::from_frames(vec![blank()]));
        let mut controller = ScannerController::new(
            backend,
            ScannerConfig {
                max_samples: None,
                ..fast_config()
            },
        )
        .with_decoder(Box::new(ScriptedDecoder::new(Vec::new())));
        let mut surface = RecordingSurface {
            stop_on_status: Some(controller.stop_handle()),
            ..Default::default()
        };

        let outcome = controller.run(&mut surface).await.unwrap();
        assert!(matches!(outcome, ScanOutcome::Stopped));
        assert_eq!(controller.state(), &ScannerState::Idle);
    }

    #[tokio::test]
    async fn test_sample_budget() {
        let backend = Arc::new(StillCamera::from_frames(vec![blank()]));
        let mut controller = ScannerController::new(
            backend,
            ScannerConfig {
                max_samples: Some(2),
                ..fast_config()
            },
        );
        let mut surface = RecordingSurface::default();

        let outcome = controller.run(&mut surface).await.unwrap();
        assert!(matches!(outcome, ScanOutcome::NotFound));
    }

    #[tokio::test]
    async fn test_unavailable_camera_shows_error() {
        let mut controller = ScannerController::new(Arc::new(UnavailableCamera), fast_config());
        let mut surface = RecordingSurface::default();

        let err = controller.run(&mut surface).await.unwrap_err();
        assert!(matches!(err, ScanError::Camera(CameraError::Unavailable)));
        assert_eq!(
            controller.state(),
            &ScannerState::Error(CameraError::Unavailable)
        );
        match surface.views.as_slice() {
            [View::Error(msg)] => assert_eq!(msg, CameraError::Unavailable.user_message()),
            other => panic!("unexpected views: {:?}", other),
        }
    }
}

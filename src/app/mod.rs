//! Application Shell
//!
//! Wires settings, camera backends, the scanner and the terminal surface
//! together for each CLI command.

pub mod config;

pub use config::Settings;

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{info, warn};

use crate::cli::{Commands, ConfigCommands};
use crate::guard::{classify, ThreatHeuristic};
use crate::media::{CameraBackend, StillCamera};
use crate::scanner::{ScanOutcome, ScanReport, ScannerConfig, ScannerController};
use crate::ui::{
    Action, ClipboardWriter, Intent, RenderModel, ResultSurface, TerminalSurface, View,
};

/// Question asked before opening a flagged link
pub const DANGER_PROMPT: &str = "This link may be dangerous. Open it anyway? [y/N]";

/// Heading for `check` results
const CHECK_TITLE: &str = "🔎 Content check";

/// What the user picked after a result was shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextStep {
    Done,
    Rescan,
}

/// Main application structure
pub struct App {
    /// User settings
    pub settings: Settings,

    /// Settings file in use (`--config` or the default location)
    settings_path: Option<PathBuf>,

    /// Results as JSON instead of text
    json: bool,

    /// Offer result actions on stdin
    interactive: bool,

    clipboard: ClipboardWriter,
}

impl App {
    pub fn new(config: Option<PathBuf>, json: bool, no_interactive: bool) -> Self {
        // A broken settings file must not lock out `config init --force`
        let settings = match &config {
            Some(path) => Settings::load_from(path),
            None => Settings::load(),
        }
        .unwrap_or_else(|e| {
            warn!("{:#}; using default settings", e);
            Settings::default()
        });
        let settings_path = config.or_else(Settings::file_path);

        Self {
            settings,
            settings_path,
            json,
            interactive: !json && !no_interactive && io::stdin().is_terminal(),
            clipboard: ClipboardWriter::new(),
        }
    }

    pub async fn run(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Scan {
                device,
                facing,
                save_snapshot,
            } => {
                let mut config = self.settings.scanner_config();
                if let Some(device) = device {
                    config.camera.device_index = device;
                }
                if let Some(facing) = facing {
                    config.camera.facing = facing.into();
                }
                let heuristic = self.settings.threat_heuristic()?;
                self.scan_loop(camera_backend(), heuristic, config, save_snapshot.as_deref())
                    .await
            }
            Commands::Image {
                files,
                save_snapshot,
            } => {
                for file in &files {
                    if !file.is_file() {
                        bail!("No such file: {}", file.display());
                    }
                }
                let config = ScannerConfig {
                    scan_interval: Duration::ZERO,
                    max_samples: Some(files.len() as u32),
                    ..self.settings.scanner_config()
                };
                let heuristic = self.settings.threat_heuristic()?;
                let backend = Arc::new(StillCamera::from_paths(files));
                self.scan_loop(backend, heuristic, config, save_snapshot.as_deref())
                    .await
            }
            Commands::Check { text } => {
                let heuristic = self.settings.threat_heuristic()?;
                self.check(&heuristic, &text);
                Ok(())
            }
            Commands::Config { command } => self.config_command(command),
        }
    }

    /// Scan until the user is done with the results
    async fn scan_loop(
        &mut self,
        backend: Arc<dyn CameraBackend>,
        heuristic: ThreatHeuristic,
        config: ScannerConfig,
        save_snapshot: Option<&Path>,
    ) -> Result<()> {
        let mut controller = ScannerController::new(backend, config).with_heuristic(heuristic);
        let mut surface = TerminalSurface::new(self.json);

        loop {
            let handle = controller.stop_handle();
            let ctrl_c = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupted, stopping scanner");
                    handle.stop();
                }
            });
            let outcome = controller.run(&mut surface).await;
            ctrl_c.abort();

            match outcome? {
                ScanOutcome::Found(report) => {
                    if let Some(path) = save_snapshot {
                        save_report_snapshot(&report, path)?;
                    }
                    let model = RenderModel::from_report(&report);
                    if self.respond(&model)? == NextStep::Rescan {
                        continue;
                    }
                    return Ok(());
                }
                ScanOutcome::Stopped => {
                    eprintln!("Scan cancelled");
                    return Ok(());
                }
                ScanOutcome::NotFound => bail!("No QR code found"),
            }
        }
    }

    fn check(&mut self, heuristic: &ThreatHeuristic, text: &str) {
        let classification = classify(text);
        let verdict = heuristic.assess(text);
        let model = RenderModel::build(text, &classification, &verdict, None)
            .with_title(CHECK_TITLE)
            .without_rescan();

        TerminalSurface::new(self.json).show(&View::Result(Box::new(model.clone())));
        if let Err(e) = self.respond(&model) {
            warn!("Action prompt failed: {}", e);
        }
    }

    /// Offer the result's actions until the user quits or rescans
    fn respond(&mut self, model: &RenderModel) -> Result<NextStep> {
        if !self.interactive || model.actions.is_empty() {
            return Ok(NextStep::Done);
        }

        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stderr();

        loop {
            let Some(index) = choose_action(&mut input, &mut output, model.actions.len())? else {
                return Ok(NextStep::Done);
            };
            match &model.actions[index].action {
                Action::OpenLink { url, dangerous } => {
                    if *dangerous
                        && self.settings.confirm_dangerous_links
                        && !confirm(&mut input, &mut output, DANGER_PROMPT)?
                    {
                        continue;
                    }
                    Intent::OpenUrl(url.clone()).fire();
                }
                Action::Email { address } => Intent::Email(address.clone()).fire(),
                Action::Call { number } => Intent::Call(number.clone()).fire(),
                Action::Copy { text } => match self.clipboard.copy(text) {
                    Ok(()) => eprintln!("📋 Copied!"),
                    Err(e) => eprintln!("❌ {}", e),
                },
                Action::Rescan => return Ok(NextStep::Rescan),
            }
        }
    }

    fn config_command(&self, command: ConfigCommands) -> Result<()> {
        match command {
            ConfigCommands::Show => {
                println!("{}", serde_json::to_string_pretty(&self.settings)?);
            }
            ConfigCommands::Path => {
                println!("{}", self.settings_path()?.display());
            }
            ConfigCommands::Init { force } => {
                let path = self.settings_path()?;
                if path.exists() && !force {
                    bail!(
                        "{} already exists (use --force to overwrite)",
                        path.display()
                    );
                }
                Settings::default().save_to(path)?;
                info!("Wrote default settings");
                println!("{}", path.display());
            }
        }
        Ok(())
    }

    fn settings_path(&self) -> Result<&Path> {
        self.settings_path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No config directory"))
    }
}

fn save_report_snapshot(report: &ScanReport, path: &Path) -> Result<()> {
    match &report.snapshot {
        Some(snapshot) => {
            snapshot
                .save(path)
                .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;
            info!("Snapshot saved to {}", path.display());
        }
        None => warn!("No snapshot to save"),
    }
    Ok(())
}

/// Camera used by `scan`
#[cfg(feature = "camera")]
fn camera_backend() -> Arc<dyn CameraBackend> {
    Arc::new(crate::media::native::NativeCamera)
}

/// Camera used by `scan`
#[cfg(not(feature = "camera"))]
fn camera_backend() -> Arc<dyn CameraBackend> {
    Arc::new(crate::media::UnavailableCamera)
}

/// Ask for an action number; `None` when the user quits or input ends
fn choose_action<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    count: usize,
) -> io::Result<Option<usize>> {
    loop {
        write!(output, "Choose an action [1-{}], or Enter/q to quit: ", count)?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let answer = line.trim();
        if answer.is_empty() || answer.eq_ignore_ascii_case("q") {
            return Ok(None);
        }
        match answer.parse::<usize>() {
            Ok(n) if (1..=count).contains(&n) => return Ok(Some(n - 1)),
            _ => writeln!(output, "Not an action: {}", answer)?,
        }
    }
}

/// Yes/no question that defaults to no
fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> io::Result<bool> {
    write!(output, "⚠️ {} ", prompt)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

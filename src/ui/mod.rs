//! Result Presentation
//!
//! Turns classification and threat verdicts into a render model. Building
//! the model is pure; surfaces only draw what they're handed.

pub mod actions;
pub mod terminal;

pub use actions::{ClipboardWriter, Intent};
pub use terminal::TerminalSurface;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::guard::{ClassificationResult, ContentType, ThreatKind, ThreatVerdict};
use crate::media::CropRegion;
use crate::scanner::ScanReport;

/// Status shown while no symbol is in view
pub const SEARCHING_STATUS: &str = "🔍 Searching for QR code...";

/// Default result heading
pub const DETECTED_TITLE: &str = "✅ QR code detected";

/// What the result region shows; always replaced wholesale
#[derive(Debug, Clone)]
pub enum View {
    Status(String),
    Result(Box<RenderModel>),
    Error(String),
}

/// Anything that can display a [`View`]
pub trait ResultSurface {
    fn show(&mut self, view: &View);
}

/// Verdict as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerdictView {
    pub dangerous: bool,
    pub kind: Option<ThreatKind>,
    /// "⚠️ <warning>" or "✓ Safe"
    pub label: String,
    pub description: Option<String>,
}

impl VerdictView {
    fn from_verdict(verdict: &ThreatVerdict) -> Self {
        if verdict.is_dangerous {
            Self {
                dangerous: true,
                kind: verdict.kind,
                label: format!("⚠️ {}", verdict.warning),
                description: (!verdict.description.is_empty())
                    .then(|| verdict.description.clone()),
            }
        } else {
            Self {
                dangerous: false,
                kind: None,
                label: "✓ Safe".to_string(),
                description: None,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Primary,
    Secondary,
    Info,
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    OpenLink { url: String, dangerous: bool },
    Email { address: String },
    Call { number: String },
    Copy { text: String },
    Rescan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionButton {
    #[serde(flatten)]
    pub action: Action,
    pub label: String,
    pub tone: Tone,
}

impl ActionButton {
    fn new(action: Action, label: &str, tone: Tone) -> Self {
        Self {
            action,
            label: label.to_string(),
            tone,
        }
    }
}

/// Everything a surface needs to draw a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderModel {
    pub title: String,
    pub classification: ClassificationResult,
    pub type_label: String,
    pub verdict: VerdictView,
    /// Raw payload; surfaces escape it for their medium
    pub payload: String,
    pub snapshot: Option<CropRegion>,
    /// Snapshot PNG as a `data:` URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanned_at: Option<DateTime<Local>>,
    pub actions: Vec<ActionButton>,
}

impl RenderModel {
    pub fn build(
        payload: &str,
        classification: &ClassificationResult,
        verdict: &ThreatVerdict,
        snapshot: Option<CropRegion>,
    ) -> Self {
        let type_label = match classification.content_type {
            ContentType::Url => "🔗 Link".to_string(),
            ContentType::Text => "📝 Text".to_string(),
            ContentType::Email => "📧 Email".to_string(),
            ContentType::Phone => "📞 Phone".to_string(),
            ContentType::Unrecognized => format!("❓ {}", classification.message),
        };

        let mut actions = Vec::with_capacity(3);
        match classification.content_type {
            ContentType::Url => {
                let open = Action::OpenLink {
                    url: payload.to_string(),
                    dangerous: verdict.is_dangerous,
                };
                actions.push(if verdict.is_dangerous {
                    ActionButton::new(open, "⚠️ Open (unsafe)", Tone::Danger)
                } else {
                    ActionButton::new(open, "🔗 Open link", Tone::Primary)
                });
            }
            ContentType::Email => actions.push(ActionButton::new(
                Action::Email {
                    address: payload.to_string(),
                },
                "📧 Send email",
                Tone::Info,
            )),
            ContentType::Phone => actions.push(ActionButton::new(
                Action::Call {
                    number: payload.to_string(),
                },
                "📞 Call",
                Tone::Success,
            )),
            ContentType::Text | ContentType::Unrecognized => {}
        }
        actions.push(ActionButton::new(
            Action::Copy {
                text: payload.to_string(),
            },
            "📋 Copy",
            Tone::Secondary,
        ));
        actions.push(ActionButton::new(Action::Rescan, "🔍 Scan again", Tone::Secondary));

        Self {
            title: DETECTED_TITLE.to_string(),
            classification: classification.clone(),
            type_label,
            verdict: VerdictView::from_verdict(verdict),
            payload: payload.to_string(),
            snapshot,
            snapshot_url: None,
            scanned_at: None,
            actions,
        }
    }

    pub fn from_report(report: &ScanReport) -> Self {
        let mut model = Self::build(
            &report.payload.text,
            &report.classification,
            &report.verdict,
            report.snapshot.as_ref().map(|s| s.region),
        );
        model.snapshot_url = report.snapshot.as_ref().map(|s| s.data_url());
        model.scanned_at = Some(report.scanned_at);
        model
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Drop the rescan button (nothing to rescan outside a camera session)
    pub fn without_rescan(mut self) -> Self {
        self.actions.retain(|b| b.action != Action::Rescan);
        self
    }
}

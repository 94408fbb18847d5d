//! Terminal Surface
//!
//! Statuses and errors go to stderr, results to stdout (plain text or JSON).

use std::fmt::Write as _;

use log::error;

use super::{RenderModel, ResultSurface, View};

pub struct TerminalSurface {
    json: bool,
    last_status: Option<String>,
}

impl TerminalSurface {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            last_status: None,
        }
    }
}

impl ResultSurface for TerminalSurface {
    fn show(&mut self, view: &View) {
        match view {
            View::Status(status) => {
                // The loop re-posts the same status every sample
                if self.last_status.as_deref() != Some(status.as_str()) {
                    eprintln!("{}", sanitize(status));
                    self.last_status = Some(status.clone());
                }
            }
            View::Error(message) => {
                self.last_status = None;
                eprintln!("❌ {}", sanitize(message));
            }
            View::Result(model) => {
                self.last_status = None;
                if self.json {
                    match serde_json::to_string_pretty(model.as_ref()) {
                        Ok(json) => println!("{}", json),
                        Err(e) => error!("Failed to serialize result: {}", e),
                    }
                } else {
                    print!("{}", render_text(model));
                }
            }
        }
    }
}

/// Plain-text rendering of a result
pub fn render_text(model: &RenderModel) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", model.title);
    let _ = writeln!(out, "{}", model.type_label);
    let _ = writeln!(out, "{}", model.verdict.label);
    if let Some(description) = &model.verdict.description {
        let _ = writeln!(out, "   {}", description);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "  {}", sanitize(&model.payload));
    let _ = writeln!(out);
    if let Some(region) = &model.snapshot {
        let _ = writeln!(
            out,
            "Symbol at {}x{}+{}+{}",
            region.width, region.height, region.x, region.y
        );
    }
    if let Some(at) = &model.scanned_at {
        let _ = writeln!(out, "Scanned at {}", at.format("%Y-%m-%d %H:%M:%S"));
    }

    let buttons: Vec<String> = model
        .actions
        .iter()
        .enumerate()
        .map(|(i, b)| format!("[{}] {}", i + 1, b.label))
        .collect();
    let _ = writeln!(out, "{}", buttons.join("  "));
    out
}

/// Replace control and bidi-override characters so a payload can't rewrite
/// the terminal
pub fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_control() || is_bidi_control(c) {
                char::REPLACEMENT_CHARACTER
            } else {
                c
            }
        })
        .collect()
}

fn is_bidi_control(c: char) -> bool {
    matches!(
        c,
        '\u{200E}' | '\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}'
    )
}

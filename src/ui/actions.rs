//! Result Actions
//!
//! Outbound intents handed to the OS and clipboard writes.

use arboard::Clipboard;
use log::{debug, info, warn};

use crate::error::ActionError;

/// Something the OS should open on the user's behalf
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Open in the default browser
    OpenUrl(String),
    /// Compose a mail to this address
    Email(String),
    /// Dial this number
    Call(String),
}

impl Intent {
    /// URI handed to the OS
    pub fn target(&self) -> String {
        match self {
            Intent::OpenUrl(url) => url.clone(),
            Intent::Email(address) => format!("mailto:{}", address.trim()),
            Intent::Call(number) => {
                let dialable: String = number
                    .chars()
                    .filter(|c| c.is_ascii_digit() || *c == '+')
                    .collect();
                format!("tel:{}", dialable)
            }
        }
    }

    /// Hand the intent to the OS without waiting on the launched program
    pub fn launch(&self) -> Result<(), ActionError> {
        let target = self.target();
        info!("Opening {}", target);
        open::that_detached(&target).map_err(|source| ActionError::Launch { target, source })
    }

    /// Like [`Intent::launch`], but failures are only logged
    pub fn fire(&self) {
        if let Err(e) = self.launch() {
            warn!("{}", e);
        }
    }
}

/// System clipboard, opened on first use
///
/// The handle is kept for the life of the writer since some platforms drop
/// clipboard contents when the owning handle goes away.
#[derive(Default)]
pub struct ClipboardWriter {
    clipboard: Option<Clipboard>,
}

impl ClipboardWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copy(&mut self, text: &str) -> Result<(), ActionError> {
        if self.clipboard.is_none() {
            let clipboard = Clipboard::new().map_err(|e| ActionError::Clipboard(e.to_string()))?;
            self.clipboard = Some(clipboard);
        }
        let Some(clipboard) = self.clipboard.as_mut() else {
            return Err(ActionError::Clipboard("clipboard unavailable".to_string()));
        };
        clipboard
            .set_text(text.to_string())
            .map_err(|e| ActionError::Clipboard(e.to_string()))?;
        debug!("Copied {} bytes to clipboard", text.len());
        Ok(())
    }
}

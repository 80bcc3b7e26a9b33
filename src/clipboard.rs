use log::warn;

use crate::gui::ClipboardBackend;

/// OS clipboard through `arboard`.
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

impl SystemClipboard {
    /// `None` when no clipboard is reachable, e.g. a headless session.
    pub fn new() -> Option<Self> {
        match arboard::Clipboard::new() {
            Ok(inner) => Some(Self { inner }),
            Err(e) => {
                warn!("clipboard unavailable: {e}");
                None
            }
        }
    }
}

impl ClipboardBackend for SystemClipboard {
    fn get(&mut self) -> Option<String> {
        self.inner.get_text().ok()
    }

    fn set(&mut self, text: &str) {
        if let Err(e) = self.inner.set_text(text.to_owned()) {
            warn!("failed to write clipboard: {e}");
        }
    }
}

//! Clipboard back ends

use cloudtray_core::{Clipboard, Result};

/// Desktop clipboard
#[cfg(feature = "clipboard")]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

#[cfg(feature = "clipboard")]
impl Clipboard for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        arboard::Clipboard::new()
            .and_then(|mut clipboard| clipboard.set_text(text))
            .map_err(|e| cloudtray_core::Error::ClipboardError(e.to_string()))
    }
}

/// Prints exported text, for headless sessions
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutClipboard;

impl Clipboard for StdoutClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        println!("{}", text);
        Ok(())
    }
}

/// The system clipboard unless disabled on the command line or at build time
pub fn select(disabled: bool) -> Box<dyn Clipboard> {
    if disabled {
        return Box::new(StdoutClipboard);
    }
    system()
}

#[cfg(feature = "clipboard")]
fn system() -> Box<dyn Clipboard> {
    Box::new(SystemClipboard)
}

#[cfg(not(feature = "clipboard"))]
fn system() -> Box<dyn Clipboard> {
    Box::new(StdoutClipboard)
}

//! Console status output
//!
//! Renders the updater's status calls as a header line and a single
//! progress bar whose message is the current step.

use goflash_core::container::PreviewTile;
use goflash_core::status::StatusSink;
use indicatif::{ProgressBar, ProgressStyle};

/// Status sink drawing to the terminal
pub struct ConsoleStatus {
    bar: ProgressBar,
    interactive: bool,
}

impl ConsoleStatus {
    /// Create the sink with an empty bar
    ///
    /// `interactive` adds a typing hint to the confirmation footer.
    pub fn new(interactive: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
                .progress_chars("#>-"),
        );
        Ok(Self { bar, interactive })
    }

    /// Stop drawing and leave the last state on screen
    pub fn finish(&self) {
        self.bar.finish();
    }
}

impl StatusSink for ConsoleStatus {
    fn show_header(&mut self, text: &str) {
        self.bar.println(format!("Firmware: {}", text));
    }

    fn show_progress(&mut self, percent: u8) {
        self.bar.set_position(percent as u64);
    }

    fn show_message(&mut self, text: &str) {
        log::debug!("{}", text);
        self.bar.set_message(text.to_string());
    }

    fn show_footer(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.interactive {
            self.bar
                .println(format!("{}  (type 'start' or 'b' and press Enter)", text));
        } else {
            self.bar.println(text);
        }
    }

    fn show_preview(&mut self, tile: &PreviewTile) {
        let lit = tile.pixels().iter().filter(|&&p| p != 0).count();
        log::debug!(
            "preview tile: {} of {} pixels set",
            lit,
            tile.pixels().len()
        );
    }

    fn show_error(&mut self, code: &str) {
        self.bar.abandon_with_message(code.to_string());
    }
}

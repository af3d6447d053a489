//! Operator-facing status output
//!
//! Only the updater talks to the status sink; leaf components report
//! through their return values.

use crate::container::PreviewTile;

/// Where the updater reports what it is doing
pub trait StatusSink {
    /// Title line, normally the firmware description
    fn show_header(&mut self, text: &str);

    /// Progress of the current step, 0..=100
    fn show_progress(&mut self, percent: u8);

    /// Current step
    fn show_message(&mut self, text: &str);

    /// Hint line under the message
    fn show_footer(&mut self, text: &str) {
        let _ = text;
    }

    /// Show the firmware preview tile
    fn show_preview(&mut self, tile: &PreviewTile) {
        let _ = tile;
    }

    /// Fatal error; the update stops after this
    fn show_error(&mut self, code: &str);
}

impl<T: StatusSink + ?Sized> StatusSink for &mut T {
    fn show_header(&mut self, text: &str) {
        (**self).show_header(text)
    }

    fn show_progress(&mut self, percent: u8) {
        (**self).show_progress(percent)
    }

    fn show_message(&mut self, text: &str) {
        (**self).show_message(text)
    }

    fn show_footer(&mut self, text: &str) {
        (**self).show_footer(text)
    }

    fn show_preview(&mut self, tile: &PreviewTile) {
        (**self).show_preview(tile)
    }

    fn show_error(&mut self, code: &str) {
        (**self).show_error(code)
    }
}

/// Status sink that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn show_header(&mut self, text: &str) {
        log::info!("== {} ==", text);
    }

    fn show_progress(&mut self, percent: u8) {
        log::trace!("progress {}%", percent);
    }

    fn show_message(&mut self, text: &str) {
        log::info!("{}", text);
    }

    fn show_footer(&mut self, text: &str) {
        log::debug!("{}", text);
    }

    fn show_error(&mut self, code: &str) {
        log::error!("{}", code);
    }
}

/// Percentage of `done` out of `total`, clamped to 100
pub fn percent(done: u32, total: u32) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done as u64 * 100 / total as u64).min(100)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 10), 0);
        assert_eq!(percent(5, 10), 50);
        assert_eq!(percent(10, 10), 100);
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(u32::MAX, u32::MAX), 100);
    }
}

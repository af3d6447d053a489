//! Operator input on a host
//!
//! There is no gamepad on a host, so commands typed on stdin are turned into
//! button presses. They go through the same debouncer and shared snapshot as
//! the device's GPIO buttons.

use goflash_core::input::{Buttons, GamepadState, InputReader, RawInput, DEBOUNCE_TICK_MS};
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, TryRecvError};

/// Map one typed line to a button
pub fn parse_command(line: &str) -> Option<Buttons> {
    match line.trim().to_ascii_lowercase().as_str() {
        "start" | "s" => Some(Buttons::START),
        "b" | "cancel" | "q" | "quit" => Some(Buttons::B),
        _ => None,
    }
}

/// Raw input fed by a stdin reader thread
///
/// A typed command is reported as held for long enough that a poll at
/// `poll_interval_ms` sees it after debouncing, then released.
pub struct TerminalInput {
    rx: Receiver<Buttons>,
    held: Buttons,
    remaining: u32,
    hold_ticks: u32,
}

impl TerminalInput {
    /// Start reading stdin
    pub fn spawn(poll_interval_ms: u32) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("stdin".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    match parse_command(&line) {
                        Some(button) => {
                            if tx.send(button).is_err() {
                                return;
                            }
                        }
                        None => log::warn!("Unknown input '{}' (start, b)", line.trim()),
                    }
                }
                // Closed stdin cancels
                let _ = tx.send(Buttons::B);
            })?;
        Ok(Self::from_receiver(rx, poll_interval_ms))
    }

    fn from_receiver(rx: Receiver<Buttons>, poll_interval_ms: u32) -> Self {
        Self {
            rx,
            held: Buttons::empty(),
            remaining: 0,
            hold_ticks: poll_interval_ms / DEBOUNCE_TICK_MS + 3,
        }
    }
}

impl RawInput for TerminalInput {
    fn read_raw(&mut self) -> Buttons {
        if self.remaining > 0 {
            self.remaining -= 1;
            return self.held;
        }
        match self.rx.try_recv() {
            Ok(button) => {
                self.held = button;
                self.remaining = self.hold_ticks - 1;
                button
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Buttons::empty(),
        }
    }
}

/// Input that presses START on the first poll, for unattended runs
#[derive(Debug, Default)]
pub struct AutoConfirm {
    polls: u32,
}

impl InputReader for AutoConfirm {
    fn read_state(&mut self) -> GamepadState {
        self.polls += 1;
        if self.polls > 1 {
            GamepadState::new(Buttons::START)
        } else {
            GamepadState::default()
        }
    }

    fn delay_ms(&mut self, _ms: u32) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use goflash_core::input::Debouncer;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(" START\n"), Some(Buttons::START));
        assert_eq!(parse_command("b"), Some(Buttons::B));
        assert_eq!(parse_command("a"), None);
    }

    #[test]
    fn test_typed_press_survives_debounce_until_next_poll() {
        let (tx, rx) = mpsc::channel();
        let mut input = TerminalInput::from_receiver(rx, 100);
        let mut debouncer = Debouncer::new();

        assert!(debouncer.sample(input.read_raw()).pressed.is_empty());
        tx.send(Buttons::START).unwrap();

        // Pressed for at least one full poll interval after debouncing
        let states: Vec<bool> = (0..20)
            .map(|_| debouncer.sample(input.read_raw()).is_pressed(Buttons::START))
            .collect();
        assert!(!states[0]);
        assert_eq!(states.iter().filter(|&&p| p).count(), 13);
        assert!(!states[19]);
    }

    #[test]
    fn test_auto_confirm_is_a_rising_edge() {
        let mut input = AutoConfirm::default();
        let first = input.read_state();
        let second = input.read_state();
        assert_eq!(second.newly_pressed(&first), Buttons::START);
    }
}

//! Gamepad input
//!
//! Raw button levels are sampled every 10 ms and debounced with a two-sample
//! shift register per button: a button changes state only after two equal
//! consecutive samples. The debounced snapshot is what the updater polls.
//!
//! With `std`, [`SharedGamepad`] holds the snapshot behind a mutex so a
//! sampling thread ([`InputTask`]) can publish while the updater reads.

bitflags::bitflags! {
    /// Gamepad buttons
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Buttons: u16 {
        /// D-pad up
        const UP = 1 << 0;
        /// D-pad down
        const DOWN = 1 << 1;
        /// D-pad left
        const LEFT = 1 << 2;
        /// D-pad right
        const RIGHT = 1 << 3;
        /// Select
        const SELECT = 1 << 4;
        /// Start, confirms an update
        const START = 1 << 5;
        /// A
        const A = 1 << 6;
        /// B, cancels an update
        const B = 1 << 7;
        /// Menu
        const MENU = 1 << 8;
        /// Volume
        const VOLUME = 1 << 9;
    }
}

/// Number of buttons tracked by the debouncer
pub const BUTTON_COUNT: usize = 10;

/// Sampling period of the debouncer
pub const DEBOUNCE_TICK_MS: u32 = 10;

/// A debounced snapshot of every button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GamepadState {
    /// Buttons currently held
    pub pressed: Buttons,
}

impl GamepadState {
    /// Snapshot with the given buttons held
    pub fn new(pressed: Buttons) -> Self {
        Self { pressed }
    }

    /// Whether every button in `buttons` is held
    pub fn is_pressed(&self, buttons: Buttons) -> bool {
        self.pressed.contains(buttons)
    }

    /// Buttons held now but not in `previous` (rising edges)
    pub fn newly_pressed(&self, previous: &GamepadState) -> Buttons {
        self.pressed & !previous.pressed
    }
}

/// Source of debounced input for the updater
pub trait InputReader {
    /// Copy of the current debounced snapshot
    fn read_state(&mut self) -> GamepadState;

    /// Block for `ms` milliseconds between polls
    fn delay_ms(&mut self, ms: u32);
}

impl<T: InputReader + ?Sized> InputReader for &mut T {
    fn read_state(&mut self) -> GamepadState {
        (**self).read_state()
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

/// Hardware that reports raw, undebounced button levels
pub trait RawInput {
    /// Buttons whose line currently reads as pressed
    fn read_raw(&mut self) -> Buttons;
}

/// Two-sample shift-register debouncer
#[derive(Debug, Clone)]
pub struct Debouncer {
    history: [u8; BUTTON_COUNT],
    state: GamepadState,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new()
    }
}

impl Debouncer {
    /// All buttons released
    ///
    /// The history starts all ones, so a button held at the first sample
    /// registers at once while a released one needs two samples to clear.
    pub fn new() -> Self {
        Self {
            history: [0xFF; BUTTON_COUNT],
            state: GamepadState::default(),
        }
    }

    /// Feed one raw sample and return the debounced state
    pub fn sample(&mut self, raw: Buttons) -> GamepadState {
        for (i, history) in self.history.iter_mut().enumerate() {
            let button = Buttons::from_bits_truncate(1 << i);
            *history = (*history << 1) | raw.contains(button) as u8;
            match *history & 0x03 {
                0x00 => self.state.pressed.remove(button),
                0x03 => self.state.pressed.insert(button),
                _ => {}
            }
        }
        self.state
    }

    /// Current debounced state
    pub fn state(&self) -> GamepadState {
        self.state
    }
}

#[cfg(feature = "std")]
mod shared {
    use super::{Debouncer, GamepadState, InputReader, RawInput, DEBOUNCE_TICK_MS};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread::JoinHandle;
    use std::time::Duration;

    /// Debounced snapshot shared between a sampler and the updater
    #[derive(Debug, Clone, Default)]
    pub struct SharedGamepad {
        state: Arc<Mutex<GamepadState>>,
    }

    impl SharedGamepad {
        /// A snapshot with nothing pressed
        pub fn new() -> Self {
            Self::default()
        }

        /// Replace the snapshot
        pub fn publish(&self, state: GamepadState) {
            // A poisoned lock still holds a plain Copy value
            *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
        }

        /// Copy the snapshot out under the lock
        pub fn snapshot(&self) -> GamepadState {
            *self.state.lock().unwrap_or_else(|e| e.into_inner())
        }
    }

    impl InputReader for SharedGamepad {
        fn read_state(&mut self) -> GamepadState {
            self.snapshot()
        }

        fn delay_ms(&mut self, ms: u32) {
            std::thread::sleep(Duration::from_millis(ms as u64));
        }
    }

    /// Background thread sampling raw input into a [`SharedGamepad`]
    pub struct InputTask {
        running: Arc<AtomicBool>,
        handle: Option<JoinHandle<()>>,
    }

    impl InputTask {
        /// Start sampling `raw` every 10 ms
        pub fn spawn<R>(mut raw: R, shared: SharedGamepad) -> std::io::Result<Self>
        where
            R: RawInput + Send + 'static,
        {
            let running = Arc::new(AtomicBool::new(true));
            let flag = Arc::clone(&running);
            let handle = std::thread::Builder::new()
                .name("input".into())
                .spawn(move || {
                    let mut debouncer = Debouncer::new();
                    while flag.load(Ordering::Relaxed) {
                        let state = debouncer.sample(raw.read_raw());
                        shared.publish(state);
                        std::thread::sleep(Duration::from_millis(DEBOUNCE_TICK_MS as u64));
                    }
                    log::debug!("input task stopped");
                })?;
            Ok(Self {
                running,
                handle: Some(handle),
            })
        }

        /// Stop sampling and wait for the thread to exit
        pub fn stop(mut self) {
            self.shutdown();
        }

        fn shutdown(&mut self) {
            self.running.store(false, Ordering::Relaxed);
            if let Some(handle) = self.handle.take() {
                if handle.join().is_err() {
                    log::warn!("input task panicked");
                }
            }
        }
    }

    impl Drop for InputTask {
        fn drop(&mut self) {
            self.shutdown();
        }
    }
}

#[cfg(feature = "std")]
pub use shared::{InputTask, SharedGamepad};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample() {
        let mut d = Debouncer::new();
        assert_eq!(d.sample(Buttons::START).pressed, Buttons::START);

        // A button released from the start stays released
        let mut d = Debouncer::new();
        assert_eq!(d.sample(Buttons::empty()).pressed, Buttons::empty());
        assert_eq!(d.sample(Buttons::B).pressed, Buttons::empty());
        assert_eq!(d.sample(Buttons::B).pressed, Buttons::B);
    }

    #[test]
    fn test_glitch_filtered() {
        let mut d = Debouncer::new();
        d.sample(Buttons::A);
        d.sample(Buttons::A);
        assert!(d.state().is_pressed(Buttons::A));
        // A single released sample does not release the button
        d.sample(Buttons::empty());
        assert!(d.state().is_pressed(Buttons::A));
        d.sample(Buttons::A);
        assert!(d.state().is_pressed(Buttons::A));
        d.sample(Buttons::empty());
        d.sample(Buttons::empty());
        assert!(!d.state().is_pressed(Buttons::A));
    }

    #[test]
    fn test_newly_pressed() {
        let prev = GamepadState::new(Buttons::START);
        let now = GamepadState::new(Buttons::START | Buttons::B);
        assert_eq!(now.newly_pressed(&prev), Buttons::B);
        assert_eq!(prev.newly_pressed(&now), Buttons::empty());
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_shared_snapshot() {
        let shared = SharedGamepad::new();
        let mut reader = shared.clone();
        shared.publish(GamepadState::new(Buttons::MENU));
        assert_eq!(reader.read_state().pressed, Buttons::MENU);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_input_task_publishes() {
        struct Held;
        impl RawInput for Held {
            fn read_raw(&mut self) -> Buttons {
                Buttons::START
            }
        }

        let shared = SharedGamepad::new();
        let task = InputTask::spawn(Held, shared.clone()).unwrap();
        let mut seen = false;
        for _ in 0..200 {
            if shared.snapshot().is_pressed(Buttons::START) {
                seen = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        task.stop();
        assert!(seen);
    }
}

//! Visual status indicator.
//!
//! One red/green/blue LED line set shared by every task that wants to
//! signal progress, guarded by a single mutex. Pattern sequences are
//! short and deterministic, so callers that run a full pattern acquire
//! the lock unbounded; the activity pulse — fired from hot paths —
//! uses a bounded acquisition and is simply skipped when the lines are
//! busy. No acquisition ever spans a network wait.
//!
//! ## Patterns
//!
//! | Pattern          | Lines                                    |
//! |------------------|------------------------------------------|
//! | Booting          | all off, then blue on                    |
//! | WifiConnecting   | green blink, slow                        |
//! | WifiConnected    | green held                               |
//! | BrokerConnecting | green blink, fast                        |
//! | BrokerConnected  | green on (steady)                        |
//! | ActivityPulse    | green off briefly, then back on          |
//! | Reboot           | 3 × (red long on, long off)              |
//! | Abort            | 3 × (2 short red blinks, long off)       |
//! | Error            | 3 × (4 short red blinks, long off)       |
//!
//! On ESP-IDF the line state drives GPIO; on the host it is tracked
//! in-memory and every shown pattern is recorded for tests.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::info;

/// Named indicator patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Booting,
    WifiConnecting,
    WifiConnected,
    BrokerConnecting,
    BrokerConnected,
    ActivityPulse,
    Reboot,
    Abort,
    Error,
}

/// Step durations for pattern playback. Production timing by default;
/// tests use [`Timing::fast`] so full sequences run in microseconds.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Short blink on/off step.
    pub blink: Duration,
    /// Long hold / inter-burst gap.
    pub gap: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            blink: Duration::from_millis(150),
            gap: Duration::from_millis(1000),
        }
    }
}

impl Timing {
    pub fn fast() -> Self {
        Self {
            blink: Duration::ZERO,
            gap: Duration::ZERO,
        }
    }
}

/// Last commanded level of the three lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lines {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
}

struct State {
    lines: Lines,
    #[cfg(not(target_os = "espidf"))]
    history: Vec<Pattern>,
}

/// The shared indicator resource.
pub struct IndicatorService {
    timing: Timing,
    state: Mutex<State>,
}

impl IndicatorService {
    pub fn new(timing: Timing) -> Self {
        Self {
            timing,
            state: Mutex::new(State {
                lines: Lines::default(),
                #[cfg(not(target_os = "espidf"))]
                history: Vec::new(),
            }),
        }
    }

    /// Turn every line off. Unbounded acquisition.
    pub fn all_off(&self) {
        let mut state = self.lock();
        Self::apply(&mut state, Lines::default());
    }

    /// Play a pattern to completion. Unbounded acquisition — sequences
    /// are fixed-duration, so the hold is bounded in practice.
    pub fn show(&self, pattern: Pattern) {
        let mut state = self.lock();
        info!("indicator: {pattern:?}");
        #[cfg(not(target_os = "espidf"))]
        state.history.push(pattern);
        self.play(&mut state, pattern);
    }

    /// Brief green pulse for communication activity. Bounded
    /// acquisition: gives up (and skips the pulse) if the lines stay
    /// busy past `timeout`.
    pub fn activity_pulse(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = loop {
            match self.state.try_lock() {
                Ok(guard) => break guard,
                Err(std::sync::TryLockError::Poisoned(e)) => break e.into_inner(),
                Err(std::sync::TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return false;
                    }
                    thread::sleep(Duration::from_millis(5));
                }
            }
        };
        #[cfg(not(target_os = "espidf"))]
        state.history.push(Pattern::ActivityPulse);
        self.play(&mut state, Pattern::ActivityPulse);
        true
    }

    /// Last commanded line levels.
    pub fn lines(&self) -> Lines {
        self.lock().lines
    }

    /// Every pattern shown so far, in order. Host-only test hook.
    #[cfg(not(target_os = "espidf"))]
    pub fn history(&self) -> Vec<Pattern> {
        self.lock().history.clone()
    }

    // ── Internal ──────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn play(&self, state: &mut State, pattern: Pattern) {
        let t = self.timing;
        match pattern {
            Pattern::Booting => {
                Self::apply(state, Lines::default());
                Self::apply(state, Lines { blue: true, ..Lines::default() });
            }
            Pattern::WifiConnecting => {
                self.blink_green(state, 3, t.gap / 2);
            }
            Pattern::WifiConnected => {
                Self::apply(state, Lines { green: true, ..Lines::default() });
                thread::sleep(t.gap * 2);
            }
            Pattern::BrokerConnecting => {
                self.blink_green(state, 3, t.blink);
            }
            Pattern::BrokerConnected => {
                Self::apply(state, Lines { green: true, ..Lines::default() });
            }
            Pattern::ActivityPulse => {
                Self::apply(state, Lines { green: false, ..state.lines });
                thread::sleep(t.blink);
                Self::apply(state, Lines { green: true, ..state.lines });
            }
            Pattern::Reboot => {
                for _ in 0..3 {
                    Self::apply(state, Lines { red: true, ..Lines::default() });
                    thread::sleep(t.blink * 2);
                    Self::apply(state, Lines::default());
                    thread::sleep(t.gap);
                }
            }
            Pattern::Abort => self.red_burst(state, 2),
            Pattern::Error => self.red_burst(state, 4),
        }
    }

    /// 3 repetitions of `blinks` short red flashes followed by a gap.
    fn red_burst(&self, state: &mut State, blinks: u32) {
        let t = self.timing;
        for _ in 0..3 {
            for _ in 0..blinks {
                Self::apply(state, Lines { red: true, ..Lines::default() });
                thread::sleep(t.blink);
                Self::apply(state, Lines::default());
                thread::sleep(t.blink);
            }
            thread::sleep(t.gap);
        }
    }

    fn blink_green(&self, state: &mut State, cycles: u32, step: Duration) {
        for _ in 0..cycles {
            Self::apply(state, Lines { green: true, ..Lines::default() });
            thread::sleep(step);
            Self::apply(state, Lines::default());
            thread::sleep(step);
        }
    }

    fn apply(state: &mut State, lines: Lines) {
        state.lines = lines;
        Self::platform_set(lines);
    }

    #[cfg(target_os = "espidf")]
    fn platform_set(_lines: Lines) {
        // GPIO line writes via esp_idf_hal::gpio::PinDriver, wired in
        // main.rs together with the rest of the peripheral handles.
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_set(_lines: Lines) {}
}

pub mod debounce;
pub mod decoder;
pub mod intake;

use std::time::Duration;

use tokio::time::Instant;

/// One reading of the dial line. `at` is measured from the [`Clock`] epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub level: bool,
    pub at: Duration,
}

/// One hardware edge as reported by an interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub at: Duration,
}

/// Anything that enters the decoder carries the time it was taken.
pub trait Stamped {
    fn at(&self) -> Duration;
}

impl Stamped for RawSample {
    fn at(&self) -> Duration {
        self.at
    }
}

impl Stamped for EdgeEvent {
    fn at(&self) -> Duration {
        self.at
    }
}

/// A transition that survived debouncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmedEdge {
    /// The dial contact broke: one pulse.
    PulseStart(Duration),
    /// The contact made again.
    PulseEnd(Duration),
}

/// A finished dial. `value` is always in `0..=9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitEvent {
    pub value: u8,
    pub at: Duration,
}

/// Turns raw line input into confirmed pulse edges.
///
/// Both acquisition strategies implement this so the state machine never
/// needs to know whether it is fed by an interrupt or by polling.
pub trait PulseFilter {
    type Input: Stamped + Send + 'static;

    fn feed(&mut self, input: Self::Input) -> Option<ConfirmedEdge>;

    fn reset(&mut self);
}

/// Receives completed digits. Must not block.
pub trait DigitSink {
    fn on_digit_complete(&mut self, event: DigitEvent);
}

/// Mirrors the debounced line state, usually onto an LED.
pub trait Indicator {
    fn on_state_changed(&mut self, active: bool);
}

impl Indicator for () {
    fn on_state_changed(&mut self, _active: bool) {}
}

impl<I: Indicator> Indicator for Option<I> {
    fn on_state_changed(&mut self, active: bool) {
        if let Some(indicator) = self {
            indicator.on_state_changed(active);
        }
    }
}

/// Monotonic time base shared by the producers and the consumer.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    epoch: Instant,
}

impl Clock {
    pub fn start() -> Self {
        Clock {
            epoch: Instant::now(),
        }
    }

    pub fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    pub fn instant_at(&self, offset: Duration) -> Instant {
        self.epoch + offset
    }
}

use std::time::Duration;

use crate::config::DecoderConfig;

use super::DigitEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialState {
    Idle,
    Accumulating {
        /// Pulses so far, modulo 10.
        count: u8,
        last_pulse: Duration,
    },
}

/// What a confirmed pulse did to the dial in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseOutcome {
    /// First pulse after idle.
    Started,
    Counted(u8),
    /// The gap since the previous pulse was too long; `dropped` pulses were
    /// thrown away and this pulse begins a new train.
    Restarted { dropped: u8 },
}

/// Pulse counting and digit-boundary detection.
///
/// Owned by exactly one task. Feed it confirmed pulses with [`on_pulse`] and
/// ask it whether the dial has finished with [`poll`]; the latter is safe to
/// call as often as you like and yields each digit once.
///
/// [`on_pulse`]: DialDecoder::on_pulse
/// [`poll`]: DialDecoder::poll
#[derive(Debug, Clone)]
pub struct DialDecoder {
    max_pulse_gap: Duration,
    completion_gap: Duration,
    state: DialState,
}

impl DialDecoder {
    pub fn new(config: &DecoderConfig) -> Self {
        DialDecoder {
            max_pulse_gap: config.max_pulse_gap,
            completion_gap: config.completion_gap,
            state: DialState::Idle,
        }
    }

    pub fn state(&self) -> DialState {
        self.state
    }

    pub fn on_pulse(&mut self, at: Duration) -> PulseOutcome {
        match self.state {
            DialState::Idle => {
                self.state = DialState::Accumulating {
                    count: 1,
                    last_pulse: at,
                };
                PulseOutcome::Started
            }
            DialState::Accumulating { count, last_pulse } => {
                if at.saturating_sub(last_pulse) > self.max_pulse_gap {
                    self.state = DialState::Accumulating {
                        count: 1,
                        last_pulse: at,
                    };
                    PulseOutcome::Restarted { dropped: count }
                } else {
                    let count = (count + 1) % 10;
                    self.state = DialState::Accumulating {
                        count,
                        last_pulse: at,
                    };
                    PulseOutcome::Counted(count)
                }
            }
        }
    }

    /// When the dial in progress will be complete if no further pulse shows up.
    pub fn deadline(&self) -> Option<Duration> {
        match self.state {
            DialState::Idle => None,
            DialState::Accumulating { last_pulse, .. } => Some(last_pulse + self.completion_gap),
        }
    }

    pub fn poll(&mut self, now: Duration) -> Option<DigitEvent> {
        let DialState::Accumulating { count, last_pulse } = self.state else {
            return None;
        };

        if now.saturating_sub(last_pulse) < self.completion_gap {
            return None;
        }

        self.state = DialState::Idle;

        Some(DigitEvent { value: count, at: now })
    }

    /// Drops the dial in progress without emitting it. Returns the count that
    /// was lost, if any.
    pub fn discard(&mut self) -> Option<u8> {
        match std::mem::replace(&mut self.state, DialState::Idle) {
            DialState::Idle => None,
            DialState::Accumulating { count, .. } => Some(count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    /// Pulses 100 ms apart starting at `start`; returns the time of the last one.
    fn dial(decoder: &mut DialDecoder, start: u64, pulses: u64) -> u64 {
        let mut at = start;
        for index in 0..pulses {
            at = start + index * 100;
            decoder.on_pulse(ms(at));
            assert_eq!(decoder.poll(ms(at)), None);
        }
        at
    }

    #[test]
    fn n_pulses_give_digit_n() {
        for pulses in 1..=9u64 {
            let mut decoder = DialDecoder::new(&DecoderConfig::default());
            let last = dial(&mut decoder, 1_000, pulses);

            assert_eq!(
                decoder.poll(ms(last + 125)),
                Some(DigitEvent {
                    value: pulses as u8,
                    at: ms(last + 125),
                })
            );
            assert_eq!(decoder.state(), DialState::Idle);
        }
    }

    #[test]
    fn ten_pulses_give_zero() {
        let mut decoder = DialDecoder::new(&DecoderConfig::default());
        let last = dial(&mut decoder, 0, 10);

        let event = decoder.poll(ms(last + 200)).unwrap();
        assert_eq!(event.value, 0);
    }

    #[test]
    fn nothing_before_completion_gap() {
        let mut decoder = DialDecoder::new(&DecoderConfig::default());
        let last = dial(&mut decoder, 0, 3);

        assert_eq!(decoder.poll(ms(last + 124)), None);
        assert_eq!(decoder.deadline(), Some(ms(last + 125)));
        assert_eq!(decoder.poll(ms(last + 125)).map(|event| event.value), Some(3));
    }

    #[test]
    fn emits_once_per_dial() {
        let mut decoder = DialDecoder::new(&DecoderConfig::default());
        let last = dial(&mut decoder, 0, 4);

        assert!(decoder.poll(ms(last + 130)).is_some());
        assert_eq!(decoder.poll(ms(last + 131)), None);
        assert_eq!(decoder.poll(ms(last + 10_000)), None);
    }

    #[test]
    fn poll_while_idle_is_a_no_op() {
        let mut decoder = DialDecoder::new(&DecoderConfig::default());

        assert_eq!(decoder.poll(ms(0)), None);
        assert_eq!(decoder.poll(ms(1_000_000)), None);
        assert_eq!(decoder.deadline(), None);
    }

    #[test]
    fn counter_wraps_through_thousands_of_pulses() {
        let mut decoder = DialDecoder::new(&DecoderConfig::default());

        for index in 0..5_000u64 {
            let at = ms(index * 100);
            decoder.on_pulse(at);
            assert_eq!(decoder.poll(at + ms(99)), None);

            let DialState::Accumulating { count, .. } = decoder.state() else {
                panic!("decoder went idle mid-train");
            };
            assert_eq!(u64::from(count), (index + 1) % 10);
        }
    }

    #[test]
    fn long_gap_restarts_the_count() {
        let mut decoder = DialDecoder::new(&DecoderConfig::default());

        assert_eq!(decoder.on_pulse(ms(0)), PulseOutcome::Started);
        assert_eq!(decoder.on_pulse(ms(100)), PulseOutcome::Counted(2));
        assert_eq!(decoder.on_pulse(ms(220)), PulseOutcome::Restarted { dropped: 2 });
        assert_eq!(decoder.on_pulse(ms(320)), PulseOutcome::Counted(2));
        assert_eq!(decoder.on_pulse(ms(420)), PulseOutcome::Counted(3));

        assert_eq!(decoder.poll(ms(545)).map(|event| event.value), Some(3));
    }

    #[test]
    fn gap_equal_to_reset_threshold_still_counts() {
        let mut decoder = DialDecoder::new(&DecoderConfig::default());

        decoder.on_pulse(ms(0));
        assert_eq!(decoder.on_pulse(ms(110)), PulseOutcome::Counted(2));
    }

    #[test]
    fn pulse_after_completion_starts_new_dial() {
        let mut decoder = DialDecoder::new(&DecoderConfig::default());
        dial(&mut decoder, 0, 2);

        assert_eq!(decoder.poll(ms(400)).map(|event| event.value), Some(2));
        assert_eq!(decoder.on_pulse(ms(500)), PulseOutcome::Started);
    }

    #[test]
    fn discard_drops_dial_in_progress() {
        let mut decoder = DialDecoder::new(&DecoderConfig::default());
        dial(&mut decoder, 0, 6);

        assert_eq!(decoder.discard(), Some(6));
        assert_eq!(decoder.state(), DialState::Idle);
        assert_eq!(decoder.poll(ms(10_000)), None);
        assert_eq!(decoder.discard(), None);
    }
}

//! The two ways of turning a bouncing contact into clean pulse edges.
//!
//! [`ShiftRegisterFilter`] works on periodic level samples and only trusts a
//! level once it has been seen for a whole run of samples. [`EdgeGapFilter`]
//! works on interrupt timestamps and only trusts an edge that follows a quiet
//! line.

use std::time::Duration;

use crate::config::DecoderConfig;

use super::{ConfirmedEdge, EdgeEvent, PulseFilter, RawSample};

/// Shift-register debouncer for the polling intake.
///
/// The newest sample sits in bit 0. Bits above the configured window are
/// kept at one, so a freshly seeded register reads as a line resting high.
///
/// Only the newest `run` samples decide a level change. The window width
/// bounds that run: a run longer than the window is cut down to it.
#[derive(Debug, Clone)]
pub struct ShiftRegisterFilter {
    history: u16,
    padding: u16,
    run_mask: u16,
    high: bool,
}

impl ShiftRegisterFilter {
    pub fn new(config: &DecoderConfig) -> Self {
        let width = u32::from(config.debounce_width.clamp(1, 16));
        let run = config.run_length().clamp(1, width);

        ShiftRegisterFilter {
            history: u16::MAX,
            padding: !low_bits(width),
            run_mask: low_bits(run),
            high: true,
        }
    }

    /// Debounced line level.
    pub fn is_high(&self) -> bool {
        self.high
    }
}

fn low_bits(count: u32) -> u16 {
    if count >= 16 {
        u16::MAX
    } else {
        (1 << count) - 1
    }
}

impl PulseFilter for ShiftRegisterFilter {
    type Input = RawSample;

    fn feed(&mut self, sample: RawSample) -> Option<ConfirmedEdge> {
        self.history = (self.history << 1) | u16::from(sample.level) | self.padding;

        let recent = self.history & self.run_mask;

        if self.high && recent == 0 {
            self.high = false;
            Some(ConfirmedEdge::PulseStart(sample.at))
        } else if !self.high && recent == self.run_mask {
            self.high = true;
            Some(ConfirmedEdge::PulseEnd(sample.at))
        } else {
            None
        }
    }

    fn reset(&mut self) {
        self.history = u16::MAX;
        self.high = true;
    }
}

/// Quiet-time debouncer for the interrupt intake.
///
/// Every edge, accepted or not, restarts the quiet window, so a chattering
/// contact keeps being rejected until it settles.
#[derive(Debug, Clone)]
pub struct EdgeGapFilter {
    min_gap: Duration,
    last_edge: Option<Duration>,
}

impl EdgeGapFilter {
    pub fn new(config: &DecoderConfig) -> Self {
        EdgeGapFilter {
            min_gap: config.min_pulse_gap,
            last_edge: None,
        }
    }
}

impl PulseFilter for EdgeGapFilter {
    type Input = EdgeEvent;

    fn feed(&mut self, edge: EdgeEvent) -> Option<ConfirmedEdge> {
        let quiet = match self.last_edge {
            Some(last) => edge.at.saturating_sub(last) > self.min_gap,
            None => true,
        };

        self.last_edge = Some(edge.at);

        quiet.then_some(ConfirmedEdge::PulseStart(edge.at))
    }

    fn reset(&mut self) {
        self.last_edge = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn samples(levels: &[bool]) -> Vec<RawSample> {
        levels
            .iter()
            .enumerate()
            .map(|(index, &level)| RawSample {
                level,
                at: ms(index as u64 * 10),
            })
            .collect()
    }

    fn run_shift(filter: &mut ShiftRegisterFilter, levels: &[bool]) -> Vec<ConfirmedEdge> {
        samples(levels)
            .into_iter()
            .filter_map(|sample| filter.feed(sample))
            .collect()
    }

    #[test]
    fn steady_high_line_is_quiet() {
        let mut filter = ShiftRegisterFilter::new(&DecoderConfig::default());

        assert!(run_shift(&mut filter, &[true; 50]).is_empty());
        assert!(filter.is_high());
    }

    #[test]
    fn clean_pulse_gives_start_then_end() {
        let mut filter = ShiftRegisterFilter::new(&DecoderConfig::default());

        let edges = run_shift(
            &mut filter,
            &[true, true, false, false, false, false, true, true, true, true],
        );

        assert_eq!(
            edges,
            vec![ConfirmedEdge::PulseStart(ms(30)), ConfirmedEdge::PulseEnd(ms(70))]
        );
    }

    #[test]
    fn single_low_sample_is_bounce() {
        let mut filter = ShiftRegisterFilter::new(&DecoderConfig::default());

        let edges = run_shift(&mut filter, &[true, false, true, true, false, true, true]);

        assert!(edges.is_empty());
        assert!(filter.is_high());
    }

    #[test]
    fn rapid_toggling_never_confirms() {
        let mut filter = ShiftRegisterFilter::new(&DecoderConfig::default());
        let levels: Vec<bool> = (0..100).map(|index| index % 2 == 0).collect();

        assert!(run_shift(&mut filter, &levels).is_empty());
    }

    #[test]
    fn chatter_before_a_real_break_still_counts() {
        let mut filter = ShiftRegisterFilter::new(&DecoderConfig::default());

        let edges = run_shift(&mut filter, &[true, false, true, false, false, false]);

        assert_eq!(edges, vec![ConfirmedEdge::PulseStart(ms(40))]);
    }

    #[test]
    fn longer_min_gap_needs_longer_runs() {
        let config = DecoderConfig {
            min_pulse_gap: ms(40),
            ..DecoderConfig::default()
        };
        let mut filter = ShiftRegisterFilter::new(&config);

        assert!(run_shift(&mut filter, &[false, false, false, true]).is_empty());

        filter.reset();
        let edges = run_shift(&mut filter, &[false, false, false, false]);
        assert_eq!(edges, vec![ConfirmedEdge::PulseStart(ms(30))]);
    }

    #[test]
    fn window_caps_the_run_length() {
        let config = DecoderConfig {
            debounce_width: 2,
            min_pulse_gap: ms(40),
            ..DecoderConfig::default()
        };
        let mut filter = ShiftRegisterFilter::new(&config);

        let edges = run_shift(&mut filter, &[true, false, false, true, true]);

        assert_eq!(
            edges,
            vec![ConfirmedEdge::PulseStart(ms(20)), ConfirmedEdge::PulseEnd(ms(40))]
        );
    }

    #[test]
    fn reset_returns_to_resting_high() {
        let mut filter = ShiftRegisterFilter::new(&DecoderConfig::default());
        run_shift(&mut filter, &[false, false, false]);
        assert!(!filter.is_high());

        filter.reset();

        assert!(filter.is_high());
        assert!(run_shift(&mut filter, &[true, true]).is_empty());
    }

    #[test]
    fn first_edge_is_accepted() {
        let mut filter = EdgeGapFilter::new(&DecoderConfig::default());

        assert_eq!(
            filter.feed(EdgeEvent { at: ms(5) }),
            Some(ConfirmedEdge::PulseStart(ms(5)))
        );
    }

    #[test]
    fn bounce_after_an_edge_is_dropped() {
        let mut filter = EdgeGapFilter::new(&DecoderConfig::default());

        assert!(filter.feed(EdgeEvent { at: ms(100) }).is_some());
        assert!(filter.feed(EdgeEvent { at: ms(101) }).is_none());
        assert!(filter.feed(EdgeEvent { at: ms(103) }).is_none());
        assert!(filter.feed(EdgeEvent { at: ms(200) }).is_some());
    }

    #[test]
    fn gap_equal_to_threshold_is_bounce() {
        let mut filter = EdgeGapFilter::new(&DecoderConfig::default());

        assert!(filter.feed(EdgeEvent { at: ms(0) }).is_some());
        assert!(filter.feed(EdgeEvent { at: ms(20) }).is_none());
        assert!(filter.feed(EdgeEvent { at: ms(41) }).is_some());
    }

    #[test]
    fn sustained_chatter_keeps_being_rejected() {
        let mut filter = EdgeGapFilter::new(&DecoderConfig::default());
        assert!(filter.feed(EdgeEvent { at: ms(0) }).is_some());

        for step in 1..50 {
            assert!(filter.feed(EdgeEvent { at: ms(step * 15) }).is_none());
        }
    }
}

//! Plumbing between the producer context (interrupt callback or polling task)
//! and the single consumer task that owns the decoder.

use std::time::Duration;

use thiserror::Error;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, trace, warn};

use super::{
    decoder::{DialDecoder, PulseOutcome},
    Clock, ConfirmedEdge, DigitSink, Indicator, PulseFilter, RawSample, Stamped,
};

/// What travels over the intake channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intake<I> {
    Input(I),
    /// The producer had to drop `dropped` inputs because the channel was full.
    Overrun { dropped: u32 },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("dial consumer has gone away")]
pub struct IntakeClosed;

/// Builds the intake channel. It holds `capacity` inputs plus one slot kept
/// back for an overrun marker, so the consumer always hears about a loss
/// behind the inputs that came before it.
pub fn channel<I>(capacity: usize) -> (IntakeProducer<I>, mpsc::Receiver<Intake<I>>) {
    let (sender, receiver) = mpsc::channel(capacity + 1);

    (
        IntakeProducer {
            sender,
            dropped: 0,
            marked: false,
        },
        receiver,
    )
}

/// Producer half of the intake channel. Never blocks and never logs, so it is
/// safe to drive from an interrupt callback.
#[derive(Debug)]
pub struct IntakeProducer<I> {
    sender: mpsc::Sender<Intake<I>>,
    /// Inputs lost since the last marker went out.
    dropped: u32,
    /// A marker for the current overrun is already queued.
    marked: bool,
}

impl<I> IntakeProducer<I> {
    pub fn push(&mut self, input: I) -> Result<(), IntakeClosed> {
        if self.sender.is_closed() {
            return Err(IntakeClosed);
        }

        // Losses counted after the marker went out. The consumer has been idle
        // since that marker, so this one only settles the count.
        if self.dropped > 0 && self.has_room_for_input() {
            self.send_overrun()?;
        }

        if self.has_room_for_input() {
            self.marked = false;
            return self.send(Intake::Input(input));
        }

        self.dropped = self.dropped.saturating_add(1);
        if !self.marked {
            self.send_overrun()?;
        }

        Ok(())
    }

    /// An input may never take the last free slot.
    fn has_room_for_input(&self) -> bool {
        self.sender.capacity() > 1
    }

    fn send_overrun(&mut self) -> Result<(), IntakeClosed> {
        self.send(Intake::Overrun {
            dropped: self.dropped,
        })?;
        self.dropped = 0;
        self.marked = true;
        Ok(())
    }

    fn send(&self, intake: Intake<I>) -> Result<(), IntakeClosed> {
        match self.sender.try_send(intake) {
            Ok(()) => Ok(()),
            // The reserved slot keeps a single producer from getting here.
            Err(TrySendError::Full(_)) => Ok(()),
            Err(TrySendError::Closed(_)) => Err(IntakeClosed),
        }
    }
}

/// A line that can be sampled.
pub trait DialLine {
    fn read_level(&mut self) -> bool;
}

/// Periodic sampling task for the polling intake. Runs until the consumer
/// hangs up.
pub async fn run_polling<L: DialLine>(
    mut line: L,
    mut producer: IntakeProducer<RawSample>,
    clock: Clock,
    interval: Duration,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let sample = RawSample {
            level: line.read_level(),
            at: clock.now(),
        };

        if producer.push(sample).is_err() {
            break;
        }
    }
}

/// The one owner of the filter, the pulse counter and the dial timer.
pub struct DialConsumer<F, S, L> {
    filter: F,
    decoder: DialDecoder,
    sink: S,
    indicator: L,
    line_active: bool,
}

impl<F, S, L> DialConsumer<F, S, L>
where
    F: PulseFilter,
    S: DigitSink,
    L: Indicator,
{
    pub fn new(filter: F, decoder: DialDecoder, sink: S, indicator: L) -> Self {
        DialConsumer {
            filter,
            decoder,
            sink,
            indicator,
            line_active: false,
        }
    }

    pub fn decoder(&self) -> &DialDecoder {
        &self.decoder
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn handle(&mut self, intake: Intake<F::Input>) {
        match intake {
            Intake::Overrun { dropped } => {
                match self.decoder.discard() {
                    Some(count) => {
                        warn!(dropped, count, "intake overrun, discarding dial in progress")
                    }
                    None => warn!(dropped, "intake overrun"),
                }
                self.set_line_active(false);
            }
            Intake::Input(input) => {
                let at = input.at();

                // A dial that has already run out its completion gap is
                // finished, whatever this input turns out to be.
                self.check_completion(at);

                match self.filter.feed(input) {
                    Some(ConfirmedEdge::PulseStart(at)) => {
                        trace!(?at, "pulse start");
                        self.set_line_active(true);

                        match self.decoder.on_pulse(at) {
                            PulseOutcome::Started => debug!(?at, "dial started"),
                            PulseOutcome::Counted(count) => debug!(?at, count, "pulse"),
                            PulseOutcome::Restarted { dropped } => {
                                debug!(?at, dropped, "pulse gap too long, restarting count")
                            }
                        }
                    }
                    Some(ConfirmedEdge::PulseEnd(at)) => {
                        trace!(?at, "pulse end");
                        self.set_line_active(false);
                    }
                    None => {}
                }
            }
        }
    }

    pub fn check_completion(&mut self, now: Duration) {
        if let Some(event) = self.decoder.poll(now) {
            info!(digit = event.value, at = ?event.at, "dial complete");
            self.set_line_active(false);
            self.sink.on_digit_complete(event);
        }
    }

    /// Returns to idle as if freshly built.
    pub fn reset(&mut self) {
        self.filter.reset();
        self.decoder.discard();
        self.set_line_active(false);
    }

    fn set_line_active(&mut self, active: bool) {
        if self.line_active != active {
            self.line_active = active;
            self.indicator.on_state_changed(active);
        }
    }

    /// Consumes intake until every producer is gone. The completion timer is
    /// re-armed from the decoder's deadline on every pass, so a new pulse
    /// simply replaces the pending one.
    ///
    /// Queued intake always goes first: a pulse waiting in the channel belongs
    /// to the dial the timer is about to close.
    pub async fn run(
        mut self,
        mut receiver: mpsc::Receiver<Intake<F::Input>>,
        clock: Clock,
    ) -> Self {
        loop {
            match self.decoder.deadline() {
                Some(deadline) => {
                    tokio::select! {
                        biased;

                        intake = receiver.recv() => match intake {
                            Some(intake) => self.handle(intake),
                            None => break,
                        },
                        _ = time::sleep_until(clock.instant_at(deadline)) => {
                            while let Ok(intake) = receiver.try_recv() {
                                self.handle(intake);
                            }
                            self.check_completion(clock.now());
                        }
                    }
                }
                None => match receiver.recv().await {
                    Some(intake) => self.handle(intake),
                    None => break,
                },
            }
        }

        self
    }
}

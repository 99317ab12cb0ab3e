//! A dial that lives on stdin. Type digits and they come back out of the line
//! as pulse trains, contact chatter included.

use std::{
    io::BufRead,
    sync::mpsc::{self, Receiver, Sender},
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, info, warn};

use crate::dial::{
    intake::{DialLine, IntakeProducer},
    Clock, EdgeEvent, Indicator,
};

use super::{DialHardware, HardwareError};

/// Shape of the generated pulse trains. The defaults are a 10 pulse per
/// second dial with a 60/40 break/make ratio.
#[derive(Debug, Clone)]
pub struct PulseTiming {
    pub break_time: Duration,
    pub make_time: Duration,
    /// Length of each bounce the contact makes when it closes again.
    pub chatter: Duration,
    /// Line stays at rest this long after the last pulse.
    pub inter_digit: Duration,
}

impl Default for PulseTiming {
    fn default() -> Self {
        PulseTiming {
            break_time: Duration::from_millis(60),
            make_time: Duration::from_millis(40),
            chatter: Duration::from_millis(1),
            inter_digit: Duration::from_millis(400),
        }
    }
}

/// Line level over time for one dialed digit. Starts and ends high.
#[derive(Debug, Clone)]
pub struct Waveform {
    transitions: Vec<(Duration, bool)>,
    length: Duration,
}

impl Waveform {
    pub fn for_digit(digit: u8, timing: &PulseTiming) -> Waveform {
        let pulses = match digit % 10 {
            0 => 10,
            digit => digit,
        };

        let mut transitions = Vec::new();
        let mut at = Duration::ZERO;

        for _ in 0..pulses {
            transitions.push((at, false));

            let make = at + timing.break_time;
            transitions.push((make, true));
            transitions.push((make + timing.chatter, false));
            transitions.push((make + timing.chatter * 2, true));

            at = make + timing.make_time;
        }

        Waveform {
            transitions,
            length: at + timing.inter_digit,
        }
    }

    pub fn length(&self) -> Duration {
        self.length
    }

    pub fn level_at(&self, offset: Duration) -> bool {
        self.transitions
            .iter()
            .take_while(|(at, _)| *at <= offset)
            .last()
            .map_or(true, |&(_, level)| level)
    }

    /// Every low-to-high transition, bounces included.
    pub fn rising_edges(&self) -> impl Iterator<Item = Duration> + '_ {
        self.transitions
            .iter()
            .filter(|(_, level)| *level)
            .map(|&(at, _)| at)
    }
}

pub struct Hardware {
    timing: PulseTiming,
    dial_receiver: Option<Receiver<u8>>,
    playing: Option<(Instant, Waveform)>,
    indicator: Option<ConsoleLed>,
}

/// Stand-in for the LED.
pub struct ConsoleLed;

impl Indicator for ConsoleLed {
    fn on_state_changed(&mut self, active: bool) {
        debug!(active, "indicator");
    }
}

impl Hardware {
    fn with_receiver(dial_receiver: Receiver<u8>, timing: PulseTiming) -> Self {
        Hardware {
            timing,
            dial_receiver: Some(dial_receiver),
            playing: None,
            indicator: Some(ConsoleLed),
        }
    }
}

fn read_digits(dial_sender: Sender<u8>) {
    for line in std::io::stdin().lock().lines() {
        let Ok(line) = line else {
            break;
        };

        for ch in line.chars().filter(|ch| !ch.is_whitespace()) {
            match ch.to_digit(10) {
                Some(digit) => {
                    if dial_sender.send(digit as u8).is_err() {
                        return;
                    }
                }
                None => warn!("ignoring {:?}, only digits can be dialed", ch),
            }
        }
    }
}

impl DialLine for Hardware {
    fn read_level(&mut self) -> bool {
        let now = Instant::now();

        if let Some((start, waveform)) = &self.playing {
            if now.duration_since(*start) >= waveform.length() {
                self.playing = None;
            }
        }

        if self.playing.is_none() {
            if let Some(digit) = self.dial_receiver.as_ref().and_then(|r| r.try_recv().ok()) {
                self.playing = Some((now, Waveform::for_digit(digit, &self.timing)));
            }
        }

        match &self.playing {
            Some((start, waveform)) => waveform.level_at(now.duration_since(*start)),
            None => true,
        }
    }
}

impl DialHardware for Hardware {
    type Indicator = ConsoleLed;

    fn create() -> Result<Self, HardwareError> {
        let (dial_sender, dial_receiver) = mpsc::channel::<u8>();

        thread::Builder::new()
            .name("stdin-dial".to_string())
            .spawn(move || read_digits(dial_sender))
            .map_err(|e| HardwareError::Thread("stdin-dial", e))?;

        info!("emulated dial ready, type digits and press enter");

        Ok(Hardware::with_receiver(dial_receiver, PulseTiming::default()))
    }

    fn take_indicator(&mut self) -> Option<ConsoleLed> {
        self.indicator.take()
    }

    fn listen_edges(
        &mut self,
        mut producer: IntakeProducer<EdgeEvent>,
        clock: Clock,
    ) -> Result<(), HardwareError> {
        let dial_receiver = self.dial_receiver.take().ok_or(HardwareError::EdgesTaken)?;
        let timing = self.timing.clone();

        thread::Builder::new()
            .name("dial-edges".to_string())
            .spawn(move || {
                for digit in dial_receiver.iter() {
                    let waveform = Waveform::for_digit(digit, &timing);
                    let start = Instant::now();

                    for edge in waveform.rising_edges() {
                        thread::sleep((start + edge).saturating_duration_since(Instant::now()));

                        if producer.push(EdgeEvent { at: clock.now() }).is_err() {
                            return;
                        }
                    }

                    let end = start + waveform.length();
                    thread::sleep(end.saturating_duration_since(Instant::now()));
                }
            })
            .map_err(|e| HardwareError::Thread("dial-edges", e))?;

        Ok(())
    }
}

use std::{str::FromStr, time::Duration};

use thiserror::Error;

pub const DIAL_PULSE_PIN: u8 = 27;
pub const INDICATOR_LED_PIN: u8 = 4;

pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 10;
pub const DEFAULT_DEBOUNCE_WIDTH: u8 = 8;
pub const DEFAULT_MIN_PULSE_GAP_MS: u64 = 20;
pub const DEFAULT_MAX_PULSE_GAP_MS: u64 = 110;
pub const DEFAULT_COMPLETION_GAP_MS: u64 = 125;
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;
pub const DEFAULT_NOTIFY_TIMEOUT_MS: u64 = 10_000;

pub const MAX_DEBOUNCE_WIDTH: u8 = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is not a valid value: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("unknown intake mode {0:?}, expected Interrupt or Polling")]
    UnknownIntake(String),

    #[error("debounce width must be between 1 and 16, got {0}")]
    DebounceWidth(u8),

    #[error("sample interval must be greater than zero")]
    ZeroSampleInterval,

    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("pulse gaps must satisfy min ({min:?}) < max ({max:?}) < completion ({completion:?})")]
    GapOrder {
        min: Duration,
        max: Duration,
        completion: Duration,
    },

    #[error("min pulse gap needs {run} samples but the debounce window only holds {width}")]
    WindowTooNarrow { run: u32, width: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeMode {
    Interrupt,
    Polling,
}

impl FromStr for IntakeMode {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<IntakeMode, Self::Err> {
        match input {
            "Interrupt" => Ok(IntakeMode::Interrupt),
            "Polling" => Ok(IntakeMode::Polling),
            _ => Err(ConfigError::UnknownIntake(input.to_string())),
        }
    }
}

/// Timing knobs shared by both debounce filters and the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    pub sample_interval: Duration,
    pub debounce_width: u8,
    /// Edges closer together than this are bounce.
    pub min_pulse_gap: Duration,
    /// A pulse later than this after the previous one starts a fresh train.
    pub max_pulse_gap: Duration,
    /// Silence after the last pulse that ends the dial.
    pub completion_gap: Duration,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            sample_interval: Duration::from_millis(DEFAULT_SAMPLE_INTERVAL_MS),
            debounce_width: DEFAULT_DEBOUNCE_WIDTH,
            min_pulse_gap: Duration::from_millis(DEFAULT_MIN_PULSE_GAP_MS),
            max_pulse_gap: Duration::from_millis(DEFAULT_MAX_PULSE_GAP_MS),
            completion_gap: Duration::from_millis(DEFAULT_COMPLETION_GAP_MS),
        }
    }
}

impl DecoderConfig {
    /// Consecutive equal samples the shift-register filter needs to confirm
    /// a level change.
    pub fn run_length(&self) -> u32 {
        let interval = self.sample_interval.as_micros().max(1);
        let run = self.min_pulse_gap.as_micros().div_ceil(interval);
        run.max(1) as u32
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_interval.is_zero() {
            return Err(ConfigError::ZeroSampleInterval);
        }

        if self.debounce_width == 0 || self.debounce_width > MAX_DEBOUNCE_WIDTH {
            return Err(ConfigError::DebounceWidth(self.debounce_width));
        }

        if !(self.min_pulse_gap < self.max_pulse_gap && self.max_pulse_gap < self.completion_gap) {
            return Err(ConfigError::GapOrder {
                min: self.min_pulse_gap,
                max: self.max_pulse_gap,
                completion: self.completion_gap,
            });
        }

        let run = self.run_length();
        if run > u32::from(self.debounce_width) {
            return Err(ConfigError::WindowTooNarrow {
                run,
                width: self.debounce_width,
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyConfig {
    /// May contain `{digit}`.
    pub url: String,
    pub token: Option<String>,
    /// May contain `{digit}`.
    pub entity_id: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub intake: IntakeMode,
    pub decoder: DecoderConfig,
    pub queue_capacity: usize,
    pub notify: Option<NotifyConfig>,
    pub log_level: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let intake = match lookup("DIAL_INTAKE") {
            Some(value) => value.trim().parse()?,
            None => IntakeMode::Polling,
        };

        let decoder = DecoderConfig {
            sample_interval: millis(
                &lookup,
                "DIAL_SAMPLE_INTERVAL_MS",
                DEFAULT_SAMPLE_INTERVAL_MS,
            )?,
            debounce_width: parse(&lookup, "DIAL_DEBOUNCE_WIDTH", DEFAULT_DEBOUNCE_WIDTH)?,
            min_pulse_gap: millis(&lookup, "DIAL_MIN_PULSE_GAP_MS", DEFAULT_MIN_PULSE_GAP_MS)?,
            max_pulse_gap: millis(&lookup, "DIAL_MAX_PULSE_GAP_MS", DEFAULT_MAX_PULSE_GAP_MS)?,
            completion_gap: millis(
                &lookup,
                "DIAL_COMPLETION_GAP_MS",
                DEFAULT_COMPLETION_GAP_MS,
            )?,
        };
        decoder.validate()?;

        let queue_capacity = parse(&lookup, "DIAL_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?;
        if queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }

        let notify = match lookup("NOTIFY_URL").filter(|url| !url.trim().is_empty()) {
            Some(url) => Some(NotifyConfig {
                url: url.trim().to_string(),
                token: lookup("NOTIFY_TOKEN").filter(|token| !token.is_empty()),
                entity_id: lookup("NOTIFY_ENTITY_ID").filter(|entity| !entity.is_empty()),
                timeout: millis(&lookup, "NOTIFY_TIMEOUT_MS", DEFAULT_NOTIFY_TIMEOUT_MS)?,
            }),
            None => None,
        };

        Ok(Config {
            intake,
            decoder,
            queue_capacity,
            notify,
            log_level: lookup("LOG_LEVEL"),
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    parse(lookup, key, default).map(Duration::from_millis)
}

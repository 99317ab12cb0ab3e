#[cfg(not(feature = "real"))]
pub mod emulated;
#[cfg(feature = "real")]
pub mod physical;

#[cfg(not(feature = "real"))]
pub use emulated::Hardware;
#[cfg(feature = "real")]
pub use physical::Hardware;

use thiserror::Error;

use crate::dial::{
    intake::{DialLine, IntakeProducer},
    Clock, EdgeEvent, Indicator,
};

#[derive(Debug, Error)]
pub enum HardwareError {
    #[cfg(feature = "real")]
    #[error("gpio: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("edge listener is already installed")]
    EdgesTaken,

    #[error("failed to start {0} thread: {1}")]
    Thread(&'static str, #[source] std::io::Error),
}

pub trait DialHardware: DialLine + Sized {
    type Indicator: Indicator + Send + 'static;

    fn create() -> Result<Self, HardwareError>;

    /// Hands out the LED. Only the first call gets it.
    fn take_indicator(&mut self) -> Option<Self::Indicator>;

    /// Starts reporting dial edges to `producer`. The listener lives as long
    /// as the hardware does.
    fn listen_edges(
        &mut self,
        producer: IntakeProducer<EdgeEvent>,
        clock: Clock,
    ) -> Result<(), HardwareError>;
}

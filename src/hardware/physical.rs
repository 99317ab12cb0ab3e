use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};

use crate::{
    config::{DIAL_PULSE_PIN, INDICATOR_LED_PIN},
    dial::{
        intake::{DialLine, IntakeProducer},
        Clock, EdgeEvent, Indicator,
    },
};

use super::{DialHardware, HardwareError};

// The pulse contact bounces when it makes, so that is the edge worth timing.
const PULSE_TRIGGER: Trigger = Trigger::RisingEdge;

pub struct Hardware {
    dial_pulse: InputPin,
    indicator: Option<Led>,
}

pub struct Led {
    pin: OutputPin,
}

impl Indicator for Led {
    fn on_state_changed(&mut self, active: bool) {
        if active {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }
}

impl DialLine for Hardware {
    fn read_level(&mut self) -> bool {
        self.dial_pulse.is_high()
    }
}

impl DialHardware for Hardware {
    type Indicator = Led;

    fn create() -> Result<Self, HardwareError> {
        let gpio = Gpio::new()?;

        let dial_pulse = gpio.get(DIAL_PULSE_PIN)?.into_input_pullup();
        let led = gpio.get(INDICATOR_LED_PIN)?.into_output_low();

        Ok(Hardware {
            dial_pulse,
            indicator: Some(Led { pin: led }),
        })
    }

    fn take_indicator(&mut self) -> Option<Led> {
        self.indicator.take()
    }

    fn listen_edges(
        &mut self,
        mut producer: IntakeProducer<EdgeEvent>,
        clock: Clock,
    ) -> Result<(), HardwareError> {
        self.dial_pulse
            .set_async_interrupt(PULSE_TRIGGER, move |_: Level| {
                // Nobody is listening once the consumer is gone; the pin is
                // dropped on shutdown shortly after.
                let _ = producer.push(EdgeEvent { at: clock.now() });
            })?;

        Ok(())
    }
}

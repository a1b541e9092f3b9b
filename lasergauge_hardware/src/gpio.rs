use rppal::gpio::{Gpio, OutputPin};
use tracing::debug;

use lasergauge_traits::{BoxError, Laser};

use crate::error::{HwError, Result};

/// Line laser switched by a single GPIO output.
pub struct GpioLaser {
    pin: OutputPin,
    active_low: bool,
}

impl GpioLaser {
    /// Claim `pin` and drive it to the "off" level.
    pub fn new(pin: u8, active_low: bool) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let pin = gpio.get(pin).map_err(|e| HwError::Gpio(e.to_string()))?;
        let pin = if active_low {
            pin.into_output_high()
        } else {
            pin.into_output_low()
        };
        Ok(Self { pin, active_low })
    }

    fn drive(&mut self, on: bool) {
        if on != self.active_low {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        debug!(pin = self.pin.pin(), on, "laser gpio");
    }
}

impl Laser for GpioLaser {
    fn turn_on(&mut self) -> std::result::Result<(), BoxError> {
        self.drive(true);
        Ok(())
    }

    fn turn_off(&mut self) -> std::result::Result<(), BoxError> {
        self.drive(false);
        Ok(())
    }
}

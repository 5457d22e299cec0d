#![cfg(feature = "gate-rppal")]

//! Raspberry Pi GPIO controller backed by rppal.
//!
//! Pins are acquired once at construction: the lamp as a push-pull output,
//! the button as an input with the internal pull-up enabled (the button is
//! expected to short the pin to ground when pressed). Any driver error maps
//! to a hardware fault; there is no degraded mode.

use anyhow::Result;
use rppal::gpio::{Gpio, InputPin, Level, OutputPin};

use super::{GpioController, GpioLevel};
use crate::config::GateSettings;
use crate::Fault;

pub struct RppalGpio {
    lamp: OutputPin,
    button: InputPin,
    lamp_pin: u8,
    button_pin: u8,
}

impl RppalGpio {
    pub fn new(settings: &GateSettings) -> Result<Self> {
        let gpio = Gpio::new()
            .map_err(|e| Fault::Hardware(format!("cannot open GPIO controller: {}", e)))?;
        let lamp = gpio
            .get(settings.lamp_pin)
            .map_err(|e| Fault::Hardware(format!("cannot claim pin {}: {}", settings.lamp_pin, e)))?
            .into_output();
        let button_request = gpio.get(settings.button_pin).map_err(|e| {
            Fault::Hardware(format!("cannot claim pin {}: {}", settings.button_pin, e))
        })?;
        let button = if settings.button_active_low {
            button_request.into_input_pullup()
        } else {
            button_request.into_input_pulldown()
        };

        Ok(Self {
            lamp,
            button,
            lamp_pin: settings.lamp_pin,
            button_pin: settings.button_pin,
        })
    }
}

impl GpioController for RppalGpio {
    fn set_output(&mut self, pin: u8, level: GpioLevel) -> Result<()> {
        if pin != self.lamp_pin {
            return Err(Fault::Hardware(format!("pin {} is not an owned output", pin)).into());
        }
        match level {
            GpioLevel::High => self.lamp.set_high(),
            GpioLevel::Low => self.lamp.set_low(),
        }
        Ok(())
    }

    fn read_input(&mut self, pin: u8) -> Result<GpioLevel> {
        if pin != self.button_pin {
            return Err(Fault::Hardware(format!("pin {} is not an owned input", pin)).into());
        }
        let level = match self.button.read() {
            Level::High => GpioLevel::High,
            Level::Low => GpioLevel::Low,
        };
        Ok(level)
    }
}

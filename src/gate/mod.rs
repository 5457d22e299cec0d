//! Lock gate for embedded deployments.
//!
//! The gate is a two-state machine: it starts Unlocked with the indicator
//! lamp driven active ("the cabin is unlocked"), polls a debounced button
//! input, and on a genuine press drives the lamp inactive and latches
//! Locked. Locked is terminal for the run; the lamp is never re-activated
//! and there is no unlock path. The detection loop is blocked until the
//! gate latches.
//!
//! GPIO access goes through `GpioController`, so the gate logic runs
//! against real pins (feature: gate-rppal) or an in-memory controller in
//! tests. Implementations may poll or subscribe to interrupts behind the
//! same interface; the single Unlocked to Locked transition contract is
//! theirs to preserve.
//!
//! A GPIO read or write failure is fatal. The lamp signals a safety state
//! and cannot be assumed safe to ignore.

use std::time::Duration;

use anyhow::Result;

use crate::config::GateSettings;

#[cfg(feature = "gate-rppal")]
mod rppal_gpio;
#[cfg(feature = "gate-rppal")]
pub use rppal_gpio::RppalGpio;

mod memory;
pub use memory::{MemoryGpio, MemoryGpioProbe};

/// Digital pin level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GpioLevel {
    Low,
    High,
}

/// Minimal GPIO surface the gate needs. Pull-up/pull-down configuration
/// happens when the controller is constructed, not per call.
pub trait GpioController {
    fn set_output(&mut self, pin: u8, level: GpioLevel) -> Result<()>;
    fn read_input(&mut self, pin: u8) -> Result<GpioLevel>;
}

/// Gate lifecycle. Monotonic: Unlocked transitions to Locked exactly once
/// per run; no reverse transition exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Locked,
}

pub struct LockGate {
    gpio: Box<dyn GpioController>,
    lamp_pin: u8,
    button_pin: u8,
    /// Input level that means "button pressed". Low for the usual pull-up
    /// wiring where the button shorts the pin to ground.
    pressed_level: GpioLevel,
    poll_interval: Duration,
    debounce: Duration,
    state: LockState,
}

impl LockGate {
    pub fn new(gpio: Box<dyn GpioController>, settings: &GateSettings) -> Self {
        let pressed_level = if settings.button_active_low {
            GpioLevel::Low
        } else {
            GpioLevel::High
        };
        Self {
            gpio,
            lamp_pin: settings.lamp_pin,
            button_pin: settings.button_pin,
            pressed_level,
            poll_interval: Duration::from_millis(settings.poll_ms),
            debounce: Duration::from_millis(settings.debounce_ms),
            state: LockState::Unlocked,
        }
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Drive the indicator active: the cabin is unlocked and detection has
    /// not started.
    pub fn engage(&mut self) -> Result<()> {
        self.gpio.set_output(self.lamp_pin, GpioLevel::High)?;
        log::info!("lamp on: cabin unlocked, waiting for the lock button");
        Ok(())
    }

    /// One debounced poll step. Returns true once the gate has latched
    /// Locked. A press must hold its level across the debounce window to
    /// count; a bounce that releases within the window is ignored.
    pub fn poll_locked(&mut self) -> Result<bool> {
        if self.state == LockState::Locked {
            return Ok(true);
        }
        if self.gpio.read_input(self.button_pin)? != self.pressed_level {
            return Ok(false);
        }
        if !self.debounce.is_zero() {
            std::thread::sleep(self.debounce);
        }
        if self.gpio.read_input(self.button_pin)? != self.pressed_level {
            log::debug!("button bounce ignored");
            return Ok(false);
        }

        self.gpio.set_output(self.lamp_pin, GpioLevel::Low)?;
        self.state = LockState::Locked;
        log::info!("lock button pressed: lamp off, starting detection");
        Ok(true)
    }

    /// Block until the gate latches. No other work proceeds while the
    /// cabin is Unlocked.
    pub fn wait_locked(&mut self) -> Result<()> {
        while !self.poll_locked()? {
            std::thread::sleep(self.poll_interval);
        }
        Ok(())
    }
}

impl Drop for LockGate {
    fn drop(&mut self) {
        // Leave the lamp dark on every exit path.
        let _ = self.gpio.set_output(self.lamp_pin, GpioLevel::Low);
    }
}

//! In-memory GPIO controller for tests and bench runs without hardware.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use anyhow::Result;

use super::{GpioController, GpioLevel};
use crate::Fault;

struct Inner {
    outputs: HashMap<u8, GpioLevel>,
    scripts: HashMap<u8, VecDeque<GpioLevel>>,
    default_input: GpioLevel,
    input_reads: u64,
    fail: bool,
}

/// GPIO controller backed by plain memory. Input reads follow a per-pin
/// script; once a script drains, reads return the default input level.
pub struct MemoryGpio {
    inner: Rc<RefCell<Inner>>,
}

impl MemoryGpio {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                outputs: HashMap::new(),
                scripts: HashMap::new(),
                default_input: GpioLevel::Low,
                input_reads: 0,
                fail: false,
            })),
        }
    }

    /// Controller whose reads of `pin` replay `script`, then settle on the
    /// default level (Low, i.e. "pressed" under pull-up wiring).
    pub fn with_input_script(pin: u8, script: Vec<GpioLevel>) -> Self {
        let gpio = Self::new();
        gpio.inner
            .borrow_mut()
            .scripts
            .insert(pin, script.into());
        gpio
    }

    /// Controller whose every operation fails, for fault-path tests.
    pub fn failing() -> Self {
        let gpio = Self::new();
        gpio.inner.borrow_mut().fail = true;
        gpio
    }

    /// Observation handle that stays valid after the controller is moved
    /// into the gate.
    pub fn probe(&self) -> MemoryGpioProbe {
        MemoryGpioProbe {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Default for MemoryGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioController for MemoryGpio {
    fn set_output(&mut self, pin: u8, level: GpioLevel) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail {
            return Err(Fault::Hardware(format!("cannot drive pin {}", pin)).into());
        }
        inner.outputs.insert(pin, level);
        Ok(())
    }

    fn read_input(&mut self, pin: u8) -> Result<GpioLevel> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail {
            return Err(Fault::Hardware(format!("cannot read pin {}", pin)).into());
        }
        inner.input_reads += 1;
        let level = inner
            .scripts
            .get_mut(&pin)
            .and_then(|script| script.pop_front())
            .unwrap_or(inner.default_input);
        Ok(level)
    }
}

/// Read-only view into a `MemoryGpio`'s recorded state.
pub struct MemoryGpioProbe {
    inner: Rc<RefCell<Inner>>,
}

impl MemoryGpioProbe {
    pub fn output_level(&self, pin: u8) -> Option<GpioLevel> {
        self.inner.borrow().outputs.get(&pin).copied()
    }

    pub fn input_reads(&self) -> u64 {
        self.inner.borrow().input_reads
    }
}

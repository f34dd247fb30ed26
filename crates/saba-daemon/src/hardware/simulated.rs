//! In-process stand-in for the panel hardware.
//!
//! Used on development machines, where panel messages are typed on stdin,
//! and by the tests.
use std::collections::{HashMap, VecDeque};
use std::io::BufRead;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::{AlertCallback, GpioPort, Level, PinMode, SerialHandle};
use crate::error::HardwareError;

#[derive(Default)]
struct SimState {
    initialized: bool,
    fail_init: bool,
    modes: HashMap<u32, PinMode>,
    levels: HashMap<u32, Level>,
    pull_ups: Vec<u32>,
    alerts: HashMap<u32, AlertCallback>,
    serial: Option<SerialHandle>,
    rx: VecDeque<u8>,
    failing_reads: u32,
}

#[derive(Default)]
pub struct SimulatedGpio {
    state: Mutex<SimState>,
}

impl SimulatedGpio {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    pub fn is_initialized(&self) -> bool {
        self.state().initialized
    }

    #[cfg(test)]
    pub fn pin_mode(&self, pin: u32) -> Option<PinMode> {
        self.state().modes.get(&pin).copied()
    }

    #[cfg(test)]
    pub fn pin_level(&self, pin: u32) -> Option<Level> {
        self.state().levels.get(&pin).copied()
    }

    #[cfg(test)]
    pub fn has_pull_up(&self, pin: u32) -> bool {
        self.state().pull_ups.contains(&pin)
    }

    #[cfg(test)]
    pub fn has_alert(&self, pin: u32) -> bool {
        self.state().alerts.contains_key(&pin)
    }

    #[cfg(test)]
    pub fn serial_open(&self) -> bool {
        self.state().serial.is_some()
    }

    #[cfg(test)]
    pub fn fail_init(&self, fail: bool) {
        self.state().fail_init = fail;
    }

    /// The next `count` serial reads return an error.
    #[cfg(test)]
    pub fn fail_reads(&self, count: u32) {
        self.state().failing_reads = count;
    }

    pub fn push_serial(&self, bytes: &[u8]) {
        self.state().rx.extend(bytes.iter().copied());
    }

    /// Drive an input pin.  Returns whether an alert callback was armed.
    pub fn set_input(&self, pin: u32, level: Level) -> bool {
        let callback = {
            let mut state = self.state();
            state.levels.insert(pin, level);
            state.alerts.get(&pin).cloned()
        };
        match callback {
            Some(callback) => {
                callback(level);
                true
            }
            None => false,
        }
    }

    /// Queue one panel message and pulse the interrupt line.
    pub fn send_message(&self, interrupt_pin: u32, message: &str) {
        self.push_serial(message.trim_end().as_bytes());
        self.push_serial(b"\n");
        if !self.set_input(interrupt_pin, Level::Low) {
            debug!("simulated gpio: interrupt not armed, message stays buffered");
        }
        self.set_input(interrupt_pin, Level::High);
    }

    /// Forward lines typed on stdin as panel messages.
    pub fn feed_from_stdin(self: Arc<Self>, interrupt_pin: u32) -> std::io::Result<()> {
        std::thread::Builder::new()
            .name("stdin-panel".into())
            .spawn(move || {
                info!("simulated panel: type JSON commands on stdin");
                for line in std::io::stdin().lock().lines() {
                    match line {
                        Ok(line) if line.trim().is_empty() => {}
                        Ok(line) => self.send_message(interrupt_pin, &line),
                        Err(e) => {
                            warn!("simulated panel: stdin closed: {}", e);
                            break;
                        }
                    }
                }
            })?;
        Ok(())
    }
}

impl GpioPort for SimulatedGpio {
    fn initialize(&self) -> Result<(), HardwareError> {
        let mut state = self.state();
        if state.fail_init {
            return Err(HardwareError::InitFailed(-1));
        }
        state.initialized = true;
        Ok(())
    }

    fn terminate(&self) {
        let mut state = self.state();
        state.initialized = false;
        state.alerts.clear();
    }

    fn set_pin_mode(&self, pin: u32, mode: PinMode) -> Result<(), HardwareError> {
        self.state().modes.insert(pin, mode);
        Ok(())
    }

    fn set_pull_up(&self, pin: u32) -> Result<(), HardwareError> {
        let mut state = self.state();
        if !state.pull_ups.contains(&pin) {
            state.pull_ups.push(pin);
        }
        state.levels.entry(pin).or_insert(Level::High);
        Ok(())
    }

    fn write_pin(&self, pin: u32, level: Level) -> Result<(), HardwareError> {
        let mut state = self.state();
        if state.modes.get(&pin) != Some(&PinMode::Output) {
            return Err(HardwareError::Pin {
                call: "write",
                pin,
                code: -1,
            });
        }
        state.levels.insert(pin, level);
        Ok(())
    }

    fn set_alert(&self, pin: u32, callback: AlertCallback) -> Result<(), HardwareError> {
        self.state().alerts.insert(pin, callback);
        Ok(())
    }

    fn clear_alert(&self, pin: u32) -> Result<(), HardwareError> {
        self.state().alerts.remove(&pin);
        Ok(())
    }

    fn open_serial(&self, device: &str, baud: u32) -> Result<SerialHandle, HardwareError> {
        debug!("simulated gpio: serial {} @ {}", device, baud);
        let handle = SerialHandle(0);
        self.state().serial = Some(handle);
        Ok(handle)
    }

    fn read_serial(&self, handle: SerialHandle, buf: &mut [u8]) -> Result<usize, HardwareError> {
        let mut state = self.state();
        if state.serial != Some(handle) {
            return Err(HardwareError::SerialRead(-1));
        }
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(HardwareError::SerialRead(-2));
        }
        let n = buf.len().min(state.rx.len());
        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn close_serial(&self, handle: SerialHandle) {
        let mut state = self.state();
        if state.serial == Some(handle) {
            state.serial = None;
        }
    }
}

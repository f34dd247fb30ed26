//! GPIO and UART access.
//!
//! The panel microcontroller pulls the interrupt pin LOW when it has a
//! message waiting on the serial line.  At boot we hold the status request
//! pin LOW, which asks it for a full `State` report; the listener releases
//! the pin once that report has arrived.
#[cfg(feature = "pigpio")]
pub mod pigpio;
pub mod simulated;

use saba_proto::config::HardwareConfig;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::error::HardwareError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialHandle(pub u32);

/// Invoked from the GPIO library's own thread with the new pin level.
pub type AlertCallback = Arc<dyn Fn(Level) + Send + Sync>;

/// The subset of pigpio the radio needs.
pub trait GpioPort: Send + Sync {
    fn initialize(&self) -> Result<(), HardwareError>;
    fn terminate(&self);
    fn set_pin_mode(&self, pin: u32, mode: PinMode) -> Result<(), HardwareError>;
    fn set_pull_up(&self, pin: u32) -> Result<(), HardwareError>;
    fn write_pin(&self, pin: u32, level: Level) -> Result<(), HardwareError>;
    fn set_alert(&self, pin: u32, callback: AlertCallback) -> Result<(), HardwareError>;
    fn clear_alert(&self, pin: u32) -> Result<(), HardwareError>;
    fn open_serial(&self, device: &str, baud: u32) -> Result<SerialHandle, HardwareError>;
    /// Non-blocking; `Ok(0)` when nothing is buffered.
    fn read_serial(&self, handle: SerialHandle, buf: &mut [u8]) -> Result<usize, HardwareError>;
    fn close_serial(&self, handle: SerialHandle);
}

/// Read side of the panel's serial line.
#[derive(Clone)]
pub struct SerialChannel {
    port: Arc<dyn GpioPort>,
    handle: SerialHandle,
}

impl SerialChannel {
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, HardwareError> {
        self.port.read_serial(self.handle, buf)
    }
}

/// Owns the GPIO library session and the serial handle.
pub struct HardwareManager {
    port: Arc<dyn GpioPort>,
    config: HardwareConfig,
    serial: Mutex<Option<SerialHandle>>,
}

impl HardwareManager {
    pub fn new(port: Arc<dyn GpioPort>, config: HardwareConfig) -> Self {
        Self {
            port,
            config,
            serial: Mutex::new(None),
        }
    }

    pub fn init(&self) -> Result<(), HardwareError> {
        self.port.initialize()?;
        self.port
            .set_pin_mode(self.config.status_request_pin, PinMode::Output)?;
        self.port.write_pin(self.config.status_request_pin, Level::Low)?;
        let handle = self
            .port
            .open_serial(&self.config.serial_device, self.config.baud_rate)?;
        *self.serial.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        info!(
            "Hardware ready: {} @ {} baud, interrupt pin {}",
            self.config.serial_device, self.config.baud_rate, self.config.interrupt_pin
        );
        Ok(())
    }

    pub fn teardown(&self) {
        if let Some(handle) = self.serial.lock().unwrap_or_else(|e| e.into_inner()).take() {
            self.port.close_serial(handle);
        }
        self.port.terminate();
        debug!("Hardware released");
    }

    pub fn serial(&self) -> Result<SerialChannel, HardwareError> {
        let handle = (*self.serial.lock().unwrap_or_else(|e| e.into_inner()))
            .ok_or(HardwareError::NotInitialised)?;
        Ok(SerialChannel {
            port: self.port.clone(),
            handle,
        })
    }

    pub fn set_status_request(&self, level: Level) -> Result<(), HardwareError> {
        self.port.write_pin(self.config.status_request_pin, level)
    }

    pub fn interrupt_pin(&self) -> u32 {
        self.config.interrupt_pin
    }

    pub fn port(&self) -> &Arc<dyn GpioPort> {
        &self.port
    }
}

impl Drop for HardwareManager {
    fn drop(&mut self) {
        let open = self
            .serial
            .get_mut()
            .map(|s| s.is_some())
            .unwrap_or(false);
        if open {
            warn!("Hardware dropped without teardown");
            self.teardown();
        }
    }
}

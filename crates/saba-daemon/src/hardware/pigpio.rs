//! Binding to the C pigpio library.
use std::collections::HashMap;
use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_uint};
use std::sync::{Mutex, OnceLock};
use tracing::warn;

use super::{AlertCallback, GpioPort, Level, PinMode, SerialHandle};
use crate::error::HardwareError;

const PI_INPUT: c_uint = 0;
const PI_OUTPUT: c_uint = 1;
const PI_PUD_UP: c_uint = 2;

type AlertFn = extern "C" fn(gpio: c_int, level: c_int, tick: u32);

#[link(name = "pigpio")]
extern "C" {
    fn gpioInitialise() -> c_int;
    fn gpioTerminate();
    fn gpioSetMode(gpio: c_uint, mode: c_uint) -> c_int;
    fn gpioSetPullUpDown(gpio: c_uint, pud: c_uint) -> c_int;
    fn gpioWrite(gpio: c_uint, level: c_uint) -> c_int;
    fn gpioSetAlertFunc(user_gpio: c_uint, f: Option<AlertFn>) -> c_int;
    fn serOpen(sertty: *mut c_char, baud: c_uint, ser_flags: c_uint) -> c_int;
    fn serClose(handle: c_uint) -> c_int;
    fn serRead(handle: c_uint, buf: *mut c_char, count: c_uint) -> c_int;
}

/// pigpio calls alerts with a bare function pointer, so closures are looked
/// up per pin.
fn alerts() -> &'static Mutex<HashMap<u32, AlertCallback>> {
    static ALERTS: OnceLock<Mutex<HashMap<u32, AlertCallback>>> = OnceLock::new();
    ALERTS.get_or_init(|| Mutex::new(HashMap::new()))
}

extern "C" fn on_alert(gpio: c_int, level: c_int, _tick: u32) {
    let level = match level {
        0 => Level::Low,
        1 => Level::High,
        // 2 is a watchdog timeout, not an edge.
        _ => return,
    };
    let callback = alerts()
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .get(&(gpio as u32))
        .cloned();
    if let Some(callback) = callback {
        callback(level);
    }
}

fn check(call: &'static str, pin: u32, code: c_int) -> Result<(), HardwareError> {
    if code < 0 {
        Err(HardwareError::Pin { call, pin, code })
    } else {
        Ok(())
    }
}

pub struct PigpioPort;

impl GpioPort for PigpioPort {
    fn initialize(&self) -> Result<(), HardwareError> {
        // SAFETY: no preconditions; returns the library version or an error.
        let code = unsafe { gpioInitialise() };
        if code < 0 {
            return Err(HardwareError::InitFailed(code));
        }
        Ok(())
    }

    fn terminate(&self) {
        alerts().lock().unwrap_or_else(|e| e.into_inner()).clear();
        // SAFETY: safe to call even when not initialised.
        unsafe { gpioTerminate() }
    }

    fn set_pin_mode(&self, pin: u32, mode: PinMode) -> Result<(), HardwareError> {
        let mode = match mode {
            PinMode::Input => PI_INPUT,
            PinMode::Output => PI_OUTPUT,
        };
        // SAFETY: plain integer arguments.
        check("gpioSetMode", pin, unsafe { gpioSetMode(pin, mode) })
    }

    fn set_pull_up(&self, pin: u32) -> Result<(), HardwareError> {
        // SAFETY: plain integer arguments.
        check("gpioSetPullUpDown", pin, unsafe {
            gpioSetPullUpDown(pin, PI_PUD_UP)
        })
    }

    fn write_pin(&self, pin: u32, level: Level) -> Result<(), HardwareError> {
        let level = match level {
            Level::Low => 0,
            Level::High => 1,
        };
        // SAFETY: plain integer arguments.
        check("gpioWrite", pin, unsafe { gpioWrite(pin, level) })
    }

    fn set_alert(&self, pin: u32, callback: AlertCallback) -> Result<(), HardwareError> {
        alerts()
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(pin, callback);
        // SAFETY: on_alert is a 'static extern "C" fn.
        check("gpioSetAlertFunc", pin, unsafe {
            gpioSetAlertFunc(pin, Some(on_alert))
        })
    }

    fn clear_alert(&self, pin: u32) -> Result<(), HardwareError> {
        // SAFETY: a null callback cancels the alert.
        let code = unsafe { gpioSetAlertFunc(pin, None) };
        alerts()
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&pin);
        check("gpioSetAlertFunc", pin, code)
    }

    fn open_serial(&self, device: &str, baud: u32) -> Result<SerialHandle, HardwareError> {
        let tty = CString::new(device).map_err(|_| HardwareError::SerialOpen {
            device: device.to_string(),
            code: -1,
        })?;
        // SAFETY: tty outlives the call; pigpio copies the path.
        let code = unsafe { serOpen(tty.as_ptr() as *mut c_char, baud, 0) };
        if code < 0 {
            return Err(HardwareError::SerialOpen {
                device: device.to_string(),
                code,
            });
        }
        Ok(SerialHandle(code as u32))
    }

    fn read_serial(&self, handle: SerialHandle, buf: &mut [u8]) -> Result<usize, HardwareError> {
        let count = buf.len().min(c_uint::MAX as usize) as c_uint;
        // SAFETY: buf is valid for `count` bytes.
        let code = unsafe { serRead(handle.0, buf.as_mut_ptr() as *mut c_char, count) };
        if code < 0 {
            return Err(HardwareError::SerialRead(code));
        }
        Ok(code as usize)
    }

    fn close_serial(&self, handle: SerialHandle) {
        // SAFETY: handle came from serOpen.
        let code = unsafe { serClose(handle.0) };
        if code < 0 {
            warn!("serClose failed (code {})", code);
        }
    }
}

//! Interrupt-driven reader for the panel's serial messages.
//!
//! Runs on its own OS thread because it blocks: on the interrupt, then on the
//! serial line.
use saba_proto::protocol::{self, IoCommand};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::HardwareError;
use crate::hardware::{HardwareManager, Level, PinMode, SerialChannel};
use crate::status::RadioStatus;

/// Lets the UART buffer fill after the interrupt before reading.
const SETTLE_DELAY: Duration = Duration::from_millis(20);
const READ_RETRY: Duration = Duration::from_millis(100);
const READ_CHUNK: usize = 256;

// ── trigger ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct TriggerState {
    fired: bool,
    cancelled: bool,
}

/// One-shot wake-up, fired from the GPIO callback thread.
#[derive(Default)]
pub struct Trigger {
    state: Mutex<TriggerState>,
    cond: Condvar,
}

impl Trigger {
    pub fn fire(&self) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).fired = true;
        self.cond.notify_all();
    }

    pub fn cancel(&self) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).cancelled = true;
        self.cond.notify_all();
    }

    pub fn reset(&self) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).fired = false;
    }

    /// Blocks until fired.  Returns false when cancelled instead.
    pub fn wait(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        while !state.fired && !state.cancelled {
            state = self.cond.wait(state).unwrap_or_else(|e| e.into_inner());
        }
        !state.cancelled
    }
}

// ── listener ──────────────────────────────────────────────────────────────────

pub struct InterruptListener {
    hardware: Arc<HardwareManager>,
    status: Arc<RadioStatus>,
    trigger: Arc<Trigger>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl InterruptListener {
    pub fn new(hardware: Arc<HardwareManager>, status: Arc<RadioStatus>) -> Self {
        Self {
            hardware,
            status,
            trigger: Arc::new(Trigger::default()),
            stop: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    pub fn start_listening(&mut self) -> Result<(), HardwareError> {
        let pin = self.hardware.interrupt_pin();
        let port = self.hardware.port();
        port.set_pin_mode(pin, PinMode::Input)?;
        port.set_pull_up(pin)?;
        let serial = self.hardware.serial()?;

        let worker = Worker {
            hardware: self.hardware.clone(),
            status: self.status.clone(),
            trigger: self.trigger.clone(),
            stop: self.stop.clone(),
            serial,
            pin,
        };
        let thread = std::thread::Builder::new()
            .name("io-listener".into())
            .spawn(move || worker.run())?;
        self.thread = Some(thread);
        info!("Listening for panel interrupts on pin {}", pin);
        Ok(())
    }

    /// Let the current iteration finish, then join the thread.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Err(e) = self.hardware.port().clear_alert(self.hardware.interrupt_pin()) {
            warn!("Clearing interrupt alert failed: {}", e);
        }
        self.trigger.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Listener thread panicked");
            }
        }
        debug!("Listener stopped");
    }
}

impl Drop for InterruptListener {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop();
        }
    }
}

struct Worker {
    hardware: Arc<HardwareManager>,
    status: Arc<RadioStatus>,
    trigger: Arc<Trigger>,
    stop: Arc<AtomicBool>,
    serial: SerialChannel,
    pin: u32,
}

impl Worker {
    fn run(self) {
        let port = self.hardware.port().clone();
        while !self.stop.load(Ordering::SeqCst) {
            let trigger = self.trigger.clone();
            let armed = port.set_alert(
                self.pin,
                Arc::new(move |level| {
                    // Active low.
                    if level == Level::Low {
                        trigger.fire();
                    }
                }),
            );
            if let Err(e) = armed {
                error!("Cannot arm interrupt: {}", e);
                break;
            }

            if !self.trigger.wait() {
                break;
            }
            if let Err(e) = port.clear_alert(self.pin) {
                warn!("Clearing interrupt alert failed: {}", e);
            }

            std::thread::sleep(SETTLE_DELAY);
            if let Some(text) = self.read_message() {
                dispatch(&text, &self.hardware, &self.status);
            }
            self.trigger.reset();
        }
        debug!("Listener thread exiting");
    }

    /// Reads until something arrives.  Gives up only when stopping.
    fn read_message(&self) -> Option<String> {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match self.serial.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => {
                    let mut text = String::from_utf8_lossy(&buf[..n]).into_owned();
                    // Drain whatever else is already buffered.
                    while let Ok(more) = self.serial.read(&mut buf) {
                        if more == 0 {
                            break;
                        }
                        text.push_str(&String::from_utf8_lossy(&buf[..more]));
                    }
                    return Some(text);
                }
                Err(e) => warn!("Serial read failed: {}", e),
            }
            if self.stop.load(Ordering::SeqCst) {
                return None;
            }
            std::thread::sleep(READ_RETRY);
        }
    }
}

/// Parse every line of a serial chunk and hand the commands to the status.
pub fn dispatch(text: &str, hardware: &HardwareManager, status: &RadioStatus) {
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let command = match protocol::parse(line) {
            Ok(command) => command,
            Err(e) => {
                warn!("Dropping panel message {:?}: {}", line, e);
                continue;
            }
        };
        debug!("Panel: {}", command.name());
        if matches!(command, IoCommand::Status { .. }) {
            // The report we asked for at boot has arrived.
            if let Err(e) = hardware.set_status_request(Level::High) {
                warn!("Releasing status request pin failed: {}", e);
            }
        }
        status.handle(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::simulated::SimulatedGpio;
    use crate::status::ChangeKind;
    use saba_proto::config::HardwareConfig;
    use saba_proto::protocol::{PlayMode, PlayerType, SabaButton};
    use std::time::Instant;

    fn setup() -> (Arc<SimulatedGpio>, Arc<HardwareManager>, Arc<RadioStatus>) {
        let gpio = Arc::new(SimulatedGpio::new());
        let hardware = Arc::new(HardwareManager::new(gpio.clone(), HardwareConfig::default()));
        hardware.init().unwrap();
        (gpio, hardware, Arc::new(RadioStatus::new()))
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_trigger_fire_and_cancel() {
        let trigger = Arc::new(Trigger::default());
        trigger.fire();
        assert!(trigger.wait());
        trigger.reset();

        let remote = trigger.clone();
        let waiter = std::thread::spawn(move || remote.wait());
        std::thread::sleep(Duration::from_millis(20));
        trigger.cancel();
        assert!(!waiter.join().unwrap());
    }

    #[test]
    fn test_dispatch_handles_multiple_lines() {
        let (gpio, hardware, status) = setup();
        dispatch(
            "{\"command\":\"ButtonPressed\",\"buttonIndex\":3}\r\n\
             garbage\n\
             {\"command\":\"NewFrequency\",\"frequency\":95}\n",
            &hardware,
            &status,
        );
        let snap = status.snapshot();
        assert_eq!(snap.active_button, SabaButton::K);
        assert_eq!(snap.frequency, 95);
        // Only a State report releases the request pin.
        assert_eq!(gpio.pin_level(16), Some(Level::Low));
    }

    #[test]
    fn test_dispatch_state_releases_request_pin() {
        let (gpio, hardware, status) = setup();
        dispatch(
            r#"{"command":"State","buttonIndex":1,"isPause":0,"frequency":100}"#,
            &hardware,
            &status,
        );
        assert_eq!(gpio.pin_level(16), Some(Level::High));
        let snap = status.snapshot();
        assert_eq!(snap.player_type, PlayerType::Spotify);
        assert_eq!(snap.play_mode, PlayMode::Play);
        assert_eq!(status.latch().pending(), Some(ChangeKind::BackendChanged));
    }

    #[test]
    fn test_listener_reads_on_interrupt() {
        let (gpio, hardware, status) = setup();
        let mut listener = InterruptListener::new(hardware.clone(), status.clone());
        listener.start_listening().unwrap();
        assert!(gpio.has_pull_up(26));
        assert!(wait_for(|| gpio.has_alert(26)));

        gpio.send_message(26, r#"{"command":"NewFrequency","frequency":92}"#);
        assert!(wait_for(|| status.snapshot().frequency == 92));

        // Re-armed for the next message.
        assert!(wait_for(|| gpio.has_alert(26)));
        gpio.send_message(26, r#"{"command":"PlayPause","isPause":0}"#);
        assert!(wait_for(|| status.snapshot().play_mode == PlayMode::Play));

        listener.stop();
        assert!(!gpio.has_alert(26));
        hardware.teardown();
    }

    #[test]
    fn test_listener_retries_failed_reads() {
        let (gpio, hardware, status) = setup();
        let mut listener = InterruptListener::new(hardware.clone(), status.clone());
        listener.start_listening().unwrap();
        assert!(wait_for(|| gpio.has_alert(26)));

        gpio.fail_reads(2);
        gpio.send_message(26, r#"{"command":"ButtonPressed","buttonIndex":4}"#);
        assert!(wait_for(|| status.snapshot().active_button == SabaButton::U));

        listener.stop();
        hardware.teardown();
    }

    #[test]
    fn test_stop_while_waiting_for_interrupt() {
        let (_gpio, hardware, status) = setup();
        let mut listener = InterruptListener::new(hardware.clone(), status);
        listener.start_listening().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        listener.stop();
        hardware.teardown();
    }
}

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub stations: StationsConfig,
    #[serde(default)]
    pub player: PlayerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// JSON file holding the Spotify credentials and tokens.
    #[serde(default = "default_settings_file")]
    pub settings_file: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

/// Raspberry Pi wiring.  Pin numbers are BCM numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// Talk to the real pigpio library.  When false a simulated GPIO is used,
    /// which is what development machines want.
    #[serde(default = "default_hardware_enabled")]
    pub enabled: bool,
    #[serde(default = "default_serial_device")]
    pub serial_device: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Pulled LOW by the microcontroller when a message is ready.
    #[serde(default = "default_interrupt_pin")]
    pub interrupt_pin: u32,
    /// Held LOW by us to ask the microcontroller for a full status report.
    #[serde(default = "default_status_request_pin")]
    pub status_request_pin: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationsConfig {
    /// TOML station table (`[[station]]` entries).
    #[serde(default = "default_stations_toml")]
    pub stations_toml: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_volume")]
    pub volume: f32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            settings_file: default_settings_file(),
            log_file: default_log_file(),
        }
    }
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            enabled: default_hardware_enabled(),
            serial_device: default_serial_device(),
            baud_rate: default_baud_rate(),
            interrupt_pin: default_interrupt_pin(),
            status_request_pin: default_status_request_pin(),
        }
    }
}

impl Default for StationsConfig {
    fn default() -> Self {
        Self {
            stations_toml: default_stations_toml(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
        }
    }
}

fn default_settings_file() -> PathBuf {
    platform::data_dir().join("spotify.json")
}

fn default_log_file() -> PathBuf {
    platform::data_dir().join("daemon.log")
}

fn default_hardware_enabled() -> bool {
    cfg!(all(target_os = "linux", any(target_arch = "arm", target_arch = "aarch64")))
}

fn default_serial_device() -> String {
    // To find the name on the Pi: ls -l /dev/serial*
    "/dev/serial0".to_string()
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_interrupt_pin() -> u32 {
    26
}

fn default_status_request_pin() -> u32 {
    16
}

fn default_stations_toml() -> PathBuf {
    platform::config_dir().join("stations.toml")
}

fn default_volume() -> f32 {
    0.3
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

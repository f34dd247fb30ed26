use crate::protocol::SabaButton;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// An internet radio stream tuned by a region button and a dial position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub button: SabaButton,
    pub frequency: i32,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub region: String,
}

// ── TOML station loader ───────────────────────────────────────────────────────

/// Matches the `[[station]]` array in the station table.  The button is a
/// letter there (`"M"`, `"K"`, `"U"`) so the file stays readable.
#[derive(Debug, Deserialize)]
struct TomlStationFile {
    #[serde(default)]
    station: Vec<TomlStation>,
}

#[derive(Debug, Deserialize)]
struct TomlStation {
    button: String,
    frequency: i32,
    name: String,
    url: String,
    #[serde(default)]
    region: String,
}

fn button_from_letter(letter: &str) -> Option<SabaButton> {
    match letter.trim().to_ascii_uppercase().as_str() {
        "M" => Some(SabaButton::M),
        "K" => Some(SabaButton::K),
        "U" => Some(SabaButton::U),
        _ => None,
    }
}

pub fn load_stations_from_toml(path: &Path) -> anyhow::Result<Vec<Station>> {
    let content = std::fs::read_to_string(path)?;
    parse_stations_from_toml_str(&content)
}

pub fn parse_stations_from_toml_str(content: &str) -> anyhow::Result<Vec<Station>> {
    let file: TomlStationFile = toml::from_str(content)?;
    let mut stations = Vec::with_capacity(file.station.len());
    for s in file.station {
        let Some(button) = button_from_letter(&s.button) else {
            anyhow::bail!("station '{}': '{}' is not a radio button", s.name, s.button);
        };
        stations.push(Station {
            button,
            frequency: s.frequency,
            name: s.name,
            url: s.url,
            region: s.region,
        });
    }
    Ok(stations)
}

/// Read-only (button, frequency) -> station table.
#[derive(Debug, Clone, Default)]
pub struct StationTable {
    stations: Vec<Station>,
}

impl StationTable {
    pub fn new(stations: Vec<Station>) -> Self {
        Self { stations }
    }

    /// A missing file is an empty table; a malformed one is an error.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::warn!("Station table {} not found, no stations", path.display());
            return Ok(Self::default());
        }
        Ok(Self::new(load_stations_from_toml(path)?))
    }

    pub fn find(&self, button: SabaButton, frequency: i32) -> Option<&Station> {
        self.stations
            .iter()
            .find(|s| s.button == button && s.frequency == frequency)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

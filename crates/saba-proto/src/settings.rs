use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Spotify credentials and the user's device/playlist choice.
///
/// Written by the settings dashboard, read and refreshed by the daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotifySettings {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Unix epoch in milliseconds.
    #[serde(default)]
    pub auth_token_expiration: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub playlist_name: Option<String>,
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

impl SpotifySettings {
    /// Names of the required fields that are absent or empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let required = [
            ("clientId", &self.client_id),
            ("clientSecret", &self.client_secret),
            ("authToken", &self.auth_token),
            ("refreshToken", &self.refresh_token),
            ("redirectUrl", &self.redirect_url),
            ("deviceName", &self.device_name),
            ("playlistName", &self.playlist_name),
        ];
        required
            .into_iter()
            .filter(|(_, value)| is_blank(value))
            .map(|(name, _)| name)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// A token without a known expiration is treated as expired.
    pub fn is_token_expired(&self, now_ms: i64) -> bool {
        match self.auth_token_expiration {
            Some(expiration) => now_ms > expiration,
            None => true,
        }
    }
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// JSON file holding one [`SpotifySettings`].
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file yields empty settings; a corrupt one is an error.
    pub fn load(&self) -> anyhow::Result<SpotifySettings> {
        if !self.path.exists() {
            return Ok(SpotifySettings::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    pub fn save(&self, settings: &SpotifySettings) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

use async_trait::async_trait;
use saba_proto::settings::{SettingsFile, SpotifySettings};
use std::path::PathBuf;
use tracing::debug;

/// Where Spotify credentials live between runs.  The settings dashboard writes
/// them, the Spotify backend reads them and stores refreshed tokens.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn spotify_settings(&self) -> anyhow::Result<SpotifySettings>;
    async fn save_spotify_settings(&self, settings: &SpotifySettings) -> anyhow::Result<()>;
}

pub struct JsonSettingsStore {
    file: SettingsFile,
}

impl JsonSettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            file: SettingsFile::new(path),
        }
    }
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn spotify_settings(&self) -> anyhow::Result<SpotifySettings> {
        debug!("Loading spotify settings from {}", self.file.path().display());
        self.file.load()
    }

    async fn save_spotify_settings(&self, settings: &SpotifySettings) -> anyhow::Result<()> {
        debug!("Saving spotify settings to {}", self.file.path().display());
        self.file.save(settings)
    }
}

//! Pluggable playback backends, one per player type.
pub mod idle;
pub mod internet_radio;
pub mod spotify;

use async_trait::async_trait;
use saba_proto::protocol::{PlayMode, PlayerType, SabaButton};
use std::sync::Arc;

use crate::display::Display;
use crate::settings_store::SettingsStore;
use crate::spotify_api::SpotifyApi;
use internet_radio::{StationDirectory, StreamPlayer};

/// A playback session driven by the orchestrator.
///
/// Backends absorb their own failures: nothing here returns an error, the
/// display shows what went wrong instead.
#[async_trait]
pub trait PlayerBackend: Send {
    fn kind(&self) -> PlayerType;
    async fn start(&mut self, button: SabaButton, mode: PlayMode, frequency: i32);
    async fn stop(&mut self);
    async fn play(&mut self);
    async fn pause(&mut self);
    async fn on_toggle_button_changed(&mut self, button: SabaButton);
    async fn on_frequency_changed(&mut self, frequency: i32);
}

pub trait BackendFactory: Send + Sync {
    fn create(&self, kind: PlayerType) -> Box<dyn PlayerBackend>;
}

impl<F> BackendFactory for F
where
    F: Fn(PlayerType) -> Box<dyn PlayerBackend> + Send + Sync,
{
    fn create(&self, kind: PlayerType) -> Box<dyn PlayerBackend> {
        self(kind)
    }
}

/// Production factory wiring every backend to its collaborators.
pub struct Backends {
    pub display: Arc<dyn Display>,
    pub settings: Arc<dyn SettingsStore>,
    pub spotify: Arc<dyn SpotifyApi>,
    pub stations: Arc<dyn StationDirectory>,
    pub stream: Arc<dyn StreamPlayer>,
}

impl BackendFactory for Backends {
    fn create(&self, kind: PlayerType) -> Box<dyn PlayerBackend> {
        match kind {
            PlayerType::Idle => Box::new(idle::IdleBackend::new(self.display.clone())),
            PlayerType::InternetRadio => Box::new(internet_radio::InternetRadioBackend::new(
                self.display.clone(),
                self.stations.clone(),
                self.stream.clone(),
            )),
            PlayerType::Spotify => Box::new(spotify::SpotifyBackend::new(
                self.display.clone(),
                self.settings.clone(),
                self.spotify.clone(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDisplay, FakeSettingsStore, FakeSpotify, FakeStations, FakeStream};

    #[test]
    fn test_factory_builds_requested_kind() {
        let backends = Backends {
            display: Arc::new(FakeDisplay::default()),
            settings: Arc::new(FakeSettingsStore::default()),
            spotify: Arc::new(FakeSpotify::default()),
            stations: Arc::new(FakeStations::default()),
            stream: Arc::new(FakeStream::default()),
        };
        for kind in [PlayerType::Idle, PlayerType::InternetRadio, PlayerType::Spotify] {
            assert_eq!(backends.create(kind).kind(), kind);
        }
    }
}

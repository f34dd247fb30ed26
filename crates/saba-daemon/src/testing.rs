//! Recording fakes for the collaborator traits.
use async_trait::async_trait;
use saba_proto::protocol::{PlayMode, PlayerType, SabaButton};
use saba_proto::settings::{now_millis, SpotifySettings};
use saba_proto::stations::Station;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::backend::internet_radio::{StationDirectory, StreamPlayer};
use crate::backend::PlayerBackend;
use crate::display::{Asset, Display};
use crate::settings_store::SettingsStore;
use crate::spotify_api::{
    Album, Artist, Device, Image, Playlist, RefreshTokenResponse, SongInfo, SpotifyApi,
    SpotifyApiError, Track,
};

// ── display ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    Init,
    Clear,
    Asset(Asset),
    Frequency(String),
    SongInfo {
        name: String,
        artist: String,
        has_art: bool,
    },
    Progress(u8),
    Station(String, String),
    RadioSong(String),
    ClearRadioSong,
}

#[derive(Default)]
pub struct FakeDisplay {
    events: Mutex<Vec<DisplayEvent>>,
    reject_song_info: AtomicBool,
}

impl FakeDisplay {
    pub fn events(&self) -> Vec<DisplayEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn reject_song_info(&self, reject: bool) {
        self.reject_song_info.store(reject, Ordering::SeqCst);
    }

    fn push(&self, event: DisplayEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl Display for FakeDisplay {
    async fn init(&self) {
        self.push(DisplayEvent::Init);
    }

    async fn clear(&self) {
        self.push(DisplayEvent::Clear);
    }

    async fn show_asset(&self, asset: Asset) {
        self.push(DisplayEvent::Asset(asset));
    }

    async fn show_frequency(&self, text: &str) {
        self.push(DisplayEvent::Frequency(text.to_string()));
    }

    async fn show_song_info(&self, name: &str, artist: &str, art: Option<&[u8]>) -> bool {
        self.push(DisplayEvent::SongInfo {
            name: name.to_string(),
            artist: artist.to_string(),
            has_art: art.is_some(),
        });
        !self.reject_song_info.load(Ordering::SeqCst)
    }

    async fn show_progress(&self, percent: u8) {
        self.push(DisplayEvent::Progress(percent));
    }

    async fn show_station(&self, name: &str, region: &str) {
        self.push(DisplayEvent::Station(name.to_string(), region.to_string()));
    }

    async fn show_radio_song(&self, text: &str) {
        self.push(DisplayEvent::RadioSong(text.to_string()));
    }

    async fn clear_radio_song(&self) {
        self.push(DisplayEvent::ClearRadioSong);
    }
}

// ── settings ──────────────────────────────────────────────────────────────────

/// Valid settings whose token is good for another hour.
pub fn complete_settings() -> SpotifySettings {
    SpotifySettings {
        client_id: Some("client".into()),
        client_secret: Some("secret".into()),
        redirect_url: Some("http://localhost:5000/callback".into()),
        auth_token: Some("access".into()),
        auth_token_expiration: Some(now_millis() + 3_600_000),
        refresh_token: Some("refresh".into()),
        device_name: Some("saba".into()),
        playlist_name: Some("favourites".into()),
    }
}

#[derive(Default)]
pub struct FakeSettingsStore {
    settings: Mutex<SpotifySettings>,
    saved: Mutex<Vec<SpotifySettings>>,
}

impl FakeSettingsStore {
    pub fn new(settings: SpotifySettings) -> Self {
        Self {
            settings: Mutex::new(settings),
            saved: Mutex::new(Vec::new()),
        }
    }

    pub fn saved(&self) -> Vec<SpotifySettings> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl SettingsStore for FakeSettingsStore {
    async fn spotify_settings(&self) -> anyhow::Result<SpotifySettings> {
        Ok(self.settings.lock().unwrap().clone())
    }

    async fn save_spotify_settings(&self, settings: &SpotifySettings) -> anyhow::Result<()> {
        *self.settings.lock().unwrap() = settings.clone();
        self.saved.lock().unwrap().push(settings.clone());
        Ok(())
    }
}

// ── spotify ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    RefreshToken,
    Devices,
    Playlists,
    StartPlayback {
        device: String,
        playlist: String,
        resume: bool,
    },
    Pause,
    Skip {
        next: bool,
    },
    Shuffle,
    NowPlaying,
    FetchImage(String),
}

pub fn song(id: &str, name: &str, progress_ms: i64, duration_ms: i64) -> SongInfo {
    SongInfo {
        progress_ms,
        is_playing: true,
        item: Some(Track {
            album: Album {
                images: vec![
                    Image {
                        url: format!("https://img.example/{id}/640"),
                        height: Some(640),
                        width: Some(640),
                    },
                    Image {
                        url: format!("https://img.example/{id}/300"),
                        height: Some(300),
                        width: Some(300),
                    },
                ],
                name: "Album".into(),
            },
            artists: vec![Artist {
                name: "Metallica".into(),
            }],
            duration_ms,
            name: name.to_string(),
            id: id.to_string(),
            uri: format!("spotify:track:{id}"),
        }),
    }
}

fn http_error(endpoint: &'static str) -> SpotifyApiError {
    SpotifyApiError::Status {
        endpoint,
        status: reqwest::StatusCode::BAD_GATEWAY,
    }
}

/// Answers from canned data and records every call.  Unqueued now-playing
/// polls report nothing playing.
#[derive(Default)]
pub struct FakeSpotify {
    pub devices: Vec<Device>,
    pub playlists: Vec<Playlist>,
    /// `None` makes the refresh fail.
    pub refresh: Option<RefreshTokenResponse>,
    calls: Mutex<Vec<ApiCall>>,
    songs: Mutex<VecDeque<Option<SongInfo>>>,
    last_token: Mutex<Option<String>>,
    fail_start_playback: AtomicBool,
    fail_skip: AtomicBool,
}

impl FakeSpotify {
    /// The account has the configured device and playlist.
    pub fn ready() -> Self {
        Self {
            devices: vec![
                Device {
                    id: Some("dev-0".into()),
                    name: "kitchen".into(),
                },
                Device {
                    id: Some("dev-1".into()),
                    name: "saba".into(),
                },
            ],
            playlists: vec![Playlist {
                id: "pl-1".into(),
                name: "favourites".into(),
            }],
            refresh: Some(RefreshTokenResponse {
                access_token: "refreshed".into(),
                expires_in: 3600,
                refresh_token: Some("refresh-2".into()),
            }),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_token(&self) -> Option<String> {
        self.last_token.lock().unwrap().clone()
    }

    pub fn queue_song(&self, song: Option<SongInfo>) {
        self.songs.lock().unwrap().push_back(song);
    }

    pub fn fail_start_playback(&self, fail: bool) {
        self.fail_start_playback.store(fail, Ordering::SeqCst);
    }

    pub fn fail_skip(&self, fail: bool) {
        self.fail_skip.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: ApiCall, token: Option<&str>) {
        self.calls.lock().unwrap().push(call);
        if let Some(token) = token {
            *self.last_token.lock().unwrap() = Some(token.to_string());
        }
    }
}

#[async_trait]
impl SpotifyApi for FakeSpotify {
    async fn refresh_token(
        &self,
        _settings: &SpotifySettings,
    ) -> Result<RefreshTokenResponse, SpotifyApiError> {
        self.record(ApiCall::RefreshToken, None);
        self.refresh.clone().ok_or_else(|| http_error("token"))
    }

    async fn devices(&self, token: &str) -> Result<Vec<Device>, SpotifyApiError> {
        self.record(ApiCall::Devices, Some(token));
        Ok(self.devices.clone())
    }

    async fn playlists(&self, token: &str) -> Result<Vec<Playlist>, SpotifyApiError> {
        self.record(ApiCall::Playlists, Some(token));
        Ok(self.playlists.clone())
    }

    async fn start_playback(
        &self,
        token: &str,
        device_id: &str,
        playlist_id: &str,
        resume: bool,
    ) -> Result<(), SpotifyApiError> {
        self.record(
            ApiCall::StartPlayback {
                device: device_id.to_string(),
                playlist: playlist_id.to_string(),
                resume,
            },
            Some(token),
        );
        if self.fail_start_playback.load(Ordering::SeqCst) {
            return Err(http_error("play"));
        }
        Ok(())
    }

    async fn pause_playback(&self, token: &str, _device_id: &str) -> Result<(), SpotifyApiError> {
        self.record(ApiCall::Pause, Some(token));
        Ok(())
    }

    async fn skip(&self, token: &str, _device_id: &str, next: bool) -> Result<(), SpotifyApiError> {
        self.record(ApiCall::Skip { next }, Some(token));
        if self.fail_skip.load(Ordering::SeqCst) {
            return Err(http_error("next"));
        }
        Ok(())
    }

    async fn enable_shuffle(&self, token: &str, _device_id: &str) -> Result<(), SpotifyApiError> {
        self.record(ApiCall::Shuffle, Some(token));
        Ok(())
    }

    async fn now_playing(&self, token: &str) -> Result<Option<SongInfo>, SpotifyApiError> {
        self.record(ApiCall::NowPlaying, Some(token));
        Ok(self.songs.lock().unwrap().pop_front().flatten())
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, SpotifyApiError> {
        self.record(ApiCall::FetchImage(url.to_string()), None);
        Ok(vec![0x42; 16])
    }
}

// ── internet radio ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeStations {
    stations: Vec<Station>,
}

impl FakeStations {
    pub fn new(stations: Vec<Station>) -> Self {
        Self { stations }
    }
}

impl StationDirectory for FakeStations {
    fn station_for(&self, button: SabaButton, frequency: i32) -> Option<Station> {
        self.stations
            .iter()
            .find(|s| s.button == button && s.frequency == frequency)
            .cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Start(String),
    Stop,
}

#[derive(Default)]
pub struct FakeStream {
    events: Mutex<Vec<StreamEvent>>,
    title: Mutex<Option<String>>,
}

impl FakeStream {
    pub fn events(&self) -> Vec<StreamEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn set_title(&self, title: Option<&str>) {
        *self.title.lock().unwrap() = title.map(str::to_string);
    }
}

#[async_trait]
impl StreamPlayer for FakeStream {
    async fn start(&self, url: &str) -> anyhow::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(StreamEvent::Start(url.to_string()));
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(StreamEvent::Stop);
        Ok(())
    }

    async fn currently_playing(&self) -> Option<String> {
        self.title.lock().unwrap().clone()
    }
}

// ── backend ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Start(PlayerType, SabaButton, PlayMode, i32),
    Stop(PlayerType),
    Play(PlayerType),
    Pause(PlayerType),
    Toggle(PlayerType, SabaButton),
    Frequency(PlayerType, i32),
}

/// Records every call into a log shared by all instances a factory made.
pub struct RecordingBackend {
    kind: PlayerType,
    log: Arc<Mutex<Vec<BackendCall>>>,
}

impl RecordingBackend {
    pub fn new(kind: PlayerType, log: Arc<Mutex<Vec<BackendCall>>>) -> Self {
        Self { kind, log }
    }

    fn push(&self, call: BackendCall) {
        self.log.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PlayerBackend for RecordingBackend {
    fn kind(&self) -> PlayerType {
        self.kind
    }

    async fn start(&mut self, button: SabaButton, mode: PlayMode, frequency: i32) {
        self.push(BackendCall::Start(self.kind, button, mode, frequency));
    }

    async fn stop(&mut self) {
        self.push(BackendCall::Stop(self.kind));
    }

    async fn play(&mut self) {
        self.push(BackendCall::Play(self.kind));
    }

    async fn pause(&mut self) {
        self.push(BackendCall::Pause(self.kind));
    }

    async fn on_toggle_button_changed(&mut self, button: SabaButton) {
        self.push(BackendCall::Toggle(self.kind, button));
    }

    async fn on_frequency_changed(&mut self, frequency: i32) {
        self.push(BackendCall::Frequency(self.kind, frequency));
    }
}

//! Spotify Connect playback steered from the radio panel.
//!
//! The radio has no skip buttons, so the tuning knob doubles as one: turn it
//! one step away from where it was when Spotify started, then back again.
//! Turning up and back skips forward, turning down and back skips to the
//! previous track.  Both moves go through the frequency debouncer, so a
//! gesture needs at least half a second between the two steps.
//!
//! While playing, the backend polls the account's now-playing state every two
//! seconds and puts song info and progress on the display.
use async_trait::async_trait;
use futures_util::FutureExt;
use saba_proto::protocol::{PlayMode, PlayerType, SabaButton};
use saba_proto::settings::{now_millis, SpotifySettings};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use super::PlayerBackend;
use crate::debounce::Debouncer;
use crate::display::{Asset, Display};
use crate::error::BackendFault;
use crate::periodic::PeriodicTask;
use crate::settings_store::SettingsStore;
use crate::spotify_api::{SpotifyApi, ALBUM_ART_HEIGHT};

const NOW_PLAYING_INTERVAL: Duration = Duration::from_secs(2);

/// Per-start session.  Discarded on every `start()`.
#[derive(Debug)]
struct Session {
    settings: SpotifySettings,
    device_id: Option<String>,
    playlist_id: Option<String>,
    settings_valid: bool,
    ready: bool,
    playing: bool,
    first_play: bool,
    last_song_id: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            settings: SpotifySettings::default(),
            device_id: None,
            playlist_id: None,
            settings_valid: false,
            ready: false,
            playing: false,
            first_play: true,
            last_song_id: None,
        }
    }
}

/// State shared between the backend and its now-playing poller.
struct Shared {
    display: Arc<dyn Display>,
    store: Arc<dyn SettingsStore>,
    api: Arc<dyn SpotifyApi>,
    session: Mutex<Session>,
}

impl Shared {
    async fn fault(&self, session: &mut Session, fault: BackendFault) {
        warn!("Spotify: {}", fault);
        session.ready = false;
        session.playing = false;
        self.display.show_asset(fault.asset()).await;
    }

    /// Current access token, refreshed and persisted first when expired.
    async fn access_token(&self, session: &mut Session) -> Result<String, BackendFault> {
        let now = now_millis();
        if session.settings.is_token_expired(now) {
            info!("Spotify: access token expired, refreshing");
            let refreshed = self.api.refresh_token(&session.settings).await?;
            if refreshed.access_token.is_empty() {
                return Err(BackendFault::Api("token refresh returned no access token".into()));
            }
            session.settings.auth_token = Some(refreshed.access_token);
            if let Some(token) = refreshed.refresh_token.filter(|t| !t.is_empty()) {
                session.settings.refresh_token = Some(token);
            }
            session.settings.auth_token_expiration = Some(now + refreshed.expires_in * 1000);
            if let Err(e) = self.store.save_spotify_settings(&session.settings).await {
                warn!("Spotify: could not persist refreshed token: {}", e);
            }
        }
        session
            .settings
            .auth_token
            .clone()
            .ok_or_else(|| BackendFault::Api("no access token".into()))
    }

    async fn device_id(&self, session: &mut Session, token: &str) -> Result<String, BackendFault> {
        if let Some(id) = &session.device_id {
            return Ok(id.clone());
        }
        let wanted = session.settings.device_name.clone().unwrap_or_default();
        let id = self
            .api
            .devices(token)
            .await?
            .into_iter()
            .find(|d| d.name == wanted)
            .and_then(|d| d.id)
            .ok_or_else(|| BackendFault::Api(format!("device '{wanted}' not found")))?;
        debug!("Spotify: device '{}' is {}", wanted, id);
        session.device_id = Some(id.clone());
        Ok(id)
    }

    async fn playlist_id(
        &self,
        session: &mut Session,
        token: &str,
    ) -> Result<String, BackendFault> {
        if let Some(id) = &session.playlist_id {
            return Ok(id.clone());
        }
        let wanted = session.settings.playlist_name.clone().unwrap_or_default();
        let id = self
            .api
            .playlists(token)
            .await?
            .into_iter()
            .find(|p| p.name == wanted)
            .map(|p| p.id)
            .ok_or_else(|| BackendFault::Api(format!("playlist '{wanted}' not found")))?;
        debug!("Spotify: playlist '{}' is {}", wanted, id);
        session.playlist_id = Some(id.clone());
        Ok(id)
    }

    async fn begin_playback(&self, session: &mut Session) -> Result<(), BackendFault> {
        let token = self.access_token(session).await?;
        let device = self.device_id(session, &token).await?;
        let playlist = self.playlist_id(session, &token).await?;
        let resume = !session.first_play;
        self.api
            .start_playback(&token, &device, &playlist, resume)
            .await?;
        if session.first_play {
            if let Err(e) = self.api.enable_shuffle(&token, &device).await {
                warn!("Spotify: could not enable shuffle: {}", e);
            }
            session.first_play = false;
        }
        Ok(())
    }

    async fn pause_playback(&self, session: &mut Session) -> Result<(), BackendFault> {
        let token = self.access_token(session).await?;
        let device = self.device_id(session, &token).await?;
        self.api.pause_playback(&token, &device).await?;
        Ok(())
    }

    async fn skip(&self, session: &mut Session, next: bool) -> Result<(), BackendFault> {
        let token = self.access_token(session).await?;
        let device = self.device_id(session, &token).await?;
        self.api.skip(&token, &device, next).await?;
        Ok(())
    }

    /// One now-playing poll.
    async fn refresh_now_playing(&self) {
        let mut session = self.session.lock().await;
        if !session.playing {
            return;
        }
        let token = match self.access_token(&mut session).await {
            Ok(token) => token,
            Err(fault) => return self.fault(&mut session, fault).await,
        };
        let info = match self.api.now_playing(&token).await {
            Ok(info) => info,
            Err(e) => {
                warn!("Spotify: now playing unavailable: {}", e);
                return;
            }
        };

        let Some(info) = info.filter(|i| i.item.is_some()) else {
            session.last_song_id = None;
            self.display.show_asset(Asset::SpotifyLogo).await;
            return;
        };
        let Some(track) = info.item.as_ref() else {
            return;
        };

        if session.last_song_id.as_deref() != Some(track.id.as_str()) {
            info!("Spotify: now playing '{}' by '{}'", track.name, track.primary_artist());
            session.last_song_id = Some(track.id.clone());
            let art = match track.album_art_url(ALBUM_ART_HEIGHT) {
                Some(url) => match self.api.fetch_image(url).await {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        warn!("Spotify: album art unavailable: {}", e);
                        None
                    }
                },
                None => None,
            };
            let shown = self
                .display
                .show_song_info(&track.name, track.primary_artist(), art.as_deref())
                .await;
            if !shown {
                warn!("Spotify: display rejected song info");
                self.display.show_asset(Asset::SpotifyApiError).await;
                return;
            }
        }

        if let Some(percent) = info.progress_percent() {
            self.display.show_progress(percent).await;
        }
    }
}

pub struct SpotifyBackend {
    shared: Arc<Shared>,
    debounce: Debouncer,
    /// Dial position when the backend started; the gesture returns here.
    baseline: i32,
    /// First step of a gesture, away from the baseline.
    probe: Option<i32>,
    poller: Option<PeriodicTask>,
}

impl SpotifyBackend {
    pub fn new(
        display: Arc<dyn Display>,
        store: Arc<dyn SettingsStore>,
        api: Arc<dyn SpotifyApi>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                display,
                store,
                api,
                session: Mutex::new(Session::default()),
            }),
            debounce: Debouncer::frequency(),
            baseline: 0,
            probe: None,
            poller: None,
        }
    }

    async fn start_polling(&mut self) {
        self.stop_polling().await;
        let shared = self.shared.clone();
        self.poller = Some(PeriodicTask::start(
            "spotify-now-playing",
            NOW_PLAYING_INTERVAL,
            move |_| {
                let shared = shared.clone();
                async move { shared.refresh_now_playing().await }.boxed()
            },
        ));
    }

    async fn stop_polling(&mut self) {
        // The poller takes the session lock, so it must be gone before we
        // take it.
        if let Some(poller) = self.poller.take() {
            poller.stop().await;
        }
    }

    /// Shared by `stop` and `pause`.  The poller goes even when a fault
    /// already ended playback.
    async fn halt(&mut self) {
        self.stop_polling().await;
        let mut session = self.shared.session.lock().await;
        if !session.playing {
            return;
        }
        session.playing = false;
        if let Err(fault) = self.shared.pause_playback(&mut session).await {
            self.shared.fault(&mut session, fault).await;
        }
    }
}

#[async_trait]
impl PlayerBackend for SpotifyBackend {
    fn kind(&self) -> PlayerType {
        PlayerType::Spotify
    }

    async fn start(&mut self, _button: SabaButton, mode: PlayMode, frequency: i32) {
        info!("Spotify player started at {}", frequency);
        self.baseline = frequency;
        self.probe = None;
        self.stop_polling().await;

        let display = self.shared.display.clone();
        display.clear().await;
        display.show_asset(Asset::SpotifyLogo).await;

        {
            let mut session = self.shared.session.lock().await;
            *session = Session::default();

            let settings = match self.shared.store.spotify_settings().await {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Spotify: cannot read settings: {}", e);
                    SpotifySettings::default()
                }
            };
            let missing = settings.missing_fields();
            if !missing.is_empty() {
                self.shared
                    .fault(&mut session, BackendFault::Unauthorized(missing))
                    .await;
                return;
            }
            session.settings = settings;
            session.settings_valid = true;
            session.ready = true;
        }

        if mode == PlayMode::Play {
            self.play().await;
        }
    }

    async fn stop(&mut self) {
        self.halt().await;
    }

    async fn play(&mut self) {
        {
            let mut session = self.shared.session.lock().await;
            if !session.settings_valid {
                debug!("Spotify: not authorised, play ignored");
                return;
            }
            if session.playing {
                return;
            }
            if let Err(fault) = self.shared.begin_playback(&mut session).await {
                self.shared.fault(&mut session, fault).await;
                return;
            }
            session.ready = true;
            session.playing = true;
        }
        self.start_polling().await;
    }

    async fn pause(&mut self) {
        self.halt().await;
    }

    async fn on_toggle_button_changed(&mut self, _button: SabaButton) {}

    async fn on_frequency_changed(&mut self, frequency: i32) {
        if !self.debounce.check() {
            return;
        }
        {
            let session = self.shared.session.lock().await;
            if !(session.ready && session.playing) {
                return;
            }
        }

        match self.probe {
            None if frequency != self.baseline => {
                debug!("Spotify: gesture probe at {}", frequency);
                self.probe = Some(frequency);
            }
            Some(probe) if frequency == self.baseline => {
                self.probe = None;
                let next = probe > self.baseline;
                info!("Spotify: skipping to {} track", if next { "next" } else { "previous" });
                let mut session = self.shared.session.lock().await;
                if let Err(fault) = self.shared.skip(&mut session, next).await {
                    self.shared.fault(&mut session, fault).await;
                }
            }
            _ => {}
        }
    }
}

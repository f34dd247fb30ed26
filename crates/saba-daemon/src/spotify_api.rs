//! Spotify Web API: the handful of endpoints the radio needs.
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use saba_proto::settings::SpotifySettings;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";

/// Album art is fetched at this height; it fits the panel screen.
pub const ALBUM_ART_HEIGHT: u32 = 300;

#[derive(Debug, Error)]
pub enum SpotifyApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{endpoint} returned {status}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
    },
    #[error("settings lack {0}")]
    MissingCredential(&'static str),
}

// ── models ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshTokenResponse {
    #[serde(default)]
    pub access_token: String,
    /// Seconds.
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct DevicesResponse {
    #[serde(default)]
    devices: Vec<Device>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistsResponse {
    #[serde(default)]
    items: Vec<Playlist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Album {
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Artist {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub album: Album,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub duration_ms: i64,
    pub name: String,
    pub id: String,
    #[serde(default)]
    pub uri: String,
}

impl Track {
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map_or("", |a| a.name.as_str())
    }

    pub fn album_art_url(&self, height: u32) -> Option<&str> {
        self.album
            .images
            .iter()
            .find(|image| image.height == Some(height))
            .map(|image| image.url.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SongInfo {
    #[serde(default)]
    pub progress_ms: i64,
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub item: Option<Track>,
}

impl SongInfo {
    /// Whole percent of the track played, `None` without a known duration.
    pub fn progress_percent(&self) -> Option<u8> {
        let duration = self.item.as_ref()?.duration_ms;
        if duration <= 0 {
            return None;
        }
        let percent = (100 * self.progress_ms / duration).clamp(0, 100);
        Some(percent as u8)
    }
}

// ── api ───────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait SpotifyApi: Send + Sync {
    async fn refresh_token(
        &self,
        settings: &SpotifySettings,
    ) -> Result<RefreshTokenResponse, SpotifyApiError>;
    async fn devices(&self, token: &str) -> Result<Vec<Device>, SpotifyApiError>;
    async fn playlists(&self, token: &str) -> Result<Vec<Playlist>, SpotifyApiError>;
    /// With `resume` the device continues where it was, otherwise the playlist
    /// starts over.
    async fn start_playback(
        &self,
        token: &str,
        device_id: &str,
        playlist_id: &str,
        resume: bool,
    ) -> Result<(), SpotifyApiError>;
    async fn pause_playback(&self, token: &str, device_id: &str) -> Result<(), SpotifyApiError>;
    async fn skip(&self, token: &str, device_id: &str, next: bool) -> Result<(), SpotifyApiError>;
    async fn enable_shuffle(&self, token: &str, device_id: &str) -> Result<(), SpotifyApiError>;
    /// `None` when nothing is playing on the account.
    async fn now_playing(&self, token: &str) -> Result<Option<SongInfo>, SpotifyApiError>;
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, SpotifyApiError>;
}

pub struct SpotifyWebApi {
    client: Client,
}

impl SpotifyWebApi {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }
}

fn ensure_success(
    endpoint: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, SpotifyApiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(SpotifyApiError::Status { endpoint, status })
    }
}

#[async_trait]
impl SpotifyApi for SpotifyWebApi {
    async fn refresh_token(
        &self,
        settings: &SpotifySettings,
    ) -> Result<RefreshTokenResponse, SpotifyApiError> {
        let client_id = settings
            .client_id
            .as_deref()
            .ok_or(SpotifyApiError::MissingCredential("clientId"))?;
        let client_secret = settings
            .client_secret
            .as_deref()
            .ok_or(SpotifyApiError::MissingCredential("clientSecret"))?;
        let refresh_token = settings
            .refresh_token
            .as_deref()
            .ok_or(SpotifyApiError::MissingCredential("refreshToken"))?;

        debug!("spotify: refreshing token");
        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(client_id, Some(client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;
        let refreshed: RefreshTokenResponse = ensure_success("token", response)?.json().await?;
        Ok(refreshed)
    }

    async fn devices(&self, token: &str) -> Result<Vec<Device>, SpotifyApiError> {
        let response = self
            .client
            .get(format!("{API_BASE}/me/player/devices"))
            .bearer_auth(token)
            .send()
            .await?;
        let body: DevicesResponse = ensure_success("devices", response)?.json().await?;
        Ok(body.devices)
    }

    async fn playlists(&self, token: &str) -> Result<Vec<Playlist>, SpotifyApiError> {
        let response = self
            .client
            .get(format!("{API_BASE}/me/playlists"))
            .bearer_auth(token)
            .send()
            .await?;
        let body: PlaylistsResponse = ensure_success("playlists", response)?.json().await?;
        Ok(body.items)
    }

    async fn start_playback(
        &self,
        token: &str,
        device_id: &str,
        playlist_id: &str,
        resume: bool,
    ) -> Result<(), SpotifyApiError> {
        let request = self
            .client
            .put(format!("{API_BASE}/me/player/play"))
            .query(&[("device_id", device_id)])
            .bearer_auth(token);
        let request = if resume {
            request.json(&json!({}))
        } else {
            request.json(&json!({ "context_uri": format!("spotify:playlist:{playlist_id}") }))
        };
        ensure_success("play", request.send().await?)?;
        Ok(())
    }

    async fn pause_playback(&self, token: &str, device_id: &str) -> Result<(), SpotifyApiError> {
        let response = self
            .client
            .put(format!("{API_BASE}/me/player/pause"))
            .query(&[("device_id", device_id)])
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await?;
        ensure_success("pause", response)?;
        Ok(())
    }

    async fn skip(&self, token: &str, device_id: &str, next: bool) -> Result<(), SpotifyApiError> {
        let (endpoint, path) = if next {
            ("next", "me/player/next")
        } else {
            ("previous", "me/player/previous")
        };
        let response = self
            .client
            .post(format!("{API_BASE}/{path}"))
            .query(&[("device_id", device_id)])
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await?;
        ensure_success(endpoint, response)?;
        Ok(())
    }

    async fn enable_shuffle(&self, token: &str, device_id: &str) -> Result<(), SpotifyApiError> {
        let response = self
            .client
            .put(format!("{API_BASE}/me/player/shuffle"))
            .query(&[("state", "true"), ("device_id", device_id)])
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await?;
        ensure_success("shuffle", response)?;
        Ok(())
    }

    async fn now_playing(&self, token: &str) -> Result<Option<SongInfo>, SpotifyApiError> {
        let response = self
            .client
            .get(format!("{API_BASE}/me/player/currently-playing"))
            .bearer_auth(token)
            .send()
            .await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let info: SongInfo = ensure_success("currently-playing", response)?.json().await?;
        Ok(info.item.is_some().then_some(info))
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, SpotifyApiError> {
        let response = self.client.get(url).send().await?;
        let bytes = ensure_success("image", response)?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

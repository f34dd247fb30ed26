//! Contract of the panel display.
//!
//! Rendering bitmaps onto the SPI screen lives outside this daemon; what the
//! daemon owns is *what* should be shown and when.  [`TracingDisplay`] is the
//! sink used when no screen driver is attached: it logs every request.
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Static bitmaps shipped in the assets directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Asset {
    SabaLogo,
    SpotifyLogo,
    SpotifyAuthError,
    SpotifyApiError,
}

impl Asset {
    pub fn file_name(self) -> &'static str {
        match self {
            Asset::SabaLogo => "SabaLogo.bmp",
            Asset::SpotifyLogo => "SpotifySabaLogo.bmp",
            Asset::SpotifyAuthError => "SpotifyAuthError.bmp",
            Asset::SpotifyApiError => "SpotifyApiError.bmp",
        }
    }
}

#[async_trait]
pub trait Display: Send + Sync {
    async fn init(&self);
    async fn clear(&self);
    async fn show_asset(&self, asset: Asset);
    async fn show_frequency(&self, text: &str);
    /// Returns false when the screen could not render the song.
    async fn show_song_info(&self, name: &str, artist: &str, art: Option<&[u8]>) -> bool;
    async fn show_progress(&self, percent: u8);
    async fn show_station(&self, name: &str, region: &str);
    async fn show_radio_song(&self, text: &str);
    async fn clear_radio_song(&self);
}

pub struct TracingDisplay {
    assets_dir: PathBuf,
}

impl TracingDisplay {
    pub fn new(assets_dir: PathBuf) -> Self {
        Self { assets_dir }
    }
}

#[async_trait]
impl Display for TracingDisplay {
    async fn init(&self) {
        info!("display: init (assets in {})", self.assets_dir.display());
    }

    async fn clear(&self) {
        debug!("display: clear");
    }

    async fn show_asset(&self, asset: Asset) {
        let path = self.assets_dir.join(asset.file_name());
        if !path.exists() {
            warn!("display: asset {} missing", path.display());
            return;
        }
        info!("display: {}", asset.file_name());
    }

    async fn show_frequency(&self, text: &str) {
        info!("display: frequency '{}'", text);
    }

    async fn show_song_info(&self, name: &str, artist: &str, art: Option<&[u8]>) -> bool {
        info!(
            "display: now playing '{}' by '{}' ({} bytes of art)",
            name,
            artist,
            art.map_or(0, <[u8]>::len)
        );
        true
    }

    async fn show_progress(&self, percent: u8) {
        debug!("display: progress {}%", percent);
    }

    async fn show_station(&self, name: &str, region: &str) {
        info!("display: station '{}' [{}]", name, region);
    }

    async fn show_radio_song(&self, text: &str) {
        info!("display: radio song '{}'", text);
    }

    async fn clear_radio_song(&self) {
        debug!("display: radio song cleared");
    }
}

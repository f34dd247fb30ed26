use async_trait::async_trait;
use saba_proto::protocol::{PlayMode, PlayerType, SabaButton};
use std::sync::Arc;
use tracing::info;

use super::PlayerBackend;
use crate::display::{Asset, Display};

/// No button pressed: show the logo and ignore everything else.
pub struct IdleBackend {
    display: Arc<dyn Display>,
}

impl IdleBackend {
    pub fn new(display: Arc<dyn Display>) -> Self {
        Self { display }
    }
}

#[async_trait]
impl PlayerBackend for IdleBackend {
    fn kind(&self) -> PlayerType {
        PlayerType::Idle
    }

    async fn start(&mut self, _button: SabaButton, _mode: PlayMode, _frequency: i32) {
        info!("Idle player started");
        self.display.clear().await;
        self.display.show_asset(Asset::SabaLogo).await;
    }

    async fn stop(&mut self) {}

    async fn play(&mut self) {}

    async fn pause(&mut self) {}

    async fn on_toggle_button_changed(&mut self, _button: SabaButton) {}

    async fn on_frequency_changed(&mut self, _frequency: i32) {}
}

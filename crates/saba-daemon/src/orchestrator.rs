use saba_proto::protocol::{PlayMode, PlayerType};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backend::{BackendFactory, PlayerBackend};
use crate::display::Display;
use crate::status::{ChangeKind, RadioStatus};

/// Owns the active backend and turns status changes into backend calls.
pub struct PlayerOrchestrator<F> {
    status: Arc<RadioStatus>,
    factory: F,
    display: Arc<dyn Display>,
}

impl<F: BackendFactory> PlayerOrchestrator<F> {
    pub fn new(status: Arc<RadioStatus>, factory: F, display: Arc<dyn Display>) -> Self {
        Self {
            status,
            factory,
            display,
        }
    }

    /// Runs until `shutdown` fires, then stops the active backend.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Player orchestrator starting");
        let mut backend = self.factory.create(PlayerType::Idle);
        self.display.init().await;
        let snap = self.status.snapshot();
        backend
            .start(snap.active_button, snap.play_mode, snap.frequency)
            .await;

        loop {
            let kind = tokio::select! {
                _ = shutdown.cancelled() => break,
                kind = self.status.latch().wait() => kind,
            };
            self.status.latch().reset();
            debug!("Status change: {:?}", kind);
            backend = self.react(backend, kind).await;
        }

        info!("Player orchestrator stopping");
        backend.stop().await;
    }

    async fn react(
        &self,
        mut backend: Box<dyn PlayerBackend>,
        kind: ChangeKind,
    ) -> Box<dyn PlayerBackend> {
        let snap = self.status.snapshot();
        match kind {
            ChangeKind::BackendChanged => {
                backend.stop().await;
                info!("Switching player {:?} -> {:?}", backend.kind(), snap.player_type);
                backend = self.factory.create(snap.player_type);
                backend
                    .start(snap.active_button, snap.play_mode, snap.frequency)
                    .await;
            }
            ChangeKind::RegionChanged => {
                backend.on_toggle_button_changed(snap.active_button).await;
            }
            ChangeKind::PlayStateChanged => match snap.play_mode {
                PlayMode::Play => backend.play().await,
                PlayMode::Pause => backend.pause().await,
            },
            ChangeKind::FrequencyChanged => {
                backend.on_frequency_changed(snap.frequency).await;
            }
            ChangeKind::None => {}
        }
        backend
    }
}

use async_trait::async_trait;
use futures_util::FutureExt;
use saba_proto::protocol::{PlayMode, PlayerType, SabaButton};
use saba_proto::stations::{Station, StationTable};
use std::sync::{Arc, Mutex};
use tokio::time::Duration;
use tracing::{debug, info, warn};

use super::PlayerBackend;
use crate::debounce::Debouncer;
use crate::display::Display;
use crate::periodic::PeriodicTask;

const TITLE_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Plays a stream URL and reports the stream's current title.
#[async_trait]
pub trait StreamPlayer: Send + Sync {
    async fn start(&self, url: &str) -> anyhow::Result<()>;
    async fn stop(&self) -> anyhow::Result<()>;
    async fn currently_playing(&self) -> Option<String>;
}

pub trait StationDirectory: Send + Sync {
    fn station_for(&self, button: SabaButton, frequency: i32) -> Option<Station>;
}

impl StationDirectory for StationTable {
    fn station_for(&self, button: SabaButton, frequency: i32) -> Option<Station> {
        self.find(button, frequency).cloned()
    }
}

pub struct InternetRadioBackend {
    display: Arc<dyn Display>,
    stations: Arc<dyn StationDirectory>,
    stream: Arc<dyn StreamPlayer>,
    debounce: Debouncer,
    button: SabaButton,
    mode: PlayMode,
    frequency: i32,
    title: Arc<Mutex<Option<String>>>,
    poller: Option<PeriodicTask>,
}

impl InternetRadioBackend {
    pub fn new(
        display: Arc<dyn Display>,
        stations: Arc<dyn StationDirectory>,
        stream: Arc<dyn StreamPlayer>,
    ) -> Self {
        Self {
            display,
            stations,
            stream,
            debounce: Debouncer::frequency(),
            button: SabaButton::M,
            mode: PlayMode::Pause,
            frequency: 0,
            title: Arc::new(Mutex::new(None)),
            poller: None,
        }
    }

    /// Stop, show where the dial is, and play again if we were playing.
    async fn reset(&mut self) {
        self.halt().await;
        self.display.clear().await;
        let text = format!("{} {} MHz", self.button, self.frequency);
        self.display.show_frequency(&text).await;
        if self.mode == PlayMode::Play {
            self.tune().await;
        }
    }

    async fn halt(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop().await;
        }
        if let Err(e) = self.stream.stop().await {
            warn!("Stream stop failed: {}", e);
        }
    }

    async fn tune(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop().await;
        }

        let Some(station) = self.stations.station_for(self.button, self.frequency) else {
            info!("No station on {} {}", self.button, self.frequency);
            return;
        };

        info!("Tuning to '{}' ({})", station.name, station.url);
        if let Err(e) = self.stream.start(&station.url).await {
            warn!("Stream start failed for '{}': {}", station.name, e);
            return;
        }

        *self.title.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.poller = Some(self.start_title_poll());
        self.display.show_station(&station.name, &station.region).await;
    }

    fn start_title_poll(&self) -> PeriodicTask {
        let display = self.display.clone();
        let stream = self.stream.clone();
        let title = self.title.clone();
        PeriodicTask::start("radio-title", TITLE_POLL_INTERVAL, move |_| {
            let display = display.clone();
            let stream = stream.clone();
            let title = title.clone();
            async move {
                let current = stream.currently_playing().await.filter(|t| !t.is_empty());
                let update = {
                    let mut last = title.lock().unwrap_or_else(|e| e.into_inner());
                    if *last == current {
                        None
                    } else {
                        *last = current.clone();
                        Some(current)
                    }
                };
                match update {
                    Some(Some(text)) => {
                        debug!("Radio title: {}", text);
                        display.clear_radio_song().await;
                        display.show_radio_song(&text).await;
                    }
                    Some(None) => display.clear_radio_song().await,
                    None => {}
                }
            }
            .boxed()
        })
    }
}

#[async_trait]
impl PlayerBackend for InternetRadioBackend {
    fn kind(&self) -> PlayerType {
        PlayerType::InternetRadio
    }

    async fn start(&mut self, button: SabaButton, mode: PlayMode, frequency: i32) {
        info!("Internet radio player started on {} {}", button, frequency);
        self.button = button;
        self.mode = mode;
        self.frequency = frequency;
        self.reset().await;
    }

    async fn stop(&mut self) {
        self.halt().await;
    }

    async fn play(&mut self) {
        self.mode = PlayMode::Play;
        self.tune().await;
    }

    async fn pause(&mut self) {
        self.mode = PlayMode::Pause;
        self.halt().await;
    }

    async fn on_toggle_button_changed(&mut self, button: SabaButton) {
        if button == self.button {
            return;
        }
        self.button = button;
        self.reset().await;
    }

    async fn on_frequency_changed(&mut self, frequency: i32) {
        if !self.debounce.check() || frequency == self.frequency {
            return;
        }
        self.frequency = frequency;
        self.reset().await;
    }
}

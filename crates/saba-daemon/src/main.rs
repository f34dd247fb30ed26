mod backend;
mod debounce;
mod display;
mod error;
mod hardware;
mod listener;
mod mpv;
mod orchestrator;
mod periodic;
mod settings_store;
mod spotify_api;
mod status;
#[cfg(test)]
mod testing;

use anyhow::Context;
use saba_proto::config::{Config, HardwareConfig};
use saba_proto::platform;
use saba_proto::stations::StationTable;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use backend::Backends;
use display::{Display, TracingDisplay};
use hardware::{GpioPort, HardwareManager};
use listener::InterruptListener;
use mpv::MpvPlayer;
use orchestrator::PlayerOrchestrator;
use settings_store::JsonSettingsStore;
use spotify_api::SpotifyWebApi;
use status::RadioStatus;

fn init_logging(log_path: &Path) -> anyhow::Result<()> {
    if let Some(dir) = log_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,saba_daemon=debug")),
        )
        .init();
    Ok(())
}

/// Real pigpio on the Pi, a simulated panel fed from stdin elsewhere.
fn gpio_port(config: &HardwareConfig) -> anyhow::Result<Arc<dyn GpioPort>> {
    if config.enabled {
        #[cfg(feature = "pigpio")]
        return Ok(Arc::new(hardware::pigpio::PigpioPort));
        #[cfg(not(feature = "pigpio"))]
        anyhow::bail!("hardware.enabled is set but saba-daemon was built without the pigpio feature");
    }
    info!("Hardware disabled, using simulated panel");
    let simulated = Arc::new(hardware::simulated::SimulatedGpio::new());
    simulated.clone().feed_from_stdin(config.interrupt_pin)?;
    Ok(simulated)
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let term = async {
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Cannot listen for Ctrl-C: {}", e);
            }
        }
        _ = term => {}
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    init_logging(&config.daemon.log_file)?;
    info!(
        "saba-daemon starting at {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("Config loaded from: {:?}", Config::config_path());

    let hardware = Arc::new(HardwareManager::new(
        gpio_port(&config.hardware)?,
        config.hardware.clone(),
    ));
    hardware.init().context("hardware initialisation failed")?;

    let status = Arc::new(RadioStatus::new());
    let mut listener = InterruptListener::new(hardware.clone(), status.clone());
    listener.start_listening()?;

    let stations = StationTable::load(&config.stations.stations_toml)?;
    info!(
        "Loaded {} stations from {:?}",
        stations.len(),
        config.stations.stations_toml
    );

    let display: Arc<dyn Display> = Arc::new(TracingDisplay::new(platform::assets_dir()));
    let mpv = Arc::new(MpvPlayer::new(config.player.volume));
    let backends = Backends {
        display: display.clone(),
        settings: Arc::new(JsonSettingsStore::new(config.daemon.settings_file.clone())),
        spotify: Arc::new(SpotifyWebApi::new()?),
        stations: Arc::new(stations),
        stream: mpv.clone(),
    };

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown requested");
        trigger.cancel();
    });

    PlayerOrchestrator::new(status, backends, display)
        .run(shutdown)
        .await;

    mpv.shutdown().await;
    listener.stop();
    hardware.teardown();
    info!("saba-daemon stopped");
    Ok(())
}

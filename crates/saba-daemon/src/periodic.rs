use futures_util::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Runs an async closure on a fixed period until stopped.
///
/// The first tick fires immediately.  Ticks never overlap: a slow tick delays
/// the next one instead of bunching them up.
pub struct PeriodicTask {
    name: &'static str,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    pub fn start<F>(name: &'static str, period: Duration, tick: F) -> Self
    where
        F: Fn(CancellationToken) -> BoxFuture<'static, ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => tick(token.clone()).await,
                }
            }
            debug!("{}: poller exited", name);
        });
        debug!("{}: poller started ({:?})", name, period);
        Self {
            name,
            cancel,
            handle,
        }
    }

    /// Cancel and wait for a tick that is already running to finish.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.handle).await {
            warn!("{}: poller task failed: {}", self.name, e);
        }
    }
}

/// A dropped task stops at its next tick boundary instead of running detached.
impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

//! Authoritative radio state and the change signal the orchestrator waits on.
use saba_proto::protocol::{IoCommand, PlayMode, PlayerType, SabaButton, DEFAULT_FREQUENCY};
use std::sync::Mutex;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// What a command changed, from the point of view of the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    BackendChanged,
    RegionChanged,
    PlayStateChanged,
    FrequencyChanged,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub player_type: PlayerType,
    pub active_button: SabaButton,
    pub play_mode: PlayMode,
    pub frequency: i32,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            player_type: PlayerType::Idle,
            active_button: SabaButton::M,
            play_mode: PlayMode::Pause,
            frequency: DEFAULT_FREQUENCY,
        }
    }
}

// ── latch ─────────────────────────────────────────────────────────────────────

/// Single-slot signal.  A newer change overwrites an unconsumed one; the
/// consumer re-reads the live status anyway.
pub struct ChangeLatch {
    slot: Mutex<Option<ChangeKind>>,
    notify: Notify,
}

impl ChangeLatch {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    pub fn signal(&self, kind: ChangeKind) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(kind);
        self.notify.notify_one();
    }

    pub fn pending(&self) -> Option<ChangeKind> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Resolves once a change is pending.  Does not clear it, see [`reset`].
    ///
    /// [`reset`]: ChangeLatch::reset
    pub async fn wait(&self) -> ChangeKind {
        loop {
            if let Some(kind) = self.pending() {
                return kind;
            }
            self.notify.notified().await;
        }
    }

    pub fn reset(&self) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

// ── radio status ──────────────────────────────────────────────────────────────

pub struct RadioStatus {
    state: Mutex<StatusSnapshot>,
    latch: ChangeLatch,
}

impl Default for RadioStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioStatus {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StatusSnapshot::default()),
            latch: ChangeLatch::new(),
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn latch(&self) -> &ChangeLatch {
        &self.latch
    }

    /// Apply one panel command.  Called from the listener thread.
    pub fn handle(&self, command: IoCommand) -> ChangeKind {
        let kind = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match command {
                IoCommand::Status {
                    button_index,
                    is_pause,
                    frequency,
                } => {
                    debug!(
                        "Status button={} pause={} frequency={}",
                        button_index, is_pause, frequency
                    );
                    // Every rule runs; the first reported change wins.
                    let button = apply_button(&mut state, button_index);
                    let play = apply_play_pause(&mut state, is_pause);
                    let freq = apply_frequency(&mut state, frequency);
                    [button, play, freq]
                        .into_iter()
                        .find(|k| *k != ChangeKind::None)
                        .unwrap_or(ChangeKind::None)
                }
                IoCommand::ToggleButtonPressed { button_index } => {
                    debug!("ToggleButtonPressed {}", button_index);
                    apply_button(&mut state, button_index)
                }
                IoCommand::PlayPauseButtonPressed { is_pause } => {
                    debug!("PlayPauseButtonPressed pause={}", is_pause);
                    apply_play_pause(&mut state, is_pause)
                }
                IoCommand::FrequencyChanged { frequency } => {
                    debug!("FrequencyChanged {}", frequency);
                    apply_frequency(&mut state, frequency)
                }
            }
        };

        if kind != ChangeKind::None {
            self.latch.signal(kind);
        }
        kind
    }
}

fn apply_button(state: &mut StatusSnapshot, button_index: i32) -> ChangeKind {
    if button_index < 0 {
        // No button held down.
        state.player_type = PlayerType::Idle;
        state.active_button = SabaButton::M;
        info!("No button pressed, going idle");
        return ChangeKind::BackendChanged;
    }

    let Some(button) = SabaButton::from_index(button_index) else {
        warn!("Button index {} does not select a player, ignored", button_index);
        return ChangeKind::None;
    };

    let player_type = button.player_type();
    if player_type != state.player_type {
        info!("Button {} selects {:?}", button, player_type);
        state.player_type = player_type;
        state.active_button = button;
        ChangeKind::BackendChanged
    } else if button != state.active_button {
        info!("Region changed to {}", button);
        state.active_button = button;
        ChangeKind::RegionChanged
    } else {
        ChangeKind::None
    }
}

fn apply_play_pause(state: &mut StatusSnapshot, is_pause: bool) -> ChangeKind {
    let requested = PlayMode::from_is_pause(is_pause);
    if state.play_mode == PlayMode::Play && requested == PlayMode::Play {
        return ChangeKind::None;
    }
    state.play_mode = requested;
    ChangeKind::PlayStateChanged
}

fn apply_frequency(state: &mut StatusSnapshot, frequency: i32) -> ChangeKind {
    if state.frequency == frequency {
        return ChangeKind::None;
    }
    state.frequency = frequency;
    ChangeKind::FrequencyChanged
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::Duration;

    fn toggle(button_index: i32) -> IoCommand {
        IoCommand::ToggleButtonPressed { button_index }
    }

    #[test]
    fn test_initial_status() {
        let status = RadioStatus::new();
        let snap = status.snapshot();
        assert_eq!(snap.player_type, PlayerType::Idle);
        assert_eq!(snap.active_button, SabaButton::M);
        assert_eq!(snap.play_mode, PlayMode::Pause);
        assert_eq!(snap.frequency, 105);
        assert_eq!(status.latch().pending(), None);
    }

    #[test]
    fn test_negative_button_goes_idle() {
        let status = RadioStatus::new();
        status.handle(toggle(1));
        assert_eq!(status.handle(toggle(-1)), ChangeKind::BackendChanged);
        let snap = status.snapshot();
        assert_eq!(snap.player_type, PlayerType::Idle);
        assert_eq!(snap.active_button, SabaButton::M);

        // Reported even when already idle.
        assert_eq!(status.handle(toggle(-1)), ChangeKind::BackendChanged);
    }

    #[test]
    fn test_button_selects_player_regardless_of_history() {
        for start in [-1, 1, 2, 3, 4] {
            for (idx, expected) in [
                (1, PlayerType::Spotify),
                (2, PlayerType::InternetRadio),
                (3, PlayerType::InternetRadio),
                (4, PlayerType::InternetRadio),
            ] {
                let status = RadioStatus::new();
                status.handle(toggle(start));
                status.handle(toggle(idx));
                assert_eq!(status.snapshot().player_type, expected, "{} -> {}", start, idx);
            }
        }
    }

    #[test]
    fn test_region_change_within_internet_radio() {
        let status = RadioStatus::new();
        assert_eq!(status.handle(toggle(2)), ChangeKind::BackendChanged);
        assert_eq!(status.handle(toggle(3)), ChangeKind::RegionChanged);
        assert_eq!(status.snapshot().active_button, SabaButton::K);
        assert_eq!(status.handle(toggle(3)), ChangeKind::None);
    }

    #[test]
    fn test_non_routing_button_is_ignored() {
        let status = RadioStatus::new();
        assert_eq!(status.handle(toggle(0)), ChangeKind::None);
        assert_eq!(status.handle(toggle(9)), ChangeKind::None);
        assert_eq!(status.snapshot(), StatusSnapshot::default());
    }

    #[test]
    fn test_play_pause_rule() {
        let status = RadioStatus::new();
        let play = IoCommand::PlayPauseButtonPressed { is_pause: false };
        let pause = IoCommand::PlayPauseButtonPressed { is_pause: true };
        assert_eq!(status.handle(play), ChangeKind::PlayStateChanged);
        assert_eq!(status.snapshot().play_mode, PlayMode::Play);
        assert_eq!(status.handle(play), ChangeKind::None);
        assert_eq!(status.handle(pause), ChangeKind::PlayStateChanged);
        // Pause is re-signalled, only a repeated play is swallowed.
        assert_eq!(status.handle(pause), ChangeKind::PlayStateChanged);
    }

    #[test]
    fn test_repeated_frequency_is_silent() {
        let status = RadioStatus::new();
        let cmd = IoCommand::FrequencyChanged { frequency: 98 };
        assert_eq!(status.handle(cmd), ChangeKind::FrequencyChanged);
        status.latch().reset();
        assert_eq!(status.handle(cmd), ChangeKind::None);
        assert_eq!(status.latch().pending(), None);
    }

    #[test]
    fn test_status_applies_all_rules_first_change_wins() {
        let status = RadioStatus::new();
        let kind = status.handle(IoCommand::Status {
            button_index: 4,
            is_pause: false,
            frequency: 90,
        });
        assert_eq!(kind, ChangeKind::BackendChanged);
        let snap = status.snapshot();
        assert_eq!(snap.player_type, PlayerType::InternetRadio);
        assert_eq!(snap.active_button, SabaButton::U);
        assert_eq!(snap.play_mode, PlayMode::Play);
        assert_eq!(snap.frequency, 90);

        let kind = status.handle(IoCommand::Status {
            button_index: 4,
            is_pause: false,
            frequency: 91,
        });
        assert_eq!(kind, ChangeKind::FrequencyChanged);
    }

    #[tokio::test]
    async fn test_latch_coalesces_signals() {
        let status = RadioStatus::new();
        status.handle(IoCommand::FrequencyChanged { frequency: 90 });
        status.handle(toggle(1));
        assert_eq!(status.latch().wait().await, ChangeKind::BackendChanged);
        // Still pending until reset.
        assert_eq!(status.latch().wait().await, ChangeKind::BackendChanged);
        status.latch().reset();
        assert_eq!(status.latch().pending(), None);
    }

    #[tokio::test]
    async fn test_latch_wakes_waiter_from_another_thread() {
        let status = Arc::new(RadioStatus::new());
        let remote = status.clone();
        let thread = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            remote.handle(toggle(2));
        });
        let kind = tokio::time::timeout(Duration::from_secs(2), status.latch().wait())
            .await
            .unwrap();
        assert_eq!(kind, ChangeKind::BackendChanged);
        thread.join().unwrap();
    }
}

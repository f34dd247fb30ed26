//! Serial wire protocol spoken by the panel microcontroller.
//!
//! Every message is one JSON object terminated by a newline.  The `command`
//! field selects the shape of the rest of the object:
//!
//! | command        | fields                              |
//! |----------------|-------------------------------------|
//! | `ButtonPressed`| `buttonIndex`                       |
//! | `PlayPause`    | `isPause` (0/1)                     |
//! | `NewFrequency` | `frequency`                         |
//! | `State`        | `buttonIndex`, `isPause`, `frequency` |
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Frequency shown on a freshly booted radio before the panel reports.
pub const DEFAULT_FREQUENCY: i32 = 105;

/// A decoded panel event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoCommand {
    /// Full snapshot, sent at boot or when the status request pin is LOW.
    Status {
        button_index: i32,
        is_pause: bool,
        frequency: i32,
    },
    ToggleButtonPressed {
        button_index: i32,
    },
    PlayPauseButtonPressed {
        is_pause: bool,
    },
    FrequencyChanged {
        frequency: i32,
    },
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("malformed command: {0}")]
    MalformedCommand(#[from] serde_json::Error),
    #[error("empty command")]
    Empty,
}

/// Wire shape.  Kept private so that the public enum stays free of the
/// microcontroller's camelCase and integer booleans.
#[derive(Debug, Deserialize)]
#[serde(tag = "command")]
enum WireCommand {
    ButtonPressed {
        #[serde(rename = "buttonIndex")]
        button_index: i32,
    },
    PlayPause {
        #[serde(rename = "isPause")]
        is_pause: i64,
    },
    NewFrequency {
        frequency: i32,
    },
    State {
        #[serde(rename = "buttonIndex")]
        button_index: i32,
        #[serde(rename = "isPause")]
        is_pause: i64,
        frequency: i32,
    },
}

impl From<WireCommand> for IoCommand {
    fn from(wire: WireCommand) -> Self {
        match wire {
            WireCommand::ButtonPressed { button_index } => {
                IoCommand::ToggleButtonPressed { button_index }
            }
            WireCommand::PlayPause { is_pause } => IoCommand::PlayPauseButtonPressed {
                is_pause: is_pause != 0,
            },
            WireCommand::NewFrequency { frequency } => IoCommand::FrequencyChanged { frequency },
            WireCommand::State {
                button_index,
                is_pause,
                frequency,
            } => IoCommand::Status {
                button_index,
                is_pause: is_pause != 0,
                frequency,
            },
        }
    }
}

/// Parse one serial message.
///
/// Unknown discriminators and missing fields are errors; it is up to the
/// caller to decide whether to drop the message.
pub fn parse(text: &str) -> Result<IoCommand, CommandError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CommandError::Empty);
    }
    let wire: WireCommand = serde_json::from_str(text)?;
    Ok(wire.into())
}

impl IoCommand {
    pub fn name(&self) -> &'static str {
        match self {
            IoCommand::Status { .. } => "Status",
            IoCommand::ToggleButtonPressed { .. } => "ToggleButtonPressed",
            IoCommand::PlayPauseButtonPressed { .. } => "PlayPauseButtonPressed",
            IoCommand::FrequencyChanged { .. } => "FrequencyChanged",
        }
    }
}

// ── panel enums ───────────────────────────────────────────────────────────────

/// Physical buttons on the SABA panel.  The discriminant is the index the
/// microcontroller sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SabaButton {
    /// Former "Phono" position, wired as the play/pause latch.
    PlayPause = 0,
    /// Long waves: Spotify.
    L = 1,
    /// Middle waves: internet radio region 1.
    M = 2,
    /// Short waves: internet radio region 2.
    K = 3,
    /// FM: internet radio region 3.
    U = 4,
}

impl SabaButton {
    /// Buttons that select a player.  `PlayPause` is not one of them.
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            1 => Some(SabaButton::L),
            2 => Some(SabaButton::M),
            3 => Some(SabaButton::K),
            4 => Some(SabaButton::U),
            _ => None,
        }
    }

    pub fn player_type(self) -> PlayerType {
        match self {
            SabaButton::L => PlayerType::Spotify,
            SabaButton::M | SabaButton::K | SabaButton::U => PlayerType::InternetRadio,
            SabaButton::PlayPause => PlayerType::Idle,
        }
    }
}

impl fmt::Display for SabaButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SabaButton::PlayPause => "PlayPause",
            SabaButton::L => "L",
            SabaButton::M => "M",
            SabaButton::K => "K",
            SabaButton::U => "U",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayMode {
    Play,
    #[default]
    Pause,
}

impl PlayMode {
    pub fn from_is_pause(is_pause: bool) -> Self {
        if is_pause {
            PlayMode::Pause
        } else {
            PlayMode::Play
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayerType {
    #[default]
    Idle,
    Spotify,
    InternetRadio,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_button_pressed() {
        for idx in [3, 5, 6] {
            let text = format!(r#"{{"command":"ButtonPressed","buttonIndex":{}}}"#, idx);
            match parse(&text).unwrap() {
                IoCommand::ToggleButtonPressed { button_index } => assert_eq!(button_index, idx),
                other => panic!("Wrong command: {:?}", other),
            }
        }
    }

    #[test]
    fn test_parse_play_pause() {
        let cmd = parse(r#"{"command":"PlayPause","isPause":1}"#).unwrap();
        assert_eq!(cmd, IoCommand::PlayPauseButtonPressed { is_pause: true });
        let cmd = parse(r#"{"command":"PlayPause","isPause":0}"#).unwrap();
        assert_eq!(cmd, IoCommand::PlayPauseButtonPressed { is_pause: false });
    }

    #[test]
    fn test_parse_new_frequency() {
        for freq in [84, 98, 103] {
            let text = format!(r#"{{"command":"NewFrequency","frequency":{}}}"#, freq);
            assert_eq!(
                parse(&text).unwrap(),
                IoCommand::FrequencyChanged { frequency: freq }
            );
        }
    }

    #[test]
    fn test_parse_state() {
        let cmd = parse("{\"command\":\"State\",\"buttonIndex\":2,\"isPause\":0,\"frequency\":101}\r\n")
            .unwrap();
        assert_eq!(
            cmd,
            IoCommand::Status {
                button_index: 2,
                is_pause: false,
                frequency: 101
            }
        );
    }

    #[test]
    fn test_parse_ignores_extra_fields() {
        let cmd = parse(r#"{"command":"NewFrequency","frequency":90,"raw":1234}"#).unwrap();
        assert_eq!(cmd, IoCommand::FrequencyChanged { frequency: 90 });
    }

    #[test]
    fn test_parse_unknown_command_fails() {
        let err = parse(r#"{"command":"Reboot"}"#).unwrap_err();
        assert!(matches!(err, CommandError::MalformedCommand(_)));
    }

    #[test]
    fn test_parse_missing_discriminator_fails() {
        assert!(parse(r#"{"frequency":90}"#).is_err());
    }

    #[test]
    fn test_parse_missing_field_fails() {
        assert!(parse(r#"{"command":"State","buttonIndex":2,"isPause":0}"#).is_err());
        assert!(parse(r#"{"command":"ButtonPressed"}"#).is_err());
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse("{\"command\":").is_err());
        assert!(matches!(parse("   ").unwrap_err(), CommandError::Empty));
    }

    #[test]
    fn test_button_mapping() {
        assert_eq!(SabaButton::from_index(1), Some(SabaButton::L));
        assert_eq!(SabaButton::L.player_type(), PlayerType::Spotify);
        for idx in 2..=4 {
            let button = SabaButton::from_index(idx).unwrap();
            assert_eq!(button.player_type(), PlayerType::InternetRadio);
        }
        assert_eq!(SabaButton::from_index(0), None);
        assert_eq!(SabaButton::from_index(7), None);
    }
}

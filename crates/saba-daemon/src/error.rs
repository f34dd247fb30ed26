use thiserror::Error;

use crate::display::Asset;

/// Failures talking to the GPIO/UART subsystem.  Fatal during boot, logged
/// afterwards.
#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("gpio initialisation failed (code {0})")]
    InitFailed(i32),
    #[error("{call} failed on pin {pin} (code {code})")]
    Pin {
        call: &'static str,
        pin: u32,
        code: i32,
    },
    #[error("cannot open serial device {device} (code {code})")]
    SerialOpen { device: String, code: i32 },
    #[error("serial read failed (code {0})")]
    SerialRead(i32),
    #[error("hardware is not initialised")]
    NotInitialised,
    #[error("cannot spawn listener thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Anything that makes a playback session unusable.  Backends swallow these
/// after putting the matching asset on the display.
#[derive(Debug, Error)]
pub enum BackendFault {
    #[error("spotify settings incomplete, missing {0:?}")]
    Unauthorized(Vec<&'static str>),
    #[error("spotify api: {0}")]
    Api(String),
}

impl BackendFault {
    pub fn asset(&self) -> Asset {
        match self {
            BackendFault::Unauthorized(_) => Asset::SpotifyAuthError,
            BackendFault::Api(_) => Asset::SpotifyApiError,
        }
    }
}

impl From<crate::spotify_api::SpotifyApiError> for BackendFault {
    fn from(err: crate::spotify_api::SpotifyApiError) -> Self {
        BackendFault::Api(err.to_string())
    }
}

//! Error types for tactus-core.

use thiserror::Error;

/// Error type for tactus-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid tempo: {0}. Must be between 1.0 and 999.0 BPM")]
    InvalidTempo(f64),

    #[error("Invalid time signature: {numerator}/{denominator}")]
    InvalidTimeSignature { numerator: u32, denominator: u32 },

    #[error("Invalid loop range: start={start}, end={end}")]
    InvalidLoopRange { start: f64, end: f64 },

    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("Click asset: {0}")]
    ClickAsset(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;

/// A transport command refused because of the current configuration.
///
/// The command is a no-op; listeners receive the same value as a warning.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("Can't play in loop mode unless the in/out markers are further apart")]
    LoopTooShortToPlay,

    #[error("To record in loop mode, the length of loop must be greater than {min_seconds} seconds.")]
    LoopTooShortToRecord { min_seconds: f64 },

    #[error(
        "Recording can be done in either loop mode or punch in/out mode, but not both at the same time!"
    )]
    LoopAndPunch,

    #[error("Recording is only possible when at least one active input device is assigned to a track")]
    NoInputsArmed,

    #[error("Can only abort a recording when something's actually recording.")]
    NothingToAbort,
}

impl From<hound::Error> for Error {
    fn from(e: hound::Error) -> Self {
        Error::ClickAsset(e.to_string())
    }
}

impl From<rubato::ResamplerConstructionError> for Error {
    fn from(e: rubato::ResamplerConstructionError) -> Self {
        Error::ClickAsset(format!("resampler construction failed: {e}"))
    }
}

impl From<rubato::ResampleError> for Error {
    fn from(e: rubato::ResampleError) -> Self {
        Error::ClickAsset(format!("resampling failed: {e}"))
    }
}

//! Centralized error type for the tactus umbrella crate.
//!
//! Wraps the core errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] tactus_core::Error),

    #[error("No playback backend configured")]
    NoBackend,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The refused transport command, if this is a rejection.
    pub fn rejection(&self) -> Option<&tactus_core::Rejection> {
        match self {
            Error::Core(tactus_core::Error::Rejected(r)) => Some(r),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

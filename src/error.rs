use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::sampler::State;

pub type DataResult<T> = Result<T, DataError>;

/// Errors surfaced by the artifact codec and the tree builder.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to open {path}: {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("short or failed write to {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("short or failed read from {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid artifact format: {0}")]
    InvalidFormat(String),

    #[error("artifact version {found} is newer than supported version {supported}")]
    VersionMismatch { found: u16, supported: u16 },

    #[error("unknown or failed compression (tag {tag})")]
    Compression { tag: u8 },

    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("fixed-capacity table is full")]
    OutOfCapacity,
}

/// Errors surfaced by the sampler runtime.
#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("timer source not supported: {0}")]
    NotSupported(String),

    #[error("no permission to arm the hardware counter: {0}")]
    Permission(#[source] io::Error),

    #[error("sampler initialization failed: {0}")]
    InitFailure(#[source] io::Error),

    #[error("`{op}` is not valid in state {state:?}")]
    StateError { op: &'static str, state: State },
}

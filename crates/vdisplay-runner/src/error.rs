//! Error types for the runner.

use std::path::PathBuf;
use thiserror::Error;
use vdisplay_engine::{BridgeError, EmulatorError};
use vdisplay_model::ModelError;
use vdisplay_protocol::WireError;

/// Errors raised while wiring or driving the emulator.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Emulator(#[from] EmulatorError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("cannot encode message: {0}")]
    Wire(#[from] WireError),
}

impl RunnerError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        RunnerError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

use std::path::PathBuf;

use thiserror::Error;

use crate::vdf::VdfError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("terminal error: {0}")]
    Terminal(String),

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: VdfError,
    },

    #[error("{path:?} has no {key:?} entry")]
    MissingKey { path: PathBuf, key: String },

    #[error("cannot read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

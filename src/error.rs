use std::path::PathBuf;

use thiserror::Error;

use crate::brain::BrainError;
use crate::checkpoint::CheckpointError;
use crate::config::ConfigError;
use crate::dispatch::DispatchError;

/// Anything that ends a run.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Brain(#[from] BrainError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error("cannot read config file {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config file {path}: {source}")]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

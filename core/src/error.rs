use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("path does not exist: {}", .0.display())]
    MissingPath(PathBuf),

    #[error("unable to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to encode json for {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unable to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("task scheduler has been shut down")]
    SchedulerShutdown,
}

pub type Result<T> = std::result::Result<T, Error>;

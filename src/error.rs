use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("respawn table not found at '{}'", .0.display())]
    RespawnTableMissing(PathBuf),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("game log not found: {0}")]
    LogNotFound(String),

    #[error("log watcher failed: {0}")]
    Watch(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

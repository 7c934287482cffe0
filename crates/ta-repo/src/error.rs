use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("store error: {0:#}")]
    Store(#[from] anyhow::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("the default user cannot be deleted")]
    DefaultUserProtected,

    #[error("settings file error: {0}")]
    Settings(#[from] std::io::Error),

    #[error("settings file is malformed: {0}")]
    SettingsFormat(#[from] serde_json::Error),
}

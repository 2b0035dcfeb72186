use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("widget script tag not found")]
    MissingScript,
    #[error("data-api-key attribute is required")]
    MissingApiKey,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(#[from] sqlx::Error),
    #[error("storage migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored value is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("stored value under {0} is unreadable")]
    Unreadable(String),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned status {0}")]
    Status(u16),
    #[error("backend rejected request: {0}")]
    Rejected(String),
    #[error("could not decode backend response: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum WidgetError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not build chat client: {0}")]
    Client(#[from] ApiError),
    #[error("widget has been destroyed")]
    Destroyed,
    #[error("widget style node is missing")]
    StyleMissing,
}

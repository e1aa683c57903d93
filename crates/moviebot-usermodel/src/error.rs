use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Item store query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Unknown item table: {0}")]
    UnknownTable(String),
    #[error("Unknown slot column: {0}")]
    UnknownSlot(String),
}

#[derive(Debug, Error)]
pub enum UserModelError {
    #[error("Choice history I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Choice history is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, UserModelError>;

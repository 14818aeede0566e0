//! Error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A setting value that cannot be used (unknown zone, bad number)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Settings file could not be read or written
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// Inventory service rejected the request or answered garbage
    #[error("Inventory error: {0}")]
    InventoryError(String),

    #[error("Probe error: {0}")]
    ProbeError(String),

    #[error("Clipboard error: {0}")]
    ClipboardError(String),

    /// Slot index outside the current inventory
    #[error("Slot error: {0}")]
    SlotError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Transport failure before any HTTP status was received
    #[error("HTTP error: {0}")]
    HttpError(String),
}

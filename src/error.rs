use thiserror::Error;
use uuid::Uuid;

/// Error type used throughout the alarm engine.
#[derive(Error, Debug)]
pub enum AlarmError {
    /// I/O related failure while loading configuration
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error while parsing YAML configuration files
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Comparer name that does not map to a known comparison
    #[error("Unknown comparer type: {0}")]
    UnknownComparer(String),

    /// Requested group does not exist on the server
    #[error("Alarm group not found: {0}")]
    GroupNotFound(String),

    /// Requested item does not exist in the group
    #[error("Alarm item '{item}' not found in group '{group}'")]
    ItemNotFound { group: String, item: String },

    /// Event is not (or no longer) retained by the server
    #[error("Alarm event not found: {0}")]
    EventNotFound(Uuid),

    /// Value type cannot be compared against the trigger
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: &'static str, actual: &'static str },
}

/// Convenient alias over [`Result`] using [`AlarmError`]
pub type Result<T> = std::result::Result<T, AlarmError>;

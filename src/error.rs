//! Error types for the taskdeck core.

/// Top-level error type for the task tracker core.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Item store read/write error.
    #[error("store error: {0}")]
    Store(String),

    /// Settings file persistence error.
    #[error("settings error: {0}")]
    Settings(String),

    /// Configuration load/parse error.
    #[error("config error: {0}")]
    Config(String),

    /// Single-instance lock or activation signal error.
    #[error("singleton error: {0}")]
    Singleton(String),

    /// Notification engine error.
    #[error("notify error: {0}")]
    Notify(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, TrackerError>;

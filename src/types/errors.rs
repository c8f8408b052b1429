use thiserror::Error;

// === PersistenceError ===

/// Errors surfaced by a bookmark persistence backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    /// The server (or store) refused the payload.
    #[error("Bookmark rejected ({status}): {}", .errors.join(", "))]
    Rejected { status: u16, errors: Vec<String> },
    /// A plain error string returned by the backend.
    #[error("{0}")]
    Message(String),
    /// The request never produced a response.
    #[error("Bookmark network error: {0}")]
    Network(String),
    /// The response body could not be understood.
    #[error("Bookmark response parse error: {0}")]
    Parse(String),
    /// No bookmark exists with the given ID.
    #[error("Bookmark not found: {0}")]
    NotFound(i64),
    /// Local database operation failed.
    #[error("Bookmark database error: {0}")]
    Database(String),
}

impl PersistenceError {
    /// Text shown to the user in the modal flash, before sanitizing.
    ///
    /// Server validation errors are shown verbatim, one per line.
    pub fn user_message(&self) -> String {
        match self {
            PersistenceError::Rejected { errors, .. } if !errors.is_empty() => errors.join("\n"),
            PersistenceError::Rejected { status, .. } => {
                format!("Request failed with status {}", status)
            }
            other => other.to_string(),
        }
    }
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(e: rusqlite::Error) -> Self {
        PersistenceError::Database(e.to_string())
    }
}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    #[error("Settings I/O error: {0}")]
    IoError(String),
    /// Failed to serialize or deserialize settings.
    #[error("Settings serialization error: {0}")]
    SerializationError(String),
    /// The provided settings key is invalid.
    #[error("Invalid settings key: {0}")]
    InvalidKey(String),
    /// The provided settings value is invalid.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}

// === LocaleError ===

/// Errors related to localization engine operations.
#[derive(Debug, Error)]
pub enum LocaleError {
    /// The requested locale is not supported.
    #[error("Unsupported locale: {0}")]
    UnsupportedLocale(String),
    /// The locale file was not found or could not be parsed.
    #[error("Locale file not found: {0}")]
    FileNotFound(String),
}

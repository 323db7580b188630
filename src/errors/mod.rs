//! Error handling utilities for the logbook application.
//!
//! This module provides the entry lifecycle taxonomy (`EntryError`), the
//! persistence failures underneath it (`PersistenceError`, `LockError`), and the
//! central application error type `AppError` with its `AppResult` alias.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Represents errors that can occur when attempting to lock the data file.
///
/// # Examples
///
/// ```
/// use logbook::errors::LockError;
/// use std::path::PathBuf;
///
/// let error = LockError::FileBusy {
///     path: PathBuf::from("/var/lib/logbook/data.json.lock"),
/// };
///
/// assert!(format!("{}", error).contains("held by another writer"));
/// ```
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock is held by another process and did not free up in time.
    #[error("Data file lock {path} is held by another writer. Please wait for the other logbook process to finish or check for stuck processes.")]
    FileBusy {
        /// The path to the lock file
        path: PathBuf,
    },

    /// Acquiring the lock failed for a technical reason.
    #[error("Failed to acquire lock {path}: {source}. Please check file permissions and ensure the directory is accessible.")]
    AcquisitionFailed {
        /// The path to the lock file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Failures of the persistence backend.
///
/// These are never user-correctable. Callers that see one after a write must
/// treat the stored state as unknown and re-read before retrying.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The data file exists but could not be read.
    #[error("Failed to read data file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The data file (or its temporary replacement) could not be written.
    #[error("Failed to write data file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The data file is not a JSON array of entries.
    #[error("Data file {path} is not a valid entry collection: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The collection could not be serialized.
    #[error("Failed to encode entry collection: {0}")]
    Encode(#[source] serde_json::Error),

    /// Errors related to locking the data file.
    #[error("Data file locking error: {0}")]
    Lock(#[from] LockError),

    /// A writer panicked while holding the store's write gate.
    #[error("Entry store write gate was poisoned by a panicked writer")]
    Poisoned,

    /// Simulated or backend-specific failure.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// The entry lifecycle error taxonomy.
///
/// Validation and capacity failures are detected before any mutation and
/// leave stored state untouched.
///
/// # Examples
///
/// ```
/// use logbook::errors::EntryError;
///
/// let error = EntryError::Validation(vec![
///     "Title is required and must be a string".to_string(),
///     "Body must be 5000 characters or fewer".to_string(),
/// ]);
/// let message = format!("{}", error);
/// assert!(message.contains("Title is required"));
/// assert!(message.contains("Body must be"));
///
/// let error = EntryError::NotFound("42".to_string());
/// assert_eq!(format!("{}", error), "Entry not found: 42");
/// ```
#[derive(Debug, Error)]
pub enum EntryError {
    /// The candidate violates one or more field constraints.
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// The collection already holds the maximum number of entries.
    #[error("Maximum number of entries reached ({max})")]
    Capacity {
        /// The configured maximum
        max: usize,
    },

    /// No entry carries the requested id.
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// The backend could not load or store the collection.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl EntryError {
    /// Returns the validation messages, or an empty slice for other kinds.
    pub fn messages(&self) -> &[String] {
        match self {
            EntryError::Validation(messages) => messages,
            _ => &[],
        }
    }
}

impl From<LockError> for EntryError {
    fn from(error: LockError) -> Self {
        EntryError::Persistence(PersistenceError::Lock(error))
    }
}

/// Convenience alias for entry lifecycle results.
pub type EntryResult<T> = Result<T, EntryError>;

/// Represents all possible errors that can occur in the logbook application.
///
/// # Examples
///
/// Creating a configuration error:
/// ```
/// use logbook::errors::AppError;
///
/// let error = AppError::Config("LOGBOOK_MAX_ENTRIES must be a positive integer".to_string());
/// assert_eq!(
///     format!("{}", error),
///     "Configuration error: LOGBOOK_MAX_ENTRIES must be a positive integer"
/// );
/// ```
///
/// Converting from an IO error:
/// ```
/// use logbook::errors::AppError;
/// use std::io::{self, ErrorKind};
///
/// let io_error = io::Error::new(ErrorKind::NotFound, "file not found");
/// let app_error: AppError = io_error.into();
///
/// match app_error {
///     AppError::Io(inner) => assert_eq!(inner.kind(), ErrorKind::NotFound),
///     _ => panic!("Expected Io variant"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum AppError {
    /// Errors related to configuration loading or validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input/output errors outside the persistence backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from the entry lifecycle.
    #[error("Entry error: {0}")]
    Entry(#[from] EntryError),

    /// Errors starting or running the HTTP server.
    #[error("Server error: {0}")]
    Server(String),
}

/// A type alias for `Result<T, AppError>` to simplify function signatures.
pub type AppResult<T> = Result<T, AppError>;

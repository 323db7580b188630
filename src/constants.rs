//! Constants used throughout the application.
//!
//! This module contains all constants used in the Logbook application, organized
//! into logical groups. Having constants centralized makes them easier to find,
//! modify, and reference consistently.

// Application Metadata
/// The name of the application.
pub const APP_NAME: &str = "logbook";
/// The description of the application used in CLI help text.
pub const APP_DESCRIPTION: &str = "A minimal unit logbook for timestamped field notes";

// Entry Constraints
/// Maximum number of characters allowed in an entry title.
pub const MAX_TITLE_LENGTH: usize = 200;
/// Maximum number of characters allowed in an entry body.
pub const MAX_BODY_LENGTH: usize = 5000;
/// Default maximum number of entries the store will hold.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;
/// Latitude bounds, inclusive.
pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);
/// Longitude bounds, inclusive.
pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);
/// URL schemes stripped from free text before storage, matched case-insensitively.
pub const STRIPPED_SCHEMES: &[&str] = &["javascript:", "data:", "vbscript:"];

// Configuration Keys & Environment Variables
/// Environment variable for the JSON data file location.
pub const ENV_VAR_DATA_FILE: &str = "LOGBOOK_DATA_FILE";
/// Environment variable for the maximum number of stored entries.
pub const ENV_VAR_MAX_ENTRIES: &str = "LOGBOOK_MAX_ENTRIES";
/// Environment variable for the HTTP listen address.
pub const ENV_VAR_BIND: &str = "LOGBOOK_BIND";
/// Bare port variable honoured when no bind address is given.
pub const ENV_VAR_PORT: &str = "PORT";
/// Environment variable for the rate limit window, in seconds.
pub const ENV_VAR_RATE_LIMIT_WINDOW_SECS: &str = "LOGBOOK_RATE_LIMIT_WINDOW_SECS";
/// Environment variable for the number of requests allowed per window.
pub const ENV_VAR_RATE_LIMIT_MAX: &str = "LOGBOOK_RATE_LIMIT_MAX";
/// Environment variable holding a comma-separated origin allowlist.
pub const ENV_VAR_ALLOWED_ORIGINS: &str = "LOGBOOK_ALLOWED_ORIGINS";
/// Environment variable for the data-file lock timeout, in milliseconds.
pub const ENV_VAR_LOCK_TIMEOUT_MS: &str = "LOGBOOK_LOCK_TIMEOUT_MS";
/// Environment variable for the request body size cap, in bytes.
pub const ENV_VAR_MAX_BODY_BYTES: &str = "LOGBOOK_MAX_BODY_BYTES";
/// Environment variable selecting the log output format.
pub const ENV_VAR_LOG_FORMAT: &str = "LOGBOOK_LOG_FORMAT";
/// Standard environment variable for the user's home directory.
pub const ENV_VAR_HOME: &str = "HOME";
/// Default data file location relative to the user's home directory.
pub const DEFAULT_DATA_SUBPATH: &str = ".logbook/data.json";

// Server Defaults
/// Default HTTP listen address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
/// Default rate limit window (15 minutes).
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 15 * 60;
/// Default number of requests allowed per client per window.
pub const DEFAULT_RATE_LIMIT_MAX: usize = 100;

/// Hard cap on distinct clients the rate limiter tracks at once.
pub const MAX_TRACKED_CLIENTS: usize = 10_000;
/// Default time to wait for the data-file lock.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2000;
/// Interval between attempts to take the data-file lock.
pub const LOCK_RETRY_INTERVAL_MS: u64 = 25;
/// Default request body cap (10 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

// File System Parameters
/// Suffix appended to the data file path to form its lock file.
pub const LOCK_FILE_SUFFIX: &str = ".lock";
/// Default POSIX permissions for newly created directories (owner read/write/execute).
#[cfg(unix)]
pub const DEFAULT_DIR_PERMISSIONS: u32 = 0o700;
/// Default POSIX permissions for newly created files (owner read/write).
#[cfg(unix)]
pub const DEFAULT_FILE_PERMISSIONS: u32 = 0o600;

// Logging Configuration
/// Log format identifier for plain text.
pub const LOG_FORMAT_TEXT: &str = "text";
/// Log format identifier for JSON.
pub const LOG_FORMAT_JSON: &str = "json";
/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Service name used in tracing spans and structured logs.
pub const TRACING_SERVICE_NAME: &str = "logbook";
/// Name for the root tracing span covering an application invocation.
pub const TRACING_ROOT_SPAN_NAME: &str = "app_invocation";
/// Placeholder string for redacted information in debug output.
pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

//! Configuration management for the logbook application.
//!
//! This module handles loading and validating configuration settings from environment
//! variables, with sensible defaults. Command-line flags override individual fields
//! after loading.
//!
//! # Environment Variables
//!
//! - `LOGBOOK_DATA_FILE`: Path to the JSON data file (defaults to ~/.logbook/data.json)
//! - `LOGBOOK_MAX_ENTRIES`: Maximum number of stored entries (defaults to 1000)
//! - `LOGBOOK_BIND`: HTTP listen address (defaults to 127.0.0.1:3000)
//! - `PORT`: Listen on 0.0.0.0:$PORT when `LOGBOOK_BIND` is not set
//! - `LOGBOOK_RATE_LIMIT_WINDOW_SECS` / `LOGBOOK_RATE_LIMIT_MAX`: API rate limit (100 per 900s)
//! - `LOGBOOK_ALLOWED_ORIGINS`: Comma-separated CORS origin allowlist (empty allows any)
//! - `LOGBOOK_LOCK_TIMEOUT_MS`: How long a writer waits for the data file lock
//! - `LOGBOOK_MAX_BODY_BYTES`: Request body cap
//! - `LOGBOOK_LOG_FORMAT`: `text` or `json`
//! - `HOME`: Used for expanding the default data file path

use crate::constants::{
    DEFAULT_BIND_ADDR, DEFAULT_DATA_SUBPATH, DEFAULT_LOCK_TIMEOUT_MS, DEFAULT_MAX_BODY_BYTES,
    DEFAULT_MAX_ENTRIES, DEFAULT_RATE_LIMIT_MAX, DEFAULT_RATE_LIMIT_WINDOW_SECS, ENV_VAR_ALLOWED_ORIGINS,
    ENV_VAR_BIND, ENV_VAR_DATA_FILE, ENV_VAR_HOME, ENV_VAR_LOCK_TIMEOUT_MS, ENV_VAR_LOG_FORMAT,
    ENV_VAR_MAX_BODY_BYTES, ENV_VAR_MAX_ENTRIES, ENV_VAR_PORT, ENV_VAR_RATE_LIMIT_MAX,
    ENV_VAR_RATE_LIMIT_WINDOW_SECS, LOG_FORMAT_JSON, LOG_FORMAT_TEXT, REDACTED_PLACEHOLDER,
};
use crate::errors::{AppError, AppResult};
use std::env::{self, VarError};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            LOG_FORMAT_TEXT => Ok(LogFormat::Text),
            LOG_FORMAT_JSON => Ok(LogFormat::Json),
            other => Err(AppError::Config(format!(
                "{} must be '{}' or '{}', got '{}'",
                ENV_VAR_LOG_FORMAT, LOG_FORMAT_TEXT, LOG_FORMAT_JSON, other
            ))),
        }
    }
}

/// Configuration for the logbook application.
///
/// # Examples
///
/// Building a configuration from an explicit variable table:
/// ```
/// use logbook::Config;
///
/// let config = Config::from_lookup(|key| match key {
///     "LOGBOOK_DATA_FILE" => Some("/srv/logbook/data.json".to_string()),
///     "LOGBOOK_MAX_ENTRIES" => Some("50".to_string()),
///     _ => None,
/// })
/// .expect("valid configuration");
///
/// assert_eq!(config.max_entries, 50);
/// assert_eq!(config.bind_addr.to_string(), "127.0.0.1:3000");
/// ```
///
/// Loading configuration from environment variables:
/// ```no_run
/// use logbook::Config;
///
/// let config = Config::load().expect("Failed to load configuration");
/// println!("listening on {}", config.bind_addr);
/// ```
#[derive(Clone)]
pub struct Config {
    /// JSON file holding the entry collection. Must be absolute.
    pub data_file: PathBuf,

    /// Capacity of the collection.
    pub max_entries: usize,

    /// Address the HTTP server listens on.
    pub bind_addr: SocketAddr,

    /// Length of the rate limiter's sliding window.
    pub rate_limit_window: Duration,

    /// Requests allowed per client within one window.
    pub rate_limit_max: usize,

    /// Origins allowed to call the API. Empty means any origin.
    pub allowed_origins: Vec<String>,

    /// How long a writer waits for the data file lock before giving up.
    pub lock_timeout: Duration,

    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,

    pub log_format: LogFormat,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("data_file", &REDACTED_PLACEHOLDER)
            .field("max_entries", &self.max_entries)
            .field("bind_addr", &self.bind_addr)
            .field("rate_limit_window", &self.rate_limit_window)
            .field("rate_limit_max", &self.rate_limit_max)
            .field("allowed_origins", &self.allowed_origins)
            .field("lock_timeout", &self.lock_timeout)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Default for Config {
    /// Defaults for every field except the data file, which is left empty.
    fn default() -> Self {
        Config {
            data_file: PathBuf::new(),
            max_entries: DEFAULT_MAX_ENTRIES,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            rate_limit_window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
            rate_limit_max: DEFAULT_RATE_LIMIT_MAX,
            allowed_origins: Vec::new(),
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the offending variable when a value
    /// cannot be parsed, when path expansion fails, or when the result does
    /// not pass [`Config::validate`].
    pub fn load() -> AppResult<Self> {
        Self::load_with_data_file(None)
    }

    /// Loads configuration from the process environment, using `data_file`
    /// instead of `LOGBOOK_DATA_FILE` and the `HOME` default when given.
    pub fn load_with_data_file(data_file: Option<PathBuf>) -> AppResult<Self> {
        Self::from_lookup_with_data_file(|key| env::var(key).ok(), data_file)
    }

    /// Loads configuration from an arbitrary variable source.
    ///
    /// `lookup` returns the value of a variable, or `None` when it is unset.
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup_with_data_file(lookup, None)
    }

    /// Like [`Config::from_lookup`], but an explicit `data_file` replaces the
    /// path from the variable source. Neither `LOGBOOK_DATA_FILE` nor `HOME`
    /// is consulted for it then.
    pub fn from_lookup_with_data_file<F>(lookup: F, data_file: Option<PathBuf>) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let data_file = match data_file {
            Some(path) => path,
            None => data_file_from(&get)?,
        };

        let bind_addr = match (get(ENV_VAR_BIND), get(ENV_VAR_PORT)) {
            (Some(bind), _) => parse_value::<SocketAddr>(ENV_VAR_BIND, &bind)?,
            (None, Some(port)) => {
                let port = parse_value::<u16>(ENV_VAR_PORT, &port)?;
                SocketAddr::from(([0, 0, 0, 0], port))
            }
            (None, None) => parse_value::<SocketAddr>(ENV_VAR_BIND, DEFAULT_BIND_ADDR)?,
        };

        let config = Config {
            data_file,
            max_entries: parse_or(&get, ENV_VAR_MAX_ENTRIES, DEFAULT_MAX_ENTRIES)?,
            bind_addr,
            rate_limit_window: Duration::from_secs(parse_or(
                &get,
                ENV_VAR_RATE_LIMIT_WINDOW_SECS,
                DEFAULT_RATE_LIMIT_WINDOW_SECS,
            )?),
            rate_limit_max: parse_or(&get, ENV_VAR_RATE_LIMIT_MAX, DEFAULT_RATE_LIMIT_MAX)?,
            allowed_origins: get(ENV_VAR_ALLOWED_ORIGINS)
                .map(|raw| parse_origins(&raw))
                .unwrap_or_default(),
            lock_timeout: Duration::from_millis(parse_or(
                &get,
                ENV_VAR_LOCK_TIMEOUT_MS,
                DEFAULT_LOCK_TIMEOUT_MS,
            )?),
            max_body_bytes: parse_or(&get, ENV_VAR_MAX_BODY_BYTES, DEFAULT_MAX_BODY_BYTES)?,
            log_format: match get(ENV_VAR_LOG_FORMAT) {
                Some(raw) => raw.parse()?,
                None => LogFormat::Text,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when:
    /// - the data file path is empty or relative
    /// - the capacity, rate limit window or rate limit maximum is zero
    /// - the body cap is zero
    ///
    /// # Examples
    ///
    /// ```
    /// use logbook::Config;
    /// use std::path::PathBuf;
    ///
    /// let mut config = Config {
    ///     data_file: PathBuf::from("/var/lib/logbook/data.json"),
    ///     ..Config::default()
    /// };
    /// assert!(config.validate().is_ok());
    ///
    /// config.data_file = PathBuf::from("relative/data.json");
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> AppResult<()> {
        if self.data_file.as_os_str().is_empty() {
            return Err(AppError::Config("Data file path is empty".to_string()));
        }

        if !self.data_file.is_absolute() {
            return Err(AppError::Config(format!(
                "{} must be an absolute path",
                ENV_VAR_DATA_FILE
            )));
        }

        let positive = [
            (ENV_VAR_MAX_ENTRIES, self.max_entries as u128),
            (
                ENV_VAR_RATE_LIMIT_WINDOW_SECS,
                self.rate_limit_window.as_secs() as u128,
            ),
            (ENV_VAR_RATE_LIMIT_MAX, self.rate_limit_max as u128),
            (ENV_VAR_MAX_BODY_BYTES, self.max_body_bytes as u128),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(AppError::Config(format!("{} must be greater than zero", name)));
            }
        }

        Ok(())
    }
}

/// Resolves the data file from `LOGBOOK_DATA_FILE`, falling back to the
/// default under `HOME`, and expands `~` and `$VARS` against the same source.
fn data_file_from<G>(get: &G) -> AppResult<PathBuf>
where
    G: Fn(&str) -> Option<String>,
{
    let raw = match get(ENV_VAR_DATA_FILE) {
        Some(path) => path,
        None => {
            let home = get(ENV_VAR_HOME).ok_or_else(|| {
                AppError::Config(format!(
                    "{} is not set and {} is unavailable for the default path",
                    ENV_VAR_DATA_FILE, ENV_VAR_HOME
                ))
            })?;
            format!("{}/{}", home.trim_end_matches('/'), DEFAULT_DATA_SUBPATH)
        }
    };

    let expanded = shellexpand::full_with_context(
        &raw,
        || get(ENV_VAR_HOME),
        |var| get(var).map(Some).ok_or(VarError::NotPresent),
    )
    .map_err(|e| AppError::Config(format!("Failed to expand {}: {}", ENV_VAR_DATA_FILE, e)))?;
    Ok(PathBuf::from(expanded.into_owned()))
}

fn parse_value<T>(name: &str, raw: &str) -> AppResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| AppError::Config(format!("Invalid value '{}' for {}: {}", raw, name, e)))
}

fn parse_or<T, G>(get: &G, name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}

/// Splits a comma-separated allowlist, dropping blanks and trailing slashes.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let table: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| table.get(key).cloned()
    }

    fn config_error(result: AppResult<Config>) -> String {
        match result {
            Err(AppError::Config(message)) => message,
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_impl_redacts_data_file() {
        let config = Config {
            data_file: PathBuf::from("/home/username/private/logbook.json"),
            ..Config::default()
        };

        let debug_output = format!("{:?}", config);

        assert!(debug_output.contains(REDACTED_PLACEHOLDER));
        assert!(!debug_output.contains("/home/username/private"));
    }

    #[test]
    fn test_defaults_derive_from_home() {
        let config = Config::from_lookup(lookup_from(&[("HOME", "/home/ops")])).unwrap();

        assert_eq!(config.data_file, PathBuf::from("/home/ops/.logbook/data.json"));
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.bind_addr, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(config.rate_limit_window, Duration::from_secs(900));
        assert_eq!(config.rate_limit_max, 100);
        assert!(config.allowed_origins.is_empty());
        assert_eq!(config.lock_timeout, Duration::from_millis(2000));
        assert_eq!(config.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_data_file_expands_tilde_and_variables() {
        let config = Config::from_lookup(lookup_from(&[
            ("HOME", "/home/ops"),
            ("LOGBOOK_DATA_FILE", "~/logs/$UNIT.json"),
            ("UNIT", "alpha"),
        ]))
        .unwrap();
        assert_eq!(config.data_file, PathBuf::from("/home/ops/logs/alpha.json"));
    }

    #[test]
    fn test_undefined_variable_in_data_file_is_an_error() {
        let message = config_error(Config::from_lookup(lookup_from(&[(
            "LOGBOOK_DATA_FILE",
            "/srv/$MISSING/data.json",
        )])));
        assert!(message.contains("LOGBOOK_DATA_FILE"));
    }

    #[test]
    fn test_relative_data_file_is_rejected() {
        let message = config_error(Config::from_lookup(lookup_from(&[(
            "LOGBOOK_DATA_FILE",
            "data.json",
        )])));
        assert!(message.contains("must be an absolute path"));
    }

    #[test]
    fn test_missing_home_without_data_file_is_rejected() {
        let message = config_error(Config::from_lookup(lookup_from(&[])));
        assert!(message.contains("LOGBOOK_DATA_FILE is not set"));
    }

    #[test]
    fn test_explicit_data_file_replaces_environment_path() {
        let explicit = PathBuf::from("/srv/logbook/override.json");

        // No HOME and no LOGBOOK_DATA_FILE
        let config =
            Config::from_lookup_with_data_file(lookup_from(&[]), Some(explicit.clone())).unwrap();
        assert_eq!(config.data_file, explicit);

        // A relative LOGBOOK_DATA_FILE is never consulted
        let config = Config::from_lookup_with_data_file(
            lookup_from(&[("HOME", "/h"), ("LOGBOOK_DATA_FILE", "relative.json")]),
            Some(explicit.clone()),
        )
        .unwrap();
        assert_eq!(config.data_file, explicit);
    }

    #[test]
    fn test_explicit_data_file_is_still_validated() {
        let message = config_error(Config::from_lookup_with_data_file(
            lookup_from(&[("HOME", "/h")]),
            Some(PathBuf::from("relative.json")),
        ));
        assert!(message.contains("must be an absolute path"));
    }

    #[test]
    fn test_port_applies_only_without_bind() {
        let config = Config::from_lookup(lookup_from(&[("HOME", "/h"), ("PORT", "8080")])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());

        let config = Config::from_lookup(lookup_from(&[
            ("HOME", "/h"),
            ("PORT", "8080"),
            ("LOGBOOK_BIND", "127.0.0.1:9000"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
    }

    #[test]
    fn test_invalid_numbers_name_the_variable() {
        for (name, value) in [
            ("LOGBOOK_MAX_ENTRIES", "many"),
            ("LOGBOOK_RATE_LIMIT_MAX", "-1"),
            ("LOGBOOK_LOCK_TIMEOUT_MS", "1.5"),
            ("PORT", "70000"),
            ("LOGBOOK_BIND", "localhost"),
        ] {
            let message =
                config_error(Config::from_lookup(lookup_from(&[("HOME", "/h"), (name, value)])));
            assert!(message.contains(name), "{} not named in {:?}", name, message);
        }
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        for name in [
            "LOGBOOK_MAX_ENTRIES",
            "LOGBOOK_RATE_LIMIT_WINDOW_SECS",
            "LOGBOOK_RATE_LIMIT_MAX",
            "LOGBOOK_MAX_BODY_BYTES",
        ] {
            let message =
                config_error(Config::from_lookup(lookup_from(&[("HOME", "/h"), (name, "0")])));
            assert!(message.contains("greater than zero"));
            assert!(message.contains(name));
        }
    }

    #[test]
    fn test_allowed_origins_are_split_and_trimmed() {
        let config = Config::from_lookup(lookup_from(&[
            ("HOME", "/h"),
            (
                "LOGBOOK_ALLOWED_ORIGINS",
                " https://ops.example.com/ ,, http://localhost:3000",
            ),
        ]))
        .unwrap();
        assert_eq!(
            config.allowed_origins,
            vec!["https://ops.example.com", "http://localhost:3000"]
        );
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" text ".parse::<LogFormat>().unwrap(), LogFormat::Text);

        let message = config_error(Config::from_lookup(lookup_from(&[
            ("HOME", "/h"),
            ("LOGBOOK_LOG_FORMAT", "xml"),
        ])));
        assert!(message.contains("LOGBOOK_LOG_FORMAT"));
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        let config = Config::from_lookup(lookup_from(&[
            ("HOME", "/h"),
            ("LOGBOOK_MAX_ENTRIES", "  "),
        ]))
        .unwrap();
        assert_eq!(config.max_entries, DEFAULT_MAX_ENTRIES);
    }
}

use crate::config::LogFormat;
use crate::constants::{APP_DESCRIPTION, APP_NAME};
use crate::entry::{Entry, EntryCandidate, EntryPatch};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::fmt::Write;
use std::net::SocketAddr;
use std::path::PathBuf;

/// A minimal unit logbook for timestamped field notes
#[derive(Parser, Debug)]
#[command(name = APP_NAME, about = APP_DESCRIPTION)]
#[command(author, version, long_about = None)]
pub struct CliArgs {
    /// JSON data file (overrides LOGBOOK_DATA_FILE)
    #[arg(long, global = true, value_name = "PATH")]
    pub data_file: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Log output format (overrides LOGBOOK_LOG_FORMAT)
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the HTTP server
    Serve {
        /// Listen address (overrides LOGBOOK_BIND and PORT)
        #[arg(long, value_name = "ADDR")]
        bind: Option<SocketAddr>,
    },

    /// Print all entries, newest first
    List {
        /// Print the entries as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Add an entry and print it as JSON
    Add(AddArgs),

    /// Change fields of an entry and print it as JSON
    Update(UpdateArgs),

    /// Delete an entry
    Delete { id: String },
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct AddArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub body: String,
    /// Latitude in degrees, -90 to 90
    #[arg(long, allow_hyphen_values = true)]
    pub lat: Option<String>,
    /// Longitude in degrees, -180 to 180
    #[arg(long, allow_hyphen_values = true)]
    pub lon: Option<String>,
}

impl AddArgs {
    /// Coordinates stay text so the store applies the same parsing as the form.
    pub fn to_candidate(&self) -> EntryCandidate {
        EntryCandidate::from_text(
            &self.title,
            &self.body,
            self.lat.as_deref(),
            self.lon.as_deref(),
        )
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct UpdateArgs {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub body: Option<String>,
    /// New latitude; an empty value clears it
    #[arg(long, allow_hyphen_values = true)]
    pub lat: Option<String>,
    /// New longitude; an empty value clears it
    #[arg(long, allow_hyphen_values = true)]
    pub lon: Option<String>,
    /// Remove both coordinates
    #[arg(long, conflicts_with_all = ["lat", "lon"])]
    pub clear_location: bool,
}

impl UpdateArgs {
    pub fn to_patch(&self) -> EntryPatch {
        let cleared = self.clear_location.then_some(Value::Null);
        EntryPatch {
            title: self.title.as_deref().map(Value::from),
            body: self.body.as_deref().map(Value::from),
            lat: self
                .lat
                .as_deref()
                .map(Value::from)
                .or_else(|| cleared.clone()),
            lon: self.lon.as_deref().map(Value::from).or(cleared),
            iso_time: None,
        }
    }
}

/// Plain-text listing used by `list` without `--json`.
pub fn format_entries(entries: &[Entry]) -> String {
    if entries.is_empty() {
        return "No entries found.\n".to_string();
    }

    let mut out = String::new();
    for entry in entries {
        let title = if entry.title.is_empty() { "No title" } else { &entry.title };
        let time = if entry.iso_time.is_empty() { "No timestamp" } else { &entry.iso_time };
        let body = if entry.body.is_empty() { "No content" } else { &entry.body };

        let _ = writeln!(out, "[{}] {} ({})", entry.id, title, time);
        for line in body.lines() {
            let _ = writeln!(out, "    {}", line);
        }
        match entry.location() {
            Some((lat, lon)) => {
                let _ = writeln!(out, "    Location: {}, {}", lat, lon);
            }
            None => {
                let _ = writeln!(out, "    No location data");
            }
        }
    }
    out
}

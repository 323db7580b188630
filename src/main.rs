/*!
# Logbook - A Minimal Unit Logbook

Command-line entry point. Either runs the HTTP server or performs one entry
operation against the data file and prints the result.

## Usage

```
logbook [OPTIONS] <COMMAND>

Commands:
  serve   Run the HTTP server
  list    Print all entries, newest first
  add     Add an entry and print it as JSON
  update  Change fields of an entry and print it as JSON
  delete  Delete an entry

Options:
      --data-file <PATH>         JSON data file (overrides LOGBOOK_DATA_FILE)
  -v, --verbose                  Log at debug level unless RUST_LOG says otherwise
      --log-format <LOG_FORMAT>  Log output format [possible values: text, json]
  -h, --help                     Print help
  -V, --version                  Print version
```

## Configuration

See [`logbook::config`] for the environment variables. Flags override them.
*/

use clap::Parser;
use logbook::cli::{format_entries, CliArgs, Command};
use logbook::config::Config;
use logbook::errors::{AppError, AppResult};
use logbook::http::{self, AppState};
use logbook::logging;
use logbook::store::{EntryStore, JsonFileBackend};
use std::env;
use std::io;
use std::path::PathBuf;
use tracing::{debug, error, info, Instrument};

/// The main entry point for the logbook application.
///
/// 1. Parses command-line arguments
/// 2. Loads configuration and initializes logging
/// 3. Applies the remaining flag overrides and re-validates
/// 4. Runs the requested command inside the invocation span
///
/// Errors are logged once here and then returned, which sets a non-zero exit
/// status.
fn main() -> AppResult<()> {
    let args = CliArgs::parse();

    let loaded = resolve_data_file(&args).and_then(Config::load_with_data_file);
    let log_format = args
        .log_format
        .or_else(|| loaded.as_ref().ok().map(|config| config.log_format))
        .unwrap_or_default();
    logging::init(log_format, args.verbose)?;

    let span = logging::root_span();
    let _entered = span.enter();
    info!(command = command_name(&args.command), "Starting logbook");

    let result = loaded
        .and_then(|config| apply_overrides(config, &args))
        .and_then(|config| run(args.command, config, &span));

    if let Err(e) = &result {
        error!(error = %e, "Command failed");
    }
    result
}

/// Resolves `--data-file` against the working directory. The result replaces
/// the environment's path before it is read, so a broken `LOGBOOK_DATA_FILE`
/// or a missing `HOME` does not matter when the flag is given.
fn resolve_data_file(args: &CliArgs) -> AppResult<Option<PathBuf>> {
    match &args.data_file {
        Some(path) if path.is_absolute() => Ok(Some(path.clone())),
        Some(path) => Ok(Some(env::current_dir()?.join(path))),
        None => Ok(None),
    }
}

fn apply_overrides(mut config: Config, args: &CliArgs) -> AppResult<Config> {
    if let Command::Serve { bind: Some(bind) } = &args.command {
        config.bind_addr = *bind;
    }
    if let Some(format) = args.log_format {
        config.log_format = format;
    }

    config.validate()?;
    debug!(config = ?config, "Configuration loaded");
    Ok(config)
}

fn run(command: Command, config: Config, span: &tracing::Span) -> AppResult<()> {
    let backend = JsonFileBackend::new(&config.data_file, config.lock_timeout);
    let store = EntryStore::new(backend).with_max_entries(config.max_entries);

    match command {
        Command::Serve { .. } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|e| AppError::Server(format!("Failed to start runtime: {}", e)))?;
            let state = AppState::new(store, &config);
            runtime.block_on(http::serve(state, &config).instrument(span.clone()))
        }
        Command::List { json } => {
            let entries = store.list_all()?;
            if json {
                println!("{}", to_json(&entries)?);
            } else {
                print!("{}", format_entries(&entries));
            }
            Ok(())
        }
        Command::Add(add) => {
            let entry = store.add(add.to_candidate())?;
            println!("{}", to_json(&entry)?);
            Ok(())
        }
        Command::Update(update) => {
            let entry = store.update(&update.id, update.to_patch())?;
            println!("{}", to_json(&entry)?);
            Ok(())
        }
        Command::Delete { id } => {
            store.delete(&id)?;
            println!("Deleted entry {}", id);
            Ok(())
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> AppResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| AppError::Io(io::Error::from(e)))
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Serve { .. } => "serve",
        Command::List { .. } => "list",
        Command::Add(_) => "add",
        Command::Update(_) => "update",
        Command::Delete { .. } => "delete",
    }
}

/*!
# Logbook

Logbook keeps a small collection of timestamped field notes ("entries") for a
unit. Each entry has a title, a body, an optional location and a timestamp
assigned when it is stored. Entries can be added, listed newest first, updated
and deleted through a JSON API, a server-rendered page, or the command line.

## Architecture

- `entry`: the persisted record and the untrusted input types
- `validation`: admission checks, sanitization and display escaping
- `store`: the entry lifecycle over a pluggable storage backend
- `http`: axum router, rate limiting and security headers
- `render`: the HTML page
- `cli`, `config`, `logging`: the binary's ambient plumbing
- `errors`: error taxonomy

## Usage Example

```rust
use logbook::entry::EntryCandidate;
use logbook::store::{EntryStore, MemoryBackend};

fn main() -> logbook::AppResult<()> {
    let store = EntryStore::new(MemoryBackend::new());

    let entry = store.add(EntryCandidate::new("Patrol", "All quiet.", Some(40.0), Some(-74.0)))?;
    assert_eq!(entry.id, "1");

    let entries = store.list_all()?;
    assert_eq!(entries.len(), 1);
    Ok(())
}
```
*/

/// Command-line interface for parsing and handling user arguments
pub mod cli;
/// Configuration loading and management
pub mod config;
/// Application-wide constants
pub mod constants;
/// Entry records and input types
pub mod entry;
/// Error types and utilities for error handling
pub mod errors;
/// HTTP server
pub mod http;
/// Tracing subscriber setup
pub mod logging;
/// HTML rendering
pub mod render;
/// Entry store and persistence backends
pub mod store;
/// Validation and sanitization
pub mod validation;

// Re-export important types for convenience
pub use config::Config;
pub use entry::{Entry, EntryCandidate, EntryPatch};
pub use errors::{AppError, AppResult, EntryError};
pub use store::EntryStore;

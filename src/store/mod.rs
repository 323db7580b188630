//! # Entry Store
//!
//! The [`EntryStore`] owns the entry lifecycle: admission (validate, sanitize,
//! assign identity), reverse-chronological reads, updates and deletes. Storage
//! is abstracted behind [`EntryBackend`], whose whole contract is "load all /
//! replace all".
//!
//! ## Implementations
//!
//! - [`json_file::JsonFileBackend`]: production storage in a single JSON file
//! - [`memory::MemoryBackend`]: in-memory storage for testing
//!
//! ## Writers
//!
//! Every mutation reads the entire collection, computes a new one, and writes
//! it back. Two writers interleaving that sequence would lose an update, so
//! each mutation runs under the store's write gate (one writer per process)
//! and holds the backend's [`WriteLease`] (one writer per data file) from the
//! load to the replace. Reads take neither.

pub mod backend;
pub mod json_file;
pub mod memory;

pub use backend::{EntryBackend, WriteLease};
pub use json_file::JsonFileBackend;
pub use memory::MemoryBackend;

use crate::constants::{DEFAULT_MAX_ENTRIES, LATITUDE_RANGE, LONGITUDE_RANGE};
use crate::entry::{Entry, EntryCandidate, EntryPatch};
use crate::errors::{EntryError, EntryResult, PersistenceError};
use crate::validation::{self, parse_coordinate, parse_iso_time, sanitize_value};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Validates, identifies, stores and orders logbook entries.
pub struct EntryStore {
    backend: Box<dyn EntryBackend>,
    max_entries: usize,
    write_gate: Mutex<()>,
    clock: Clock,
}

impl fmt::Debug for EntryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryStore")
            .field("backend", &self.backend.describe())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

impl EntryStore {
    /// Creates a store over `backend` with the default capacity.
    pub fn new(backend: impl EntryBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            max_entries: DEFAULT_MAX_ENTRIES,
            write_gate: Mutex::new(()),
            clock: Box::new(Utc::now),
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Replaces the timestamp source used for new entries.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Number of stored entries.
    pub fn len(&self) -> EntryResult<usize> {
        Ok(self.backend.load_all()?.len())
    }

    pub fn is_empty(&self) -> EntryResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns every entry, newest `isoTime` first.
    ///
    /// Entries with equal timestamps come out later-stored first. Entries whose
    /// timestamp is missing or unparsable follow all others, in storage order.
    /// Storage is never modified.
    pub fn list_all(&self) -> EntryResult<Vec<Entry>> {
        let entries = self.backend.load_all().map_err(|e| {
            warn!(backend = %self.backend.describe(), error = %e, "Failed to load entries");
            e
        })?;
        debug!(count = entries.len(), "Loaded entries");
        Ok(newest_first(entries))
    }

    /// Admits a new entry.
    ///
    /// Capacity is checked first, then validation; neither failure writes
    /// anything. On success the title and body are sanitized, an id and
    /// timestamp are assigned, and the whole collection is persisted.
    ///
    /// # Errors
    ///
    /// - `EntryError::Capacity` when the collection is full
    /// - `EntryError::Validation` with every violated constraint
    /// - `EntryError::Persistence` when the backend fails
    pub fn add(&self, candidate: EntryCandidate) -> EntryResult<Entry> {
        let _gate = self.lock_gate()?;
        let _lease = self.backend.begin_write()?;

        let mut entries = self.backend.load_all()?;

        if entries.len() >= self.max_entries {
            warn!(max = self.max_entries, "Rejected entry: collection is full");
            return Err(EntryError::Capacity {
                max: self.max_entries,
            });
        }

        let errors = validation::validate(&candidate);
        if !errors.is_empty() {
            debug!(count = errors.len(), "Rejected entry: validation failed");
            return Err(EntryError::Validation(errors));
        }

        let id = match requested_id(candidate.id.as_ref()) {
            Some(id) if entries.iter().any(|e| e.id == id) => {
                return Err(EntryError::Validation(vec![format!(
                    "Id '{}' is already in use",
                    id
                )]));
            }
            Some(id) => id,
            None => next_id(&entries),
        };

        // Validation already proved these parse; the fallbacks are unreachable.
        let entry = Entry {
            id,
            title: sanitize_value(candidate.title.as_ref()),
            body: sanitize_value(candidate.body.as_ref()),
            lat: parse_coordinate(candidate.lat.as_ref(), LATITUDE_RANGE).unwrap_or(None),
            lon: parse_coordinate(candidate.lon.as_ref(), LONGITUDE_RANGE).unwrap_or(None),
            iso_time: format_iso_time((self.clock)()),
        };

        entries.push(entry.clone());
        self.persist(&entries)?;

        info!(id = %entry.id, total = entries.len(), "Entry added");
        Ok(entry)
    }

    /// Merges `patch` onto the entry with `id`.
    ///
    /// Present patch fields overwrite stored ones; the id never changes. The
    /// merged entry must pass the same checks as a new one, and a patched
    /// `isoTime` must be a valid RFC 3339 timestamp.
    ///
    /// # Errors
    ///
    /// - `EntryError::NotFound` when no entry has `id`
    /// - `EntryError::Validation` when the merged entry is inadmissible
    /// - `EntryError::Persistence` when the backend fails
    pub fn update(&self, id: &str, patch: EntryPatch) -> EntryResult<Entry> {
        let _gate = self.lock_gate()?;
        let _lease = self.backend.begin_write()?;

        let mut entries = self.backend.load_all()?;
        let index = entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| EntryError::NotFound(id.to_string()))?;

        let current = &entries[index];
        let merged = EntryCandidate {
            id: None,
            title: Some(patch.title.unwrap_or_else(|| Value::from(current.title.as_str()))),
            body: Some(patch.body.unwrap_or_else(|| Value::from(current.body.as_str()))),
            lat: patch.lat.or_else(|| current.lat.map(Value::from)),
            lon: patch.lon.or_else(|| current.lon.map(Value::from)),
        };

        let mut errors = validation::validate(&merged);
        let iso_time = match patch.iso_time {
            None => current.iso_time.clone(),
            Some(Value::String(text)) if parse_iso_time(&text).is_some() => text.trim().to_string(),
            Some(_) => {
                errors.push("Timestamp must be a valid ISO-8601 date-time".to_string());
                String::new()
            }
        };
        if !errors.is_empty() {
            return Err(EntryError::Validation(errors));
        }

        let updated = Entry {
            id: current.id.clone(),
            title: sanitize_value(merged.title.as_ref()),
            body: sanitize_value(merged.body.as_ref()),
            lat: parse_coordinate(merged.lat.as_ref(), LATITUDE_RANGE).unwrap_or(None),
            lon: parse_coordinate(merged.lon.as_ref(), LONGITUDE_RANGE).unwrap_or(None),
            iso_time,
        };
        entries[index] = updated.clone();
        self.persist(&entries)?;

        info!(id = %updated.id, "Entry updated");
        Ok(updated)
    }

    /// Removes the entry with `id`.
    ///
    /// # Errors
    ///
    /// - `EntryError::NotFound` when no entry has `id` (nothing is written)
    /// - `EntryError::Persistence` when the backend fails
    pub fn delete(&self, id: &str) -> EntryResult<()> {
        let _gate = self.lock_gate()?;
        let _lease = self.backend.begin_write()?;

        let mut entries = self.backend.load_all()?;
        let index = entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| EntryError::NotFound(id.to_string()))?;

        entries.remove(index);
        self.persist(&entries)?;

        info!(id = %id, total = entries.len(), "Entry deleted");
        Ok(())
    }

    fn lock_gate(&self) -> Result<MutexGuard<'_, ()>, PersistenceError> {
        self.write_gate.lock().map_err(|_| PersistenceError::Poisoned)
    }

    fn persist(&self, entries: &[Entry]) -> EntryResult<()> {
        self.backend.replace_all(entries).map_err(|e| {
            tracing::error!(
                backend = %self.backend.describe(),
                error = %e,
                "Failed to persist entries; stored state is unknown"
            );
            EntryError::from(e)
        })
    }
}

/// Formats a timestamp the way entries store it: UTC, milliseconds, `Z`.
pub fn format_iso_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Sorts a collection for reading.
pub fn newest_first(entries: Vec<Entry>) -> Vec<Entry> {
    let mut keyed: Vec<(usize, Option<DateTime<Utc>>, Entry)> = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| (index, parse_iso_time(&entry.iso_time), entry))
        .collect();

    keyed.sort_by(|(a_index, a_time, _), (b_index, b_time, _)| match (a_time, b_time) {
        (Some(a), Some(b)) => b.cmp(a).then_with(|| b_index.cmp(a_index)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a_index.cmp(b_index),
    });

    keyed.into_iter().map(|(_, _, entry)| entry).collect()
}

/// One more than the largest id that reads as an unsigned integer.
///
/// Non-numeric ids are skipped here but stay in the collection. The result
/// cannot collide with an existing id: any id spelling that number would have
/// parsed to it.
pub fn next_id(entries: &[Entry]) -> String {
    let max = entries
        .iter()
        .filter_map(|e| e.id.trim().parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    (u128::from(max) + 1).to_string()
}

fn requested_id(value: Option<&Value>) -> Option<String> {
    let id = match value {
        Some(Value::String(text)) => validation::sanitize(text),
        Some(Value::Number(number)) => number.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
    use std::sync::Arc;

    fn stored(id: &str, iso_time: &str) -> Entry {
        Entry {
            id: id.to_string(),
            title: format!("entry {}", id),
            body: "body".to_string(),
            lat: None,
            lon: None,
            iso_time: iso_time.to_string(),
        }
    }

    fn ids(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    /// A clock that advances one second per call.
    fn ticking_clock() -> impl Fn() -> DateTime<Utc> + Send + Sync + 'static {
        let tick = Arc::new(AtomicI64::new(0));
        move || {
            let n = tick.fetch_add(1, AtomicOrdering::SeqCst);
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(n)
        }
    }

    #[test]
    fn test_add_assigns_identity_and_timestamp() {
        let store = EntryStore::new(MemoryBackend::new()).with_clock(ticking_clock());

        let entry = store
            .add(EntryCandidate::new("Patrol", "All quiet.", Some(40.0), Some(-74.0)))
            .unwrap();

        assert_eq!(entry.id, "1");
        assert_eq!(entry.title, "Patrol");
        assert_eq!(entry.body, "All quiet.");
        assert_eq!(entry.lat, Some(40.0));
        assert_eq!(entry.lon, Some(-74.0));
        assert_eq!(entry.iso_time, "2024-05-01T12:00:00.000Z");
    }

    #[test]
    fn test_sequential_ids_start_at_one() {
        let store = EntryStore::new(MemoryBackend::new());
        let assigned: Vec<String> = (0..5)
            .map(|i| store.add(EntryCandidate::new(&format!("t{}", i), "b", None, None)))
            .map(|r| r.unwrap().id)
            .collect();
        assert_eq!(assigned, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_next_id_skips_non_numeric_ids() {
        let entries = vec![
            stored("alpha", ""),
            stored("7", ""),
            stored("-3", ""),
            stored("12x", ""),
        ];
        assert_eq!(next_id(&entries), "8");
        assert_eq!(next_id(&[]), "1");
        assert_eq!(next_id(&[stored("18446744073709551615", "")]), "18446744073709551616");
    }

    #[test]
    fn test_add_keeps_non_numeric_ids() {
        let backend = MemoryBackend::with_entries(vec![stored("legacy", "2023-01-01T00:00:00Z")]);
        let store = EntryStore::new(backend);
        let entry = store.add(EntryCandidate::new("t", "b", None, None)).unwrap();
        assert_eq!(entry.id, "1");
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_explicit_ids_must_be_unique() {
        let store = EntryStore::new(MemoryBackend::new());
        let first = store
            .add(EntryCandidate::new("t", "b", None, None).with_id("log-a"))
            .unwrap();
        assert_eq!(first.id, "log-a");

        match store.add(EntryCandidate::new("t", "b", None, None).with_id("log-a")) {
            Err(EntryError::Validation(messages)) => {
                assert_eq!(messages, vec!["Id 'log-a' is already in use".to_string()]);
            }
            other => panic!("Expected Validation error, got {:?}", other),
        }

        // Blank ids fall back to assignment.
        let entry = store
            .add(EntryCandidate::new("t", "b", None, None).with_id("  "))
            .unwrap();
        assert_eq!(entry.id, "1");
    }

    #[test]
    fn test_add_sanitizes_text() {
        let store = EntryStore::new(MemoryBackend::new());
        let entry = store
            .add(EntryCandidate::new(
                "  Report\u{0007} ",
                "see javascript:alert(1)\u{0000}",
                None,
                None,
            ))
            .unwrap();
        assert_eq!(entry.title, "Report");
        assert_eq!(entry.body, "see alert(1)");
    }

    #[test]
    fn test_add_parses_string_coordinates() {
        let store = EntryStore::new(MemoryBackend::new());
        let entry = store
            .add(EntryCandidate::from_text("t", "b", Some(" 51.5 "), Some("")))
            .unwrap();
        assert_eq!(entry.lat, Some(51.5));
        assert_eq!(entry.lon, None);
    }

    #[test]
    fn test_zero_coordinates_are_kept() {
        let store = EntryStore::new(MemoryBackend::new());
        let entry = store
            .add(EntryCandidate::new("Null Island", "b", Some(0.0), Some(0.0)))
            .unwrap();
        assert_eq!(entry.location(), Some((0.0, 0.0)));
    }

    #[test]
    fn test_validation_failure_writes_nothing() {
        let backend = Arc::new(MemoryBackend::new());
        let store = EntryStore::new(Arc::clone(&backend));

        let candidate: EntryCandidate =
            serde_json::from_value(json!({ "title": "", "body": "x" })).unwrap();
        match store.add(candidate) {
            Err(EntryError::Validation(messages)) => {
                assert_eq!(messages, vec!["Title is required and must be a string".to_string()]);
            }
            other => panic!("Expected Validation error, got {:?}", other),
        }
        assert_eq!(backend.write_count(), 0);
        assert!(backend.snapshot().is_empty());
    }

    #[test]
    fn test_capacity_is_checked_before_validation() {
        let backend = Arc::new(MemoryBackend::with_entries(vec![
            stored("1", "2024-01-01T00:00:00Z"),
            stored("2", "2024-01-02T00:00:00Z"),
        ]));
        let store = EntryStore::new(Arc::clone(&backend)).with_max_entries(2);

        match store.add(EntryCandidate::default()) {
            Err(EntryError::Capacity { max }) => assert_eq!(max, 2),
            other => panic!("Expected Capacity error, got {:?}", other),
        }
        assert_eq!(backend.write_count(), 0);
        assert_eq!(backend.snapshot().len(), 2);
    }

    #[test]
    fn test_list_all_orders_newest_first() {
        let backend = MemoryBackend::with_entries(vec![
            stored("1", "2024-01-02T00:00:00.000Z"),
            stored("2", "2024-03-01T00:00:00.000Z"),
            stored("3", "2023-12-31T23:59:59.999Z"),
            stored("4", "2024-01-02T01:00:00+02:00"),
        ]);
        let store = EntryStore::new(backend);
        // "4" is 2024-01-01T23:00Z once offsets are applied.
        assert_eq!(ids(&store.list_all().unwrap()), vec!["2", "1", "4", "3"]);
    }

    #[test]
    fn test_list_all_places_invalid_timestamps_last() {
        let backend = MemoryBackend::with_entries(vec![
            stored("a", "not a time"),
            stored("b", "2024-01-01T00:00:00Z"),
            stored("c", ""),
            stored("d", "2025-01-01T00:00:00Z"),
        ]);
        let store = EntryStore::new(backend);
        assert_eq!(ids(&store.list_all().unwrap()), vec!["d", "b", "a", "c"]);
    }

    #[test]
    fn test_equal_timestamps_list_later_stored_first() {
        let backend = MemoryBackend::with_entries(vec![
            stored("1", "2024-01-01T00:00:00Z"),
            stored("2", "2024-01-01T00:00:00Z"),
        ]);
        let store = EntryStore::new(backend);
        assert_eq!(ids(&store.list_all().unwrap()), vec!["2", "1"]);
    }

    #[test]
    fn test_list_all_does_not_write() {
        let backend = Arc::new(MemoryBackend::with_entries(vec![
            stored("1", "2024-01-01T00:00:00Z"),
            stored("2", "2024-06-01T00:00:00Z"),
        ]));
        let store = EntryStore::new(Arc::clone(&backend));
        store.list_all().unwrap();
        assert_eq!(backend.write_count(), 0);
        assert_eq!(ids(&backend.snapshot()), vec!["1", "2"]);
    }

    #[test]
    fn test_read_failure_is_not_an_empty_list() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_fail_reads(true);
        let store = EntryStore::new(backend);
        assert!(matches!(store.list_all(), Err(EntryError::Persistence(_))));
    }

    #[test]
    fn test_write_failure_is_propagated() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_fail_writes(true);
        let store = EntryStore::new(backend);
        assert!(matches!(
            store.add(EntryCandidate::new("t", "b", None, None)),
            Err(EntryError::Persistence(_))
        ));
    }

    #[test]
    fn test_update_merges_and_keeps_identity() {
        let store = EntryStore::new(MemoryBackend::new()).with_clock(ticking_clock());
        store
            .add(EntryCandidate::new("Patrol", "All quiet.", Some(40.0), Some(-74.0)))
            .unwrap();

        let patch: EntryPatch =
            serde_json::from_value(json!({ "id": "99", "body": " Contact\u{0001} east ", "lat": null }))
                .unwrap();
        let updated = store.update("1", patch).unwrap();

        assert_eq!(updated.id, "1");
        assert_eq!(updated.title, "Patrol");
        assert_eq!(updated.body, "Contact east");
        assert_eq!(updated.lat, None);
        assert_eq!(updated.lon, Some(-74.0));
        assert_eq!(updated.iso_time, "2024-05-01T12:00:00.000Z");
        assert_eq!(store.list_all().unwrap(), vec![updated]);
    }

    #[test]
    fn test_update_revalidates() {
        let store = EntryStore::new(MemoryBackend::new());
        store.add(EntryCandidate::new("t", "b", None, None)).unwrap();

        let patch: EntryPatch = serde_json::from_value(
            json!({ "title": "x".repeat(201), "lon": 200, "isoTime": "soon" }),
        )
        .unwrap();
        match store.update("1", patch) {
            Err(EntryError::Validation(messages)) => {
                assert_eq!(messages.len(), 3);
                assert!(messages[0].starts_with("Title"));
                assert!(messages[1].starts_with("Longitude"));
                assert!(messages[2].starts_with("Timestamp"));
            }
            other => panic!("Expected Validation error, got {:?}", other),
        }
        assert_eq!(store.list_all().unwrap()[0].title, "t");
    }

    #[test]
    fn test_update_accepts_new_timestamp() {
        let store = EntryStore::new(MemoryBackend::new());
        store.add(EntryCandidate::new("t", "b", None, None)).unwrap();
        let patch: EntryPatch =
            serde_json::from_value(json!({ "isoTime": "2020-02-02T02:02:02.000Z" })).unwrap();
        assert_eq!(
            store.update("1", patch).unwrap().iso_time,
            "2020-02-02T02:02:02.000Z"
        );
    }

    #[test]
    fn test_update_missing_id() {
        let store = EntryStore::new(MemoryBackend::new());
        match store.update("404", EntryPatch::default()) {
            Err(EntryError::NotFound(id)) => assert_eq!(id, "404"),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_removes_only_the_target() {
        let store = EntryStore::new(MemoryBackend::new());
        for title in ["a", "b", "c"] {
            store.add(EntryCandidate::new(title, "body", None, None)).unwrap();
        }
        store.delete("2").unwrap();

        let mut remaining: Vec<String> =
            store.list_all().unwrap().into_iter().map(|e| e.id).collect();
        remaining.sort();
        assert_eq!(remaining, vec!["1", "3"]);

        // Ids are never reused below the current maximum.
        let entry = store.add(EntryCandidate::new("d", "body", None, None)).unwrap();
        assert_eq!(entry.id, "4");
    }

    #[test]
    fn test_delete_missing_id_writes_nothing() {
        let backend = Arc::new(MemoryBackend::with_entries(vec![stored("1", "")]));
        let store = EntryStore::new(Arc::clone(&backend));
        assert!(matches!(store.delete("2"), Err(EntryError::NotFound(_))));
        assert_eq!(backend.write_count(), 0);
        assert_eq!(backend.snapshot().len(), 1);
    }

    #[test]
    fn test_concurrent_adds_do_not_lose_updates() {
        let store = Arc::new(EntryStore::new(MemoryBackend::new()));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..5 {
                        store
                            .add(EntryCandidate::new(&format!("t{}-{}", i, j), "b", None, None))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let entries = store.list_all().unwrap();
        assert_eq!(entries.len(), 40);
        let mut ids: Vec<u64> = entries.iter().map(|e| e.id.parse().unwrap()).collect();
        ids.sort();
        assert_eq!(ids, (1..=40).collect::<Vec<u64>>());
    }

    #[test]
    fn test_format_iso_time_uses_millis_and_z() {
        let time = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(format_iso_time(time), "2024-05-01T12:00:00.000Z");
    }
}

use super::backend::EntryBackend;
use crate::entry::Entry;
use crate::errors::PersistenceError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory storage backend for testing.
///
/// Can be told to fail reads or writes so error paths are reachable without a
/// real filesystem.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<Vec<Entry>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with a pre-populated collection, in the given storage order.
    pub fn with_entries(entries: Vec<Entry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Self::default()
        }
    }

    /// Enable read error simulation.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Enable write error simulation.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `replace_all` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current contents in storage order, bypassing the failure switches.
    pub fn snapshot(&self) -> Vec<Entry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EntryBackend for MemoryBackend {
    fn load_all(&self) -> Result<Vec<Entry>, PersistenceError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(
                "simulated read failure".to_string(),
            ));
        }
        let entries = self.entries.lock().map_err(|_| PersistenceError::Poisoned)?;
        Ok(entries.clone())
    }

    fn replace_all(&self, entries: &[Entry]) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(
                "simulated write failure".to_string(),
            ));
        }
        let mut stored = self.entries.lock().map_err(|_| PersistenceError::Poisoned)?;
        *stored = entries.to_vec();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

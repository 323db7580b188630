use crate::entry::Entry;
use crate::errors::PersistenceError;
use std::fs::File;
use std::sync::Arc;

/// Raw storage for the entry collection.
///
/// A backend only knows how to load and replace the whole collection; the
/// [`EntryStore`](super::EntryStore) owns ordering, identity and admission.
pub trait EntryBackend: Send + Sync {
    /// Load the full collection in storage order.
    ///
    /// An absent collection is `Ok(vec![])`. Anything that prevents reading an
    /// existing collection is an error, never an empty list.
    fn load_all(&self) -> Result<Vec<Entry>, PersistenceError>;

    /// Replace the full collection.
    /// MUST be atomic (e.g. write to tmp then rename) to avoid partial writes.
    fn replace_all(&self, entries: &[Entry]) -> Result<(), PersistenceError>;

    /// Exclusive access for one read-modify-write cycle.
    ///
    /// The store holds the returned lease from the load through the replace.
    /// Backends shared between processes override this.
    fn begin_write(&self) -> Result<WriteLease, PersistenceError> {
        Ok(WriteLease::unlocked())
    }

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Lets a caller keep a handle on a backend the store owns.
impl<B: EntryBackend + ?Sized> EntryBackend for Arc<B> {
    fn load_all(&self) -> Result<Vec<Entry>, PersistenceError> {
        (**self).load_all()
    }

    fn replace_all(&self, entries: &[Entry]) -> Result<(), PersistenceError> {
        (**self).replace_all(entries)
    }

    fn begin_write(&self) -> Result<WriteLease, PersistenceError> {
        (**self).begin_write()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Guard for one mutation. Dropping it releases any file lock it holds.
#[derive(Debug)]
pub struct WriteLease {
    lock_file: Option<File>,
}

impl WriteLease {
    pub fn unlocked() -> Self {
        Self { lock_file: None }
    }

    pub(crate) fn locked(file: File) -> Self {
        Self {
            lock_file: Some(file),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lock_file.is_some()
    }
}

impl Drop for WriteLease {
    fn drop(&mut self) {
        if let Some(file) = self.lock_file.take() {
            // Closing the handle also releases the lock; unlock explicitly so the
            // release does not wait on the descriptor being reclaimed.
            let _ = fs2::FileExt::unlock(&file);
        }
    }
}

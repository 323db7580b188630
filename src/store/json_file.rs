use super::backend::{EntryBackend, WriteLease};
use crate::constants::{LOCK_FILE_SUFFIX, LOCK_RETRY_INTERVAL_MS};
use crate::entry::Entry;
use crate::errors::{LockError, PersistenceError};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tracing::debug;

/// Production backend: the whole collection as one pretty-printed JSON array.
///
/// ```text
/// <dir>/
/// ├── data.json        # JSON array of entries
/// └── data.json.lock   # advisory lock taken for each mutation
/// ```
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over `data.json`, so readers never observe a half-written collection.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        let path = path.into();
        let mut lock_name = OsString::from(path.as_os_str());
        lock_name.push(LOCK_FILE_SUFFIX);
        Self {
            lock_path: PathBuf::from(lock_name),
            path,
            lock_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    fn ensure_parent_dir(&self) -> Result<(), PersistenceError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => return Ok(()),
        };
        if parent.exists() {
            return Ok(());
        }

        let write_error = |source: io::Error| PersistenceError::Write {
            path: parent.to_path_buf(),
            source,
        };
        fs::create_dir_all(parent).map_err(write_error)?;

        // 0o700: owner only
        #[cfg(unix)]
        {
            fs::set_permissions(
                parent,
                fs::Permissions::from_mode(crate::constants::DEFAULT_DIR_PERMISSIONS),
            )
            .map_err(write_error)?;
            debug!("Set 0o700 permissions on data directory");
        }
        Ok(())
    }
}

impl EntryBackend for JsonFileBackend {
    fn load_all(&self) -> Result<Vec<Entry>, PersistenceError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Data file does not exist yet, starting empty");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|source| PersistenceError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn replace_all(&self, entries: &[Entry]) -> Result<(), PersistenceError> {
        self.ensure_parent_dir()?;

        let content = serde_json::to_string_pretty(entries).map_err(PersistenceError::Encode)?;
        let write_error = |source: io::Error| PersistenceError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(write_error)?;
        tmp.write_all(content.as_bytes()).map_err(write_error)?;
        tmp.flush().map_err(write_error)?;
        tmp.as_file().sync_all().map_err(write_error)?;

        #[cfg(unix)]
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(
                crate::constants::DEFAULT_FILE_PERMISSIONS,
            ))
            .map_err(write_error)?;

        tmp.persist(&self.path).map_err(|e| write_error(e.error))?;
        debug!(count = entries.len(), "Replaced data file");
        Ok(())
    }

    fn begin_write(&self) -> Result<WriteLease, PersistenceError> {
        self.ensure_parent_dir()?;

        let acquisition_failed = |source: io::Error| LockError::AcquisitionFailed {
            path: self.lock_path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(acquisition_failed)?;

        let deadline = Instant::now() + self.lock_timeout;
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => return Ok(WriteLease::locked(file)),
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if Instant::now() >= deadline {
                        return Err(LockError::FileBusy {
                            path: self.lock_path.clone(),
                        }
                        .into());
                    }
                    thread::sleep(Duration::from_millis(LOCK_RETRY_INTERVAL_MS));
                }
                Err(e) => return Err(acquisition_failed(e).into()),
            }
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

//! Crash-safe write helpers shared by the store layouts and the lockfile.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

const LOCK_ATTEMPTS: u32 = 500;
const LOCK_BACKOFF: Duration = Duration::from_millis(10);

/// Outcome of [`publish_new`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Publish {
    /// The file was created with the supplied contents.
    Created,
    /// Another writer created the target first; nothing was written.
    AlreadyExists,
}

/// Writes `contents` to a sibling temporary file and renames it over `target`.
///
/// Missing parent directories are created. A crash mid-write leaves either the
/// previous file or the new one, never a truncated mix.
///
/// # Errors
///
/// Returns [`crate::StoreError::Io`] when the temporary file cannot be written
/// or renamed.
pub fn atomic_write(target: &Path, contents: &[u8]) -> StoreResult<()> {
    ensure_parent(target)?;
    let tmp = temp_sibling(target);
    write_synced(&tmp, contents)?;
    if let Err(source) = fs::rename(&tmp, target) {
        let _ = fs::remove_file(&tmp);
        return Err(StoreError::io(target, source));
    }
    Ok(())
}

/// Materialises `target` with `contents` only if it does not exist yet.
///
/// The contents are staged in a temporary file and hard-linked into place,
/// which fails atomically when the target is already taken. On filesystems
/// without hard links the file is created exclusively instead.
pub(crate) fn publish_new(target: &Path, contents: &[u8]) -> StoreResult<Publish> {
    ensure_parent(target)?;
    let tmp = temp_sibling(target);
    write_synced(&tmp, contents)?;
    let linked = fs::hard_link(&tmp, target);
    let _ = fs::remove_file(&tmp);

    match linked {
        Ok(()) => Ok(Publish::Created),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(Publish::AlreadyExists),
        Err(err) => {
            debug!(path = %target.display(), error = %err, "hard link unavailable, creating exclusively");
            create_exclusive(target, contents)
        }
    }
}

fn create_exclusive(target: &Path, contents: &[u8]) -> StoreResult<Publish> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(target) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(Publish::AlreadyExists),
        Err(source) => return Err(StoreError::io(target, source)),
    };
    file.write_all(contents)
        .and_then(|()| file.sync_all())
        .map_err(|source| StoreError::io(target, source))?;
    Ok(Publish::Created)
}

fn write_synced(path: &Path, contents: &[u8]) -> StoreResult<()> {
    let result = File::create(path).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    result.map_err(|source| {
        let _ = fs::remove_file(path);
        StoreError::io(path, source)
    })
}

fn ensure_parent(target: &Path) -> StoreResult<()> {
    match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| StoreError::io(parent, source))
        }
        _ => Ok(()),
    }
}

fn temp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4().simple()))
}

/// Exclusive cross-process write lock backed by a `<target>.lock` file.
///
/// The lock file is removed when the guard drops.
#[derive(Debug)]
pub(crate) struct WriteLock {
    path: PathBuf,
}

impl WriteLock {
    /// Blocks until the lock for `target` is acquired.
    pub(crate) fn acquire(target: &Path) -> StoreResult<Self> {
        ensure_parent(target)?;
        let mut name = target.as_os_str().to_owned();
        name.push(".lock");
        let path = PathBuf::from(name);

        for _ in 0..LOCK_ATTEMPTS {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => thread::sleep(LOCK_BACKOFF),
                Err(source) => return Err(StoreError::io(&path, source)),
            }
        }

        warn!(lock = %path.display(), "write lock still held after waiting");
        Err(StoreError::WriteContended { path })
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(lock = %self.path.display(), error = %err, "failed to release write lock");
        }
    }
}

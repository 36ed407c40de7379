use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::debug;

const LOCK_FILE: &str = ".lock";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_BACKOFF: Duration = Duration::from_millis(100);

/// Exclusive write access to a list store, held until dropped.
///
/// The `.lock` file in the store directory carries the holder's pid while
/// the lock is held, so a waiting `lk` can say who it is waiting on. The
/// file stays behind empty on release: unlinking it would let a waiter that
/// already opened it lock an orphaned inode.
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("store {} is busy{}", .dir.display(), held_by(.holder))]
    Busy { dir: PathBuf, holder: Option<u32> },
}

fn held_by(holder: &Option<u32>) -> String {
    match holder {
        Some(pid) => format!(": lk process {} is writing to it", pid),
        None => ": another lk process is writing to it".to_string(),
    }
}

impl StoreLock {
    /// Lock `store_dir`, retrying with backoff for up to `timeout`.
    pub fn acquire(store_dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = store_dir.join(LOCK_FILE);
        let open_error = |source| LockError::Open {
            path: path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(open_error)?;

        let start = Instant::now();
        let mut backoff = Duration::from_millis(5);
        while !try_lock(&file) {
            let waited = start.elapsed();
            if waited >= timeout {
                let holder = Self::holder(store_dir);
                debug!(store = %store_dir.display(), ?holder, "gave up waiting for store lock");
                return Err(LockError::Busy {
                    dir: store_dir.to_path_buf(),
                    holder,
                });
            }
            std::thread::sleep(backoff.min(timeout - waited));
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }

        record_holder(&mut file).map_err(open_error)?;
        debug!(
            store = %store_dir.display(),
            waited_ms = start.elapsed().as_millis() as u64,
            "store locked"
        );
        Ok(StoreLock { file, path })
    }

    pub fn acquire_default(store_dir: &Path) -> Result<Self, LockError> {
        Self::acquire(store_dir, DEFAULT_TIMEOUT)
    }

    /// The pid recorded by whoever holds the store lock. `None` when the
    /// store is free or the holder has not written its pid yet.
    pub fn holder(store_dir: &Path) -> Option<u32> {
        fs::read_to_string(store_dir.join(LOCK_FILE))
            .ok()?
            .trim()
            .parse()
            .ok()
    }
}

fn record_holder(file: &mut File) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", std::process::id())?;
    file.flush()
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        // Clear the pid before closing releases the flock
        if let Err(e) = self.file.set_len(0) {
            debug!(path = %self.path.display(), error = %e, "could not clear lock holder");
        }
    }
}

#[cfg(unix)]
fn try_lock(file: &File) -> bool {
    use std::os::unix::io::AsRawFd;
    unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) == 0 }
}

// No advisory locking here; the pid is still recorded
#[cfg(not(unix))]
fn try_lock(_file: &File) -> bool {
    true
}

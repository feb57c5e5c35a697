use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{Result, SpiritError};

const RETRY_EVERY: Duration = Duration::from_millis(100);

/// Exclusive advisory lock on a config directory's lock file.
///
/// The git working tree is not safe for concurrent mutation, so every
/// checkpoint or sync run holds one of these. Released on drop.
#[derive(Debug)]
pub struct DirLock {
    file: File,
}

impl DirLock {
    /// Take the lock at `path`, waiting at most `wait` for another holder.
    ///
    /// # Errors
    /// [`SpiritError::Busy`] if the lock is still held after `wait`.
    pub fn acquire(path: &Path, wait: Duration) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;

        let deadline = Instant::now() + wait;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(path = %path.display(), "acquired run lock");
                    return Ok(Self { file });
                }
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if Instant::now() >= deadline {
                        let dir = path.parent().unwrap_or(path).to_path_buf();
                        return Err(SpiritError::Busy(dir));
                    }
                    thread::sleep(RETRY_EVERY);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_holder_times_out_until_release() {
        let td = tempdir().unwrap();
        let path = td.path().join(".spirit.lock");

        let first = DirLock::acquire(&path, Duration::ZERO).unwrap();
        let err = DirLock::acquire(&path, Duration::from_millis(150)).unwrap_err();
        assert!(matches!(err, SpiritError::Busy(ref d) if d == td.path()));

        drop(first);
        DirLock::acquire(&path, Duration::ZERO).unwrap();
    }

    #[test]
    fn waits_for_holder_on_another_thread() {
        let td = tempdir().unwrap();
        let path = td.path().join(".spirit.lock");

        let held = DirLock::acquire(&path, Duration::ZERO).unwrap();
        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            drop(held);
        });

        DirLock::acquire(&path, Duration::from_secs(5)).unwrap();
        releaser.join().unwrap();
    }
}

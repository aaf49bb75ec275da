use std::fs::OpenOptions;
use std::path::Path;

use docstore_core::LockHolder;
use fs2::FileExt;
use tracing::debug;

/// Who holds a document, as established by one probe.
///
/// Foreign holds are detected by an exclusive-open attempt on the current
/// file. This is best effort: exclusive-open semantics depend on the
/// platform and the answer can be stale by the time the caller acts on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldProbe {
    /// Nobody holds the document.
    Free,
    /// The lock sidecar names a holder.
    Held(String),
    /// Some process has the current file open exclusively without a sidecar.
    ForeignProcess,
}

impl From<HoldProbe> for LockHolder {
    fn from(probe: HoldProbe) -> Self {
        match probe {
            HoldProbe::Free => LockHolder::Unlocked,
            HoldProbe::Held(identity) => LockHolder::Identity(identity),
            HoldProbe::ForeignProcess => LockHolder::ForeignProcess,
        }
    }
}

/// Try to open `path` for exclusive write access and release it at once.
///
/// Returns `true` when the file is free (or absent). Any failure to open or
/// lock counts as a foreign hold. Makes blocking calls; async callers run it
/// on the blocking pool.
pub fn probe_exclusive(path: &Path) -> bool {
    let file = match OpenOptions::new().write(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return true,
        Err(e) => {
            debug!("Exclusive open of {} failed: {}", path.display(), e);
            return false;
        }
    };

    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => {
            let _ = FileExt::unlock(&file);
            true
        }
        Err(e) => {
            debug!("{} is locked by another handle: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_absent_file_is_free() {
        let temp = TempDir::new().unwrap();
        assert!(probe_exclusive(&temp.path().join("missing.txt")));
    }

    #[test]
    fn test_unlocked_file_is_free() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.txt");
        std::fs::write(&path, b"content").unwrap();
        assert!(probe_exclusive(&path));
        // The probe must not leave its own lock behind.
        assert!(probe_exclusive(&path));
    }

    #[test]
    fn test_exclusively_held_file_is_foreign() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.txt");
        std::fs::write(&path, b"content").unwrap();

        let holder = OpenOptions::new().write(true).open(&path).unwrap();
        FileExt::lock_exclusive(&holder).unwrap();
        assert!(!probe_exclusive(&path));

        FileExt::unlock(&holder).unwrap();
        assert!(probe_exclusive(&path));
    }

    #[test]
    fn test_probe_into_holder() {
        assert_eq!(LockHolder::from(HoldProbe::Free), LockHolder::Unlocked);
        assert_eq!(
            LockHolder::from(HoldProbe::Held("alice".into())),
            LockHolder::Identity("alice".into())
        );
        assert_eq!(
            LockHolder::from(HoldProbe::ForeignProcess),
            LockHolder::ForeignProcess
        );
    }
}

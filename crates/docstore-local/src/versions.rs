use std::path::PathBuf;

use docstore_core::{StoreError, VersionDescriptor};
use futures::TryStreamExt;
use tokio::fs;
use tokio_stream::wrappers::ReadDirStream;
use tracing::{debug, instrument, warn};

use crate::fsutil::{copy_atomic, discard_temp, exists, remove_if_exists, temp_sibling, timestamp};
use crate::paths::PathResolver;

/// Slots taken by a concurrent committer are skipped at most this many times.
const MAX_COMMIT_ATTEMPTS: usize = 8;

/// Immutable, numbered snapshots of a document stored as
/// `{name} v{N}{ext}` siblings of the current file.
#[derive(Debug, Clone)]
pub struct VersionStore {
    paths: PathResolver,
}

impl VersionStore {
    pub fn new(paths: PathResolver) -> Self {
        Self { paths }
    }

    /// First version number, starting at 1, with no version file.
    pub async fn next_version_number(&self, document_ref: &str) -> Result<u32, StoreError> {
        let mut number = 1u32;
        while exists(&self.paths.version_path(document_ref, number)).await? {
            number = number.checked_add(1).ok_or_else(|| {
                StoreError::Internal(format!("Version numbers exhausted for {}", document_ref))
            })?;
        }
        Ok(number)
    }

    /// Snapshot the current file as the next version.
    ///
    /// The content is copied to a temp file first and then linked into the
    /// version slot, which fails if the slot is taken. On any error the
    /// current file and the existing versions are unchanged.
    #[instrument(skip(self), level = "debug")]
    pub async fn commit(&self, document_ref: &str) -> Result<VersionDescriptor, StoreError> {
        let current = self.paths.document_path(document_ref, None);
        let temp_path = temp_sibling(&current);

        if let Err(e) = fs::copy(&current, &temp_path).await {
            discard_temp(&temp_path).await;
            return Err(StoreError::from_io(
                format!("Failed to snapshot {}", current.display()),
                e,
            ));
        }

        let result = self.link_next_slot(document_ref, &temp_path).await;
        discard_temp(&temp_path).await;
        let (number, path) = result?;

        let metadata = fs::metadata(&path).await.map_err(|e| {
            StoreError::Io(format!("Failed to get metadata of {}: {}", path.display(), e))
        })?;
        debug!("Committed version {} of {}", number, document_ref);
        Ok(VersionDescriptor {
            document_ref: document_ref.to_string(),
            number,
            checked_in_at: timestamp(metadata.modified()),
            size_bytes: metadata.len(),
        })
    }

    async fn link_next_slot(
        &self,
        document_ref: &str,
        temp_path: &std::path::Path,
    ) -> Result<(u32, PathBuf), StoreError> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let number = self.next_version_number(document_ref).await?;
            let path = self.paths.version_path(document_ref, number);
            match fs::hard_link(temp_path, &path).await {
                Ok(()) => return Ok((number, path)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!("Version slot {} of {} taken, retrying", number, document_ref);
                }
                Err(e) => {
                    return Err(StoreError::Io(format!(
                        "Failed to create version {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }
        Err(StoreError::Conflict(format!(
            "Could not allocate a version slot for {}",
            document_ref
        )))
    }

    /// Existing versions in directory enumeration order.
    ///
    /// The result is a snapshot taken at call time; callers needing numeric
    /// order sort it.
    #[instrument(skip(self), level = "debug")]
    pub async fn list(&self, document_ref: &str) -> Result<Vec<VersionDescriptor>, StoreError> {
        let pattern = self.paths.version_pattern(document_ref);
        let dir = match fs::read_dir(&pattern.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                return Err(StoreError::Io(format!(
                    "Failed to read dir {}: {}",
                    pattern.dir.display(),
                    e
                )));
            }
        };

        let mut entries = ReadDirStream::new(dir);
        let mut versions = Vec::new();
        while let Some(entry) = entries
            .try_next()
            .await
            .map_err(|e| StoreError::Io(format!("Failed to read dir entry: {}", e)))?
        {
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Some(number) = pattern.match_number(&file_name) else {
                continue;
            };
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                // Deleted between enumeration and stat.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(StoreError::Io(format!("Failed to get metadata: {}", e)));
                }
            };
            versions.push(VersionDescriptor {
                document_ref: document_ref.to_string(),
                number,
                checked_in_at: timestamp(metadata.modified()),
                size_bytes: metadata.len(),
            });
        }

        debug!(
            "Listed {} versions matching {}",
            versions.len(),
            pattern.glob().display()
        );
        Ok(versions)
    }

    /// Highest existing version number.
    pub async fn latest(&self, document_ref: &str) -> Result<Option<u32>, StoreError> {
        Ok(self
            .list(document_ref)
            .await?
            .into_iter()
            .map(|v| v.number)
            .max())
    }

    /// Overwrite the current file with the highest version.
    ///
    /// Returns the path of the version restored, or `None` if the document
    /// has no versions (the current file is then left alone).
    #[instrument(skip(self), level = "debug")]
    pub async fn revert(&self, document_ref: &str) -> Result<Option<PathBuf>, StoreError> {
        let Some(number) = self.latest(document_ref).await? else {
            return Ok(None);
        };
        let version = self.paths.version_path(document_ref, number);
        let current = self.paths.document_path(document_ref, None);
        copy_atomic(&version, &current).await?;
        debug!("Reverted {} to version {}", document_ref, number);
        Ok(Some(version))
    }

    /// Remove every version of a document. Returns how many were removed.
    #[instrument(skip(self), level = "debug")]
    pub async fn delete_all(&self, document_ref: &str) -> Result<usize, StoreError> {
        let mut removed = 0;
        for version in self.list(document_ref).await? {
            let path = self.paths.version_path(document_ref, version.number);
            match remove_if_exists(&path).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!("Failed to delete version {}: {}", path.display(), e),
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (VersionStore, PathResolver, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let paths = PathResolver::new(temp_dir.path());
        std::fs::create_dir_all(paths.documents_dir()).unwrap();
        (VersionStore::new(paths.clone()), paths, temp_dir)
    }

    fn write_current(paths: &PathResolver, doc: &str, data: &[u8]) {
        std::fs::write(paths.document_path(doc, None), data).unwrap();
    }

    #[tokio::test]
    async fn test_numbering_is_dense() {
        let (versions, paths, _temp) = setup();
        let doc = "a.txt";
        assert_eq!(versions.next_version_number(doc).await.unwrap(), 1);

        for i in 1..=5u32 {
            write_current(&paths, doc, format!("content {}", i).as_bytes());
            let committed = versions.commit(doc).await.unwrap();
            assert_eq!(committed.number, i);
        }

        let mut listed: Vec<u32> = versions
            .list(doc)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.number)
            .collect();
        listed.sort_unstable();
        assert_eq!(listed, vec![1, 2, 3, 4, 5]);
        assert_eq!(versions.latest(doc).await.unwrap(), Some(5));
        assert_eq!(
            std::fs::read(paths.version_path(doc, 3)).unwrap(),
            b"content 3"
        );
    }

    #[tokio::test]
    async fn test_list_sorts_numerically_after_ten() {
        let (versions, paths, _temp) = setup();
        let doc = "a.txt";
        for _ in 0..11 {
            write_current(&paths, doc, b"x");
            versions.commit(doc).await.unwrap();
        }

        let mut listed = versions.list(doc).await.unwrap();
        listed.sort();
        let numbers: Vec<u32> = listed.iter().map(|v| v.number).collect();
        assert_eq!(numbers, (1..=11).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_list_ignores_unrelated_files() {
        let (versions, paths, _temp) = setup();
        write_current(&paths, "a.txt", b"a");
        write_current(&paths, "b.txt", b"b");
        versions.commit("a.txt").await.unwrap();
        versions.commit("b.txt").await.unwrap();
        std::fs::write(paths.documents_dir().join("a vdraft.txt"), b"?").unwrap();
        std::fs::write(paths.lock_path("a.txt"), b"alice").unwrap();

        let listed = versions.list("a.txt").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].number, 1);
        assert_eq!(listed[0].document_ref, "a.txt");
        assert_eq!(listed[0].tag(), "1");
    }

    #[tokio::test]
    async fn test_list_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let versions = VersionStore::new(PathResolver::new(temp_dir.path()));
        assert!(versions.list("a.txt").await.unwrap().is_empty());
        assert_eq!(versions.latest("a.txt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_state_untouched() {
        let (versions, paths, _temp) = setup();
        let doc = "a.txt";

        // No current file: nothing to snapshot
        let err = versions.commit(doc).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(versions.list(doc).await.unwrap().is_empty());

        // No temp files left behind
        let leftovers = std::fs::read_dir(paths.documents_dir()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_revert_restores_latest() {
        let (versions, paths, _temp) = setup();
        let doc = "a.txt";

        assert!(versions.revert(doc).await.unwrap().is_none());

        write_current(&paths, doc, b"v1");
        versions.commit(doc).await.unwrap();
        write_current(&paths, doc, b"v2");
        versions.commit(doc).await.unwrap();
        write_current(&paths, doc, b"scratch");

        let restored = versions.revert(doc).await.unwrap();
        assert_eq!(restored, Some(paths.version_path(doc, 2)));
        assert_eq!(
            std::fs::read(paths.document_path(doc, None)).unwrap(),
            b"v2"
        );
        // Versions themselves are unchanged
        assert_eq!(std::fs::read(paths.version_path(doc, 2)).unwrap(), b"v2");
    }

    #[tokio::test]
    async fn test_delete_all() {
        let (versions, paths, _temp) = setup();
        let doc = "a.txt";
        write_current(&paths, doc, b"x");
        versions.commit(doc).await.unwrap();
        versions.commit(doc).await.unwrap();

        assert_eq!(versions.delete_all(doc).await.unwrap(), 2);
        assert!(versions.list(doc).await.unwrap().is_empty());
        assert!(paths.document_path(doc, None).exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_commits_get_distinct_slots() {
        use std::sync::Arc;
        use tokio::sync::Barrier;

        let (versions, paths, _temp) = setup();
        write_current(&paths, "a.txt", b"shared");
        let versions = Arc::new(versions);

        const NUM_TASKS: usize = 4;
        let barrier = Arc::new(Barrier::new(NUM_TASKS));
        let mut handles = vec![];
        for _ in 0..NUM_TASKS {
            let versions = Arc::clone(&versions);
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                versions.commit("a.txt").await.expect("commit failed").number
            }));
        }

        let mut numbers = vec![];
        for handle in handles {
            numbers.push(handle.await.expect("task panicked"));
        }
        numbers.sort_unstable();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }
}

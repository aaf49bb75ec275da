use std::path::{Path, PathBuf};

use docstore_core::{LockHolder, StoreError};
use fs2::FileExt;
use tokio::fs;
use tracing::{debug, instrument, warn};

use super::probe::{probe_exclusive, HoldProbe};
use crate::fsutil::{discard_temp, ensure_parent, remove_if_exists, temp_sibling};
use crate::paths::PathResolver;

/// Link attempts per acquire; a sidecar that vanishes or is found empty
/// costs one retry.
const MAX_ACQUIRE_ATTEMPTS: usize = 4;

/// What a read of the sidecar found.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SidecarState {
    Missing,
    Empty,
    Held(String),
}

/// Result of a lock acquisition attempt.
#[derive(Debug, Clone)]
pub struct LockAcquireResult {
    /// Whether the caller holds the lock now.
    pub acquired: bool,
    /// Whether this call created the sidecar (false when re-entering).
    pub created: bool,
    /// Holder that blocked the attempt.
    pub holder: LockHolder,
}

impl LockAcquireResult {
    /// The sidecar was created for the caller.
    pub fn acquired() -> Self {
        Self {
            acquired: true,
            created: true,
            holder: LockHolder::Unlocked,
        }
    }

    /// The caller already held the lock.
    pub fn reentered(actor: &str) -> Self {
        Self {
            acquired: true,
            created: false,
            holder: LockHolder::Identity(actor.to_string()),
        }
    }

    /// Lock held by another identity.
    pub fn not_acquired(holder: LockHolder) -> Self {
        Self {
            acquired: false,
            created: false,
            holder,
        }
    }
}

/// Single-writer lock represented by a `{current}.lock` sidecar whose
/// content is the holder identity.
///
/// The lock is advisory: it only excludes writers that go through this
/// store. Acquisition is one atomic create-if-absent (a hard link of a
/// fully written temp file), so two racing actors cannot both win.
#[derive(Debug, Clone)]
pub struct SidecarLock {
    paths: PathResolver,
}

impl SidecarLock {
    pub fn new(paths: PathResolver) -> Self {
        Self { paths }
    }

    /// Probe the document: exclusive-open check on the current file first,
    /// then the sidecar.
    #[instrument(skip(self), level = "debug")]
    pub async fn probe(&self, document_ref: &str) -> Result<HoldProbe, StoreError> {
        let current = self.paths.document_path(document_ref, None);
        let free = tokio::task::spawn_blocking(move || probe_exclusive(&current))
            .await
            .map_err(|e| StoreError::Internal(format!("Probe task failed: {}", e)))?;
        if !free {
            warn!("{} is held by a process outside the lock convention", document_ref);
            return Ok(HoldProbe::ForeignProcess);
        }

        Ok(match self.read_sidecar(document_ref).await? {
            Some(identity) => HoldProbe::Held(identity),
            None => HoldProbe::Free,
        })
    }

    /// Current holder of the document.
    pub async fn holder(&self, document_ref: &str) -> Result<LockHolder, StoreError> {
        self.probe(document_ref).await.map(LockHolder::from)
    }

    /// Write the holder identity; an empty identity deletes the sidecar.
    ///
    /// This overwrites unconditionally. Use [`Self::try_acquire`] to take a
    /// lock that may be contended.
    #[instrument(skip(self), level = "debug")]
    pub async fn set_holder(&self, document_ref: &str, identity: &str) -> Result<(), StoreError> {
        let path = self.paths.lock_path(document_ref);
        if identity.is_empty() {
            let existed = remove_if_exists(&path).await?;
            debug!("Cleared lock on {} (existed: {})", document_ref, existed);
            return Ok(());
        }

        ensure_parent(&path).await?;
        let temp_path = temp_sibling(&path);
        write_identity(&temp_path, identity).await?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            discard_temp(&temp_path).await;
            return Err(StoreError::Io(format!(
                "Failed to write lock {}: {}",
                path.display(),
                e
            )));
        }
        debug!("Set lock on {} to {}", document_ref, identity);
        Ok(())
    }

    /// Release the lock regardless of holder.
    pub async fn release(&self, document_ref: &str) -> Result<(), StoreError> {
        self.set_holder(document_ref, "").await
    }

    /// Create the sidecar for `actor` only if no sidecar exists.
    ///
    /// Succeeds without change if `actor` already holds the lock.
    #[instrument(skip(self), level = "debug")]
    pub async fn try_acquire(
        &self,
        document_ref: &str,
        actor: &str,
    ) -> Result<LockAcquireResult, StoreError> {
        if actor.is_empty() {
            return Err(StoreError::InvalidArgument(
                "Lock holder identity must not be empty".to_string(),
            ));
        }

        let path = self.paths.lock_path(document_ref);
        ensure_parent(&path).await?;

        for _ in 0..MAX_ACQUIRE_ATTEMPTS {
            let temp_path = temp_sibling(&path);
            write_identity(&temp_path, actor).await?;
            let linked = fs::hard_link(&temp_path, &path).await;
            discard_temp(&temp_path).await;

            match linked {
                Ok(()) => {
                    debug!("Acquired lock on {} for {}", document_ref, actor);
                    return Ok(LockAcquireResult::acquired());
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    let state = match read_state(&path).await? {
                        SidecarState::Empty => self.clear_empty(document_ref).await?,
                        state => state,
                    };
                    match state {
                        SidecarState::Held(holder) if holder == actor => {
                            debug!("Lock on {} already held by {}", document_ref, actor);
                            return Ok(LockAcquireResult::reentered(actor));
                        }
                        SidecarState::Held(holder) => {
                            debug!(
                                "Lock on {} held by {} (requested by {})",
                                document_ref, holder, actor
                            );
                            return Ok(LockAcquireResult::not_acquired(LockHolder::Identity(
                                holder,
                            )));
                        }
                        SidecarState::Missing | SidecarState::Empty => {
                            debug!("Lock sidecar for {} is gone, retrying", document_ref);
                        }
                    }
                }
                Err(e) => {
                    return Err(StoreError::Io(format!(
                        "Failed to create lock {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }

        Err(StoreError::Conflict(format!(
            "Lock sidecar for {} changed during acquisition",
            document_ref
        )))
    }

    /// Remove an empty sidecar, unless someone replaced it meanwhile.
    ///
    /// Clearing is serialized through an exclusive lock on a guard file. A
    /// sidecar that is present and empty cannot be linked over, so the
    /// re-read under the guard is still current when it is removed.
    async fn clear_empty(&self, document_ref: &str) -> Result<SidecarState, StoreError> {
        let guard_path = self.paths.lock_guard_path(document_ref);
        let guard = lock_guard(guard_path.clone()).await?;

        let path = self.paths.lock_path(document_ref);
        let state = match read_state(&path).await? {
            SidecarState::Empty => {
                warn!("Replacing empty lock sidecar for {}", document_ref);
                remove_if_exists(&path).await?;
                SidecarState::Missing
            }
            state => state,
        };

        discard_temp(&guard_path).await;
        drop(guard);
        Ok(state)
    }

    /// Sidecar content, or `None` if absent or empty.
    async fn read_sidecar(&self, document_ref: &str) -> Result<Option<String>, StoreError> {
        Ok(match read_state(&self.paths.lock_path(document_ref)).await? {
            SidecarState::Held(identity) => Some(identity),
            SidecarState::Missing | SidecarState::Empty => None,
        })
    }
}

async fn read_state(path: &Path) -> Result<SidecarState, StoreError> {
    match fs::read_to_string(path).await {
        Ok(content) => {
            let identity = content.trim();
            Ok(if identity.is_empty() {
                SidecarState::Empty
            } else {
                SidecarState::Held(identity.to_string())
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SidecarState::Missing),
        Err(e) => Err(StoreError::Io(format!(
            "Failed to read lock {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Block on an exclusive lock of `path`; released when the file is dropped.
async fn lock_guard(path: PathBuf) -> Result<std::fs::File, StoreError> {
    let display = path.display().to_string();
    tokio::task::spawn_blocking(move || {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        FileExt::lock_exclusive(&file)?;
        Ok::<_, std::io::Error>(file)
    })
    .await
    .map_err(|e| StoreError::Internal(format!("Lock guard task failed: {}", e)))?
    .map_err(|e| StoreError::Io(format!("Failed to lock {}: {}", display, e)))
}

async fn write_identity(path: &Path, identity: &str) -> Result<(), StoreError> {
    if let Err(e) = fs::write(path, identity.as_bytes()).await {
        discard_temp(path).await;
        return Err(StoreError::Io(format!(
            "Failed to write {}: {}",
            path.display(),
            e
        )));
    }
    Ok(())
}

use async_trait::async_trait;
use docstore_core::{
    Capabilities, CheckoutState, CommandContext, CommandResult, ContentStream, DocumentProperties,
    DocumentStore, LockHolder, OperationResult, StoreError, VersionDescriptor,
};
use tokio::fs;
use tokio::io::AsyncRead;
use tracing::{debug, info, instrument, warn};

use crate::capabilities;
use crate::commands;
use crate::config::RepositoryConfig;
use crate::fsutil::{
    copy_atomic, ensure_parent, exists, remove_if_exists, timestamp, write_stream_atomic,
};
use crate::lock::SidecarLock;
use crate::paths::{validate_ref, PathResolver};
use crate::versions::VersionStore;

/// Filesystem document repository.
///
/// Enforces one writer per document through the lock sidecar. With locking
/// disabled, checkout/checkin/undo are successful no-ops and saves always
/// overwrite.
#[derive(Debug, Clone)]
pub struct LocalDocumentStore {
    config: RepositoryConfig,
    paths: PathResolver,
    lock: SidecarLock,
    versions: VersionStore,
}

impl LocalDocumentStore {
    pub fn new(config: RepositoryConfig) -> Self {
        let paths = PathResolver::new(&config.root);
        Self {
            lock: SidecarLock::new(paths.clone()),
            versions: VersionStore::new(paths.clone()),
            paths,
            config,
        }
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn paths(&self) -> &PathResolver {
        &self.paths
    }

    /// Take the lock for `actor`, recording a baseline if this creates it.
    async fn acquire(&self, document_ref: &str, actor: &str) -> Result<LockHolder, StoreError> {
        let result = self.lock.try_acquire(document_ref, actor).await?;
        if !result.acquired {
            return Ok(result.holder);
        }
        if result.created {
            if let Err(e) = self.capture_baseline(document_ref).await {
                warn!(
                    "Releasing lock on {} after failed baseline capture: {}",
                    document_ref, e
                );
                self.lock.release(document_ref).await?;
                return Err(e);
            }
        }
        Ok(LockHolder::Identity(actor.to_string()))
    }

    /// Keep the pre-checkout state while no version exists to undo to: a
    /// copy of the content, or a marker if the document does not exist yet.
    async fn capture_baseline(&self, document_ref: &str) -> Result<(), StoreError> {
        self.discard_baseline(document_ref).await?;
        if self.versions.latest(document_ref).await?.is_some() {
            return Ok(());
        }

        let current = self.paths.document_path(document_ref, None);
        if exists(&current).await? {
            copy_atomic(&current, &self.paths.baseline_path(document_ref)).await?;
            debug!("Captured baseline of {}", document_ref);
        } else {
            let marker = self.paths.absent_marker_path(document_ref);
            ensure_parent(&marker).await?;
            fs::write(&marker, b"").await.map_err(|e| {
                StoreError::Io(format!("Failed to write {}: {}", marker.display(), e))
            })?;
            debug!("Marked {} as absent before checkout", document_ref);
        }
        Ok(())
    }

    /// Put back the pre-checkout state of a document without versions.
    ///
    /// Without a baseline or an absent marker the content is left alone.
    async fn restore_baseline(&self, document_ref: &str) -> Result<(), StoreError> {
        let baseline = self.paths.baseline_path(document_ref);
        let marker = self.paths.absent_marker_path(document_ref);
        let current = self.paths.document_path(document_ref, None);
        if exists(&baseline).await? {
            fs::rename(&baseline, &current).await.map_err(|e| {
                StoreError::Io(format!("Failed to restore {}: {}", current.display(), e))
            })?;
            remove_if_exists(&marker).await?;
            debug!("Restored {} from baseline", document_ref);
        } else if exists(&marker).await? {
            remove_if_exists(&current).await?;
            remove_if_exists(&marker).await?;
            debug!("Removed {} created under checkout", document_ref);
        } else {
            warn!(
                "No baseline recorded for {}; keeping current content",
                document_ref
            );
        }
        Ok(())
    }

    async fn discard_baseline(&self, document_ref: &str) -> Result<(), StoreError> {
        remove_if_exists(&self.paths.baseline_path(document_ref)).await?;
        remove_if_exists(&self.paths.absent_marker_path(document_ref)).await?;
        Ok(())
    }

    /// Refusal for an operation that requires `actor` to hold the lock.
    fn require_owner(holder: &LockHolder, actor: &str) -> Option<OperationResult> {
        match holder {
            LockHolder::Unlocked => Some(OperationResult::refused("Not checked out")),
            h if h.is_held_by(actor) => None,
            h => Some(OperationResult::refused(format!("Checked out to {}", h))),
        }
    }

    fn content_path(&self, document_ref: &str, version: Option<u32>) -> std::path::PathBuf {
        match version {
            Some(number) => self.paths.version_path(document_ref, number),
            None => self.paths.document_path(document_ref, None),
        }
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    fn capabilities(&self) -> Capabilities {
        capabilities::report(&self.config)
    }

    // =========================================================================
    // Content
    // =========================================================================

    #[instrument(skip(self), level = "debug")]
    async fn exists(&self, document_ref: &str) -> Result<bool, StoreError> {
        validate_ref(document_ref)?;
        exists(&self.paths.document_path(document_ref, None)).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn length(
        &self,
        document_ref: &str,
        version: Option<u32>,
    ) -> Result<Option<u64>, StoreError> {
        validate_ref(document_ref)?;
        let path = self.content_path(document_ref, version);
        match fs::metadata(&path).await {
            Ok(metadata) => Ok(Some(metadata.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(format!(
                "Failed to stat {}: {}",
                path.display(),
                e
            ))),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn open_read(
        &self,
        document_ref: &str,
        version: Option<u32>,
    ) -> Result<ContentStream, StoreError> {
        validate_ref(document_ref)?;
        let path = self.content_path(document_ref, version);
        let file = fs::File::open(&path)
            .await
            .map_err(|e| StoreError::from_io(format!("Failed to open {}", path.display()), e))?;
        Ok(Box::pin(file))
    }

    #[instrument(skip(self, content), level = "debug")]
    async fn save(
        &self,
        document_ref: &str,
        actor: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<OperationResult, StoreError> {
        validate_ref(document_ref)?;

        if self.config.locking() {
            let mut holder = self.lock.holder(document_ref).await?;
            if holder.is_unlocked() {
                holder = self.acquire(document_ref, actor).await?;
            }
            if !holder.is_held_by(actor) {
                debug!("Save of {} by {} refused: locked by {}", document_ref, actor, holder);
                return Ok(OperationResult::refused(format!("Locked by {}", holder)));
            }
        }

        let path = self.paths.document_path(document_ref, None);
        let written = write_stream_atomic(&path, content).await?;
        debug!("Saved {} ({} bytes) for {}", document_ref, written, actor);
        Ok(OperationResult::ok())
    }

    #[instrument(skip(self), level = "debug")]
    async fn properties(
        &self,
        document_ref: &str,
    ) -> Result<Option<DocumentProperties>, StoreError> {
        validate_ref(document_ref)?;
        let path = self.paths.document_path(document_ref, None);
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Io(format!(
                    "Failed to stat {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        let version_count = self.versions.list(document_ref).await?.len();

        Ok(Some(DocumentProperties {
            document_ref: document_ref.to_string(),
            size_bytes: metadata.len(),
            created_at: timestamp(metadata.created()),
            modified_at: timestamp(metadata.modified()),
            version_count,
        }))
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, document_ref: &str) -> Result<OperationResult, StoreError> {
        validate_ref(document_ref)?;

        if self.config.locking() {
            let holder = self.lock.holder(document_ref).await?;
            if !holder.is_unlocked() {
                return Ok(OperationResult::refused(format!("Checked out by {}", holder)));
            }
        }

        let existed = remove_if_exists(&self.paths.document_path(document_ref, None)).await?;
        let versions = self.versions.delete_all(document_ref).await?;
        self.discard_baseline(document_ref).await?;
        self.lock.release(document_ref).await?;

        info!(
            "Deleted {} (existed: {}, versions: {})",
            document_ref, existed, versions
        );
        Ok(OperationResult::ok())
    }

    async fn rename(
        &self,
        document_ref: &str,
        new_document_ref: &str,
    ) -> Result<OperationResult, StoreError> {
        Err(StoreError::Unimplemented(format!(
            "Renaming {} to {} is not supported",
            document_ref, new_document_ref
        )))
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    #[instrument(skip(self), level = "debug")]
    async fn checkout(
        &self,
        document_ref: &str,
        actor: &str,
    ) -> Result<OperationResult, StoreError> {
        validate_ref(document_ref)?;
        if !self.config.locking() {
            return Ok(OperationResult::ok());
        }

        let mut holder = self.lock.holder(document_ref).await?;
        if holder.is_unlocked() {
            holder = self.acquire(document_ref, actor).await?;
        }
        if !holder.is_held_by(actor) {
            return Ok(OperationResult::refused(format!("Checked out by {}", holder)));
        }

        info!("Checked out {} to {}", document_ref, actor);
        Ok(OperationResult::ok())
    }

    #[instrument(skip(self), level = "debug")]
    async fn checkin(
        &self,
        document_ref: &str,
        actor: &str,
        description: &str,
    ) -> Result<OperationResult, StoreError> {
        validate_ref(document_ref)?;
        if !self.config.locking() {
            return Ok(OperationResult::ok());
        }

        let holder = self.lock.holder(document_ref).await?;
        if let Some(refusal) = Self::require_owner(&holder, actor) {
            return Ok(refusal);
        }

        if self.config.versioning() {
            if exists(&self.paths.document_path(document_ref, None)).await? {
                let version = self.versions.commit(document_ref).await?;
                info!(
                    "Checked in {} as version {} by {}",
                    document_ref, version.number, actor
                );
            } else {
                debug!("Nothing to check in for {}: no content saved", document_ref);
            }
        }

        self.discard_baseline(document_ref).await?;
        self.lock.release(document_ref).await?;
        Ok(OperationResult::ok())
    }

    #[instrument(skip(self), level = "debug")]
    async fn undo_checkout(
        &self,
        document_ref: &str,
        actor: &str,
    ) -> Result<OperationResult, StoreError> {
        validate_ref(document_ref)?;
        if !self.config.locking() {
            return Ok(OperationResult::ok());
        }

        let holder = self.lock.holder(document_ref).await?;
        if let Some(refusal) = Self::require_owner(&holder, actor) {
            return Ok(refusal);
        }

        match self.versions.revert(document_ref).await? {
            Some(version) => {
                self.discard_baseline(document_ref).await?;
                debug!("Undid checkout of {} from {}", document_ref, version.display());
            }
            None => self.restore_baseline(document_ref).await?,
        }

        self.lock.release(document_ref).await?;
        info!("Undid checkout of {} by {}", document_ref, actor);
        Ok(OperationResult::ok())
    }

    #[instrument(skip(self), level = "debug")]
    async fn checkout_state(
        &self,
        document_ref: &str,
        actor: &str,
    ) -> Result<CheckoutState, StoreError> {
        validate_ref(document_ref)?;
        if !self.config.locking() {
            return Ok(CheckoutState::LockingUnsupported);
        }

        Ok(match self.lock.holder(document_ref).await? {
            LockHolder::Unlocked => CheckoutState::Unlocked,
            h if h.is_held_by(actor) => CheckoutState::CheckedOutToActor,
            h => CheckoutState::CheckedOutToOther(h.to_string()),
        })
    }

    // =========================================================================
    // Versions
    // =========================================================================

    #[instrument(skip(self), level = "debug")]
    async fn versions(&self, document_ref: &str) -> Result<Vec<VersionDescriptor>, StoreError> {
        validate_ref(document_ref)?;
        if !self.config.versioning() {
            return Err(StoreError::Unsupported(
                "Versioning is disabled for this repository".to_string(),
            ));
        }
        self.versions.list(document_ref).await
    }

    // =========================================================================
    // Commands
    // =========================================================================

    #[instrument(skip(self), level = "debug")]
    async fn execute_command(
        &self,
        name: &str,
        context: &CommandContext,
    ) -> Result<CommandResult, StoreError> {
        commands::execute(&self.config, &self.paths, name, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstore_core::FOREIGN_HOLDER;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn setup_with(
        configure: impl FnOnce(RepositoryConfig) -> RepositoryConfig,
    ) -> (LocalDocumentStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = configure(RepositoryConfig::new(temp_dir.path()));
        (LocalDocumentStore::new(config), temp_dir)
    }

    fn setup() -> (LocalDocumentStore, TempDir) {
        setup_with(|config| config)
    }

    async fn save(
        store: &LocalDocumentStore,
        doc: &str,
        actor: &str,
        data: &[u8],
    ) -> OperationResult {
        let mut content = data;
        store.save(doc, actor, &mut content).await.unwrap()
    }

    async fn read(store: &LocalDocumentStore, doc: &str, version: Option<u32>) -> Vec<u8> {
        let mut stream = store.open_read(doc, version).await.unwrap();
        let mut data = Vec::new();
        stream.read_to_end(&mut data).await.unwrap();
        data
    }

    #[tokio::test]
    async fn test_checkout_checkin_scenario() {
        let (store, _temp) = setup();
        let doc = "a.txt";

        assert!(store.checkout(doc, "userX").await.unwrap().succeeded);
        assert_eq!(
            store.checkout_state(doc, "userX").await.unwrap(),
            CheckoutState::CheckedOutToActor
        );

        assert!(save(&store, doc, "userX", b"v1").await.succeeded);
        assert_eq!(read(&store, doc, None).await, b"v1");

        assert!(store.checkin(doc, "userX", "first").await.unwrap().succeeded);
        assert_eq!(
            std::fs::read(store.paths().documents_dir().join("a v1.txt")).unwrap(),
            b"v1"
        );
        assert_eq!(
            store.checkout_state(doc, "userX").await.unwrap(),
            CheckoutState::Unlocked
        );

        assert!(store.checkout(doc, "userY").await.unwrap().succeeded);
        assert!(save(&store, doc, "userY", b"v2").await.succeeded);
        assert!(store.checkin(doc, "userY", "").await.unwrap().succeeded);
        assert_eq!(read(&store, doc, Some(2)).await, b"v2");

        let mut versions = store.versions(doc).await.unwrap();
        versions.sort();
        let tags: Vec<String> = versions.iter().map(|v| v.tag()).collect();
        assert_eq!(tags, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_checkout_conflict() {
        let (store, _temp) = setup();
        let doc = "a.txt";

        assert!(store.checkout(doc, "alice").await.unwrap().succeeded);
        // Re-entrant for the holder
        assert!(store.checkout(doc, "alice").await.unwrap().succeeded);

        let result = store.checkout(doc, "bob").await.unwrap();
        assert!(!result.succeeded);
        assert_eq!(result.message.as_deref(), Some("Checked out by alice"));
        assert_eq!(
            store.checkout_state(doc, "bob").await.unwrap(),
            CheckoutState::CheckedOutToOther("alice".into())
        );
    }

    #[tokio::test]
    async fn test_save_by_non_holder_leaves_content() {
        let (store, _temp) = setup();
        let doc = "a.txt";

        // Implicit checkout on first save
        assert!(save(&store, doc, "alice", b"original").await.succeeded);
        assert_eq!(
            store.checkout_state(doc, "alice").await.unwrap(),
            CheckoutState::CheckedOutToActor
        );

        let result = save(&store, doc, "bob", b"overwrite").await;
        assert!(!result.succeeded);
        assert_eq!(result.message.as_deref(), Some("Locked by alice"));
        assert_eq!(read(&store, doc, None).await, b"original");
    }

    #[tokio::test]
    async fn test_checkin_failures() {
        let (store, _temp) = setup();
        let doc = "a.txt";

        let result = store.checkin(doc, "alice", "").await.unwrap();
        assert_eq!(result.message.as_deref(), Some("Not checked out"));
        let result = store.undo_checkout(doc, "alice").await.unwrap();
        assert_eq!(result.message.as_deref(), Some("Not checked out"));

        store.checkout(doc, "alice").await.unwrap();
        let result = store.checkin(doc, "bob", "").await.unwrap();
        assert_eq!(result.message.as_deref(), Some("Checked out to alice"));
        let result = store.undo_checkout(doc, "bob").await.unwrap();
        assert_eq!(result.message.as_deref(), Some("Checked out to alice"));

        // The lock survives refused calls
        assert_eq!(
            store.checkout_state(doc, "alice").await.unwrap(),
            CheckoutState::CheckedOutToActor
        );
    }

    #[tokio::test]
    async fn test_checkin_increments_version() {
        let (store, _temp) = setup();
        let doc = "report.docx";

        for i in 1..=3u32 {
            store.checkout(doc, "alice").await.unwrap();
            save(&store, doc, "alice", format!("rev {}", i).as_bytes()).await;
            assert!(store.checkin(doc, "alice", "").await.unwrap().succeeded);

            let versions = store.versions(doc).await.unwrap();
            assert_eq!(versions.len() as u32, i);
            assert_eq!(versions.iter().map(|v| v.number).max(), Some(i));
        }
        assert!(!store.paths().lock_path(doc).exists());
    }

    #[tokio::test]
    async fn test_undo_checkout_restores_last_version() {
        let (store, _temp) = setup();
        let doc = "a.txt";

        save(&store, doc, "alice", b"checked in").await;
        store.checkin(doc, "alice", "").await.unwrap();

        store.checkout(doc, "alice").await.unwrap();
        save(&store, doc, "alice", b"draft 1").await;
        save(&store, doc, "alice", b"draft 2").await;
        assert!(store.undo_checkout(doc, "alice").await.unwrap().succeeded);

        assert_eq!(read(&store, doc, None).await, b"checked in");
        assert_eq!(store.versions(doc).await.unwrap().len(), 1);
        assert_eq!(
            store.checkout_state(doc, "alice").await.unwrap(),
            CheckoutState::Unlocked
        );
    }

    #[tokio::test]
    async fn test_undo_checkout_without_versions() {
        let (store, _temp) = setup_with(|config| config.with_locking(false));
        let doc = "a.txt";
        // Content that predates locking, so it has no versions
        save(&store, doc, "alice", b"pre-existing").await;

        let mut config = store.config().clone();
        config.force_locking = true;
        let store = LocalDocumentStore::new(config);

        store.checkout(doc, "alice").await.unwrap();
        save(&store, doc, "alice", b"draft").await;
        assert!(store.undo_checkout(doc, "alice").await.unwrap().succeeded);
        assert_eq!(read(&store, doc, None).await, b"pre-existing");
        assert!(!store.paths().baseline_path(doc).exists());

        // A document created under the checkout disappears again
        save(&store, "new.txt", "alice", b"draft").await;
        assert!(store.undo_checkout("new.txt", "alice").await.unwrap().succeeded);
        assert!(!store.exists("new.txt").await.unwrap());
        assert!(!store.paths().absent_marker_path("new.txt").exists());
    }

    #[tokio::test]
    async fn test_undo_keeps_content_without_recorded_baseline() {
        let (store, _temp) = setup();
        let doc = "a.txt";
        let current = store.paths().document_path(doc, None);
        std::fs::create_dir_all(store.paths().documents_dir()).unwrap();
        std::fs::write(&current, b"precious").unwrap();
        // Sidecar written directly, so no checkout ever captured a baseline
        store.lock.set_holder(doc, "alice").await.unwrap();

        assert!(store.undo_checkout(doc, "alice").await.unwrap().succeeded);
        assert_eq!(read(&store, doc, None).await, b"precious");
        assert_eq!(
            store.checkout_state(doc, "alice").await.unwrap(),
            CheckoutState::Unlocked
        );
    }

    #[tokio::test]
    async fn test_failed_baseline_capture_releases_lock() {
        let (store, _temp) = setup_with(|config| config.with_locking(false));
        let doc = "a.txt";
        save(&store, doc, "alice", b"original").await;

        let mut config = store.config().clone();
        config.force_locking = true;
        let store = LocalDocumentStore::new(config);

        // A directory in the baseline's place makes the capture fail
        let baseline = store.paths().baseline_path(doc);
        std::fs::create_dir_all(baseline.join("blocker")).unwrap();

        assert!(store.checkout(doc, "alice").await.is_err());
        assert!(!store.paths().lock_path(doc).exists());
        assert_eq!(
            store.checkout_state(doc, "bob").await.unwrap(),
            CheckoutState::Unlocked
        );

        let mut content: &[u8] = b"draft";
        assert!(store.save(doc, "alice", &mut content).await.is_err());
        assert!(!store.paths().lock_path(doc).exists());
        assert_eq!(read(&store, doc, None).await, b"original");
    }

    #[tokio::test]
    async fn test_versions_hide_in_progress_edit() {
        let (store, _temp) = setup();
        let doc = "a.txt";

        save(&store, doc, "alice", b"v1").await;
        store.checkin(doc, "alice", "").await.unwrap();
        save(&store, doc, "alice", b"editing").await;

        let versions = store.versions(doc).await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(read(&store, doc, Some(1)).await, b"v1");
    }

    #[tokio::test]
    async fn test_delete_refused_while_locked() {
        let (store, _temp) = setup();
        let doc = "a.txt";

        save(&store, doc, "alice", b"v1").await;
        let result = store.delete(doc).await.unwrap();
        assert!(!result.succeeded);
        assert!(store.exists(doc).await.unwrap());

        store.checkin(doc, "alice", "").await.unwrap();
        save(&store, doc, "alice", b"v2").await;
        store.checkin(doc, "alice", "").await.unwrap();

        assert!(store.delete(doc).await.unwrap().succeeded);
        assert!(!store.exists(doc).await.unwrap());
        assert!(store.versions(doc).await.unwrap().is_empty());
        let leftovers = std::fs::read_dir(store.paths().documents_dir()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_locking_disabled() {
        let (store, _temp) = setup_with(|config| config.with_locking(false));
        let doc = "a.txt";

        assert!(save(&store, doc, "alice", b"x").await.succeeded);
        assert!(save(&store, doc, "bob", b"y").await.succeeded);
        assert_eq!(read(&store, doc, None).await, b"y");
        assert!(!store.paths().lock_path(doc).exists());

        assert!(store.checkout(doc, "alice").await.unwrap().succeeded);
        assert!(store.checkin(doc, "bob", "").await.unwrap().succeeded);
        assert!(store.undo_checkout(doc, "carol").await.unwrap().succeeded);
        assert!(!store.paths().lock_path(doc).exists());
        assert_eq!(
            store.checkout_state(doc, "alice").await.unwrap(),
            CheckoutState::LockingUnsupported
        );
        assert!(store.delete(doc).await.unwrap().succeeded);
    }

    #[tokio::test]
    async fn test_versioning_disabled() {
        let (store, _temp) = setup_with(|config| config.with_versioning(false));
        let doc = "a.txt";

        save(&store, doc, "alice", b"x").await;
        assert!(store.checkin(doc, "alice", "").await.unwrap().succeeded);
        assert!(!store.paths().version_path(doc, 1).exists());
        assert!(matches!(
            store.versions(doc).await.unwrap_err(),
            StoreError::Unsupported(_)
        ));

        let mut config = store.config().clone();
        config.force_versioning = true;
        let store = LocalDocumentStore::new(config);
        assert!(store.versions(doc).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_hold_blocks_writers() {
        use fs2::FileExt;

        let (store, _temp) = setup_with(|config| config.with_locking(false));
        let doc = "a.txt";
        save(&store, doc, "alice", b"x").await;

        let mut config = store.config().clone();
        config.force_locking = true;
        let store = LocalDocumentStore::new(config);

        let current = store.paths().document_path(doc, None);
        let foreign = std::fs::OpenOptions::new().write(true).open(&current).unwrap();
        FileExt::lock_exclusive(&foreign).unwrap();

        let result = store.checkout(doc, "alice").await.unwrap();
        assert!(!result.succeeded);
        assert_eq!(
            result.message,
            Some(format!("Checked out by {}", FOREIGN_HOLDER))
        );
        assert_eq!(
            store.checkout_state(doc, "alice").await.unwrap(),
            CheckoutState::CheckedOutToOther(FOREIGN_HOLDER.to_string())
        );
        assert!(!save(&store, doc, "alice", b"y").await.succeeded);
        assert!(!store.paths().lock_path(doc).exists());

        FileExt::unlock(&foreign).unwrap();
        assert!(store.checkout(doc, "alice").await.unwrap().succeeded);
    }

    #[tokio::test]
    async fn test_queries_without_content() {
        let (store, _temp) = setup();
        let doc = "missing.txt";

        assert!(!store.exists(doc).await.unwrap());
        assert_eq!(store.length(doc, None).await.unwrap(), None);
        assert_eq!(store.length(doc, Some(1)).await.unwrap(), None);
        assert!(store.properties(doc).await.unwrap().is_none());
        assert!(store.open_read(doc, None).await.err().unwrap().is_not_found());
        assert!(store.open_read(doc, Some(3)).await.err().unwrap().is_not_found());
    }

    #[tokio::test]
    async fn test_length_and_properties() {
        let (store, _temp) = setup();
        let doc = "reports/q1.docx";

        save(&store, doc, "alice", b"12345").await;
        store.checkin(doc, "alice", "").await.unwrap();
        save(&store, doc, "alice", b"1234567").await;

        assert_eq!(store.length(doc, None).await.unwrap(), Some(7));
        assert_eq!(store.length(doc, Some(1)).await.unwrap(), Some(5));

        let properties = store.properties(doc).await.unwrap().unwrap();
        assert_eq!(properties.size_bytes, 7);
        assert_eq!(properties.version_count, 1);
        assert_eq!(properties.document_ref, doc);
    }

    #[tokio::test]
    async fn test_rename_unimplemented() {
        let (store, _temp) = setup();
        let err = store.rename("a.txt", "b.txt").await.unwrap_err();
        assert!(matches!(err, StoreError::Unimplemented(_)));
    }

    #[tokio::test]
    async fn test_invalid_reference() {
        let (store, _temp) = setup();
        let err = store.checkout("../escape.txt", "alice").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkout_single_owner() {
        use std::sync::Arc;
        use tokio::sync::Barrier;

        let (store, _temp) = setup();
        let store = Arc::new(store);
        let doc = "contended.txt";

        const NUM_TASKS: usize = 8;
        let barrier = Arc::new(Barrier::new(NUM_TASKS));
        let mut handles = vec![];

        for i in 0..NUM_TASKS {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            let actor = format!("user-{}", i);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                let result = store.checkout(doc, &actor).await.expect("checkout failed");
                (actor, result.succeeded)
            }));
        }

        let mut owners = vec![];
        for handle in handles {
            let (actor, succeeded) = handle.await.expect("task panicked");
            if succeeded {
                owners.push(actor);
            }
        }

        assert_eq!(owners.len(), 1, "exactly one checkout must win: {:?}", owners);
        assert_eq!(
            store.checkout_state(doc, &owners[0]).await.unwrap(),
            CheckoutState::CheckedOutToActor
        );
    }
}

use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::capabilities::{Capabilities, TemplateTypes};
use crate::command::{CommandContext, CommandResult};
use crate::document::{CheckoutState, DocumentProperties, OperationResult, VersionDescriptor};
use crate::error::StoreError;
use crate::template::TemplateVariant;

/// Readable document or template content handed to the host.
pub type ContentStream = Pin<Box<dyn AsyncRead + Send>>;

/// Document repository contract consumed by the host.
///
/// Documents are addressed by the host's opaque external reference. `actor`
/// is the identity attempting a lock-gated call; it is recorded verbatim as
/// the lock holder.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns the backend identifier (e.g., "local").
    fn backend_name(&self) -> &'static str;

    /// Optional behaviors this instance supports.
    fn capabilities(&self) -> Capabilities;

    // =========================================================================
    // Content
    // =========================================================================

    /// Check whether the document's current file exists.
    async fn exists(&self, document_ref: &str) -> Result<bool, StoreError>;

    /// Byte length of the current file, or of a version. `None` if absent.
    async fn length(
        &self,
        document_ref: &str,
        version: Option<u32>,
    ) -> Result<Option<u64>, StoreError>;

    /// Open the current content, or a specific version, for reading.
    async fn open_read(
        &self,
        document_ref: &str,
        version: Option<u32>,
    ) -> Result<ContentStream, StoreError>;

    /// Overwrite the current content, implicitly checking the document out
    /// to `actor` if it is unlocked.
    async fn save(
        &self,
        document_ref: &str,
        actor: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<OperationResult, StoreError>;

    /// Filesystem facts about the current file. `None` if absent.
    async fn properties(
        &self,
        document_ref: &str,
    ) -> Result<Option<DocumentProperties>, StoreError>;

    /// Remove the current file with all versions and sidecars.
    async fn delete(&self, document_ref: &str) -> Result<OperationResult, StoreError>;

    /// Renaming documents is not supported by any backend yet.
    async fn rename(
        &self,
        document_ref: &str,
        new_document_ref: &str,
    ) -> Result<OperationResult, StoreError>;

    // =========================================================================
    // Checkout
    // =========================================================================

    async fn checkout(&self, document_ref: &str, actor: &str)
        -> Result<OperationResult, StoreError>;

    /// Mint a new version from the current file and release the lock.
    /// `description` is accepted for the host contract and not persisted.
    async fn checkin(
        &self,
        document_ref: &str,
        actor: &str,
        description: &str,
    ) -> Result<OperationResult, StoreError>;

    /// Discard edits made under the lock and release it.
    async fn undo_checkout(
        &self,
        document_ref: &str,
        actor: &str,
    ) -> Result<OperationResult, StoreError>;

    async fn checkout_state(
        &self,
        document_ref: &str,
        actor: &str,
    ) -> Result<CheckoutState, StoreError>;

    // =========================================================================
    // Versions
    // =========================================================================

    /// Checked-in versions in filesystem enumeration order.
    async fn versions(&self, document_ref: &str) -> Result<Vec<VersionDescriptor>, StoreError>;

    // =========================================================================
    // Commands
    // =========================================================================

    async fn execute_command(
        &self,
        name: &str,
        context: &CommandContext,
    ) -> Result<CommandResult, StoreError>;
}

/// Template repository contract consumed by the host.
///
/// Templates have no locking and no history; `language` selects a variant,
/// and `None` or an empty code addresses the neutral file.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Template file types this instance accepts.
    fn template_types(&self) -> TemplateTypes;

    async fn template_exists(
        &self,
        template_ref: &str,
        language: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Create an empty template if none exists yet.
    async fn create_template(
        &self,
        template_ref: &str,
        language: Option<&str>,
    ) -> Result<OperationResult, StoreError>;

    /// Overwrite a template (last writer wins).
    async fn save_template(
        &self,
        template_ref: &str,
        language: Option<&str>,
        content: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<(), StoreError>;

    /// Open a template, falling back to the neutral file when the requested
    /// language variant is missing.
    async fn open_template(
        &self,
        template_ref: &str,
        language: Option<&str>,
    ) -> Result<ContentStream, StoreError>;

    /// Remove a template variant. Returns whether it existed.
    async fn delete_template(
        &self,
        template_ref: &str,
        language: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Language variants present next to the neutral template.
    async fn template_languages(
        &self,
        template_ref: &str,
    ) -> Result<Vec<TemplateVariant>, StoreError>;
}

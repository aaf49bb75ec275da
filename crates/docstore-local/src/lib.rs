//! Local filesystem backend for the document repository.
//!
//! Layout under the configured root:
//! ```text
//! {root}/
//!   Documents/
//!     {document_ref}                 current content
//!     {document_ref}.lock            lock holder identity
//!     {document_ref}.base            pre-checkout content while no version exists
//!     {name} v{N}{ext}               version N
//!   Templates/
//!     {template_ref}                 neutral template
//!     {name}{language}{ext}          language variant
//! ```

pub mod capabilities;
pub mod commands;
pub mod config;
pub mod documents;
mod fsutil;
pub mod lock;
pub mod paths;
pub mod templates;
pub mod versions;

pub use config::RepositoryConfig;
pub use documents::LocalDocumentStore;
pub use lock::{HoldProbe, LockAcquireResult, SidecarLock};
pub use paths::PathResolver;
pub use templates::LocalTemplateStore;
pub use versions::VersionStore;

//! Core traits and types for document repository backends.
//!
//! This crate defines the abstractions shared by every repository backend:
//! - `DocumentStore`: content, checkout/checkin and version history for documents
//! - `TemplateStore`: lock-free storage for templates and their language variants
//! - `Capabilities`: which optional behaviors a backend instance supports
//! - `CommandResult`: typed outcome of a named custom command

mod capabilities;
mod command;
mod document;
mod error;
mod store;
mod template;

pub use capabilities::{Capabilities, TemplateTypes};
pub use command::{CommandContext, CommandResult};
pub use document::{
    CheckoutState, DocumentProperties, LockHolder, OperationResult, VersionDescriptor,
    FOREIGN_HOLDER,
};
pub use error::StoreError;
pub use store::{ContentStream, DocumentStore, TemplateStore};
pub use template::TemplateVariant;

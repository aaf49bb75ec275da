use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Holder value reported when a process outside the lock convention has the
/// current file open for exclusive write access.
pub const FOREIGN_HOLDER: &str = "another process";

/// Result of a lock-gated operation (checkout, save, checkin, undo, delete).
///
/// A refused operation carries a human-readable message and has not changed
/// any state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Whether the operation took effect.
    pub succeeded: bool,
    /// Why the operation was refused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl OperationResult {
    /// Create a successful result.
    pub fn ok() -> Self {
        Self {
            succeeded: true,
            message: None,
        }
    }

    /// Create a refused result with a message for the user.
    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: Some(message.into()),
        }
    }
}

/// Who currently holds the single-writer lock on a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockHolder {
    /// No sidecar and no foreign hold.
    Unlocked,
    /// The identity recorded in the lock sidecar.
    Identity(String),
    /// The current file is held open exclusively by a process that bypassed
    /// the sidecar convention.
    ForeignProcess,
}

impl LockHolder {
    pub fn is_unlocked(&self) -> bool {
        matches!(self, LockHolder::Unlocked)
    }

    /// Whether `actor` is the recorded holder.
    pub fn is_held_by(&self, actor: &str) -> bool {
        matches!(self, LockHolder::Identity(holder) if holder == actor)
    }
}

impl fmt::Display for LockHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockHolder::Unlocked => Ok(()),
            LockHolder::Identity(holder) => write!(f, "{}", holder),
            LockHolder::ForeignProcess => write!(f, "{}", FOREIGN_HOLDER),
        }
    }
}

/// Checkout state of a document as seen by a particular actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "holder", rename_all = "snake_case")]
pub enum CheckoutState {
    Unlocked,
    CheckedOutToActor,
    CheckedOutToOther(String),
    LockingUnsupported,
}

/// An immutable, checked-in snapshot of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    /// External reference of the document the version belongs to.
    pub document_ref: String,
    /// Version number (1-based, dense).
    pub number: u32,
    /// Last-write time of the version file, reported as the check-in time.
    pub checked_in_at: chrono::DateTime<chrono::Utc>,
    pub size_bytes: u64,
}

impl VersionDescriptor {
    /// The version tag as the host sees it.
    pub fn tag(&self) -> String {
        self.number.to_string()
    }
}

impl PartialOrd for VersionDescriptor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionDescriptor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.document_ref
            .cmp(&other.document_ref)
            .then(self.number.cmp(&other.number))
            .then(self.checked_in_at.cmp(&other.checked_in_at))
            .then(self.size_bytes.cmp(&other.size_bytes))
    }
}

/// Filesystem facts about a document's current file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentProperties {
    pub document_ref: String,
    pub size_bytes: u64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub modified_at: chrono::DateTime<chrono::Utc>,
    pub version_count: usize,
}

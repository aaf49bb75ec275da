use serde::{Deserialize, Serialize};

/// The document a custom command is invoked on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandContext {
    /// External reference of the document.
    pub document_ref: String,
    /// Host-side numeric id, used only for display and deep links.
    #[serde(default)]
    pub document_id: Option<u64>,
}

/// Outcome of a named custom command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandResult {
    /// Plain message to show the user.
    Message { text: String },
    /// External URL for the host to open.
    Link { url: String },
    /// Reference to an object inside the host application.
    DeepLink { target: String, id: String },
}

//! Named custom commands the host can invoke on a document.

use std::str::FromStr;

use docstore_core::{CommandContext, CommandResult, StoreError};
use tracing::debug;

use crate::config::RepositoryConfig;
use crate::paths::{validate_ref, PathResolver};

/// Commands this backend understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Describe the backend.
    About,
    /// Link to the directory holding the document.
    OpenFolder,
    /// Deep link to the document inside the host.
    ShowDocument,
}

impl Command {
    pub const ALL: [Command; 3] = [Command::About, Command::OpenFolder, Command::ShowDocument];

    pub fn name(&self) -> &'static str {
        match self {
            Command::About => "about",
            Command::OpenFolder => "open-folder",
            Command::ShowDocument => "show-document",
        }
    }
}

impl FromStr for Command {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|command| command.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| StoreError::InvalidArgument(format!("Unknown command: {}", s)))
    }
}

/// Run a named command against a document.
pub fn execute(
    config: &RepositoryConfig,
    paths: &PathResolver,
    name: &str,
    context: &CommandContext,
) -> Result<CommandResult, StoreError> {
    if !config.commands_enabled {
        return Err(StoreError::Unsupported(
            "Custom commands are disabled for this repository".to_string(),
        ));
    }

    let command: Command = name.parse()?;
    debug!("Executing {} for {}", command.name(), context.document_ref);

    Ok(match command {
        Command::About => CommandResult::Message {
            text: format!(
                "{} {}: documents stored under {}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                paths.root().display()
            ),
        },
        Command::OpenFolder => {
            validate_ref(&context.document_ref)?;
            let current = paths.document_path(&context.document_ref, None);
            let folder = current.parent().unwrap_or(paths.root());
            CommandResult::Link {
                url: format!("file://{}", folder.display()),
            }
        }
        Command::ShowDocument => {
            let id = match context.document_id {
                Some(id) => id.to_string(),
                None => {
                    validate_ref(&context.document_ref)?;
                    context.document_ref.clone()
                }
            };
            CommandResult::DeepLink {
                target: "document".to_string(),
                id,
            }
        }
    })
}

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docstore_local::RepositoryConfig;

/// Configuration for the docstore-local command line.
#[derive(Parser, Debug, Clone)]
#[command(name = "docstore-local")]
#[command(about = "Filesystem document repository with checkout and version history")]
pub struct Config {
    /// Repository root holding Documents/ and Templates/
    #[arg(long, env = "DOCSTORE_ROOT")]
    pub root: Option<PathBuf>,

    /// JSON file with repository options; flags below override it
    #[arg(long, env = "DOCSTORE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Identity recorded as lock holder
    #[arg(long, env = "DOCSTORE_ACTOR", default_value = "local")]
    pub actor: String,

    /// Disable checkout locking
    #[arg(long, env = "DOCSTORE_NO_LOCKING")]
    pub no_locking: bool,

    /// Disable version history
    #[arg(long, env = "DOCSTORE_NO_VERSIONING")]
    pub no_versioning: bool,

    /// Disable template creation, saving and deletion
    #[arg(long, env = "DOCSTORE_NO_TEMPLATES")]
    pub no_templates: bool,

    /// Disable custom commands
    #[arg(long, env = "DOCSTORE_NO_COMMANDS")]
    pub no_commands: bool,

    #[command(subcommand)]
    pub operation: Operation,
}

impl Config {
    /// Build the repository config: file (if any), then root, then flags.
    pub fn repository_config(&self) -> anyhow::Result<RepositoryConfig> {
        let mut config = match &self.config {
            Some(path) => RepositoryConfig::from_json_file(path)?,
            None => RepositoryConfig::default(),
        };
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if self.no_locking {
            config.locking_enabled = false;
        }
        if self.no_versioning {
            config.versioning_enabled = false;
        }
        if self.no_templates {
            config.template_creation_enabled = false;
        }
        if self.no_commands {
            config.commands_enabled = false;
        }
        Ok(config)
    }
}

/// Host operation to run.
#[derive(Subcommand, Debug, Clone)]
pub enum Operation {
    /// Check whether a document exists
    Exists { document: String },
    /// Byte length of a document or one of its versions
    Length {
        document: String,
        #[arg(long)]
        version: Option<u32>,
    },
    /// Write document content to stdout
    Read {
        document: String,
        #[arg(long)]
        version: Option<u32>,
    },
    /// Save document content from a file or stdin
    Save {
        document: String,
        /// Input file (stdin if omitted)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Check a document out to the actor
    Checkout { document: String },
    /// Check a document in, creating a new version
    Checkin {
        document: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Discard edits and release the checkout
    UndoCheckout { document: String },
    /// Checkout state as seen by the actor
    State { document: String },
    /// List checked-in versions
    Versions { document: String },
    /// Delete a document with its versions
    Delete { document: String },
    /// Size and timestamps of a document
    Properties { document: String },
    /// Capability map of this repository
    Capabilities,
    /// Supported template types
    TemplateTypes,
    /// Save a template from a file or stdin
    TemplateSave {
        template: String,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Create an empty template if absent
    TemplateCreate {
        template: String,
        #[arg(long)]
        language: Option<String>,
    },
    /// Write template content to stdout, falling back to the neutral variant
    TemplateRead {
        template: String,
        #[arg(long)]
        language: Option<String>,
    },
    /// Delete a template variant
    TemplateDelete {
        template: String,
        #[arg(long)]
        language: Option<String>,
    },
    /// List language variants of a template
    TemplateLanguages { template: String },
    /// Run a named custom command
    Exec {
        name: String,
        document: String,
        #[arg(long)]
        document_id: Option<u64>,
    },
}

use std::path::{Path, PathBuf};

use docstore_core::{StoreError, TemplateTypes};
use serde::{Deserialize, Serialize};

/// Configuration for one repository instance.
///
/// Locking and versioning are read from independent keys. The `force_*`
/// flags turn a feature on regardless of its own key; test harnesses use
/// them to exercise the checkout engine against a config that disables it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Directory holding `Documents/` and `Templates/`.
    pub root: PathBuf,
    pub locking_enabled: bool,
    pub versioning_enabled: bool,
    pub template_creation_enabled: bool,
    pub commands_enabled: bool,
    pub force_locking: bool,
    pub force_versioning: bool,
    /// Accepted template types, keyed by extension.
    pub template_types: TemplateTypes,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            root: Self::default_root(),
            locking_enabled: true,
            versioning_enabled: true,
            template_creation_enabled: true,
            commands_enabled: true,
            force_locking: false,
            force_versioning: false,
            template_types: default_template_types(),
        }
    }
}

impl RepositoryConfig {
    /// Create a config with every feature enabled, rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Platform default root: `{data_local_dir}/docstore`.
    pub fn default_root() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docstore")
    }

    /// Load a JSON config file. Missing keys take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| StoreError::from_io(format!("Failed to read config {}", path.display()), e))?;
        serde_json::from_str(&json).map_err(|e| {
            StoreError::InvalidArgument(format!("Invalid config {}: {}", path.display(), e))
        })
    }

    pub fn with_locking(mut self, enabled: bool) -> Self {
        self.locking_enabled = enabled;
        self
    }

    pub fn with_versioning(mut self, enabled: bool) -> Self {
        self.versioning_enabled = enabled;
        self
    }

    pub fn with_template_creation(mut self, enabled: bool) -> Self {
        self.template_creation_enabled = enabled;
        self
    }

    pub fn with_commands(mut self, enabled: bool) -> Self {
        self.commands_enabled = enabled;
        self
    }

    /// Effective locking switch.
    pub fn locking(&self) -> bool {
        self.locking_enabled || self.force_locking
    }

    /// Effective versioning switch.
    pub fn versioning(&self) -> bool {
        self.versioning_enabled || self.force_versioning
    }
}

fn default_template_types() -> TemplateTypes {
    [
        (".docx", "Word Document"),
        (".dotx", "Word Template"),
        (".odt", "OpenDocument Text"),
        (".txt", "Plain Text"),
    ]
    .into_iter()
    .map(|(ext, description)| (ext.to_string(), description.to_string()))
    .collect()
}

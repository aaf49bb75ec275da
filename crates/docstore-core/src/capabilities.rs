use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Template file types a backend accepts, keyed by extension (".docx").
pub type TemplateTypes = BTreeMap<String, String>;

/// Optional behaviors supported by a backend instance.
///
/// The host reads this once and decides which other calls it will issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_lock: bool,
    pub can_version: bool,
    /// Existence checks are a single metadata lookup.
    pub fast_exists: bool,
    /// Lock status is a single sidecar read plus one open probe.
    pub fast_lock_status: bool,
    pub fast_version_list: bool,
    pub can_create_templates: bool,
    pub can_execute_commands: bool,
}

impl Capabilities {
    /// Flatten into the named map the host consumes.
    pub fn to_map(&self) -> BTreeMap<&'static str, bool> {
        BTreeMap::from([
            ("CanLock", self.can_lock),
            ("CanVersion", self.can_version),
            ("FastExists", self.fast_exists),
            ("FastLockStatus", self.fast_lock_status),
            ("FastVersionList", self.fast_version_list),
            ("CanCreateTemplates", self.can_create_templates),
            ("CanExecuteCommands", self.can_execute_commands),
        ])
    }
}

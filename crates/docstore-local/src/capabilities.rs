//! Static facts about what a repository instance supports.

use docstore_core::{Capabilities, TemplateTypes};

use crate::config::RepositoryConfig;

/// Derive the capability map from configuration.
///
/// `fast_exists` and `fast_lock_status` hold because each is a constant
/// number of filesystem calls; revisit them if the storage layout changes.
pub fn report(config: &RepositoryConfig) -> Capabilities {
    Capabilities {
        can_lock: config.locking(),
        can_version: config.versioning(),
        fast_exists: true,
        fast_lock_status: true,
        fast_version_list: config.versioning(),
        can_create_templates: config.template_creation_enabled,
        can_execute_commands: config.commands_enabled,
    }
}

/// Template types the host may offer for new templates.
pub fn supported_template_types(config: &RepositoryConfig) -> TemplateTypes {
    config.template_types.clone()
}

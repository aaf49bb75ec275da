use serde::{Deserialize, Serialize};

/// A language variant of a template found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateVariant {
    /// External reference of the neutral template.
    pub template_ref: String,
    /// Language code suffix (e.g. "fr"); never empty.
    pub language_code: String,
    /// File name of the variant, relative to the template's directory.
    pub file_name: String,
}

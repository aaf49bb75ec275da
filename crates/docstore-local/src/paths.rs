//! Mapping from document and template references to on-disk locations.
//!
//! Resolution is a pure function of the root and its inputs; nothing here
//! touches the filesystem.

use std::path::{Component, Path, PathBuf};

use docstore_core::StoreError;

pub const DOCUMENTS_DIR: &str = "Documents";
pub const TEMPLATES_DIR: &str = "Templates";

/// Version tag that matches every version slot of a document.
pub const VERSION_WILDCARD: &str = "*";

const LOCK_SUFFIX: &str = ".lock";
const BASELINE_SUFFIX: &str = ".base";
const ABSENT_SUFFIX: &str = ".absent";
const GUARD_SUFFIX: &str = ".guard";

/// Resolves references to paths under a repository root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Create a resolver for the given root directory.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.root.join(DOCUMENTS_DIR)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join(TEMPLATES_DIR)
    }

    /// Current file of a document, or the sibling for `version_tag`
    /// (`{name} v{tag}{ext}`). [`VERSION_WILDCARD`] yields a glob path.
    pub fn document_path(&self, document_ref: &str, version_tag: Option<&str>) -> PathBuf {
        let current = self.documents_dir().join(document_ref);
        match version_tag {
            None => current,
            Some(tag) => with_infix(&current, &format!(" v{}", tag)),
        }
    }

    /// Path of version `number` of a document.
    pub fn version_path(&self, document_ref: &str, number: u32) -> PathBuf {
        self.document_path(document_ref, Some(&number.to_string()))
    }

    /// Lock sidecar of a document.
    pub fn lock_path(&self, document_ref: &str) -> PathBuf {
        with_suffix(&self.document_path(document_ref, None), LOCK_SUFFIX)
    }

    /// Pre-checkout snapshot kept while a document has no versions.
    pub fn baseline_path(&self, document_ref: &str) -> PathBuf {
        with_suffix(&self.document_path(document_ref, None), BASELINE_SUFFIX)
    }

    /// Marker recording that a document did not exist when it was checked out.
    pub fn absent_marker_path(&self, document_ref: &str) -> PathBuf {
        with_suffix(&self.document_path(document_ref, None), ABSENT_SUFFIX)
    }

    /// File locked while an empty lock sidecar is being cleared.
    pub fn lock_guard_path(&self, document_ref: &str) -> PathBuf {
        with_suffix(&self.lock_path(document_ref), GUARD_SUFFIX)
    }

    /// Matcher for the version files of a document.
    pub fn version_pattern(&self, document_ref: &str) -> VersionPattern {
        let current = self.document_path(document_ref, None);
        let (stem, ext) = split_file_name(&current);
        VersionPattern {
            dir: parent_dir(&current),
            prefix: format!("{} v", stem),
            suffix: ext,
        }
    }

    /// Template file, with `language` inserted before the extension.
    /// `None` or an empty code resolves to the neutral file.
    pub fn template_path(&self, template_ref: &str, language: Option<&str>) -> PathBuf {
        let neutral = self.templates_dir().join(template_ref);
        match language.filter(|code| !code.is_empty()) {
            None => neutral,
            Some(code) => with_infix(&neutral, code),
        }
    }

    /// Matcher for the language variants of a template.
    pub fn language_pattern(&self, template_ref: &str) -> LanguagePattern {
        let neutral = self.template_path(template_ref, None);
        let (stem, ext) = split_file_name(&neutral);
        LanguagePattern {
            dir: parent_dir(&neutral),
            stem,
            ext,
        }
    }
}

/// Reject references that would escape the repository root.
pub fn validate_ref(reference: &str) -> Result<(), StoreError> {
    if reference.is_empty() {
        return Err(StoreError::InvalidArgument("Empty reference".to_string()));
    }
    let path = Path::new(reference);
    let escapes = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes || path.file_name().is_none() {
        return Err(StoreError::InvalidArgument(format!(
            "Reference must be a relative file path: {}",
            reference
        )));
    }
    Ok(())
}

/// Reject language codes that are not a plain file-name fragment.
pub fn validate_language(language: Option<&str>) -> Result<(), StoreError> {
    let Some(code) = language else {
        return Ok(());
    };
    if code.contains(['/', '\\', '\0']) || code.contains("..") {
        return Err(StoreError::InvalidArgument(format!(
            "Invalid language code: {:?}",
            code
        )));
    }
    Ok(())
}

/// File-name matcher for `{stem} v{N}{ext}` version files.
#[derive(Debug, Clone)]
pub struct VersionPattern {
    pub dir: PathBuf,
    prefix: String,
    suffix: String,
}

impl VersionPattern {
    /// Version number encoded in `file_name`, if it is a version file.
    pub fn match_number(&self, file_name: &str) -> Option<u32> {
        let tag = file_name
            .strip_prefix(&self.prefix)?
            .strip_suffix(&self.suffix)?;
        if tag.is_empty() || !tag.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        tag.parse::<u32>().ok().filter(|n| *n > 0)
    }

    /// The wildcard path this pattern stands for.
    pub fn glob(&self) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", self.prefix, VERSION_WILDCARD, self.suffix))
    }
}

/// File-name matcher for `{stem}{code}{ext}` template variants.
#[derive(Debug, Clone)]
pub struct LanguagePattern {
    pub dir: PathBuf,
    stem: String,
    ext: String,
}

impl LanguagePattern {
    /// Language code encoded in `file_name`; `None` for the neutral file
    /// and for unrelated files.
    pub fn match_language<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        let code = file_name.strip_prefix(&self.stem)?.strip_suffix(&self.ext)?;
        // Another extension folded into the code means a different file type.
        if code.is_empty() || (self.ext.is_empty() && code.contains('.')) {
            return None;
        }
        Some(code)
    }
}

/// Split a path's file name into stem and extension (with its dot).
/// A leading dot does not start an extension.
fn split_file_name(path: &Path) -> (String, String) {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    match name.rfind('.') {
        Some(idx) if idx > 0 => (name[..idx].to_string(), name[idx..].to_string()),
        _ => (name, String::new()),
    }
}

fn with_infix(path: &Path, infix: &str) -> PathBuf {
    let (stem, ext) = split_file_name(path);
    parent_dir(path).join(format!("{}{}{}", stem, infix, ext))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

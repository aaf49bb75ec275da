use std::path::PathBuf;

use async_trait::async_trait;
use docstore_core::{
    ContentStream, OperationResult, StoreError, TemplateStore, TemplateTypes, TemplateVariant,
};
use futures::TryStreamExt;
use tokio::fs;
use tokio::io::AsyncRead;
use tokio_stream::wrappers::ReadDirStream;
use tracing::{debug, instrument};

use crate::capabilities;
use crate::config::RepositoryConfig;
use crate::fsutil::{ensure_parent, exists, remove_if_exists, write_stream_atomic};
use crate::paths::{validate_language, validate_ref, PathResolver};

/// Filesystem template repository.
///
/// No locking and no history: every save replaces the file and the last
/// writer wins.
#[derive(Debug, Clone)]
pub struct LocalTemplateStore {
    config: RepositoryConfig,
    paths: PathResolver,
}

impl LocalTemplateStore {
    pub fn new(config: RepositoryConfig) -> Self {
        Self {
            paths: PathResolver::new(&config.root),
            config,
        }
    }

    /// Validated path of a template variant.
    fn resolve(&self, template_ref: &str, language: Option<&str>) -> Result<PathBuf, StoreError> {
        validate_ref(template_ref)?;
        validate_language(language)?;
        Ok(self.paths.template_path(template_ref, language))
    }

    fn ensure_writable(&self) -> Result<(), StoreError> {
        if self.config.template_creation_enabled {
            Ok(())
        } else {
            Err(StoreError::Unsupported(
                "Template creation is disabled for this repository".to_string(),
            ))
        }
    }
}

#[async_trait]
impl TemplateStore for LocalTemplateStore {
    fn template_types(&self) -> TemplateTypes {
        capabilities::supported_template_types(&self.config)
    }

    #[instrument(skip(self), level = "debug")]
    async fn template_exists(
        &self,
        template_ref: &str,
        language: Option<&str>,
    ) -> Result<bool, StoreError> {
        exists(&self.resolve(template_ref, language)?).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn create_template(
        &self,
        template_ref: &str,
        language: Option<&str>,
    ) -> Result<OperationResult, StoreError> {
        let path = self.resolve(template_ref, language)?;
        self.ensure_writable()?;

        ensure_parent(&path).await?;
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(_) => {
                debug!("Created template {}", path.display());
                Ok(OperationResult::ok())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(
                OperationResult::refused(format!("Template {} already exists", template_ref)),
            ),
            Err(e) => Err(StoreError::Io(format!(
                "Failed to create {}: {}",
                path.display(),
                e
            ))),
        }
    }

    #[instrument(skip(self, content), level = "debug")]
    async fn save_template(
        &self,
        template_ref: &str,
        language: Option<&str>,
        content: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<(), StoreError> {
        let path = self.resolve(template_ref, language)?;
        self.ensure_writable()?;

        let written = write_stream_atomic(&path, content).await?;
        debug!("Saved template {} ({} bytes)", path.display(), written);
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn open_template(
        &self,
        template_ref: &str,
        language: Option<&str>,
    ) -> Result<ContentStream, StoreError> {
        let path = self.resolve(template_ref, language)?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e)
                if e.kind() == std::io::ErrorKind::NotFound
                    && language.is_some_and(|code| !code.is_empty()) =>
            {
                let neutral = self.paths.template_path(template_ref, None);
                debug!(
                    "No {:?} variant of {}, falling back to {}",
                    language,
                    template_ref,
                    neutral.display()
                );
                fs::File::open(&neutral).await.map_err(|e| {
                    StoreError::from_io(format!("Failed to open {}", neutral.display()), e)
                })?
            }
            Err(e) => {
                return Err(StoreError::from_io(
                    format!("Failed to open {}", path.display()),
                    e,
                ));
            }
        };
        Ok(Box::pin(file))
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_template(
        &self,
        template_ref: &str,
        language: Option<&str>,
    ) -> Result<bool, StoreError> {
        let path = self.resolve(template_ref, language)?;
        self.ensure_writable()?;

        let existed = remove_if_exists(&path).await?;
        debug!("Deleted template {} (existed: {})", path.display(), existed);
        Ok(existed)
    }

    #[instrument(skip(self), level = "debug")]
    async fn template_languages(
        &self,
        template_ref: &str,
    ) -> Result<Vec<TemplateVariant>, StoreError> {
        validate_ref(template_ref)?;

        let pattern = self.paths.language_pattern(template_ref);
        let dir = match fs::read_dir(&pattern.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                return Err(StoreError::Io(format!(
                    "Failed to read dir {}: {}",
                    pattern.dir.display(),
                    e
                )));
            }
        };

        let mut entries = ReadDirStream::new(dir);
        let mut variants = Vec::new();
        while let Some(entry) = entries
            .try_next()
            .await
            .map_err(|e| StoreError::Io(format!("Failed to read dir entry: {}", e)))?
        {
            let file_name = entry.file_name().to_string_lossy().to_string();
            if let Some(code) = pattern.match_language(&file_name) {
                variants.push(TemplateVariant {
                    template_ref: template_ref.to_string(),
                    language_code: code.to_string(),
                    file_name: file_name.clone(),
                });
            }
        }

        debug!("Found {} language variants of {}", variants.len(), template_ref);
        Ok(variants)
    }
}

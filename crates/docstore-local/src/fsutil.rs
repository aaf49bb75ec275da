use std::path::{Path, PathBuf};
use std::time::SystemTime;

use docstore_core::StoreError;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::warn;

/// A uniquely named temp file in the same directory as `path`, so that a
/// rename or hard link onto `path` never crosses filesystems.
pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}

/// Ensure the directory containing `path` exists.
pub(crate) async fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).await.map_err(|e| {
            StoreError::Io(format!("Failed to create dir {}: {}", dir.display(), e))
        })?;
    }
    Ok(())
}

/// Remove a file. Returns whether it existed.
pub(crate) async fn remove_if_exists(path: &Path) -> Result<bool, StoreError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::Io(format!(
            "Failed to delete {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Best-effort removal of a temp file after a failed operation.
pub(crate) async fn discard_temp(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove temp file {}: {}", path.display(), e);
        }
    }
}

pub(crate) async fn exists(path: &Path) -> Result<bool, StoreError> {
    fs::try_exists(path)
        .await
        .map_err(|e| StoreError::Io(format!("Failed to stat {}: {}", path.display(), e)))
}

/// Stream `content` into `path` via a temp file, so readers never observe a
/// partial write. Returns the number of bytes written.
pub(crate) async fn write_stream_atomic(
    path: &Path,
    content: &mut (dyn AsyncRead + Send + Unpin),
) -> Result<u64, StoreError> {
    ensure_parent(path).await?;
    let temp_path = temp_sibling(path);

    let written = match stream_into(&temp_path, content).await {
        Ok(n) => n,
        Err(e) => {
            discard_temp(&temp_path).await;
            return Err(e);
        }
    };

    if let Err(e) = fs::rename(&temp_path, path).await {
        discard_temp(&temp_path).await;
        return Err(StoreError::Io(format!(
            "Failed to rename to {}: {}",
            path.display(),
            e
        )));
    }
    Ok(written)
}

async fn stream_into(
    path: &Path,
    content: &mut (dyn AsyncRead + Send + Unpin),
) -> Result<u64, StoreError> {
    let mut file = fs::File::create(path)
        .await
        .map_err(|e| StoreError::Io(format!("Failed to create {}: {}", path.display(), e)))?;
    let written = tokio::io::copy(content, &mut file)
        .await
        .map_err(|e| StoreError::Io(format!("Failed to write {}: {}", path.display(), e)))?;
    file.flush()
        .await
        .map_err(|e| StoreError::Io(format!("Failed to flush {}: {}", path.display(), e)))?;
    file.sync_all()
        .await
        .map_err(|e| StoreError::Io(format!("Failed to sync {}: {}", path.display(), e)))?;
    Ok(written)
}

/// Replace `to` with a copy of `from` via a temp file.
pub(crate) async fn copy_atomic(from: &Path, to: &Path) -> Result<(), StoreError> {
    let temp_path = temp_sibling(to);
    if let Err(e) = fs::copy(from, &temp_path).await {
        discard_temp(&temp_path).await;
        return Err(StoreError::from_io(
            format!("Failed to copy {}", from.display()),
            e,
        ));
    }
    if let Err(e) = fs::rename(&temp_path, to).await {
        discard_temp(&temp_path).await;
        return Err(StoreError::Io(format!(
            "Failed to rename to {}: {}",
            to.display(),
            e
        )));
    }
    Ok(())
}

pub(crate) fn timestamp(time: std::io::Result<SystemTime>) -> chrono::DateTime<chrono::Utc> {
    time.map(chrono::DateTime::from)
        .unwrap_or_else(|_| chrono::Utc::now())
}

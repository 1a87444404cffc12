//! Write-then-rename helper shared by the config file and the IP cache.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;

/// Atomically replace `path` with `contents`.
///
/// The data is written to a sibling `.tmp` file, flushed, and renamed over
/// the target. On Unix the temp file gets `mode` unless the target already
/// exists, in which case its permissions are carried over.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> Result<(), Error> {
    let temp_path = temp_path(path);

    {
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to create temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        file.write_all(contents).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to write to temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        file.flush().await.map_err(|e| {
            Error::state_store(format!(
                "Failed to flush temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;
    }

    apply_permissions(path, &temp_path, mode).await?;

    fs::rename(&temp_path, path).await.map_err(|e| {
        Error::state_store(format!(
            "Failed to rename {} to {}: {}",
            temp_path.display(),
            path.display(),
            e
        ))
    })?;

    tracing::trace!("Wrote {}", path.display());
    Ok(())
}

#[cfg(unix)]
async fn apply_permissions(target: &Path, temp: &Path, mode: u32) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;

    let permissions = match fs::metadata(target).await {
        Ok(meta) => meta.permissions(),
        Err(_) => std::fs::Permissions::from_mode(mode),
    };
    fs::set_permissions(temp, permissions).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn apply_permissions(_target: &Path, _temp: &Path, _mode: u32) -> Result<(), Error> {
    Ok(())
}

/// Create `dir` (and parents) if missing, owner-only on Unix
pub(crate) async fn ensure_dir(dir: &Path) -> Result<(), Error> {
    if dir.as_os_str().is_empty() || fs::try_exists(dir).await.unwrap_or(false) {
        return Ok(());
    }

    fs::create_dir_all(dir).await.map_err(|e| {
        Error::config(format!("Failed to create directory {}: {}", dir.display(), e))
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)).await?;
    }

    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

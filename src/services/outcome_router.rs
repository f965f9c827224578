use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{ERROR_DIR, PROCESSED_DIR};
use crate::models::internal::ResolutionOutcome;

/// Moves resolved files into the terminal `processed/` or `error/` subtrees.
#[derive(Debug, Clone)]
pub struct OutcomeRouter {
    root: PathBuf,
}

impl OutcomeRouter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Moves `path` according to `outcome` and returns where it landed.
    ///
    /// Failures are logged and swallowed; `None` means the file is still at
    /// its original location.
    pub async fn route(&self, path: &Path, outcome: &ResolutionOutcome) -> Option<PathBuf> {
        let subtree = match outcome {
            ResolutionOutcome::Processed { .. } => PROCESSED_DIR,
            ResolutionOutcome::Errored { .. } => ERROR_DIR,
        };
        let dest_dir = self.root.join(subtree).join(outcome.owner());

        let destination = match self.move_into(path, &dest_dir).await {
            Ok(destination) => destination,
            Err(e) => {
                warn!("Failed to move file {}: {}", path.display(), e);
                return None;
            }
        };

        if let ResolutionOutcome::Errored { error, .. } = outcome {
            if let Err(e) = write_sidecar(&destination, &error.to_string()).await {
                warn!(
                    "Failed to write error file for {}: {}",
                    destination.display(),
                    e
                );
            }
        }

        Some(destination)
    }

    async fn move_into(&self, path: &Path, dest_dir: &Path) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(dest_dir).await?;

        let file_name = path
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?
            .to_string_lossy()
            .into_owned();

        let destination = unique_destination(dest_dir, &file_name).await?;
        move_file(path, &destination).await?;
        debug!("Moved {} to {}", path.display(), destination.display());
        Ok(destination)
    }
}

/// Picks a free name in `dest_dir`: the original name, then
/// `{stem}_{YYYYmmdd_HHMMSS}{.ext}`, then that name with `_{n}` appended.
async fn unique_destination(dest_dir: &Path, file_name: &str) -> io::Result<PathBuf> {
    let candidate = dest_dir.join(file_name);
    if !tokio::fs::try_exists(&candidate).await? {
        return Ok(candidate);
    }

    let (stem, ext) = split_extension(file_name);
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let stamped = dest_dir.join(format!("{}_{}{}", stem, timestamp, ext));
    if !tokio::fs::try_exists(&stamped).await? {
        return Ok(stamped);
    }

    let mut n = 1u32;
    loop {
        let numbered = dest_dir.join(format!("{}_{}_{}{}", stem, timestamp, n, ext));
        if !tokio::fs::try_exists(&numbered).await? {
            return Ok(numbered);
        }
        n += 1;
    }
}

/// Splits `name.ext` into (`name`, `.ext`). Dotfiles keep their full name as stem.
fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => file_name.split_at(idx),
        _ => (file_name, ""),
    }
}

async fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            // rename(2) cannot cross filesystems; fall back to copy + remove.
            if !tokio::fs::try_exists(from).await.unwrap_or(false) {
                return Err(rename_err);
            }
            info!(
                "Rename of {} failed ({}), copying instead",
                from.display(),
                rename_err
            );
            let copied = match tokio::fs::copy(from, to).await {
                Ok(_) => tokio::fs::remove_file(from).await,
                Err(e) => Err(e),
            };
            discard_copy_on_error(to, copied).await
        }
    }
}

/// Removes the copy at `to` when the copy or the source removal failed, so
/// the file never persists at both locations.
async fn discard_copy_on_error(to: &Path, copied: io::Result<()>) -> io::Result<()> {
    let Err(e) = copied else {
        return Ok(());
    };
    match tokio::fs::remove_file(to).await {
        Ok(()) => {}
        Err(cleanup) if cleanup.kind() == io::ErrorKind::NotFound => {}
        Err(cleanup) => warn!("Failed to remove partial copy {}: {}", to.display(), cleanup),
    }
    Err(e)
}

pub fn sidecar_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".error");
    destination.with_file_name(name)
}

async fn write_sidecar(destination: &Path, message: &str) -> io::Result<()> {
    let content = format!(
        "Timestamp: {}\nError: {}\n",
        Utc::now().to_rfc3339(),
        message
    );
    tokio::fs::write(sidecar_path(destination), content).await
}

//! Per-session temporary files. One directory per review session holds the
//! base and head snapshots; everything is removed when the session ends.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

pub struct Session {
    dir: TempDir,
}

impl Session {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("qrev")
            .tempdir()
            .context("Failed to create session temp directory")?;
        tracing::debug!("session temp directory: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` to `<session>/<prefix>/<file>`, creating parents.
    /// Read-only snapshots get mode 0444 and a `.ro` suffix.
    pub fn create_file(&self, prefix: &str, file: &str, contents: &str, readonly: bool) -> Result<PathBuf> {
        let mut name = PathBuf::from(file);
        if readonly {
            name.set_file_name(format!(
                "{}.ro",
                name.file_name().unwrap_or_default().to_string_lossy()
            ));
        }
        let path = self.dir.path().join(prefix).join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        if readonly {
            fs::set_permissions(&path, fs::Permissions::from_mode(0o444))
                .with_context(|| format!("chmod {}", path.display()))?;
        }
        tracing::debug!("created temp file {}", path.display());
        Ok(path)
    }
}

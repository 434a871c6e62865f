use crate::error::AppResult;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Run-scoped directory for every temporary artifact of one import run
/// (fetched certificates, the exported transfer keystore). The whole
/// directory is removed when the workspace is dropped, so cleanup holds
/// on every exit path: success, declined confirmation, or error.
#[derive(Debug)]
pub struct TempWorkspace {
    dir: TempDir,
}

impl TempWorkspace {
    pub fn new() -> AppResult<Self> {
        let dir = tempfile::Builder::new().prefix("certimport-").tempdir()?;
        debug!("temporary workspace at {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Create a file inside the workspace. The name is sanitized so
    /// endpoint strings like "host:443" are usable directly.
    pub fn create_file(&self, name: &str, contents: &[u8]) -> AppResult<PathBuf> {
        let name: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let path = self.dir.path().join(name);
        fs::write(&path, contents)?;
        Ok(path)
    }
}

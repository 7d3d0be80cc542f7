use parking_lot::RwLock;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Process-wide holder of the single bearer token.
///
/// Clones share the same slot. Writes are last-write-wins and a stored token
/// is trusted until it is cleared or overwritten.
#[derive(Clone, Default)]
pub struct CredentialStore {
    slot: Arc<RwLock<Option<String>>>,
    file: Option<PathBuf>,
}

impl CredentialStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Mirrors the slot into `<root>/credentials/auth_token` and restores any
    /// token left there by a previous run.
    pub fn persistent(root: impl AsRef<Path>) -> Self {
        let dir = root.as_ref().join("credentials");
        if let Err(err) = fs::create_dir_all(&dir) {
            tracing::warn!(%err, dir = %dir.display(), "failed to create credential directory");
        }
        let file = dir.join("auth_token");
        let restored = fs::read_to_string(&file)
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());
        Self {
            slot: Arc::new(RwLock::new(restored)),
            file: Some(file),
        }
    }

    pub fn get(&self) -> Option<String> {
        self.slot.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.slot.read().is_some()
    }

    pub fn set(&self, token: impl Into<String>) {
        let token = token.into();
        if let Some(path) = &self.file {
            if let Err(err) = write_token(path, &token) {
                tracing::warn!(%err, "failed to persist credential");
            }
        }
        *self.slot.write() = Some(token);
    }

    pub fn clear(&self) {
        if let Some(path) = &self.file {
            if let Err(err) = fs::remove_file(path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(%err, "failed to remove persisted credential");
                }
            }
        }
        *self.slot.write() = None;
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("authenticated", &self.is_authenticated())
            .field("file", &self.file)
            .finish()
    }
}

fn write_token(path: &Path, token: &str) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(token.as_bytes())?;
    Ok(())
}

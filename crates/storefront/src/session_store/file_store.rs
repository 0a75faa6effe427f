//! File-based session storage.
//!
//! - The cart id is stored in `~/.medusa-store/cart.json` by default
//! - File permissions are set to 0600 on Unix (owner read/write only)
//! - All writes are atomic (write to temp file, then rename)

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use serde::{Deserialize, Serialize};

use medusa_store_core::CartId;

use super::{SessionStore, SessionStoreError};

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    cart_id: CartId,
}

/// Session store backed by a small JSON document on disk.
#[derive(Debug)]
pub struct FileSessionStore {
    /// Path to the session file
    path: PathBuf,
}

impl FileSessionStore {
    /// Create a store at the default location (`~/.medusa-store/cart.json`).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, SessionStoreError> {
        let home = dirs::home_dir()
            .ok_or_else(|| SessionStoreError::Read("cannot determine home directory".into()))?;
        Ok(Self::with_path(home.join(".medusa-store").join("cart.json")))
    }

    /// Create a store at a custom path.
    #[must_use]
    pub const fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path to the session file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomic(&self, content: &[u8]) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SessionStoreError::Write(format!("cannot create directory: {e}")))?;
        }

        let temp_path = self.path.with_extension("tmp");
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .map_err(|e| SessionStoreError::Write(format!("cannot create temp file: {e}")))?;

            #[cfg(unix)]
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|e| SessionStoreError::Write(format!("cannot set permissions: {e}")))?;

            file.write_all(content)
                .map_err(|e| SessionStoreError::Write(format!("cannot write session: {e}")))?;
            file.sync_all()
                .map_err(|e| SessionStoreError::Write(format!("cannot sync to disk: {e}")))?;
        }

        fs::rename(&temp_path, &self.path)
            .map_err(|e| SessionStoreError::Write(format!("cannot rename temp file: {e}")))
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> Result<Option<CartId>, SessionStoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SessionStoreError::Read(format!(
                    "cannot read session file: {e}"
                )));
            }
        };

        let session: SessionFile = serde_json::from_str(&content)
            .map_err(|e| SessionStoreError::Read(format!("cannot parse session file: {e}")))?;

        Ok(Some(session.cart_id).filter(|id| !id.is_empty()))
    }

    fn set(&self, cart_id: &CartId) -> Result<(), SessionStoreError> {
        let content = serde_json::to_vec(&SessionFile {
            cart_id: cart_id.clone(),
        })
        .map_err(|e| SessionStoreError::Write(format!("cannot serialize session: {e}")))?;
        self.write_atomic(&content)
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionStoreError::Write(format!(
                "cannot remove session file: {e}"
            ))),
        }
    }
}

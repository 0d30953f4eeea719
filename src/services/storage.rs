// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Durable storage for the session token record.
//!
//! A single key holds `{accessToken, refreshToken, expiresIn}`. A missing key
//! means an anonymous session. Records with a missing token are never
//! returned. The file backend keeps the record readable by its owner only.

use crate::error::ClientError;
use crate::models::SessionTokens;
use parking_lot::Mutex;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Synchronous key-value slot for the session record.
pub trait TokenStorage: Send + Sync {
    fn load(&self) -> Result<Option<SessionTokens>, ClientError>;
    fn save(&self, tokens: &SessionTokens) -> Result<(), ClientError>;
    fn clear(&self) -> Result<(), ClientError>;
}

/// Stores the record as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", key)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn discard(&self, reason: &str) -> Result<Option<SessionTokens>, ClientError> {
        tracing::warn!(path = %self.path.display(), reason, "Discarding unusable session record");
        self.clear()?;
        Ok(None)
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Result<Option<SessionTokens>, ClientError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ClientError::Storage(format!("read {}: {}", self.path.display(), e))),
        };

        match serde_json::from_str::<SessionTokens>(&raw) {
            Ok(tokens) if tokens.is_complete() => Ok(Some(tokens)),
            Ok(_) => self.discard("incomplete token pair"),
            Err(_) => self.discard("malformed JSON"),
        }
    }

    fn save(&self, tokens: &SessionTokens) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ClientError::Storage(format!("create {}: {}", parent.display(), e)))?;
        }

        // Write-then-rename so a crash never leaves a half-written record.
        let tmp = self.path.with_extension("json.tmp");
        let raw = serde_json::to_vec(tokens)?;
        write_private(&tmp, &raw)
            .map_err(|e| ClientError::Storage(format!("write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| ClientError::Storage(format!("rename {}: {}", self.path.display(), e)))
    }

    fn clear(&self) -> Result<(), ClientError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::Storage(format!("remove {}: {}", self.path.display(), e))),
        }
    }
}

/// Create `path` afresh with owner-only permissions and write `raw` to it.
fn write_private(path: &Path, raw: &[u8]) -> std::io::Result<()> {
    // A leftover file would keep its old mode.
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(raw)?;
    file.sync_all()
}

/// In-process storage slot holding the serialized record.
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    slot: Mutex<Option<String>>,
    #[cfg(test)]
    fail_writes: Mutex<bool>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a previously persisted session.
    pub fn with_tokens(tokens: &SessionTokens) -> Result<Self, ClientError> {
        let storage = Self::new();
        storage.save(tokens)?;
        Ok(storage)
    }

    /// Raw stored JSON, if any.
    pub fn raw(&self) -> Option<String> {
        self.slot.lock().clone()
    }

    /// Make subsequent `save` calls fail (simulates a full or read-only disk).
    #[cfg(test)]
    pub(crate) fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    #[cfg(test)]
    fn check_writable(&self) -> Result<(), ClientError> {
        if *self.fail_writes.lock() {
            return Err(ClientError::Storage("storage is read-only".to_string()));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_writable(&self) -> Result<(), ClientError> {
        Ok(())
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<Option<SessionTokens>, ClientError> {
        let slot = self.slot.lock();
        let Some(raw) = slot.as_deref() else {
            return Ok(None);
        };
        let tokens: SessionTokens = serde_json::from_str(raw)?;
        Ok(tokens.is_complete().then_some(tokens))
    }

    fn save(&self, tokens: &SessionTokens) -> Result<(), ClientError> {
        self.check_writable()?;
        *self.slot.lock() = Some(serde_json::to_string(tokens)?);
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *self.slot.lock() = None;
        Ok(())
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable credential store: a JSON file replaced atomically on each write.

use std::path::{Path, PathBuf};

use anyhow::Context;
use parking_lot::RwLock;

use crate::credential::{CredentialRecord, CredentialStore};

/// File name used inside the state directory.
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Credential store backed by a JSON file.
///
/// The record is cached in memory so `get` never touches the disk. Writes
/// hold the cache lock across the file replace, so readers observe either
/// the old record or the new one.
pub struct FileStore {
    path: PathBuf,
    cached: RwLock<Option<CredentialRecord>>,
}

impl FileStore {
    /// Open the store at `path`, loading any existing record.
    ///
    /// A missing file is an empty store. An unreadable or corrupt file is an
    /// error.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let cached = if path.exists() { Some(load(&path)?) } else { None };
        Ok(Self { path, cached: RwLock::new(cached) })
    }

    /// Open `credentials.json` inside `dir`, creating the directory if needed.
    pub fn open_in(dir: &Path) -> anyhow::Result<Self> {
        if !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating state dir {}", dir.display()))?;
        }
        Self::open(dir.join(CREDENTIALS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileStore {
    fn get(&self) -> Option<CredentialRecord> {
        self.cached.read().clone()
    }

    fn store(&self, record: CredentialRecord) -> anyhow::Result<()> {
        let mut cached = self.cached.write();
        save(&self.path, &record)?;
        *cached = Some(record);
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        let mut cached = self.cached.write();
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("removing {}", self.path.display()));
            }
        }
        *cached = None;
        Ok(())
    }
}

/// Load a credential record from a JSON file.
pub fn load(path: &Path) -> anyhow::Result<CredentialRecord> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading credentials from {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("corrupt credentials file {}", path.display()))
}

/// Replace the credentials file atomically: write a sibling temp file, then
/// rename it over `path`.
///
/// Temp names carry the PID and a counter so two stores saving to the same
/// path never write into one temp file.
pub fn save(path: &Path, record: &CredentialRecord) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static SAVE_SEQ: AtomicU32 = AtomicU32::new(0);

    let json = serde_json::to_vec_pretty(record)?;
    let file_name = path.file_name().unwrap_or_default().to_string_lossy();
    let tmp_path = path.with_file_name(format!(
        ".{file_name}.{}.{}.tmp",
        std::process::id(),
        SAVE_SEQ.fetch_add(1, Ordering::Relaxed),
    ));

    std::fs::write(&tmp_path, json)
        .with_context(|| format!("writing {}", tmp_path.display()))?;
    restrict_permissions(&tmp_path)?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e).with_context(|| format!("replacing {}", path.display()));
    }
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;

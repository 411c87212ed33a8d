//! On-disk session store.
//!
//! One directory per key under the store root: `creds.json` holds the
//! credential blob, every other `<category>.<id>.json` file is one key-store
//! entry.
//! Everything here is transient; a session directory lives for one pairing run.

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use wabridge::{Credentials, KeyUpdate};

use super::identity::Identity;

pub const CREDS_FILE: &str = "creds.json";

/// Used when the raw key has nothing usable left after sanitizing
pub const DEFAULT_SESSION_KEY: &str = "session";

/// Directory name of a session.
///
/// Raw caller input is reduced to `[A-Za-z0-9+_-]` so a key can never escape
/// the store root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn for_identity(identity: &Identity) -> Self {
        Self(identity.as_str().to_string())
    }

    pub fn from_raw(raw: &str) -> Self {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_'))
            .collect();
        if cleaned.is_empty() {
            Self(DEFAULT_SESSION_KEY.to_string())
        } else {
            Self(cleaned)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir_for(&self, key: &SessionKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    /// Delete everything stored under `key`.
    ///
    /// Idempotent and infallible from the caller's point of view: a missing
    /// directory is fine, any other failure is logged and swallowed.
    /// Returns whether a directory was removed.
    pub async fn reset(&self, key: &SessionKey) -> bool {
        let dir = self.dir_for(key);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(session = %key.as_str(), "Session directory removed");
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                warn!(session = %key.as_str(), error = %e, "Error removing session directory");
                false
            }
        }
    }

    /// Open (creating if needed) the session for `key` and load its credentials.
    pub async fn open(&self, key: &SessionKey) -> Result<SessionHandle> {
        let dir = self.dir_for(key);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create session directory {}", dir.display()))?;

        let creds = match tokio::fs::read(dir.join(CREDS_FILE)).await {
            Ok(bytes) => serde_json::from_slice(&bytes).context("Corrupt credential file")?,
            Err(e) if e.kind() == ErrorKind::NotFound => Credentials::default(),
            Err(e) => return Err(e).context("Failed to read credential file"),
        };

        Ok(SessionHandle {
            key: key.clone(),
            dir,
            creds,
        })
    }

    /// Number of session directories currently on disk
    pub async fn active_sessions(&self) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(_) => return 0,
        };
        let mut count = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                count += 1;
            }
        }
        count
    }
}

/// An open session: current credentials plus the persist/read capabilities
/// the connection needs.
#[derive(Debug)]
pub struct SessionHandle {
    key: SessionKey,
    dir: PathBuf,
    creds: Credentials,
}

impl SessionHandle {
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn credentials(&self) -> &Credentials {
        &self.creds
    }

    pub fn is_registered(&self) -> bool {
        self.creds.registered
    }

    /// Durably replace the credential blob.
    pub async fn persist_creds(&mut self, creds: Credentials) -> Result<()> {
        let bytes = serde_json::to_vec(&creds)?;
        write_atomic(&self.dir, CREDS_FILE, &bytes).await?;
        self.creds = creds;
        Ok(())
    }

    /// Apply key-store writes; `None` values delete the entry.
    pub async fn persist_keys(&self, updates: &[KeyUpdate]) -> Result<()> {
        for update in updates {
            let file = key_file_name(&update.category, &update.id);
            match &update.value {
                Some(value) => {
                    write_atomic(&self.dir, &file, &serde_json::to_vec(value)?).await?;
                }
                None => match tokio::fs::remove_file(self.dir.join(&file)).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e).with_context(|| format!("Failed to delete {}", file)),
                },
            }
        }
        Ok(())
    }

    /// All stored key-store entries, for handing to a new connection attempt.
    pub async fn load_keys(&self) -> Result<Vec<KeyUpdate>> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .context("Failed to list session directory")?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            if name == CREDS_FILE {
                continue;
            }
            let Some((category, id)) = stem.split_once('.') else {
                continue;
            };
            let bytes = tokio::fs::read(entry.path()).await?;
            keys.push(KeyUpdate {
                category: category.to_string(),
                id: decode_id(id),
                value: Some(serde_json::from_slice(&bytes)?),
            });
        }

        keys.sort_by(|a, b| (&a.category, &a.id).cmp(&(&b.category, &b.id)));
        Ok(keys)
    }

    /// Raw bytes of the canonical credential file.
    ///
    /// Only meaningful once the connection has opened; before that the file
    /// may be missing or partial.
    pub async fn read_artifact(&self) -> Result<Vec<u8>> {
        let path = self.dir.join(CREDS_FILE);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}

/// Scoped ownership of a session directory.
///
/// `release` destroys the directory; if the lease is dropped without being
/// released (early return, panic, cancelled task) the directory is removed
/// synchronously in `Drop`.
#[derive(Debug)]
pub struct SessionLease {
    store: SessionStore,
    key: SessionKey,
    released: bool,
}

impl SessionLease {
    pub fn new(store: SessionStore, key: SessionKey) -> Self {
        Self {
            store,
            key,
            released: false,
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub async fn release(mut self) {
        self.store.reset(&self.key).await;
        self.released = true;
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_dir_all(self.store.dir_for(&self.key)) {
            Ok(()) => debug!(session = %self.key.as_str(), "Session removed on drop"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(session = %self.key.as_str(), error = %e, "Error removing session on drop"),
        }
    }
}

fn key_file_name(category: &str, id: &str) -> String {
    format!("{}.{}.json", category, encode_id(id))
}

fn encode_id(id: &str) -> String {
    id.replace('%', "%25").replace('/', "%2F")
}

fn decode_id(id: &str) -> String {
    id.replace("%2F", "/").replace("%25", "%")
}

async fn write_atomic(dir: &Path, file: &str, bytes: &[u8]) -> Result<()> {
    let tmp = dir.join(format!(".{}.tmp", file));
    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write {}", file))?;
    tokio::fs::rename(&tmp, dir.join(file))
        .await
        .with_context(|| format!("Failed to move {} into place", file))?;
    Ok(())
}

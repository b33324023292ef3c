//! Durable client credentials.
//!
//! A [`Session`] is the credential triple (bearer token, API key, username)
//! attached to authenticated API calls. [`SessionStore`] reads it once from a
//! [`Storage`] backend when opened and writes through on every save/clear.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};

/// Storage key for the bearer token.
pub const TOKEN_KEY: &str = "authToken";
/// Storage key for the API key.
pub const API_KEY_KEY: &str = "apiKey";
/// Storage key for the username.
pub const USERNAME_KEY: &str = "username";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub bearer_token: Option<String>,
    pub api_key: Option<String>,
    pub username: Option<String>,
}

impl Session {
    pub fn new(bearer_token: String, api_key: Option<String>, username: String) -> Self {
        Session {
            bearer_token: Some(bearer_token),
            api_key,
            username: Some(username),
        }
    }

    /// Any non-empty token counts as logged in until the backend says otherwise.
    pub fn is_authenticated(&self) -> bool {
        self.bearer_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Three independent string entries, the equivalent of browser local storage.
pub trait Storage: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// JSON object file, rewritten on every mutation.
pub struct FileStorage {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    /// The file on disk did not parse and has not been rewritten yet.
    malformed: bool,
}

impl FileStorage {
    pub fn open(path: &Path) -> Result<Self> {
        let mut malformed = false;
        let entries = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                // Unreadable entries count as logged out; the next save rewrites the file.
                serde_json::from_str(&content).unwrap_or_else(|e| {
                    tracing::warn!("ignoring malformed session file {}: {e}", path.display());
                    malformed = true;
                    BTreeMap::new()
                })
            }
        } else {
            BTreeMap::new()
        };
        Ok(FileStorage {
            path: path.to_path_buf(),
            entries,
            malformed,
        })
    }

    fn flush(&mut self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        // Credentials: owner read/write only, from the moment the file exists.
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        file.write_all(json.as_bytes())
            .with_context(|| format!("failed to write {}", self.path.display()))?;

        // A file left by an older build may predate the mode above.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        self.malformed = false;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() || self.malformed {
            self.flush()?;
        }
        Ok(())
    }
}

/// In-process storage. Clones share the same entries, so a test can keep a
/// handle and inspect what the store wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStorage {
    pub fn with_entries(entries: &[(&str, &str)]) -> Self {
        let map = entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        MemoryStorage {
            entries: Arc::new(Mutex::new(map)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}

pub struct SessionStore {
    storage: Box<dyn Storage>,
    current: Session,
}

/// The store as shared between the UI thread and the dispatch worker.
pub type SharedSession = Arc<Mutex<SessionStore>>;

impl SessionStore {
    /// Open the store, reading durable storage exactly once.
    pub fn open(storage: Box<dyn Storage>) -> Self {
        let read = |key: &str| storage.get(key).filter(|v| !v.is_empty());
        let current = Session {
            bearer_token: read(TOKEN_KEY),
            api_key: read(API_KEY_KEY),
            username: read(USERNAME_KEY),
        };
        SessionStore { storage, current }
    }

    /// Open the file-backed store at ~/.tasky/session.json.
    pub fn open_default() -> Result<Self> {
        let path = crate::config::session_path()?;
        Ok(Self::open(Box::new(FileStorage::open(&path)?)))
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    pub fn current(&self) -> &Session {
        &self.current
    }

    /// Persist all three fields, overwriting what was there. `None` removes the entry.
    pub fn save(&mut self, session: Session) -> Result<()> {
        for (key, value) in [
            (TOKEN_KEY, session.bearer_token.as_deref()),
            (API_KEY_KEY, session.api_key.as_deref()),
            (USERNAME_KEY, session.username.as_deref()),
        ] {
            match value {
                Some(v) => self.storage.set(key, v)?,
                None => self.storage.remove(key)?,
            }
        }
        tracing::info!(user = ?session.username, "session saved");
        self.current = session;
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        for key in [TOKEN_KEY, API_KEY_KEY, USERNAME_KEY] {
            self.storage.remove(key)?;
        }
        tracing::info!("session cleared");
        self.current = Session::default();
        Ok(())
    }
}

/// Snapshot the current session out of a shared store.
pub fn snapshot(shared: &SharedSession) -> Session {
    shared
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .current()
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Session {
        Session::new("tok1".into(), Some("key1".into()), "alice".into())
    }

    #[test]
    fn empty_storage_is_logged_out() {
        let store = SessionStore::open(Box::new(MemoryStorage::default()));
        assert_eq!(store.current(), &Session::default());
        assert!(!store.current().is_authenticated());
    }

    #[test]
    fn open_reads_existing_entries() {
        let storage = MemoryStorage::with_entries(&[
            (TOKEN_KEY, "tok1"),
            (API_KEY_KEY, "key1"),
            (USERNAME_KEY, "alice"),
        ]);
        let store = SessionStore::open(Box::new(storage));
        assert_eq!(store.current(), &alice());
        assert!(store.current().is_authenticated());
    }

    #[test]
    fn empty_strings_read_back_as_absent() {
        let storage = MemoryStorage::with_entries(&[(TOKEN_KEY, ""), (USERNAME_KEY, "alice")]);
        let store = SessionStore::open(Box::new(storage));
        assert_eq!(store.current().bearer_token, None);
        assert_eq!(store.current().username.as_deref(), Some("alice"));
        assert!(!store.current().is_authenticated());
    }

    #[test]
    fn token_without_key_still_counts_as_logged_in() {
        let storage = MemoryStorage::with_entries(&[(TOKEN_KEY, "tok1")]);
        let store = SessionStore::open(Box::new(storage));
        assert!(store.current().is_authenticated());
        assert_eq!(store.current().api_key, None);
    }

    #[test]
    fn save_writes_all_three_entries() {
        let storage = MemoryStorage::default();
        let mut store = SessionStore::open(Box::new(storage.clone()));
        store.save(alice()).unwrap();

        assert_eq!(storage.get(TOKEN_KEY).as_deref(), Some("tok1"));
        assert_eq!(storage.get(API_KEY_KEY).as_deref(), Some("key1"));
        assert_eq!(storage.get(USERNAME_KEY).as_deref(), Some("alice"));
        assert_eq!(store.current(), &alice());
    }

    #[test]
    fn save_overwrites_and_drops_missing_fields() {
        let storage = MemoryStorage::default();
        let mut store = SessionStore::open(Box::new(storage.clone()));
        store.save(alice()).unwrap();
        store
            .save(Session::new("tok2".into(), None, "bob".into()))
            .unwrap();

        assert_eq!(storage.get(TOKEN_KEY).as_deref(), Some("tok2"));
        assert_eq!(storage.get(API_KEY_KEY), None);
        assert_eq!(storage.get(USERNAME_KEY).as_deref(), Some("bob"));
    }

    #[test]
    fn clear_removes_everything() {
        let storage = MemoryStorage::default();
        let mut store = SessionStore::open(Box::new(storage.clone()));
        store.save(alice()).unwrap();
        store.clear().unwrap();

        assert_eq!(storage.get(TOKEN_KEY), None);
        assert_eq!(storage.get(API_KEY_KEY), None);
        assert_eq!(storage.get(USERNAME_KEY), None);
        assert_eq!(store.current(), &Session::default());
    }

    #[test]
    fn file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut store = SessionStore::open(Box::new(FileStorage::open(&path).unwrap()));
        store.save(alice()).unwrap();
        drop(store);

        let reopened = SessionStore::open(Box::new(FileStorage::open(&path).unwrap()));
        assert_eq!(reopened.current(), &alice());
    }

    #[test]
    fn file_storage_clear_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut store = SessionStore::open(Box::new(FileStorage::open(&path).unwrap()));
        store.save(alice()).unwrap();
        store.clear().unwrap();

        let reopened = SessionStore::open(Box::new(FileStorage::open(&path).unwrap()));
        assert!(!reopened.current().is_authenticated());
    }

    #[test]
    fn malformed_file_reads_as_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        fs::write(&path, "not json").unwrap();
        let store = SessionStore::open(Box::new(FileStorage::open(&path).unwrap()));
        assert_eq!(store.current(), &Session::default());

        fs::write(&path, r#"{"authToken": 5, "username": "alice"}"#).unwrap();
        let store = SessionStore::open(Box::new(FileStorage::open(&path).unwrap()));
        assert!(!store.current().is_authenticated());
    }

    #[test]
    fn clear_rewrites_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        let mut store = SessionStore::open(Box::new(FileStorage::open(&path).unwrap()));
        store.clear().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let entries: BTreeMap<String, String> = serde_json::from_str(&content).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn malformed_file_is_replaced_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"authToken": 5}"#).unwrap();

        let mut store = SessionStore::open(Box::new(FileStorage::open(&path).unwrap()));
        store.save(alice()).unwrap();

        let reopened = SessionStore::open(Box::new(FileStorage::open(&path).unwrap()));
        assert_eq!(reopened.current(), &alice());
    }

    #[cfg(unix)]
    #[test]
    fn file_storage_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mut storage = FileStorage::open(&path).unwrap();
        storage.set(TOKEN_KEY, "tok1").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn snapshot_clones_current_session() {
        let mut store = SessionStore::open(Box::new(MemoryStorage::default()));
        store.save(alice()).unwrap();
        let shared = store.into_shared();
        assert_eq!(snapshot(&shared), alice());
    }
}

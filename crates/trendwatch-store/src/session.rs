//! Persisted browser session snapshots, one per site

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};
use trendwatch_browser::StorageState;
use trendwatch_util::SiteId;

use crate::{StoreError, StoreResult};

/// Storage for authenticated session snapshots.
///
/// A snapshot is valid wholesale or not at all: readers either get the full
/// state that was last saved or an error.
pub trait SessionStateStore: Send + Sync {
    /// Load the snapshot for a site. `Ok(None)` when none was ever saved.
    fn load(&self, site: &SiteId) -> StoreResult<Option<StorageState>>;

    /// Replace the snapshot for a site
    fn save(&self, site: &SiteId, state: &StorageState) -> StoreResult<()>;
}

/// One JSON file per site under a directory: `<dir>/<site>_session.json`
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, site: &SiteId) -> PathBuf {
        self.dir.join(format!("{}_session.json", site.as_str()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SessionStateStore for FileSessionStore {
    fn load(&self, site: &SiteId) -> StoreResult<Option<StorageState>> {
        let path = self.path_for(site);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let state: StorageState = serde_json::from_str(&content)?;
        debug!(site = %site, path = %path.display(), cookies = state.cookies.len(), "Loaded session snapshot");
        Ok(Some(state))
    }

    fn save(&self, site: &SiteId, state: &StorageState) -> StoreResult<()> {
        std::fs::create_dir_all(&self.dir)?;

        let path = self.path_for(site);
        let tmp = self.dir.join(format!(".{}_session.json.tmp", site.as_str()));
        let json = serde_json::to_vec_pretty(state)?;

        // Write-then-rename so a crash never leaves a half-written snapshot
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &path)?;

        info!(site = %site, path = %path.display(), "Session snapshot saved");
        Ok(())
    }
}

/// In-memory snapshots (for testing)
#[derive(Default)]
pub struct MemorySessionStore {
    states: Mutex<HashMap<SiteId, StorageState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(site: SiteId, state: StorageState) -> Self {
        let store = Self::default();
        if let Ok(mut states) = store.states.lock() {
            states.insert(site, state);
        }
        store
    }

    pub fn contains(&self, site: &SiteId) -> bool {
        self.states.lock().map(|s| s.contains_key(site)).unwrap_or(false)
    }
}

impl SessionStateStore for MemorySessionStore {
    fn load(&self, site: &SiteId) -> StoreResult<Option<StorageState>> {
        let states = self
            .states
            .lock()
            .map_err(|_| StoreError::Database("session store lock poisoned".into()))?;
        Ok(states.get(site).cloned())
    }

    fn save(&self, site: &SiteId, state: &StorageState) -> StoreResult<()> {
        let mut states = self
            .states
            .lock()
            .map_err(|_| StoreError::Database("session store lock poisoned".into()))?;
        states.insert(site.clone(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendwatch_browser::Cookie;

    fn sample_state() -> StorageState {
        StorageState {
            cookies: vec![Cookie::new("auth_token", "abc").with_domain(".x.com")],
            origins: vec![],
        }
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        assert!(store.load(&SiteId::new("x")).unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("sessions"));
        let site = SiteId::new("x");

        store.save(&site, &sample_state()).unwrap();
        assert!(dir.path().join("sessions").join("x_session.json").exists());
        assert_eq!(store.load(&site).unwrap(), Some(sample_state()));

        // Overwrite
        store.save(&site, &StorageState::default()).unwrap();
        assert_eq!(store.load(&site).unwrap(), Some(StorageState::default()));
    }

    #[test]
    fn test_corrupt_snapshot_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        std::fs::write(store.path_for(&SiteId::new("x")), "{ not json").unwrap();

        assert!(matches!(
            store.load(&SiteId::new("x")),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_sites_are_independent() {
        let store = MemorySessionStore::with_state(SiteId::new("x"), sample_state());
        assert!(store.contains(&SiteId::new("x")));
        assert!(store.load(&SiteId::new("y")).unwrap().is_none());
    }
}

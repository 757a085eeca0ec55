//! RocksDB-backed session store
//!
//! Sessions and results live in separate column families as JSON values, so
//! the persisted layout matches [`EliminationSession::to_json`].

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use serde::{de::DeserializeOwned, Serialize};

use super::schema::{self, ALL_CFS};
use super::{SessionStore, StoreError, StoreResult};
use crate::result::DecisionResult;
use crate::session::EliminationSession;

/// Persistent session store
pub struct RocksStore {
    db: RwLock<DB>,
    path: PathBuf,
}

impl RocksStore {
    /// Open or create a store at the given path
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, &path, cf_descriptors)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self {
            db: RwLock::new(db),
            path,
        })
    }

    /// Create a shared reference to this store
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Get the database path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn put<T: Serialize>(db: &DB, cf_name: &str, key: &str, value: &T) -> StoreResult<()> {
        let cf = db
            .cf_handle(cf_name)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(cf_name.to_string()))?;
        let bytes =
            serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        db.put_cf(&cf, key.as_bytes(), bytes)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn get<T: DeserializeOwned>(db: &DB, cf_name: &str, key: &str) -> StoreResult<Option<T>> {
        let cf = db
            .cf_handle(cf_name)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(cf_name.to_string()))?;
        match db
            .get_cf(&cf, key.as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?
        {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Deserialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn list_keys(db: &DB, cf_name: &str, prefix: &str) -> StoreResult<Vec<String>> {
        let cf = db
            .cf_handle(cf_name)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(cf_name.to_string()))?;

        let mut keys = Vec::new();
        for item in db.prefix_iterator_cf(&cf, prefix.as_bytes()) {
            let (key, _) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
            match String::from_utf8(key.to_vec()) {
                Ok(key) if key.starts_with(prefix) => keys.push(key),
                Ok(_) => break,
                Err(_) => continue,
            }
        }
        Ok(keys)
    }
}

impl SessionStore for RocksStore {
    fn get_session(&self, session_id: &str) -> StoreResult<Option<EliminationSession>> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        Self::get(&db, schema::CF_SESSIONS, &schema::keys::session(session_id))
    }

    fn put_session(
        &self,
        session: &EliminationSession,
        expected_version: u64,
    ) -> StoreResult<u64> {
        // Write lock makes the read-compare-write atomic within this process
        let db = self.db.write().map_err(|_| StoreError::LockPoisoned)?;
        let key = schema::keys::session(&session.id);

        let found = Self::get::<EliminationSession>(&db, schema::CF_SESSIONS, &key)?
            .map(|s| s.version)
            .unwrap_or(0);
        if found != expected_version {
            return Err(StoreError::Conflict {
                key,
                expected: expected_version,
                found,
            });
        }

        let mut stored = session.clone();
        stored.version = expected_version + 1;
        Self::put(&db, schema::CF_SESSIONS, &key, &stored)?;
        Ok(stored.version)
    }

    fn list_sessions(&self) -> StoreResult<Vec<EliminationSession>> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        let keys = Self::list_keys(&db, schema::CF_SESSIONS, schema::keys::SESSION_PREFIX)?;

        let mut sessions = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(session) = Self::get::<EliminationSession>(&db, schema::CF_SESSIONS, &key)? {
                sessions.push(session);
            }
        }
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(sessions)
    }

    fn put_result(&self, result: &DecisionResult) -> StoreResult<()> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        Self::put(
            &db,
            schema::CF_RESULTS,
            &schema::keys::result(&result.session_id),
            result,
        )
    }

    fn get_result(&self, session_id: &str) -> StoreResult<Option<DecisionResult>> {
        let db = self.db.read().map_err(|_| StoreError::LockPoisoned)?;
        Self::get(&db, schema::CF_RESULTS, &schema::keys::result(session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::AlgorithmParams;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = RocksStore::open(temp_dir.path()).unwrap();
        (store, temp_dir)
    }

    fn session(id: &str) -> EliminationSession {
        EliminationSession::new(
            "g-1",
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            AlgorithmParams::new(1, 1, 2, 3),
            30,
            Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap(),
        )
        .with_id(id)
    }

    #[test]
    fn test_session_roundtrip_and_versioning() {
        let (store, _dir) = create_test_store();
        let mut s = session("s-1");

        s.version = store.put_session(&s, 0).unwrap();
        let loaded = store.get_session("s-1").unwrap().unwrap();
        assert_eq!(loaded, s);

        let err = store.put_session(&s, 0).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { found: 1, .. }));
    }

    #[test]
    fn test_list_sessions() {
        let (store, _dir) = create_test_store();
        store.put_session(&session("s-1"), 0).unwrap();
        store.put_session(&session("s-2"), 0).unwrap();

        assert_eq!(store.list_sessions().unwrap().len(), 2);
        assert!(store.get_session("s-3").unwrap().is_none());
    }

    #[test]
    fn test_reopen_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = RocksStore::open(temp_dir.path()).unwrap();
            store.put_session(&session("s-1"), 0).unwrap();
        }
        let store = RocksStore::open(temp_dir.path()).unwrap();
        assert_eq!(store.get_session("s-1").unwrap().unwrap().version, 1);
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Operation store backends
//!
//! [`OperationStore`] is the persistence contract for operation records.
//! The file-backed store is the default; alternate backends (a hosted
//! table store, for instance) implement the same trait so the engine
//! stays backend-agnostic.
//!
//! Contract requirements every backend must honour:
//!
//! - `save` is atomic at single-record granularity; concurrent saves of
//!   different records never corrupt each other.
//! - `update` is read-modify-write safe under concurrent access, and a
//!   second update that flips `rolled_back` on an already-rolled-back
//!   record is rejected with `AlreadyRolledBack`. The store is the last
//!   line of defense for that flag's monotonicity.
//! - Any I/O failure surfaces as `RollbackError::Storage`; callers must
//!   not assume partial writes succeeded.

use crate::error::RollbackError;
use crate::types::{OperationFilter, OperationRecord, OperationUpdate};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Persistence contract for operation records
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Persist a new record
    async fn save(&self, record: &OperationRecord) -> Result<(), RollbackError>;

    /// Load records matching the filter, newest first
    async fn load(&self, filter: &OperationFilter) -> Result<Vec<OperationRecord>, RollbackError>;

    /// Fetch one record by id
    async fn get(&self, id: Uuid) -> Result<Option<OperationRecord>, RollbackError>;

    /// Apply a partial update to one record
    async fn update(&self, id: Uuid, update: OperationUpdate) -> Result<(), RollbackError>;

    /// Remove one record
    async fn delete(&self, id: Uuid) -> Result<(), RollbackError>;
}

fn apply_update(
    record: &mut OperationRecord,
    update: OperationUpdate,
) -> Result<(), RollbackError> {
    if update.rolled_back == Some(true) && record.rolled_back {
        return Err(RollbackError::AlreadyRolledBack(record.operation_id));
    }
    if let Some(rolled_back) = update.rolled_back {
        record.rolled_back = rolled_back;
    }
    if let Some(rollback_operation_id) = update.rollback_operation_id {
        record.rollback_operation_id = Some(rollback_operation_id);
    }
    Ok(())
}

/// File-backed store: one `<operation_id>.json` per record under a
/// configured directory.
///
/// Writes land in a temp file in the same directory and are renamed into
/// place, so a record file is always either the old or the new content.
/// Read-modify-write (`update`) is serialised behind a store-level mutex.
pub struct FileOperationStore {
    dir: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileOperationStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub fn open(dir: &Path) -> Result<Self, RollbackError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| RollbackError::storage_io("failed to create operation store dir", e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn write_record(&self, record: &OperationRecord) -> Result<(), RollbackError> {
        let content = serde_json::to_vec_pretty(record)
            .map_err(|e| RollbackError::Storage(format!("failed to encode record: {}", e)))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| RollbackError::storage_io("failed to create temp file", e))?;
        tmp.write_all(&content)
            .map_err(|e| RollbackError::storage_io("failed to write record", e))?;
        tmp.persist(self.record_path(record.operation_id))
            .map_err(|e| RollbackError::Storage(format!("failed to persist record: {}", e)))?;
        Ok(())
    }

    fn read_record(&self, path: &Path) -> Result<OperationRecord, RollbackError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RollbackError::storage_io("failed to read record", e))?;
        serde_json::from_str(&content).map_err(|e| {
            RollbackError::Storage(format!(
                "corrupt record at {}: {}",
                path.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl OperationStore for FileOperationStore {
    async fn save(&self, record: &OperationRecord) -> Result<(), RollbackError> {
        let _guard = self.write_lock.lock().await;
        self.write_record(record)?;
        tracing::debug!(
            operation_id = %record.operation_id,
            operation_type = %record.operation_type,
            "saved operation record"
        );
        Ok(())
    }

    async fn load(&self, filter: &OperationFilter) -> Result<Vec<OperationRecord>, RollbackError> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| RollbackError::storage_io("failed to list operation store", e))?;

        let now = Utc::now();
        let mut records = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| RollbackError::storage_io("failed to list operation store", e))?;
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let record = self.read_record(&path)?;
            if filter.matches(&record, now) {
                records.push(record);
            }
        }

        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    async fn get(&self, id: Uuid) -> Result<Option<OperationRecord>, RollbackError> {
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(None);
        }
        self.read_record(&path).map(Some)
    }

    async fn update(&self, id: Uuid, update: OperationUpdate) -> Result<(), RollbackError> {
        let _guard = self.write_lock.lock().await;

        let path = self.record_path(id);
        if !path.exists() {
            return Err(RollbackError::OperationNotFound(id));
        }
        let mut record = self.read_record(&path)?;
        apply_update(&mut record, update)?;
        self.write_record(&record)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RollbackError> {
        let _guard = self.write_lock.lock().await;

        let path = self.record_path(id);
        if !path.exists() {
            return Err(RollbackError::OperationNotFound(id));
        }
        std::fs::remove_file(&path)
            .map_err(|e| RollbackError::storage_io("failed to delete record", e))
    }
}

/// In-memory store, for tests and ephemeral use
#[derive(Default)]
pub struct MemoryOperationStore {
    records: tokio::sync::Mutex<HashMap<Uuid, OperationRecord>>,
}

impl MemoryOperationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OperationStore for MemoryOperationStore {
    async fn save(&self, record: &OperationRecord) -> Result<(), RollbackError> {
        self.records
            .lock()
            .await
            .insert(record.operation_id, record.clone());
        Ok(())
    }

    async fn load(&self, filter: &OperationFilter) -> Result<Vec<OperationRecord>, RollbackError> {
        let now = Utc::now();
        let mut records: Vec<OperationRecord> = self
            .records
            .lock()
            .await
            .values()
            .filter(|r| filter.matches(r, now))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    async fn get(&self, id: Uuid) -> Result<Option<OperationRecord>, RollbackError> {
        Ok(self.records.lock().await.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, update: OperationUpdate) -> Result<(), RollbackError> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(&id)
            .ok_or(RollbackError::OperationNotFound(id))?;
        apply_update(record, update)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RollbackError> {
        self.records
            .lock()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(RollbackError::OperationNotFound(id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{OperationResult, OperationType};
    use accessapi_client::{PermissionSet, Principal, PrincipalType};
    use std::collections::BTreeMap;

    fn sample_record() -> OperationRecord {
        OperationRecord {
            operation_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            operation_type: OperationType::Assign,
            principal: Principal {
                id: "u-1".to_string(),
                kind: PrincipalType::User,
                name: "alice".to_string(),
            },
            permission_set: PermissionSet {
                id: "ps-1".to_string(),
                name: "ops-admin".to_string(),
            },
            targets: vec!["acct-a".to_string()],
            target_names: vec!["alpha".to_string()],
            results: vec![OperationResult {
                target_id: "acct-a".to_string(),
                success: true,
                error: None,
                duration_ms: None,
            }],
            metadata: BTreeMap::new(),
            rolled_back: false,
            rollback_operation_id: None,
        }
    }

    #[tokio::test]
    async fn file_store_save_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOperationStore::open(dir.path()).unwrap();

        let record = sample_record();
        store.save(&record).await.unwrap();

        let loaded = store.get(record.operation_id).await.unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn file_store_get_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOperationStore::open(dir.path()).unwrap();
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_load_filters_and_sorts_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOperationStore::open(dir.path()).unwrap();

        let mut old = sample_record();
        old.timestamp = Utc::now() - chrono::Duration::hours(2);
        let mut new = sample_record();
        new.operation_type = OperationType::Revoke;
        store.save(&old).await.unwrap();
        store.save(&new).await.unwrap();

        let all = store.load(&OperationFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].operation_id, new.operation_id);

        let revokes = store
            .load(&OperationFilter {
                operation_type: Some(OperationType::Revoke),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(revokes.len(), 1);
        assert_eq!(revokes[0].operation_id, new.operation_id);
    }

    #[tokio::test]
    async fn rolled_back_flip_is_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOperationStore::open(dir.path()).unwrap();

        let record = sample_record();
        store.save(&record).await.unwrap();

        let first_rollback = Uuid::new_v4();
        store
            .update(
                record.operation_id,
                OperationUpdate {
                    rolled_back: Some(true),
                    rollback_operation_id: Some(first_rollback),
                },
            )
            .await
            .unwrap();

        let err = store
            .update(
                record.operation_id,
                OperationUpdate {
                    rolled_back: Some(true),
                    rollback_operation_id: Some(Uuid::new_v4()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RollbackError::AlreadyRolledBack(id) if id == record.operation_id));

        // The losing update must not have clobbered the winner's link.
        let loaded = store.get(record.operation_id).await.unwrap().unwrap();
        assert_eq!(loaded.rollback_operation_id, Some(first_rollback));
    }

    #[tokio::test]
    async fn update_of_missing_record_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOperationStore::open(dir.path()).unwrap();
        let err = store
            .update(Uuid::new_v4(), OperationUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RollbackError::OperationNotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_the_record_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOperationStore::open(dir.path()).unwrap();

        let record = sample_record();
        store.save(&record).await.unwrap();
        store.delete(record.operation_id).await.unwrap();

        assert!(store.get(record.operation_id).await.unwrap().is_none());
        let err = store.delete(record.operation_id).await.unwrap_err();
        assert!(matches!(err, RollbackError::OperationNotFound(_)));
    }

    #[tokio::test]
    async fn corrupt_record_surfaces_as_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOperationStore::open(dir.path()).unwrap();

        std::fs::write(dir.path().join(format!("{}.json", Uuid::new_v4())), "{not json").unwrap();

        let err = store.load(&OperationFilter::default()).await.unwrap_err();
        assert!(matches!(err, RollbackError::Storage(_)));
    }

    #[tokio::test]
    async fn memory_store_honours_the_same_contract() {
        let store = MemoryOperationStore::new();
        let record = sample_record();
        store.save(&record).await.unwrap();

        store
            .update(
                record.operation_id,
                OperationUpdate {
                    rolled_back: Some(true),
                    rollback_operation_id: Some(Uuid::new_v4()),
                },
            )
            .await
            .unwrap();
        let err = store
            .update(
                record.operation_id,
                OperationUpdate {
                    rolled_back: Some(true),
                    rollback_operation_id: Some(Uuid::new_v4()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RollbackError::AlreadyRolledBack(_)));
    }
}

//! StateStore: redb-backed state persistence for cronscale.
//!
//! Provides typed CRUD operations over policies, job run records, policy
//! status, and scalable objects. All values are JSON-serialized into redb's
//! `&[u8]` value columns. The store supports both on-disk and in-memory
//! backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Result of a compare-and-set firing record.
#[derive(Debug, Clone, PartialEq)]
pub enum FireOutcome {
    /// The firing was committed; carries the new record.
    Recorded(JobRunRecord),
    /// A firing for the same (or a later) instant, or a completed run-once
    /// job, was already on record. Nothing was written.
    AlreadyRecorded(JobRunRecord),
    /// The policy was deleted before the firing could be recorded.
    PolicyMissing,
}

/// Result of patching a scalable object.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOutcome {
    Patched(ScalableObject),
    NotFound,
    /// The object changed since the caller read it.
    Conflict { current_version: u64 },
    /// The patch does not apply to this kind of object.
    Mismatch,
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(POLICIES).map_err(map_err!(Table))?;
        txn.open_table(JOB_RUNS).map_err(map_err!(Table))?;
        txn.open_table(POLICY_STATUS).map_err(map_err!(Table))?;
        txn.open_table(OBJECTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Generic helpers ────────────────────────────────────────────

    fn put_value<T: Serialize>(
        &self,
        table: JsonTable,
        key: &str,
        value: &T,
    ) -> StateResult<()> {
        let bytes = serde_json::to_vec(value).map_err(map_err!(Encode))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut t = txn.open_table(table).map_err(map_err!(Table))?;
            t.insert(key, bytes.as_slice()).map_err(map_err!(Storage))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get_value<T: DeserializeOwned>(
        &self,
        table: JsonTable,
        key: &str,
    ) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let t = txn.open_table(table).map_err(map_err!(Table))?;
        match t.get(key).map_err(map_err!(Storage))? {
            Some(guard) => {
                let value = serde_json::from_slice(guard.value()).map_err(map_err!(Decode))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// List values whose key starts with `prefix` (empty prefix lists all).
    fn list_values<T: DeserializeOwned>(
        &self,
        table: JsonTable,
        prefix: &str,
    ) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let t = txn.open_table(table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in t.iter().map_err(map_err!(Storage))? {
            let (key, value) = entry.map_err(map_err!(Storage))?;
            if key.value().starts_with(prefix) {
                let v = serde_json::from_slice(value.value()).map_err(map_err!(Decode))?;
                results.push(v);
            }
        }
        Ok(results)
    }

    fn delete_value(&self, table: JsonTable, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut t = txn.open_table(table).map_err(map_err!(Table))?;
            existed = t.remove(key).map_err(map_err!(Storage))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    // ── Policies ───────────────────────────────────────────────────

    /// Insert or update a scaling policy.
    ///
    /// Existing run records are kept, so editing a policy never re-arms a
    /// run-once job that already fired.
    pub fn put_policy(&self, policy: &ScalingPolicy) -> StateResult<()> {
        let key = policy.table_key();
        self.put_value(POLICIES, &key, policy)?;
        debug!(%key, jobs = policy.jobs.len(), "policy stored");
        Ok(())
    }

    /// Get a policy by `{namespace}/{name}` key.
    pub fn get_policy(&self, key: &str) -> StateResult<Option<ScalingPolicy>> {
        self.get_value(POLICIES, key)
    }

    /// List all policies.
    pub fn list_policies(&self) -> StateResult<Vec<ScalingPolicy>> {
        self.list_values(POLICIES, "")
    }

    /// Delete a policy together with its run records and status.
    /// Returns true if the policy existed.
    pub fn delete_policy(&self, key: &str) -> StateResult<bool> {
        let run_prefix = format!("{key}:");
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        let mut runs_removed = 0u32;
        {
            let mut policies = txn.open_table(POLICIES).map_err(map_err!(Table))?;
            existed = policies.remove(key).map_err(map_err!(Storage))?.is_some();

            let mut runs = txn.open_table(JOB_RUNS).map_err(map_err!(Table))?;
            let run_keys: Vec<String> = runs
                .iter()
                .map_err(map_err!(Storage))?
                .map(|entry| {
                    entry
                        .map(|(k, _)| k.value().to_string())
                        .map_err(map_err!(Storage))
                })
                .filter(|k| k.as_ref().map_or(true, |k| k.starts_with(&run_prefix)))
                .collect::<StateResult<_>>()?;
            for k in &run_keys {
                runs.remove(k.as_str()).map_err(map_err!(Storage))?;
                runs_removed += 1;
            }

            let mut status = txn.open_table(POLICY_STATUS).map_err(map_err!(Table))?;
            status.remove(key).map_err(map_err!(Storage))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed, runs_removed, "policy deleted");
        Ok(existed)
    }

    // ── Job run records ────────────────────────────────────────────

    /// Get the run record for one job, if it ever fired.
    pub fn get_job_run(&self, policy_id: &str, job_name: &str) -> StateResult<Option<JobRunRecord>> {
        self.get_value(JOB_RUNS, &job_run_key(policy_id, job_name))
    }

    /// List all run records of a policy.
    pub fn list_job_runs(&self, policy_id: &str) -> StateResult<Vec<JobRunRecord>> {
        self.list_values(JOB_RUNS, &format!("{policy_id}:"))
    }

    /// Record a successful firing, compare-and-set style.
    ///
    /// The read and the write happen in one write transaction, so two
    /// concurrent callers cannot both record the same scheduled instant,
    /// and a firing never outlives a concurrent `delete_policy`.
    pub fn record_job_fired(
        &self,
        policy_id: &str,
        job_name: &str,
        scheduled_at: DateTime<Utc>,
        fired_at: DateTime<Utc>,
        complete: bool,
    ) -> StateResult<FireOutcome> {
        let key = job_run_key(policy_id, job_name);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let outcome;
        {
            let policies = txn.open_table(POLICIES).map_err(map_err!(Table))?;
            let policy_exists = policies.get(policy_id).map_err(map_err!(Storage))?.is_some();
            let mut table = txn.open_table(JOB_RUNS).map_err(map_err!(Table))?;
            let existing: Option<JobRunRecord> = match table.get(key.as_str()).map_err(map_err!(Storage))? {
                Some(guard) => Some(
                    serde_json::from_slice(guard.value()).map_err(map_err!(Decode))?,
                ),
                None => None,
            };

            match existing {
                _ if !policy_exists => {
                    outcome = FireOutcome::PolicyMissing;
                }
                Some(record) if record.completed || record.covers(scheduled_at) => {
                    outcome = FireOutcome::AlreadyRecorded(record);
                }
                existing => {
                    let mut record =
                        existing.unwrap_or_else(|| JobRunRecord::new(policy_id, job_name));
                    record.scheduled_at = Some(scheduled_at);
                    record.last_fired_at = Some(fired_at);
                    record.completed |= complete;
                    let value = serde_json::to_vec(&record).map_err(map_err!(Encode))?;
                    table
                        .insert(key.as_str(), value.as_slice())
                        .map_err(map_err!(Storage))?;
                    outcome = FireOutcome::Recorded(record);
                }
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        if let FireOutcome::Recorded(record) = &outcome {
            debug!(%key, completed = record.completed, "job firing recorded");
        }
        Ok(outcome)
    }

    // ── Status ─────────────────────────────────────────────────────

    /// Insert or replace the status of a policy.
    pub fn put_policy_status(&self, status: &PolicyStatus) -> StateResult<()> {
        self.put_value(POLICY_STATUS, &status.policy_id, status)
    }

    pub fn get_policy_status(&self, policy_id: &str) -> StateResult<Option<PolicyStatus>> {
        self.get_value(POLICY_STATUS, policy_id)
    }

    // ── Objects ────────────────────────────────────────────────────

    /// Create or replace an object. The stored resource version is bumped
    /// past whatever was there before; returns the stored object.
    pub fn put_object(&self, object: &ScalableObject) -> StateResult<ScalableObject> {
        let key = object.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let stored;
        {
            let mut table = txn.open_table(OBJECTS).map_err(map_err!(Table))?;
            let previous_version = match table.get(key.as_str()).map_err(map_err!(Storage))? {
                Some(guard) => {
                    let prev: ScalableObject =
                        serde_json::from_slice(guard.value()).map_err(map_err!(Decode))?;
                    prev.resource_version
                }
                None => 0,
            };
            let mut obj = object.clone();
            obj.resource_version = previous_version + 1;
            let value = serde_json::to_vec(&obj).map_err(map_err!(Encode))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Storage))?;
            stored = obj;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, version = stored.resource_version, "object stored");
        Ok(stored)
    }

    pub fn get_object(&self, key: &ObjectKey) -> StateResult<Option<ScalableObject>> {
        self.get_value(OBJECTS, &key.table_key())
    }

    pub fn list_objects(&self) -> StateResult<Vec<ScalableObject>> {
        self.list_values(OBJECTS, "")
    }

    pub fn delete_object(&self, key: &ObjectKey) -> StateResult<bool> {
        let existed = self.delete_value(OBJECTS, &key.table_key())?;
        debug!(%key, existed, "object deleted");
        Ok(existed)
    }

    /// Apply a patch to an object.
    ///
    /// When `expected_version` is set, the patch only applies if the stored
    /// object still has that resource version.
    pub fn patch_object(
        &self,
        key: &ObjectKey,
        patch: ObjectPatch,
        expected_version: Option<u64>,
    ) -> StateResult<PatchOutcome> {
        let table_key = key.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let outcome;
        {
            let mut table = txn.open_table(OBJECTS).map_err(map_err!(Table))?;
            let current: Option<ScalableObject> =
                match table.get(table_key.as_str()).map_err(map_err!(Storage))? {
                    Some(guard) => Some(
                        serde_json::from_slice(guard.value()).map_err(map_err!(Decode))?,
                    ),
                    None => None,
                };

            outcome = match current {
                None => PatchOutcome::NotFound,
                Some(obj) if expected_version.is_some_and(|v| v != obj.resource_version) => {
                    PatchOutcome::Conflict {
                        current_version: obj.resource_version,
                    }
                }
                Some(mut obj) => {
                    if apply_patch(&mut obj.spec, patch) {
                        obj.resource_version += 1;
                        let value = serde_json::to_vec(&obj).map_err(map_err!(Encode))?;
                        table
                            .insert(table_key.as_str(), value.as_slice())
                            .map_err(map_err!(Storage))?;
                        PatchOutcome::Patched(obj)
                    } else {
                        PatchOutcome::Mismatch
                    }
                }
            };
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(key = %table_key, ?patch, "object patch evaluated");
        Ok(outcome)
    }
}

/// Overwrite the fields a patch names. Returns false if the patch does not
/// fit the object's spec.
fn apply_patch(spec: &mut ObjectSpec, patch: ObjectPatch) -> bool {
    match (spec, patch) {
        (ObjectSpec::Replicas { replicas }, ObjectPatch::Replicas { replicas: new }) => {
            *replicas = new;
            true
        }
        (
            ObjectSpec::Autoscaler {
                min_replicas,
                max_replicas,
                ..
            },
            ObjectPatch::Bounds {
                min_replicas: new_min,
                max_replicas: new_max,
            },
        ) => {
            *min_replicas = new_min;
            *max_replicas = new_max;
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn test_policy(namespace: &str, name: &str) -> ScalingPolicy {
        ScalingPolicy {
            namespace: namespace.to_string(),
            name: name.to_string(),
            target_ref: TargetRef {
                kind: "Deployment".to_string(),
                api_version: "apps/v1".to_string(),
                name: name.to_string(),
            },
            jobs: vec![JobSpec {
                name: "scale-up".to_string(),
                schedule: "*/10 * * * * *".to_string(),
                target_size: 3,
                run_once: false,
            }],
            exclude_dates: vec![],
            created_at: ts(1000),
            updated_at: ts(1000),
        }
    }

    fn test_deployment(namespace: &str, name: &str, replicas: u32) -> ScalableObject {
        ScalableObject {
            kind: "Deployment".to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            resource_version: 0,
            spec: ObjectSpec::Replicas { replicas },
        }
    }

    fn test_hpa(namespace: &str, name: &str) -> ScalableObject {
        ScalableObject {
            kind: "HorizontalPodAutoscaler".to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            resource_version: 0,
            spec: ObjectSpec::Autoscaler {
                min_replicas: 1,
                max_replicas: 10,
                current_replicas: 5,
            },
        }
    }

    // ── Policy CRUD ────────────────────────────────────────────────

    #[test]
    fn policy_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let policy = test_policy("default", "web");

        store.put_policy(&policy).unwrap();
        let retrieved = store.get_policy("default/web").unwrap();

        assert_eq!(retrieved, Some(policy));
    }

    #[test]
    fn policy_get_nonexistent_returns_none() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.get_policy("nope/nothing").unwrap().is_none());
    }

    #[test]
    fn policy_list_all() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_policy(&test_policy("ns1", "a")).unwrap();
        store.put_policy(&test_policy("ns1", "b")).unwrap();
        store.put_policy(&test_policy("ns2", "c")).unwrap();

        assert_eq!(store.list_policies().unwrap().len(), 3);
    }

    #[test]
    fn policy_update_keeps_run_records() {
        let store = StateStore::open_in_memory().unwrap();
        let mut policy = test_policy("default", "web");
        store.put_policy(&policy).unwrap();
        store
            .record_job_fired("default/web", "scale-up", ts(2000), ts(2001), true)
            .unwrap();

        policy.jobs[0].schedule = "0 0 8 * * *".to_string();
        policy.updated_at = ts(3000);
        store.put_policy(&policy).unwrap();

        let record = store.get_job_run("default/web", "scale-up").unwrap().unwrap();
        assert!(record.completed);
    }

    #[test]
    fn policy_delete_cascades_runs_and_status() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_policy(&test_policy("default", "web")).unwrap();
        store.put_policy(&test_policy("default", "web-2")).unwrap();
        store
            .record_job_fired("default/web", "scale-up", ts(2000), ts(2000), false)
            .unwrap();
        store
            .record_job_fired("default/web-2", "scale-up", ts(2000), ts(2000), false)
            .unwrap();
        store.put_policy_status(&PolicyStatus::new("default/web")).unwrap();

        assert!(store.delete_policy("default/web").unwrap());
        assert!(!store.delete_policy("default/web").unwrap());

        assert!(store.get_policy("default/web").unwrap().is_none());
        assert!(store.list_job_runs("default/web").unwrap().is_empty());
        assert!(store.get_policy_status("default/web").unwrap().is_none());
        // The `default/web-2` prefix shares characters but must survive.
        assert_eq!(store.list_job_runs("default/web-2").unwrap().len(), 1);
    }

    // ── Job runs ───────────────────────────────────────────────────

    #[test]
    fn record_fired_creates_record() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_policy(&test_policy("default", "web")).unwrap();
        let outcome = store
            .record_job_fired("default/web", "job", ts(100), ts(101), false)
            .unwrap();

        let FireOutcome::Recorded(record) = outcome else {
            panic!("expected a recorded firing");
        };
        assert_eq!(record.scheduled_at, Some(ts(100)));
        assert_eq!(record.last_fired_at, Some(ts(101)));
        assert!(!record.completed);
        assert_eq!(store.get_job_run("default/web", "job").unwrap(), Some(record));
    }

    #[test]
    fn record_fired_is_idempotent_per_instant() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_policy(&test_policy("default", "web")).unwrap();
        store
            .record_job_fired("default/web", "job", ts(100), ts(101), false)
            .unwrap();

        let again = store
            .record_job_fired("default/web", "job", ts(100), ts(102), false)
            .unwrap();
        assert!(matches!(again, FireOutcome::AlreadyRecorded(_)));

        let older = store
            .record_job_fired("default/web", "job", ts(90), ts(103), false)
            .unwrap();
        assert!(matches!(older, FireOutcome::AlreadyRecorded(_)));

        let next = store
            .record_job_fired("default/web", "job", ts(110), ts(110), false)
            .unwrap();
        assert!(matches!(next, FireOutcome::Recorded(_)));
    }

    #[test]
    fn record_fired_never_rearms_completed_job() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_policy(&test_policy("default", "web")).unwrap();
        store
            .record_job_fired("default/web", "once", ts(100), ts(100), true)
            .unwrap();

        let later = store
            .record_job_fired("default/web", "once", ts(200), ts(200), true)
            .unwrap();
        let FireOutcome::AlreadyRecorded(record) = later else {
            panic!("completed job must not record another firing");
        };
        assert_eq!(record.scheduled_at, Some(ts(100)));
    }

    #[test]
    fn record_fired_after_policy_delete_writes_nothing() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_policy(&test_policy("default", "web")).unwrap();
        store.delete_policy("default/web").unwrap();

        let outcome = store
            .record_job_fired("default/web", "once", ts(100), ts(100), true)
            .unwrap();
        assert_eq!(outcome, FireOutcome::PolicyMissing);
        assert!(store.list_job_runs("default/web").unwrap().is_empty());
    }

    // ── Status ─────────────────────────────────────────────────────

    #[test]
    fn status_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let mut status = PolicyStatus::new("default/web");
        status.last_evaluated_at = Some(ts(500));
        status.jobs.push(JobStatus {
            name: "scale-up".to_string(),
            schedule: "*/10 * * * * *".to_string(),
            target_size: 3,
            run_once: false,
            state: JobState::Failed,
            last_fired_at: None,
            completed: false,
            last_error: Some("target not found".to_string()),
        });

        store.put_policy_status(&status).unwrap();
        let retrieved = store.get_policy_status("default/web").unwrap().unwrap();
        assert_eq!(retrieved, status);
        assert_eq!(retrieved.job("scale-up").unwrap().state, JobState::Failed);
    }

    // ── Objects ────────────────────────────────────────────────────

    #[test]
    fn object_put_bumps_version() {
        let store = StateStore::open_in_memory().unwrap();
        let first = store.put_object(&test_deployment("default", "web", 2)).unwrap();
        assert_eq!(first.resource_version, 1);

        let second = store.put_object(&test_deployment("default", "web", 4)).unwrap();
        assert_eq!(second.resource_version, 2);

        let key = ObjectKey::new("Deployment", "default", "web");
        let stored = store.get_object(&key).unwrap().unwrap();
        assert_eq!(stored.spec, ObjectSpec::Replicas { replicas: 4 });
    }

    #[test]
    fn object_patch_replicas() {
        let store = StateStore::open_in_memory().unwrap();
        let stored = store.put_object(&test_deployment("default", "web", 2)).unwrap();
        let key = stored.key();

        let outcome = store
            .patch_object(&key, ObjectPatch::Replicas { replicas: 5 }, Some(stored.resource_version))
            .unwrap();
        let PatchOutcome::Patched(obj) = outcome else {
            panic!("expected patch to apply");
        };
        assert_eq!(obj.spec, ObjectSpec::Replicas { replicas: 5 });
        assert_eq!(obj.resource_version, 2);
    }

    #[test]
    fn object_patch_bounds_keeps_current_replicas() {
        let store = StateStore::open_in_memory().unwrap();
        let stored = store.put_object(&test_hpa("default", "web")).unwrap();

        let outcome = store
            .patch_object(
                &stored.key(),
                ObjectPatch::Bounds {
                    min_replicas: 6,
                    max_replicas: 10,
                },
                None,
            )
            .unwrap();
        let PatchOutcome::Patched(obj) = outcome else {
            panic!("expected patch to apply");
        };
        assert_eq!(
            obj.spec,
            ObjectSpec::Autoscaler {
                min_replicas: 6,
                max_replicas: 10,
                current_replicas: 5,
            }
        );
    }

    #[test]
    fn object_patch_stale_version_conflicts() {
        let store = StateStore::open_in_memory().unwrap();
        let stored = store.put_object(&test_deployment("default", "web", 2)).unwrap();
        store.put_object(&test_deployment("default", "web", 3)).unwrap();

        let outcome = store
            .patch_object(&stored.key(), ObjectPatch::Replicas { replicas: 5 }, Some(1))
            .unwrap();
        assert_eq!(outcome, PatchOutcome::Conflict { current_version: 2 });
    }

    #[test]
    fn object_patch_missing_and_mismatched() {
        let store = StateStore::open_in_memory().unwrap();
        let key = ObjectKey::new("Deployment", "default", "ghost");
        assert_eq!(
            store
                .patch_object(&key, ObjectPatch::Replicas { replicas: 1 }, None)
                .unwrap(),
            PatchOutcome::NotFound
        );

        let stored = store.put_object(&test_deployment("default", "web", 2)).unwrap();
        let outcome = store
            .patch_object(
                &stored.key(),
                ObjectPatch::Bounds {
                    min_replicas: 1,
                    max_replicas: 2,
                },
                None,
            )
            .unwrap();
        assert_eq!(outcome, PatchOutcome::Mismatch);
    }

    #[test]
    fn object_list_and_delete() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_object(&test_deployment("default", "web", 2)).unwrap();
        store.put_object(&test_hpa("default", "web")).unwrap();
        assert_eq!(store.list_objects().unwrap().len(), 2);

        let key = ObjectKey::new("Deployment", "default", "web");
        assert!(store.delete_object(&key).unwrap());
        assert!(!store.delete_object(&key).unwrap());
        assert_eq!(store.list_objects().unwrap().len(), 1);
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.put_policy(&test_policy("prod", "api")).unwrap();
            store
                .record_job_fired("prod/api", "scale-up", ts(100), ts(100), true)
                .unwrap();
        }

        let store = StateStore::open(&db_path).unwrap();
        assert_eq!(store.get_policy("prod/api").unwrap().unwrap().name, "api");
        let record = store.get_job_run("prod/api", "scale-up").unwrap().unwrap();
        assert!(record.completed);
    }

    #[test]
    fn empty_store_operations() {
        let store = StateStore::open_in_memory().unwrap();

        assert!(store.list_policies().unwrap().is_empty());
        assert!(store.list_objects().unwrap().is_empty());
        assert!(store.list_job_runs("any").unwrap().is_empty());
        assert!(store.get_policy_status("any").unwrap().is_none());
        assert!(!store.delete_policy("nope").unwrap());
    }
}

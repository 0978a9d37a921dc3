//! The external object API the controller reads and mutates.
//!
//! In a cluster this is the API server; in standalone mode the redb-backed
//! `StateStore` stands in for it.

use async_trait::async_trait;
use cronscale_state::{ObjectKey, ObjectPatch, PatchOutcome, ScalableObject, StateError, StateStore};

use crate::error::ApiError;

/// Get/patch/create/delete primitives, keyed by kind + namespace + name.
#[async_trait]
pub trait ObjectApi: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> Result<ScalableObject, ApiError>;

    /// Full-overwrite patch. When `expected_version` is set and the object
    /// changed since, fails with `Conflict`.
    async fn patch(
        &self,
        key: &ObjectKey,
        patch: ObjectPatch,
        expected_version: Option<u64>,
    ) -> Result<ScalableObject, ApiError>;

    async fn create(&self, object: &ScalableObject) -> Result<ScalableObject, ApiError>;

    async fn delete(&self, key: &ObjectKey) -> Result<(), ApiError>;
}

fn store_error(e: StateError) -> ApiError {
    ApiError::Transient(e.to_string())
}

#[async_trait]
impl ObjectApi for StateStore {
    async fn get(&self, key: &ObjectKey) -> Result<ScalableObject, ApiError> {
        self.get_object(key)
            .map_err(store_error)?
            .ok_or_else(|| ApiError::NotFound(key.to_string()))
    }

    async fn patch(
        &self,
        key: &ObjectKey,
        patch: ObjectPatch,
        expected_version: Option<u64>,
    ) -> Result<ScalableObject, ApiError> {
        match self
            .patch_object(key, patch, expected_version)
            .map_err(store_error)?
        {
            PatchOutcome::Patched(obj) => Ok(obj),
            PatchOutcome::NotFound => Err(ApiError::NotFound(key.to_string())),
            PatchOutcome::Conflict { current_version } => Err(ApiError::Conflict(format!(
                "{key} is at version {current_version}, expected {}",
                expected_version.unwrap_or_default()
            ))),
            PatchOutcome::Mismatch => Err(ApiError::Conflict(format!(
                "{key} does not accept a {patch:?} patch"
            ))),
        }
    }

    async fn create(&self, object: &ScalableObject) -> Result<ScalableObject, ApiError> {
        self.put_object(object).map_err(store_error)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), ApiError> {
        if self.delete_object(key).map_err(store_error)? {
            Ok(())
        } else {
            Err(ApiError::NotFound(key.to_string()))
        }
    }
}

use arbor_types::{ObjectId, ObjectKind};
use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreResult;

/// One entry of a batch submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PutItem {
    pub id: ObjectId,
    pub bytes: Bytes,
}

impl PutItem {
    pub fn new(id: ObjectId, bytes: impl Into<Bytes>) -> Self {
        Self {
            id,
            bytes: bytes.into(),
        }
    }
}

/// The external boundary providing hashing, fetch, and batched persistence.
///
/// All implementations must satisfy these invariants:
/// - `object_id` is a pure function: the same kind and bytes always yield the
///   same id, and its tag always matches `kind`.
/// - Objects are immutable once written. Writing an existing id is a no-op.
/// - `put_object_batch` either stores every item or reports
///   [`StoreError::PartialFailure`](crate::StoreError::PartialFailure).
/// - Retries, if any, are the implementation's concern.
#[async_trait]
pub trait Handle: Send + Sync {
    /// Compute the content address of canonical bytes of the given kind.
    fn object_id(&self, kind: ObjectKind, bytes: &[u8]) -> ObjectId;

    /// Fetch canonical bytes by id. `Ok(None)` if the id is unknown.
    async fn try_get_object(&self, id: &ObjectId) -> StoreResult<Option<Bytes>>;

    /// Persist an ordered batch of objects.
    async fn put_object_batch(&self, items: Vec<PutItem>) -> StoreResult<()>;

    /// Fetch canonical bytes by id, failing if absent.
    async fn get_object(&self, id: &ObjectId) -> StoreResult<Bytes> {
        self.try_get_object(id)
            .await?
            .ok_or_else(|| crate::StoreError::NotFound(id.clone()))
    }

    /// Check whether an object exists.
    async fn has_object(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.try_get_object(id).await?.is_some())
    }
}

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use arbor_types::{ObjectId, ObjectKind};
use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{StoreError, StoreResult};
use crate::hasher::hash_object;
use crate::traits::{Handle, PutItem};

/// In-memory, HashMap-based handle.
///
/// Intended for tests and embedding. Every batch submission is recorded so
/// callers can assert on how many round-trips a store operation made and in
/// which order objects arrived.
pub struct InMemoryHandle {
    objects: RwLock<HashMap<ObjectId, Bytes>>,
    batches: RwLock<Vec<Vec<ObjectId>>>,
}

impl InMemoryHandle {
    /// Create a new empty handle.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            batches: RwLock::new(Vec::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if the handle holds no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes across all stored objects.
    pub fn total_bytes(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Bytes::len)
            .sum()
    }

    /// Return a sorted list of all object ids.
    pub fn all_ids(&self) -> Vec<ObjectId> {
        let map = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<ObjectId> = map.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of `put_object_batch` calls received.
    pub fn batch_count(&self) -> usize {
        self.batches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// The ids of every submitted batch, in submission order.
    pub fn batches(&self) -> Vec<Vec<ObjectId>> {
        self.batches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove all objects and forget recorded batches.
    pub fn clear(&self) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.batches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for InMemoryHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handle for InMemoryHandle {
    fn object_id(&self, kind: ObjectKind, bytes: &[u8]) -> ObjectId {
        hash_object(kind, bytes)
    }

    async fn try_get_object(&self, id: &ObjectId) -> StoreResult<Option<Bytes>> {
        let map = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(id).cloned())
    }

    async fn put_object_batch(&self, items: Vec<PutItem>) -> StoreResult<()> {
        // Verify the whole batch before touching the map.
        for item in &items {
            let computed = hash_object(item.id.kind(), &item.bytes);
            if computed != item.id {
                return Err(StoreError::HashMismatch {
                    id: item.id.clone(),
                    computed,
                });
            }
        }
        let ids: Vec<ObjectId> = items.iter().map(|item| item.id.clone()).collect();
        {
            let mut map = self.objects.write().unwrap_or_else(PoisonError::into_inner);
            for item in items {
                map.entry(item.id).or_insert(item.bytes);
            }
        }
        tracing::debug!(count = ids.len(), "stored object batch in memory");
        self.batches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ids);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryHandle")
            .field("object_count", &self.len())
            .field("batch_count", &self.batch_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(handle: &InMemoryHandle, kind: ObjectKind, data: &'static [u8]) -> PutItem {
        PutItem::new(handle.object_id(kind, data), Bytes::from_static(data))
    }

    // -----------------------------------------------------------------------
    // Core put / get
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn put_and_get() {
        let handle = InMemoryHandle::new();
        let put = item(&handle, ObjectKind::Blob, b"{\"bytes\":\"aGk=\"}");
        let id = put.id.clone();
        handle.put_object_batch(vec![put]).await.unwrap();

        let bytes = handle.get_object(&id).await.unwrap();
        assert_eq!(&bytes[..], b"{\"bytes\":\"aGk=\"}");
        assert!(handle.has_object(&id).await.unwrap());
    }

    #[tokio::test]
    async fn missing_object() {
        let handle = InMemoryHandle::new();
        let id = handle.object_id(ObjectKind::File, b"nope");
        assert!(handle.try_get_object(&id).await.unwrap().is_none());
        assert!(matches!(
            handle.get_object(&id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Content-addressing correctness
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn duplicate_put_is_deduplicated() {
        let handle = InMemoryHandle::new();
        let a = item(&handle, ObjectKind::Blob, b"same");
        let b = item(&handle, ObjectKind::Blob, b"same");
        assert_eq!(a.id, b.id);
        handle.put_object_batch(vec![a]).await.unwrap();
        handle.put_object_batch(vec![b]).await.unwrap();
        assert_eq!(handle.len(), 1);
        assert_eq!(handle.batch_count(), 2);
    }

    #[tokio::test]
    async fn hash_mismatch_rejects_whole_batch() {
        let handle = InMemoryHandle::new();
        let good = item(&handle, ObjectKind::Blob, b"good");
        let bad = PutItem::new(handle.object_id(ObjectKind::Blob, b"x"), &b"y"[..]);
        let result = handle.put_object_batch(vec![good, bad]).await;
        assert!(matches!(result, Err(StoreError::HashMismatch { .. })));
        assert!(handle.is_empty());
        assert_eq!(handle.batch_count(), 0);
    }

    // -----------------------------------------------------------------------
    // Batch history
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn batches_record_order() {
        let handle = InMemoryHandle::new();
        let a = item(&handle, ObjectKind::Blob, b"a");
        let b = item(&handle, ObjectKind::File, b"b");
        let expected = vec![a.id.clone(), b.id.clone()];
        handle.put_object_batch(vec![a, b]).await.unwrap();
        assert_eq!(handle.batches(), vec![expected]);
        assert_eq!(handle.total_bytes(), 2);

        handle.clear();
        assert!(handle.is_empty());
        assert_eq!(handle.batch_count(), 0);
    }

    #[test]
    fn all_ids_is_sorted() {
        let handle = InMemoryHandle::new();
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(async {
            for data in [&b"c"[..], b"a", b"b"] {
                let id = handle.object_id(ObjectKind::Blob, data);
                handle
                    .put_object_batch(vec![PutItem::new(id, data.to_vec())])
                    .await
                    .unwrap();
            }
        });
        let ids = handle.all_ids();
        assert_eq!(ids.len(), 3);
        for w in ids.windows(2) {
            assert!(w[0] <= w[1]);
        }
    }

    #[test]
    fn debug_format() {
        let handle = InMemoryHandle::default();
        let debug = format!("{handle:?}");
        assert!(debug.contains("InMemoryHandle"));
        assert!(debug.contains("object_count"));
    }
}

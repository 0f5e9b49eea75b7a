use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use arbor_types::{ObjectId, ObjectKind};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::{StoreError, StoreResult};
use crate::hasher::hash_object;
use crate::traits::{Handle, PutItem};

const OBJECTS_DIR: &str = "objects";
const TMP_DIR: &str = "tmp";

/// Configuration for [`FsHandle`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FsHandleConfig {
    /// Directory holding `objects/` and `tmp/`.
    pub root: PathBuf,
    /// Call `fsync` on every object file before it is renamed into place.
    pub fsync: bool,
}

impl Default for FsHandleConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".arbor"),
            fsync: false,
        }
    }
}

/// Directory-backed handle: one file per object at `<root>/objects/<id>`.
///
/// Writes go to `<root>/tmp/` first and are renamed into place, so a reader
/// never observes a half-written object.
#[derive(Debug)]
pub struct FsHandle {
    config: FsHandleConfig,
    /// Makes temp names unique among concurrent writers in this process.
    next_tmp: AtomicU64,
}

impl FsHandle {
    /// Open (creating if needed) a store rooted at `config.root`.
    ///
    /// Leftover temp files from an interrupted batch are removed.
    pub async fn open(config: FsHandleConfig) -> StoreResult<Self> {
        tokio::fs::create_dir_all(config.root.join(OBJECTS_DIR)).await?;
        let tmp = config.root.join(TMP_DIR);
        tokio::fs::create_dir_all(&tmp).await?;
        let mut entries = tokio::fs::read_dir(&tmp).await?;
        while let Some(entry) = entries.next_entry().await? {
            tracing::warn!(path = %entry.path().display(), "removing stale temp file");
            tokio::fs::remove_file(entry.path()).await?;
        }
        tracing::debug!(root = %config.root.display(), "opened fs handle");
        Ok(Self {
            config,
            next_tmp: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        self.config.root.join(OBJECTS_DIR).join(id.as_str())
    }

    fn tmp_path(&self, id: &ObjectId) -> PathBuf {
        let seq = self.next_tmp.fetch_add(1, Ordering::Relaxed);
        self.config
            .root
            .join(TMP_DIR)
            .join(format!("{}.{}.{seq}", id.as_str(), std::process::id()))
    }

    async fn put_one(&self, item: &PutItem) -> StoreResult<()> {
        let path = self.object_path(&item.id);
        if tokio::fs::try_exists(&path).await? {
            return Ok(());
        }
        let tmp = self.tmp_path(&item.id);
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&item.bytes).await?;
        if self.config.fsync {
            file.sync_all().await?;
        }
        drop(file);
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl Handle for FsHandle {
    fn object_id(&self, kind: ObjectKind, bytes: &[u8]) -> ObjectId {
        hash_object(kind, bytes)
    }

    async fn try_get_object(&self, id: &ObjectId) -> StoreResult<Option<Bytes>> {
        let data = match tokio::fs::read(self.object_path(id)).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if hash_object(id.kind(), &data) != *id {
            return Err(StoreError::CorruptObject {
                id: id.clone(),
                reason: "content does not hash to its id".to_string(),
            });
        }
        Ok(Some(Bytes::from(data)))
    }

    async fn put_object_batch(&self, items: Vec<PutItem>) -> StoreResult<()> {
        for item in &items {
            let computed = hash_object(item.id.kind(), &item.bytes);
            if computed != item.id {
                return Err(StoreError::HashMismatch {
                    id: item.id.clone(),
                    computed,
                });
            }
        }
        let total = items.len();
        for (stored, item) in items.iter().enumerate() {
            if let Err(e) = self.put_one(item).await {
                return Err(StoreError::PartialFailure {
                    stored,
                    total,
                    reason: e.to_string(),
                });
            }
        }
        tracing::debug!(count = total, root = %self.config.root.display(), "stored object batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_temp() -> (tempfile::TempDir, FsHandle) {
        let dir = tempfile::tempdir().unwrap();
        let handle = FsHandle::open(FsHandleConfig {
            root: dir.path().to_path_buf(),
            fsync: true,
        })
        .await
        .unwrap();
        (dir, handle)
    }

    #[test]
    fn default_config() {
        let c = FsHandleConfig::default();
        assert_eq!(c.root, PathBuf::from(".arbor"));
        assert!(!c.fsync);
    }

    #[tokio::test]
    async fn put_and_get_roundtrip() {
        let (_dir, handle) = open_temp().await;
        let id = handle.object_id(ObjectKind::Directory, b"{\"entries\":{}}");
        handle
            .put_object_batch(vec![PutItem::new(id.clone(), &b"{\"entries\":{}}"[..])])
            .await
            .unwrap();
        let bytes = handle.get_object(&id).await.unwrap();
        assert_eq!(&bytes[..], b"{\"entries\":{}}");
        assert!(handle.root().join("objects").join(id.as_str()).exists());
    }

    #[tokio::test]
    async fn concurrent_writes_of_one_object_both_succeed() {
        let (_dir, handle) = open_temp().await;
        let id = handle.object_id(ObjectKind::Blob, b"shared");
        for _ in 0..8 {
            let (a, b) = tokio::join!(
                handle.put_object_batch(vec![PutItem::new(id.clone(), &b"shared"[..])]),
                handle.put_object_batch(vec![PutItem::new(id.clone(), &b"shared"[..])]),
            );
            a.unwrap();
            b.unwrap();
        }
        assert_eq!(&handle.get_object(&id).await.unwrap()[..], b"shared");
        assert_ne!(handle.tmp_path(&id), handle.tmp_path(&id));
    }

    #[tokio::test]
    async fn missing_is_none() {
        let (_dir, handle) = open_temp().await;
        let id = handle.object_id(ObjectKind::Blob, b"absent");
        assert!(handle.try_get_object(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rewrite_is_noop() {
        let (_dir, handle) = open_temp().await;
        let id = handle.object_id(ObjectKind::Blob, b"x");
        for _ in 0..2 {
            handle
                .put_object_batch(vec![PutItem::new(id.clone(), &b"x"[..])])
                .await
                .unwrap();
        }
        assert!(handle.has_object(&id).await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let (_dir, handle) = open_temp().await;
        let id = handle.object_id(ObjectKind::Blob, b"x");
        handle
            .put_object_batch(vec![PutItem::new(id.clone(), &b"x"[..])])
            .await
            .unwrap();
        std::fs::write(handle.object_path(&id), b"y").unwrap();
        assert!(matches!(
            handle.try_get_object(&id).await,
            Err(StoreError::CorruptObject { .. })
        ));
    }

    #[tokio::test]
    async fn open_removes_stale_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("tmp")).unwrap();
        std::fs::write(dir.path().join("tmp").join("leftover"), b"junk").unwrap();
        let config = FsHandleConfig {
            root: dir.path().to_path_buf(),
            fsync: false,
        };
        FsHandle::open(config).await.unwrap();
        assert!(!dir.path().join("tmp").join("leftover").exists());
    }

    #[tokio::test]
    async fn mismatched_item_rejected() {
        let (_dir, handle) = open_temp().await;
        let id = handle.object_id(ObjectKind::Blob, b"x");
        let result = handle
            .put_object_batch(vec![PutItem::new(id.clone(), &b"z"[..])])
            .await;
        assert!(matches!(result, Err(StoreError::HashMismatch { .. })));
        assert!(!handle.has_object(&id).await.unwrap());
    }
}

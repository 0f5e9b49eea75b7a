use arbor_store::Handle;
use arbor_types::{ObjectId, ObjectKind};
use bytes::{Bytes, BytesMut};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::codec::{decode_base64, encode_base64};
use crate::error::ObjectResult;
use crate::handle::{ObjectBody, ObjectHandle};
use crate::object::Object;

/// Raw bytes, or an ordered list of child blobs.
pub type Blob = ObjectHandle<BlobBody>;

#[derive(Clone, Debug, PartialEq)]
pub enum BlobBody {
    Leaf(Bytes),
    Branch(Vec<BlobChild>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlobChild {
    pub blob: Blob,
    pub length: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlobData {
    Leaf { bytes: String },
    Branch { children: Vec<BlobChildData> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlobChildData {
    pub blob: ObjectId,
    pub length: u64,
}

/// One input to [`Blob::new`].
#[derive(Clone, Debug)]
pub enum BlobArg {
    Bytes(Bytes),
    Blob(Blob),
}

impl From<&str> for BlobArg {
    fn from(value: &str) -> Self {
        Self::Bytes(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<String> for BlobArg {
    fn from(value: String) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<Vec<u8>> for BlobArg {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for BlobArg {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Blob> for BlobArg {
    fn from(value: Blob) -> Self {
        Self::Blob(value)
    }
}

impl ObjectBody for BlobBody {
    const KIND: ObjectKind = ObjectKind::Blob;
    type Data = BlobData;

    fn to_data(&self) -> ObjectResult<BlobData> {
        Ok(match self {
            Self::Leaf(bytes) => BlobData::Leaf {
                bytes: encode_base64(bytes),
            },
            Self::Branch(children) => BlobData::Branch {
                children: children
                    .iter()
                    .map(|child| {
                        Ok(BlobChildData {
                            blob: child.blob.require_id()?,
                            length: child.length,
                        })
                    })
                    .collect::<ObjectResult<_>>()?,
            },
        })
    }

    fn from_data(data: BlobData) -> ObjectResult<Self> {
        Ok(match data {
            BlobData::Leaf { bytes } => Self::Leaf(decode_base64(&bytes)?),
            BlobData::Branch { children } => Self::Branch(
                children
                    .into_iter()
                    .map(|child| {
                        Ok(BlobChild {
                            blob: Blob::with_id(child.blob)?,
                            length: child.length,
                        })
                    })
                    .collect::<ObjectResult<_>>()?,
            ),
        })
    }

    fn children(&self) -> Vec<Object> {
        match self {
            Self::Leaf(_) => Vec::new(),
            Self::Branch(children) => children
                .iter()
                .map(|child| Object::Blob(child.blob.clone()))
                .collect(),
        }
    }

    fn into_object(handle: Blob) -> Object {
        Object::Blob(handle)
    }
}

impl Blob {
    pub fn leaf(bytes: impl Into<Bytes>) -> Self {
        Self::with_body(BlobBody::Leaf(bytes.into()))
    }

    pub fn branch(children: Vec<BlobChild>) -> Self {
        Self::with_body(BlobBody::Branch(children))
    }

    /// Concatenate the arguments.
    ///
    /// No arguments yield an empty leaf; a single argument yields that blob
    /// itself rather than a one-child branch.
    pub async fn new(args: Vec<BlobArg>, handle: &dyn Handle) -> ObjectResult<Self> {
        let mut children = Vec::with_capacity(args.len());
        for arg in args {
            let child = match arg {
                BlobArg::Bytes(bytes) => BlobChild {
                    length: bytes.len() as u64,
                    blob: Self::leaf(bytes),
                },
                BlobArg::Blob(blob) => BlobChild {
                    length: blob.length(handle).await?,
                    blob,
                },
            };
            children.push(child);
        }
        Ok(match children.len() {
            0 => Self::leaf(Bytes::new()),
            1 => children.remove(0).blob,
            _ => Self::branch(children),
        })
    }

    /// Total length in bytes.
    pub async fn length(&self, handle: &dyn Handle) -> ObjectResult<u64> {
        Ok(match &*self.load(handle).await? {
            BlobBody::Leaf(bytes) => bytes.len() as u64,
            BlobBody::Branch(children) => children.iter().map(|child| child.length).sum(),
        })
    }

    /// The full contents, loading branch children through `handle`.
    pub fn bytes<'a>(&'a self, handle: &'a dyn Handle) -> BoxFuture<'a, ObjectResult<Bytes>> {
        async move {
            let body = self.load(handle).await?;
            match &*body {
                BlobBody::Leaf(bytes) => Ok(bytes.clone()),
                BlobBody::Branch(children) => {
                    let mut out = BytesMut::new();
                    for child in children {
                        out.extend_from_slice(&child.blob.bytes(handle).await?);
                    }
                    Ok(out.freeze())
                }
            }
        }
        .boxed()
    }

    pub async fn text(&self, handle: &dyn Handle) -> ObjectResult<String> {
        let bytes = self.bytes(handle).await?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ObjectError;
    use arbor_store::InMemoryHandle;

    #[tokio::test]
    async fn new_degenerates_single_child() {
        let handle = InMemoryHandle::new();
        let leaf = Blob::leaf("abc");
        let blob = Blob::new(vec![leaf.clone().into()], &handle).await.unwrap();
        assert_eq!(blob, leaf);
    }

    #[tokio::test]
    async fn new_empty_is_empty_leaf() {
        let handle = InMemoryHandle::new();
        let blob = Blob::new(Vec::new(), &handle).await.unwrap();
        assert_eq!(blob.length(&handle).await.unwrap(), 0);
        assert!(matches!(&*blob.body().unwrap(), BlobBody::Leaf(b) if b.is_empty()));
    }

    #[tokio::test]
    async fn branch_length_and_bytes() {
        let handle = InMemoryHandle::new();
        let blob = Blob::new(vec!["hello, ".into(), "world".into()], &handle)
            .await
            .unwrap();
        assert_eq!(blob.length(&handle).await.unwrap(), 12);
        assert_eq!(blob.text(&handle).await.unwrap(), "hello, world");
        assert_eq!(blob.body().unwrap().children().len(), 2);
    }

    #[tokio::test]
    async fn stored_branch_reloads() {
        let handle = InMemoryHandle::new();
        let blob = Blob::new(vec!["ab".into(), vec![0xffu8].into()], &handle)
            .await
            .unwrap();
        let id = blob.store(&handle).await.unwrap();

        let fresh = Blob::with_id(id).unwrap();
        assert_eq!(&fresh.bytes(&handle).await.unwrap()[..], b"ab\xff");
        assert!(matches!(
            fresh.text(&handle).await,
            Err(ObjectError::Utf8(_))
        ));
    }

    #[test]
    fn leaf_data_is_base64() {
        let data = BlobBody::Leaf(Bytes::from_static(b"hi")).to_data().unwrap();
        assert_eq!(serde_json::to_string(&data).unwrap(), r#"{"bytes":"aGk="}"#);
    }

    #[test]
    fn branch_encoding_needs_child_ids() {
        let body = BlobBody::Branch(vec![BlobChild {
            blob: Blob::leaf("x"),
            length: 1,
        }]);
        assert!(matches!(
            body.to_data(),
            Err(ObjectError::MissingChildId {
                kind: ObjectKind::Blob
            })
        ));
    }

    #[test]
    fn decode_rehydrates_id_only_children() {
        let child = ObjectId::from_digest(ObjectKind::Blob, &[7; 32]);
        let json = format!(r#"{{"children":[{{"blob":"{child}","length":3}}]}}"#);
        let data: BlobData = serde_json::from_str(&json).unwrap();
        let body = BlobBody::from_data(data.clone()).unwrap();
        let BlobBody::Branch(children) = &body else {
            panic!("expected a branch");
        };
        assert_eq!(children[0].blob.try_id(), Some(child));
        assert!(children[0].blob.body().is_none());
        assert_eq!(body.to_data().unwrap(), data);
    }
}

use std::collections::BTreeMap;

use arbor_store::Handle;
use arbor_types::{ObjectId, ObjectKind};
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::blob::Blob;
use crate::error::{ObjectError, ObjectResult};
use crate::file::File;
use crate::graph::{GraphRef, GraphRefData};
use crate::handle::{ObjectBody, ObjectHandle};
use crate::object::{Artifact, Object};
use crate::path::{components, validate_name, Component};
use crate::symlink::Symlink;

/// A mapping from entry names to artifacts.
pub type Directory = ObjectHandle<DirectoryBody>;

#[derive(Clone, Debug, PartialEq)]
pub enum DirectoryBody {
    /// A view of a directory node inside a graph.
    Graph(GraphRef),
    Node {
        entries: BTreeMap<String, Artifact>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DirectoryData {
    Graph(GraphRefData),
    Node {
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        entries: BTreeMap<String, ObjectId>,
    },
}

impl ObjectBody for DirectoryBody {
    const KIND: ObjectKind = ObjectKind::Directory;
    type Data = DirectoryData;

    fn to_data(&self) -> ObjectResult<DirectoryData> {
        Ok(match self {
            Self::Graph(reference) => DirectoryData::Graph(reference.to_data()?),
            Self::Node { entries } => DirectoryData::Node {
                entries: entries
                    .iter()
                    .map(|(name, artifact)| Ok((name.clone(), artifact.require_id()?)))
                    .collect::<ObjectResult<_>>()?,
            },
        })
    }

    fn from_data(data: DirectoryData) -> ObjectResult<Self> {
        Ok(match data {
            DirectoryData::Graph(reference) => Self::Graph(GraphRef::from_data(reference)?),
            DirectoryData::Node { entries } => Self::Node {
                entries: entries
                    .into_iter()
                    .map(|(name, id)| {
                        validate_name(&name)?;
                        Ok((name, Artifact::with_id(id)?))
                    })
                    .collect::<ObjectResult<_>>()?,
            },
        })
    }

    fn children(&self) -> Vec<Object> {
        match self {
            Self::Graph(reference) => vec![reference.child()],
            Self::Node { entries } => entries.values().cloned().map(Object::from).collect(),
        }
    }

    fn into_object(handle: Directory) -> Object {
        Object::Directory(handle)
    }
}

/// One input to [`Directory::new`].
#[derive(Clone, Debug)]
pub enum DirectoryArg {
    /// Merge all entries of an existing directory.
    Directory(Directory),
    /// Path-keyed entries; `None` removes the entry.
    Entries(BTreeMap<String, Option<EntryArg>>),
}

/// The value placed at a path by [`DirectoryArg::Entries`].
#[derive(Clone, Debug)]
pub enum EntryArg {
    /// Becomes a non-executable file.
    Bytes(Bytes),
    /// Becomes a non-executable file.
    Blob(Blob),
    Artifact(Artifact),
    /// A nested directory built from these entries.
    Entries(BTreeMap<String, Option<EntryArg>>),
}

impl From<Directory> for DirectoryArg {
    fn from(value: Directory) -> Self {
        Self::Directory(value)
    }
}

impl From<&str> for EntryArg {
    fn from(value: &str) -> Self {
        Self::Bytes(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<String> for EntryArg {
    fn from(value: String) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<Blob> for EntryArg {
    fn from(value: Blob) -> Self {
        Self::Blob(value)
    }
}

macro_rules! entry_from_artifact {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for EntryArg {
                fn from(value: $ty) -> Self {
                    Self::Artifact(value.into())
                }
            }
        )*
    };
}

entry_from_artifact!(Artifact, Directory, File, Symlink);

impl Directory {
    /// A directory with these entries. Every name must be a single normal
    /// path component.
    pub fn with_entries(entries: BTreeMap<String, Artifact>) -> ObjectResult<Self> {
        for name in entries.keys() {
            validate_name(name)?;
        }
        Ok(Self::with_body(DirectoryBody::Node { entries }))
    }

    pub fn with_graph(reference: GraphRef) -> Self {
        Self::with_body(DirectoryBody::Graph(reference))
    }

    /// Build a directory by folding `args` left to right.
    ///
    /// Entries from a prior directory replace same-named entries, except
    /// that two directories under one name are merged recursively. A path
    /// key such as `"a/b/c"` creates or extends the intermediate
    /// directories.
    pub fn new<'a>(
        args: Vec<DirectoryArg>,
        handle: &'a dyn Handle,
    ) -> BoxFuture<'a, ObjectResult<Self>> {
        async move {
            let mut entries: BTreeMap<String, Artifact> = BTreeMap::new();
            for arg in args {
                match arg {
                    DirectoryArg::Directory(directory) => {
                        for (name, entry) in directory.entries(handle).await? {
                            let existing = entries.get(&name).cloned();
                            let entry = match (existing, entry) {
                                (Some(Artifact::Directory(existing)), Artifact::Directory(incoming)) => {
                                    let merged =
                                        Self::new(vec![existing.into(), incoming.into()], handle)
                                            .await?;
                                    Artifact::Directory(merged)
                                }
                                (_, entry) => entry,
                            };
                            entries.insert(name, entry);
                        }
                    }
                    DirectoryArg::Entries(map) => {
                        for (key, value) in map {
                            insert_path(&mut entries, &key, value, handle).await?;
                        }
                    }
                }
            }
            Self::with_entries(entries)
        }
        .boxed()
    }

    /// All entries. Entries of a graph view are resolved against the graph.
    pub async fn entries(&self, handle: &dyn Handle) -> ObjectResult<BTreeMap<String, Artifact>> {
        match &*self.load(handle).await? {
            DirectoryBody::Node { entries } => Ok(entries.clone()),
            DirectoryBody::Graph(reference) => {
                let node = reference.directory_node(handle).await?;
                Ok(node
                    .entries
                    .iter()
                    .map(|(name, edge)| (name.clone(), reference.artifact(edge)))
                    .collect())
            }
        }
    }

    /// The entry named `name`, without any path interpretation.
    pub async fn try_get_entry(
        &self,
        name: &str,
        handle: &dyn Handle,
    ) -> ObjectResult<Option<Artifact>> {
        match &*self.load(handle).await? {
            DirectoryBody::Node { entries } => Ok(entries.get(name).cloned()),
            DirectoryBody::Graph(reference) => {
                let node = reference.directory_node(handle).await?;
                Ok(node.entries.get(name).map(|edge| reference.artifact(edge)))
            }
        }
    }
}

async fn insert_path(
    entries: &mut BTreeMap<String, Artifact>,
    key: &str,
    value: Option<EntryArg>,
    handle: &dyn Handle,
) -> ObjectResult<()> {
    let invalid = |reason: &str| ObjectError::InvalidPath {
        path: key.to_string(),
        reason: reason.to_string(),
    };
    let parts = components(key);
    let Some((first, rest)) = parts.split_first() else {
        return Err(invalid("the path must have at least one component"));
    };
    let Component::Normal(name) = first else {
        return Err(invalid("all path components must be normal"));
    };
    validate_name(name)?;
    let existing = match entries.get(name) {
        Some(Artifact::Directory(directory)) => Some(directory.clone()),
        _ => None,
    };
    let mut base: Vec<DirectoryArg> = existing.into_iter().map(DirectoryArg::Directory).collect();

    if !rest.is_empty() {
        let trailing = rest
            .iter()
            .map(Component::to_string)
            .collect::<Vec<_>>()
            .join("/");
        base.push(DirectoryArg::Entries(BTreeMap::from([(trailing, value)])));
        let directory = Directory::new(base, handle).await?;
        entries.insert(name.clone(), directory.into());
        return Ok(());
    }

    let entry: Artifact = match value {
        None => {
            entries.remove(name);
            return Ok(());
        }
        Some(EntryArg::Bytes(bytes)) => File::with_contents(Blob::leaf(bytes), false).into(),
        Some(EntryArg::Blob(blob)) => File::with_contents(blob, false).into(),
        Some(EntryArg::Artifact(Artifact::Directory(directory))) if !base.is_empty() => {
            base.push(DirectoryArg::Directory(directory));
            Directory::new(base, handle).await?.into()
        }
        Some(EntryArg::Artifact(artifact)) => artifact,
        Some(EntryArg::Entries(map)) => {
            base.push(DirectoryArg::Entries(map));
            Directory::new(base, handle).await?.into()
        }
    };
    entries.insert(name.clone(), entry);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_store::InMemoryHandle;

    fn entries(items: Vec<(&str, Option<EntryArg>)>) -> DirectoryArg {
        DirectoryArg::Entries(
            items
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        )
    }

    async fn names(directory: &Directory, handle: &dyn Handle) -> Vec<String> {
        directory
            .entries(handle)
            .await
            .unwrap()
            .into_keys()
            .collect()
    }

    #[test]
    fn with_entries_validates_names() {
        let file: Artifact = File::with_contents(Blob::leaf("x"), false).into();
        for bad in ["", ".", "..", "a/b"] {
            let result = Directory::with_entries(BTreeMap::from([(bad.to_string(), file.clone())]));
            assert!(matches!(result, Err(ObjectError::InvalidName { .. })), "{bad:?}");
        }
    }

    #[tokio::test]
    async fn new_creates_intermediate_directories() {
        let handle = InMemoryHandle::new();
        let root = Directory::new(vec![entries(vec![("a/b/c.txt", Some("hi".into()))])], &handle)
            .await
            .unwrap();
        let a = root.try_get_entry("a", &handle).await.unwrap().unwrap();
        let Artifact::Directory(a) = a else {
            panic!("expected a directory");
        };
        assert_eq!(names(&a, &handle).await, vec!["b"]);
    }

    #[tokio::test]
    async fn new_merges_directories_recursively() {
        let handle = InMemoryHandle::new();
        let left = Directory::new(vec![entries(vec![("sub/x", Some("1".into()))])], &handle)
            .await
            .unwrap();
        let right = Directory::new(vec![entries(vec![("sub/y", Some("2".into()))])], &handle)
            .await
            .unwrap();
        let merged = Directory::new(vec![left.into(), right.into()], &handle)
            .await
            .unwrap();
        let Some(Artifact::Directory(sub)) = merged.try_get_entry("sub", &handle).await.unwrap()
        else {
            panic!("expected a directory");
        };
        assert_eq!(names(&sub, &handle).await, vec!["x", "y"]);
    }

    #[tokio::test]
    async fn none_removes_entry() {
        let handle = InMemoryHandle::new();
        let base = Directory::new(
            vec![entries(vec![("keep", Some("k".into())), ("drop", Some("d".into()))])],
            &handle,
        )
        .await
        .unwrap();
        let result = Directory::new(vec![base.into(), entries(vec![("drop", None)])], &handle)
            .await
            .unwrap();
        assert_eq!(names(&result, &handle).await, vec!["keep"]);
    }

    #[tokio::test]
    async fn new_rejects_non_normal_first_component() {
        let handle = InMemoryHandle::new();
        for key in ["../x", "/x", ""] {
            let result = Directory::new(vec![entries(vec![(key, Some("x".into()))])], &handle).await;
            assert!(matches!(result, Err(ObjectError::InvalidPath { .. })), "{key:?}");
        }
    }

    #[tokio::test]
    async fn bytes_become_plain_files() {
        let handle = InMemoryHandle::new();
        let root = Directory::new(vec![entries(vec![("f", Some("body".into()))])], &handle)
            .await
            .unwrap();
        let Some(Artifact::File(file)) = root.try_get_entry("f", &handle).await.unwrap() else {
            panic!("expected a file");
        };
        assert!(!file.executable(&handle).await.unwrap());
        assert_eq!(file.text(&handle).await.unwrap(), "body");
    }

    #[tokio::test]
    async fn stored_directory_roundtrips() {
        let handle = InMemoryHandle::new();
        let root = Directory::new(vec![entries(vec![("a/b", Some("x".into()))])], &handle)
            .await
            .unwrap();
        let id = root.store(&handle).await.unwrap();

        let fresh = Directory::with_id(id.clone()).unwrap();
        assert_eq!(names(&fresh, &handle).await, vec!["a"]);
        let body = fresh.body().unwrap();
        assert!(body.children().iter().all(Object::is_stored));
        assert_eq!(fresh.id(&handle).unwrap(), id);
    }

    #[test]
    fn empty_directory_data_is_empty_map() {
        let body = DirectoryBody::Node {
            entries: BTreeMap::new(),
        };
        let json = serde_json::to_string(&body.to_data().unwrap()).unwrap();
        assert_eq!(json, "{}");
        let data: DirectoryData = serde_json::from_str(&json).unwrap();
        assert_eq!(DirectoryBody::from_data(data).unwrap(), body);
    }
}

use std::collections::BTreeMap;

use arbor_store::Handle;
use arbor_types::{ObjectId, ObjectKind};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::blob::Blob;
use crate::codec::is_false;
use crate::error::ObjectResult;
use crate::graph::{GraphRef, GraphRefData};
use crate::handle::{ObjectBody, ObjectHandle};
use crate::object::Object;
use crate::referent::{Referent, ReferentData};

/// Contents plus dependencies and an executable flag.
pub type File = ObjectHandle<FileBody>;

/// A resolved file dependency: an optional object plus provenance.
pub type FileDependency = Referent<Option<Object>>;

#[derive(Clone, Debug, PartialEq)]
pub enum FileBody {
    /// A view of a file node inside a graph.
    Graph(GraphRef),
    Node {
        contents: Blob,
        dependencies: BTreeMap<String, Option<FileDependency>>,
        executable: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileData {
    Graph(GraphRefData),
    Node {
        contents: ObjectId,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        dependencies: BTreeMap<String, Option<ReferentData<Option<ObjectId>>>>,
        #[serde(default, skip_serializing_if = "is_false")]
        executable: bool,
    },
}

fn dependency_to_data(
    dependency: &FileDependency,
) -> ObjectResult<ReferentData<Option<ObjectId>>> {
    Ok(ReferentData::Map {
        item: dependency
            .item
            .as_ref()
            .map(Object::require_id)
            .transpose()?,
        options: dependency.options.clone(),
    })
}

fn dependency_from_data(data: ReferentData<Option<ObjectId>>) -> ObjectResult<FileDependency> {
    match data {
        ReferentData::String(string) => Referent::from_data_string_with(&string, |item| {
            if item.is_empty() {
                Ok(None)
            } else {
                Ok(Some(Object::parse(item)?))
            }
        }),
        ReferentData::Map { item, options } => {
            Ok(Referent::with_options(item.map(Object::with_id), options))
        }
    }
}

impl ObjectBody for FileBody {
    const KIND: ObjectKind = ObjectKind::File;
    type Data = FileData;

    fn to_data(&self) -> ObjectResult<FileData> {
        Ok(match self {
            Self::Graph(reference) => FileData::Graph(reference.to_data()?),
            Self::Node {
                contents,
                dependencies,
                executable,
            } => FileData::Node {
                contents: contents.require_id()?,
                dependencies: dependencies
                    .iter()
                    .map(|(reference, dependency)| {
                        let data = dependency.as_ref().map(dependency_to_data).transpose()?;
                        Ok((reference.clone(), data))
                    })
                    .collect::<ObjectResult<_>>()?,
                executable: *executable,
            },
        })
    }

    fn from_data(data: FileData) -> ObjectResult<Self> {
        Ok(match data {
            FileData::Graph(reference) => Self::Graph(GraphRef::from_data(reference)?),
            FileData::Node {
                contents,
                dependencies,
                executable,
            } => Self::Node {
                contents: Blob::with_id(contents)?,
                dependencies: dependencies
                    .into_iter()
                    .map(|(reference, dependency)| {
                        Ok((reference, dependency.map(dependency_from_data).transpose()?))
                    })
                    .collect::<ObjectResult<_>>()?,
                executable,
            },
        })
    }

    fn children(&self) -> Vec<Object> {
        match self {
            Self::Graph(reference) => vec![reference.child()],
            Self::Node {
                contents,
                dependencies,
                ..
            } => {
                let mut children = vec![Object::Blob(contents.clone())];
                children.extend(
                    dependencies
                        .values()
                        .flatten()
                        .filter_map(|dependency| dependency.item.clone()),
                );
                children
            }
        }
    }

    fn into_object(handle: File) -> Object {
        Object::File(handle)
    }
}

impl File {
    pub fn with_contents(contents: Blob, executable: bool) -> Self {
        Self::with_dependencies(contents, BTreeMap::new(), executable)
    }

    pub fn with_dependencies(
        contents: Blob,
        dependencies: BTreeMap<String, Option<FileDependency>>,
        executable: bool,
    ) -> Self {
        Self::with_body(FileBody::Node {
            contents,
            dependencies,
            executable,
        })
    }

    pub fn with_graph(reference: GraphRef) -> Self {
        Self::with_body(FileBody::Graph(reference))
    }

    pub async fn contents(&self, handle: &dyn Handle) -> ObjectResult<Blob> {
        match &*self.load(handle).await? {
            FileBody::Node { contents, .. } => Ok(contents.clone()),
            FileBody::Graph(reference) => Ok(reference.file_node(handle).await?.contents),
        }
    }

    pub async fn executable(&self, handle: &dyn Handle) -> ObjectResult<bool> {
        match &*self.load(handle).await? {
            FileBody::Node { executable, .. } => Ok(*executable),
            FileBody::Graph(reference) => Ok(reference.file_node(handle).await?.executable),
        }
    }

    /// Dependencies by reference. Pointers in a graph view are resolved
    /// to view artifacts of the owning graph.
    pub async fn dependencies(
        &self,
        handle: &dyn Handle,
    ) -> ObjectResult<BTreeMap<String, Option<FileDependency>>> {
        match &*self.load(handle).await? {
            FileBody::Node { dependencies, .. } => Ok(dependencies.clone()),
            FileBody::Graph(reference) => {
                let node = reference.file_node(handle).await?;
                Ok(node
                    .dependencies
                    .into_iter()
                    .map(|(name, dependency)| {
                        let dependency = dependency.map(|d| {
                            d.map(|item| item.map(|edge| reference.object(&edge)))
                        });
                        (name, dependency)
                    })
                    .collect())
            }
        }
    }

    /// Every dependency that carries an item.
    pub async fn dependency_objects(&self, handle: &dyn Handle) -> ObjectResult<Vec<Object>> {
        Ok(self
            .dependencies(handle)
            .await?
            .into_values()
            .flatten()
            .filter_map(|dependency| dependency.item)
            .collect())
    }

    pub async fn length(&self, handle: &dyn Handle) -> ObjectResult<u64> {
        self.contents(handle).await?.length(handle).await
    }

    pub async fn bytes(&self, handle: &dyn Handle) -> ObjectResult<Bytes> {
        self.contents(handle).await?.bytes(handle).await
    }

    pub async fn text(&self, handle: &dyn Handle) -> ObjectResult<String> {
        self.contents(handle).await?.text(handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::referent::ReferentOptions;
    use arbor_store::InMemoryHandle;

    fn dependency(item: Option<Object>, tag: &str) -> Option<FileDependency> {
        Some(Referent::with_options(
            item,
            ReferentOptions {
                tag: Some(tag.to_string()),
                ..Default::default()
            },
        ))
    }

    #[tokio::test]
    async fn accessors_read_node_body() {
        let handle = InMemoryHandle::new();
        let file = File::with_contents(Blob::leaf("#!/bin/sh\n"), true);
        assert!(file.executable(&handle).await.unwrap());
        assert_eq!(file.length(&handle).await.unwrap(), 10);
        assert_eq!(file.text(&handle).await.unwrap(), "#!/bin/sh\n");
        assert!(file.dependencies(&handle).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dependencies_are_children() {
        let handle = InMemoryHandle::new();
        let lib = File::with_contents(Blob::leaf("lib"), false);
        let file = File::with_dependencies(
            Blob::leaf("main"),
            BTreeMap::from([
                ("./lib".to_string(), dependency(Some(lib.clone().into()), "lib")),
                ("missing".to_string(), None),
                ("tag-only".to_string(), dependency(None, "x")),
            ]),
            false,
        );
        let children = file.children(&handle).await.unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[1], Object::File(lib.clone()));
        assert_eq!(
            file.dependency_objects(&handle).await.unwrap(),
            vec![Object::File(lib)]
        );
    }

    #[tokio::test]
    async fn dependency_map_form_roundtrips_through_store() {
        let handle = InMemoryHandle::new();
        let lib = File::with_contents(Blob::leaf("lib"), false);
        let file = File::with_dependencies(
            Blob::leaf("main"),
            BTreeMap::from([("lib".to_string(), dependency(Some(lib.into()), "a/b"))]),
            false,
        );
        let id = file.store(&handle).await.unwrap();
        let bytes = arbor_store::Handle::get_object(&handle, &id).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["dependencies"]["lib"]["options"]["tag"], "a/b");
        assert!(json.get("executable").is_none());

        let fresh = File::with_id(id).unwrap();
        let dependencies = fresh.dependencies(&handle).await.unwrap();
        let lib = dependencies["lib"].as_ref().unwrap();
        assert!(lib.item.as_ref().unwrap().is_stored());
        assert_eq!(lib.options.tag.as_deref(), Some("a/b"));
    }

    #[test]
    fn dependency_string_form_is_accepted() {
        let lib = ObjectId::from_digest(ObjectKind::File, &[3; 32]);
        let contents = ObjectId::from_digest(ObjectKind::Blob, &[4; 32]);
        let json = format!(
            r#"{{"contents":"{contents}","dependencies":{{"lib":"{lib}?tag=x"}},"executable":true}}"#
        );
        let data: FileData = serde_json::from_str(&json).unwrap();
        let FileBody::Node {
            dependencies,
            executable,
            ..
        } = FileBody::from_data(data).unwrap()
        else {
            panic!("expected a node body");
        };
        assert!(executable);
        let lib_dependency = dependencies["lib"].as_ref().unwrap();
        assert_eq!(lib_dependency.item, Some(Object::with_id(lib)));
        assert_eq!(lib_dependency.options.tag.as_deref(), Some("x"));
    }
}

use arbor_store::Handle;
use arbor_types::{ObjectId, ObjectKind};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::error::{ObjectError, ObjectResult};
use crate::graph::{GraphRef, GraphRefData};
use crate::handle::{ObjectBody, ObjectHandle};
use crate::object::{Artifact, Object};
use crate::template::{Template, TemplateComponent};

/// An artifact, a path, or an artifact followed by a path inside it.
pub type Symlink = ObjectHandle<SymlinkBody>;

#[derive(Clone, Debug, PartialEq)]
pub enum SymlinkBody {
    /// A view of a symlink node inside a graph.
    Graph(GraphRef),
    Node {
        artifact: Option<Artifact>,
        path: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SymlinkData {
    Graph(GraphRefData),
    Node {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        artifact: Option<ObjectId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
}

fn invalid(reason: &str) -> ObjectError {
    ObjectError::InvalidSymlink {
        reason: reason.to_string(),
    }
}

impl ObjectBody for SymlinkBody {
    const KIND: ObjectKind = ObjectKind::Symlink;
    type Data = SymlinkData;

    fn to_data(&self) -> ObjectResult<SymlinkData> {
        Ok(match self {
            Self::Graph(reference) => SymlinkData::Graph(reference.to_data()?),
            Self::Node { artifact, path } => SymlinkData::Node {
                artifact: artifact.as_ref().map(Artifact::require_id).transpose()?,
                path: path.clone(),
            },
        })
    }

    fn from_data(data: SymlinkData) -> ObjectResult<Self> {
        match data {
            SymlinkData::Graph(reference) => Ok(Self::Graph(GraphRef::from_data(reference)?)),
            SymlinkData::Node {
                artifact: None,
                path: None,
            } => Err(invalid("a symlink needs an artifact or a path")),
            SymlinkData::Node { artifact, path } => Ok(Self::Node {
                artifact: artifact.map(Artifact::with_id).transpose()?,
                path,
            }),
        }
    }

    fn children(&self) -> Vec<Object> {
        match self {
            Self::Graph(reference) => vec![reference.child()],
            Self::Node { artifact, .. } => artifact.iter().cloned().map(Object::from).collect(),
        }
    }

    fn into_object(handle: Symlink) -> Object {
        Object::Symlink(handle)
    }
}

/// Input to [`Symlink::new`].
#[derive(Clone, Debug)]
pub enum SymlinkArg {
    Path(String),
    Artifact(Artifact),
    ArtifactPath { artifact: Artifact, path: String },
    /// `[path]`, `[artifact]`, or `[artifact, "/path"]`.
    Template(Template),
}

impl From<&str> for SymlinkArg {
    fn from(value: &str) -> Self {
        Self::Path(value.to_string())
    }
}

impl From<String> for SymlinkArg {
    fn from(value: String) -> Self {
        Self::Path(value)
    }
}

impl From<Artifact> for SymlinkArg {
    fn from(value: Artifact) -> Self {
        Self::Artifact(value)
    }
}

impl From<Template> for SymlinkArg {
    fn from(value: Template) -> Self {
        Self::Template(value)
    }
}

fn template_target(template: &Template) -> ObjectResult<(Option<Artifact>, Option<String>)> {
    let artifact_of = |object: &Object| {
        object
            .clone()
            .try_into_artifact()
            .ok_or_else(|| invalid("a symlink template may only reference an artifact"))
    };
    match template.components() {
        [TemplateComponent::String(path)] => Ok((None, Some(path.clone()))),
        [TemplateComponent::Object(object)] => Ok((Some(artifact_of(object)?), None)),
        [TemplateComponent::Object(object), TemplateComponent::String(path)] => {
            let Some(path) = path.strip_prefix('/') else {
                return Err(invalid("the path after the artifact must start with /"));
            };
            Ok((Some(artifact_of(object)?), Some(path.to_string())))
        }
        _ => Err(invalid("unsupported template")),
    }
}

impl Symlink {
    pub fn new(arg: impl Into<SymlinkArg>) -> ObjectResult<Self> {
        let (artifact, path) = match arg.into() {
            SymlinkArg::Path(path) => (None, Some(path)),
            SymlinkArg::Artifact(artifact) => (Some(artifact), None),
            SymlinkArg::ArtifactPath { artifact, path } => (Some(artifact), Some(path)),
            SymlinkArg::Template(template) => template_target(&template)?,
        };
        Ok(Self::with_body(SymlinkBody::Node { artifact, path }))
    }

    pub fn with_graph(reference: GraphRef) -> Self {
        Self::with_body(SymlinkBody::Graph(reference))
    }

    pub async fn artifact(&self, handle: &dyn Handle) -> ObjectResult<Option<Artifact>> {
        match &*self.load(handle).await? {
            SymlinkBody::Node { artifact, .. } => Ok(artifact.clone()),
            SymlinkBody::Graph(reference) => {
                let node = reference.symlink_node(handle).await?;
                Ok(node.artifact.as_ref().map(|edge| reference.artifact(edge)))
            }
        }
    }

    pub async fn path(&self, handle: &dyn Handle) -> ObjectResult<Option<String>> {
        match &*self.load(handle).await? {
            SymlinkBody::Node { path, .. } => Ok(path.clone()),
            SymlinkBody::Graph(reference) => Ok(reference.symlink_node(handle).await?.path),
        }
    }

    /// Follow the symlink to its target.
    ///
    /// A symlink target is resolved first. A directory target with a path
    /// is then searched for that path, which may yield `None`. A path with
    /// no artifact is relative to a parent directory this symlink does not
    /// know, so it cannot be resolved here.
    pub fn resolve<'a>(&'a self, handle: &'a dyn Handle) -> BoxFuture<'a, ObjectResult<Option<Artifact>>> {
        async move {
            let mut artifact = self.artifact(handle).await?;
            if let Some(Artifact::Symlink(target)) = &artifact {
                artifact = target.resolve(handle).await?;
            }
            match (artifact, self.path(handle).await?) {
                (None, Some(_)) => Err(invalid("cannot resolve a symlink with no artifact")),
                (Some(artifact), None) => Ok(Some(artifact)),
                (Some(Artifact::Directory(directory)), Some(path)) => {
                    directory.try_get(&path, handle).await
                }
                _ => Err(invalid("a path can only be followed inside a directory")),
            }
        }
        .boxed()
    }
}

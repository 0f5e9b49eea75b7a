use arbor_store::Handle;
use arbor_types::{ArtifactKind, ObjectId, ObjectKind};
use bytes::Bytes;

use crate::blob::Blob;
use crate::command::Command;
use crate::directory::Directory;
use crate::error::{ObjectError, ObjectResult};
use crate::error_object::ErrorObject;
use crate::file::File;
use crate::graph::{Graph, GraphRef};
use crate::symlink::Symlink;

macro_rules! each_object {
    ($value:expr, $handle:ident => $body:expr) => {
        match $value {
            Object::Blob($handle) => $body,
            Object::Directory($handle) => $body,
            Object::File($handle) => $body,
            Object::Symlink($handle) => $body,
            Object::Graph($handle) => $body,
            Object::Command($handle) => $body,
            Object::Error($handle) => $body,
        }
    };
}

/// Any object, dispatched once on its kind.
#[derive(Clone, Debug, PartialEq)]
pub enum Object {
    Blob(Blob),
    Directory(Directory),
    File(File),
    Symlink(Symlink),
    Graph(Graph),
    Command(Command),
    Error(ErrorObject),
}

impl Object {
    /// Reference a stored object, picking the variant from the id's tag.
    pub fn with_id(id: ObjectId) -> Self {
        // The tag was validated when the id was parsed, so these cannot
        // disagree with the variant.
        match id.kind() {
            ObjectKind::Blob => Self::Blob(Blob::from_known_id(id)),
            ObjectKind::Directory => Self::Directory(Directory::from_known_id(id)),
            ObjectKind::File => Self::File(File::from_known_id(id)),
            ObjectKind::Symlink => Self::Symlink(Symlink::from_known_id(id)),
            ObjectKind::Graph => Self::Graph(Graph::from_known_id(id)),
            ObjectKind::Command => Self::Command(Command::from_known_id(id)),
            ObjectKind::Error => Self::Error(ErrorObject::from_known_id(id)),
        }
    }

    /// Parse an id string and reference the object it names.
    pub fn parse(id: &str) -> ObjectResult<Self> {
        Ok(Self::with_id(ObjectId::parse(id)?))
    }

    pub fn kind(&self) -> ObjectKind {
        each_object!(self, h => h.kind())
    }

    pub fn try_id(&self) -> Option<ObjectId> {
        each_object!(self, h => h.try_id())
    }

    pub fn id(&self, handle: &dyn Handle) -> ObjectResult<ObjectId> {
        each_object!(self, h => h.id(handle))
    }

    pub fn is_stored(&self) -> bool {
        each_object!(self, h => h.is_stored())
    }

    /// Make sure the body is resident.
    pub async fn load(&self, handle: &dyn Handle) -> ObjectResult<()> {
        each_object!(self, h => h.load(handle).await.map(|_| ()))
    }

    pub fn unload(&self) {
        each_object!(self, h => h.unload())
    }

    pub async fn children(&self, handle: &dyn Handle) -> ObjectResult<Vec<Object>> {
        each_object!(self, h => h.children(handle).await)
    }

    pub async fn store(&self, handle: &dyn Handle) -> ObjectResult<ObjectId> {
        crate::store::store_objects(vec![self.clone()], handle).await?;
        self.id(handle)
    }

    pub fn try_into_artifact(self) -> Option<Artifact> {
        match self {
            Self::Directory(d) => Some(Artifact::Directory(d)),
            Self::File(f) => Some(Artifact::File(f)),
            Self::Symlink(s) => Some(Artifact::Symlink(s)),
            _ => None,
        }
    }

    /// Children of the resident body, or `None` if the body is not loaded.
    pub(crate) fn resident_children(&self) -> Option<Vec<Object>> {
        use crate::handle::ObjectBody;
        each_object!(self, h => h.body().map(|b| b.children()))
    }

    pub(crate) fn encode(&self) -> ObjectResult<Bytes> {
        each_object!(self, h => h.encode())
    }

    pub(crate) fn set_id(&self, id: ObjectId) -> ObjectId {
        each_object!(self, h => h.set_id(id))
    }

    pub(crate) fn require_id(&self) -> ObjectResult<ObjectId> {
        each_object!(self, h => h.require_id())
    }

    pub(crate) fn mark_stored(&self) {
        each_object!(self, h => h.mark_stored())
    }

    pub(crate) fn ptr(&self) -> usize {
        each_object!(self, h => h.ptr())
    }
}

macro_rules! object_from {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Object {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

object_from! {
    Blob => Blob,
    Directory => Directory,
    File => File,
    Symlink => Symlink,
    Graph => Graph,
    Command => Command,
    Error => ErrorObject,
}

impl TryFrom<Object> for Artifact {
    type Error = ObjectError;

    fn try_from(object: Object) -> Result<Self, Self::Error> {
        let kind = object.kind();
        object
            .try_into_artifact()
            .ok_or_else(|| ObjectError::InvalidValue(format!("a {kind} is not an artifact")))
    }
}

/// A directory, file, or symlink.
#[derive(Clone, Debug, PartialEq)]
pub enum Artifact {
    Directory(Directory),
    File(File),
    Symlink(Symlink),
}

impl Artifact {
    /// Reference a stored artifact. Non-artifact tags are rejected.
    pub fn with_id(id: ObjectId) -> ObjectResult<Self> {
        match id.kind() {
            ObjectKind::Directory => Ok(Self::Directory(Directory::from_known_id(id))),
            ObjectKind::File => Ok(Self::File(File::from_known_id(id))),
            ObjectKind::Symlink => Ok(Self::Symlink(Symlink::from_known_id(id))),
            other => Err(ObjectError::InvalidId {
                id: id.to_string(),
                reason: format!("a {other} id is not an artifact id"),
            }),
        }
    }

    pub fn parse(id: &str) -> ObjectResult<Self> {
        Self::with_id(ObjectId::parse(id)?)
    }

    /// A view of node `index` inside `graph`.
    pub fn with_graph(graph: Graph, index: usize, kind: ArtifactKind) -> Self {
        let reference = GraphRef { graph, index };
        match kind {
            ArtifactKind::Directory => Self::Directory(Directory::with_graph(reference)),
            ArtifactKind::File => Self::File(File::with_graph(reference)),
            ArtifactKind::Symlink => Self::Symlink(Symlink::with_graph(reference)),
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Directory(_) => ArtifactKind::Directory,
            Self::File(_) => ArtifactKind::File,
            Self::Symlink(_) => ArtifactKind::Symlink,
        }
    }

    pub fn try_id(&self) -> Option<ObjectId> {
        self.as_object().try_id()
    }

    pub fn id(&self, handle: &dyn Handle) -> ObjectResult<ObjectId> {
        self.as_object().id(handle)
    }

    pub fn is_stored(&self) -> bool {
        self.as_object().is_stored()
    }

    pub async fn store(&self, handle: &dyn Handle) -> ObjectResult<ObjectId> {
        self.as_object().store(handle).await
    }

    pub fn as_object(&self) -> Object {
        self.clone().into()
    }

    pub fn as_directory(&self) -> Option<&Directory> {
        match self {
            Self::Directory(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&File> {
        match self {
            Self::File(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_symlink(&self) -> Option<&Symlink> {
        match self {
            Self::Symlink(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn require_id(&self) -> ObjectResult<ObjectId> {
        match self {
            Self::Directory(d) => d.require_id(),
            Self::File(f) => f.require_id(),
            Self::Symlink(s) => s.require_id(),
        }
    }
}

impl From<Artifact> for Object {
    fn from(artifact: Artifact) -> Self {
        match artifact {
            Artifact::Directory(d) => Self::Directory(d),
            Artifact::File(f) => Self::File(f),
            Artifact::Symlink(s) => Self::Symlink(s),
        }
    }
}

impl From<Directory> for Artifact {
    fn from(value: Directory) -> Self {
        Self::Directory(value)
    }
}

impl From<File> for Artifact {
    fn from(value: File) -> Self {
        Self::File(value)
    }
}

impl From<Symlink> for Artifact {
    fn from(value: Symlink) -> Self {
        Self::Symlink(value)
    }
}

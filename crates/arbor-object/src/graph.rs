//! Graphs: bundles of artifact nodes that may reference each other by index.
//!
//! A node's edge is either a direct object or a [`Pointer`] to a node
//! position. A pointer without a `graph` is relative to the graph being
//! encoded, which is what lets a single content-addressed graph hold cycles.
//! A pointer with a `graph` is an absolute reference into another, already
//! identified graph.

use std::collections::BTreeMap;

use arbor_store::Handle;
use arbor_types::{ArtifactKind, ObjectId, ObjectKind};
use serde::{Deserialize, Serialize};

use crate::blob::Blob;
use crate::codec::is_false;
use crate::error::{ObjectError, ObjectResult};
use crate::handle::{ObjectBody, ObjectHandle};
use crate::object::{Artifact, Object};
use crate::referent::{query_params, Referent, ReferentData};

pub type Graph = ObjectHandle<GraphBody>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphBody {
    pub nodes: Vec<Node>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Directory(DirectoryNode),
    File(FileNode),
    Symlink(SymlinkNode),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DirectoryNode {
    pub entries: BTreeMap<String, Edge<Artifact>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FileNode {
    pub contents: Blob,
    pub dependencies: BTreeMap<String, Option<Dependency>>,
    pub executable: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SymlinkNode {
    pub artifact: Option<Edge<Artifact>>,
    pub path: Option<String>,
}

/// A file dependency inside a graph: an optional edge plus provenance.
pub type Dependency = Referent<Option<Edge<Object>>>;

#[derive(Clone, Debug, PartialEq)]
pub enum Edge<T> {
    Pointer(Pointer),
    Object(T),
}

/// Node `index` inside `graph`, or inside the enclosing graph if `graph` is
/// `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct Pointer {
    pub graph: Option<Graph>,
    pub index: usize,
    pub kind: ArtifactKind,
}

/// The body of an artifact that is a view of one graph node.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphRef {
    pub graph: Graph,
    pub index: usize,
}

// ---------------------------------------------------------------------------
// Canonical data
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    #[serde(default)]
    pub nodes: Vec<NodeData>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeData {
    Directory(DirectoryNodeData),
    File(FileNodeData),
    Symlink(SymlinkNodeData),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryNodeData {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entries: BTreeMap<String, EdgeData>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileNodeData {
    pub contents: ObjectId,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, Option<ReferentData<Option<EdgeData>>>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub executable: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SymlinkNodeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<EdgeData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// An edge is encoded as a pointer map, or as a string holding either an
/// object id or a pointer string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EdgeData {
    Pointer(PointerData),
    String(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointerData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<ObjectId>,
    pub index: usize,
    pub kind: ArtifactKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphRefData {
    pub graph: ObjectId,
    pub index: usize,
}

// ---------------------------------------------------------------------------
// Pointer and edge codecs
// ---------------------------------------------------------------------------

fn invalid_reference(reference: &str, reason: impl Into<String>) -> ObjectError {
    ObjectError::InvalidReference {
        reference: reference.to_string(),
        reason: reason.into(),
    }
}

impl Pointer {
    /// A pointer relative to the enclosing graph.
    pub fn relative(index: usize, kind: ArtifactKind) -> Self {
        Self {
            graph: None,
            index,
            kind,
        }
    }

    pub fn to_data(&self) -> ObjectResult<PointerData> {
        Ok(PointerData {
            graph: self.graph.as_ref().map(|g| g.require_id()).transpose()?,
            index: self.index,
            kind: self.kind,
        })
    }

    pub fn from_data(data: PointerData) -> ObjectResult<Self> {
        Ok(Self {
            graph: data.graph.map(Graph::with_id).transpose()?,
            index: data.index,
            kind: data.kind,
        })
    }

    /// `[graph=<id>&]index=<n>&kind=<k>`
    pub fn to_data_string(&self) -> ObjectResult<String> {
        let mut string = String::new();
        if let Some(graph) = &self.graph {
            string.push_str(&format!("graph={}&", graph.require_id()?));
        }
        string.push_str(&format!("index={}&kind={}", self.index, self.kind));
        Ok(string)
    }

    pub fn from_data_string(string: &str) -> ObjectResult<Self> {
        let mut graph = None;
        let mut index = None;
        let mut kind = None;
        for (key, value) in query_params(string)? {
            match key {
                "graph" => graph = Some(Graph::with_id(ObjectId::parse(&value)?)?),
                "index" => {
                    let parsed = value
                        .parse::<usize>()
                        .map_err(|e| invalid_reference(string, format!("bad index: {e}")))?;
                    index = Some(parsed);
                }
                "kind" => {
                    let parsed = value
                        .parse::<ArtifactKind>()
                        .map_err(|e| invalid_reference(string, e.to_string()))?;
                    kind = Some(parsed);
                }
                _ => {}
            }
        }
        Ok(Self {
            graph,
            index: index.ok_or_else(|| invalid_reference(string, "missing index"))?,
            kind: kind.ok_or_else(|| invalid_reference(string, "missing kind"))?,
        })
    }

    fn child(&self) -> Option<Object> {
        self.graph.clone().map(Object::Graph)
    }
}

impl<T: Clone + Into<Object>> Edge<T> {
    pub fn to_data(&self, id: impl FnOnce(&T) -> ObjectResult<ObjectId>) -> ObjectResult<EdgeData> {
        Ok(match self {
            Self::Pointer(pointer) => EdgeData::Pointer(pointer.to_data()?),
            Self::Object(object) => EdgeData::String(id(object)?.to_string()),
        })
    }

    pub fn from_data(
        data: EdgeData,
        object: impl FnOnce(ObjectId) -> ObjectResult<T>,
    ) -> ObjectResult<Self> {
        match data {
            EdgeData::Pointer(pointer) => Ok(Self::Pointer(Pointer::from_data(pointer)?)),
            EdgeData::String(string) => Self::from_data_string(&string, object),
        }
    }

    pub fn to_data_string(
        &self,
        id: impl FnOnce(&T) -> ObjectResult<ObjectId>,
    ) -> ObjectResult<String> {
        match self {
            Self::Pointer(pointer) => pointer.to_data_string(),
            Self::Object(object) => Ok(id(object)?.to_string()),
        }
    }

    /// Pointer strings are recognized by their `index=` parameter.
    pub fn from_data_string(
        string: &str,
        object: impl FnOnce(ObjectId) -> ObjectResult<T>,
    ) -> ObjectResult<Self> {
        if string.contains("index=") {
            Ok(Self::Pointer(Pointer::from_data_string(string)?))
        } else {
            Ok(Self::Object(object(ObjectId::parse(string)?)?))
        }
    }

    /// The object this edge keeps alive: the target itself, or the other
    /// graph an absolute pointer refers into.
    pub fn child(&self) -> Option<Object> {
        match self {
            Self::Pointer(pointer) => pointer.child(),
            Self::Object(object) => Some(object.clone().into()),
        }
    }
}

/// `<edge-string>[?<options>]`; the edge part is empty when there is no item.
pub fn dependency_to_string(dependency: &Dependency) -> ObjectResult<String> {
    dependency.to_data_string_with(|item| match item {
        Some(edge) => edge.to_data_string(|object| object.require_id()),
        None => Ok(String::new()),
    })
}

pub fn dependency_from_string(string: &str) -> ObjectResult<Dependency> {
    Referent::from_data_string_with(string, |item| {
        if item.is_empty() {
            return Ok(None);
        }
        Edge::from_data_string(item, |id| Ok(Object::with_id(id))).map(Some)
    })
}

fn dependency_from_data(data: ReferentData<Option<EdgeData>>) -> ObjectResult<Dependency> {
    match data {
        ReferentData::String(string) => dependency_from_string(&string),
        ReferentData::Map { item, options } => {
            let item = item
                .map(|edge| Edge::from_data(edge, |id| Ok(Object::with_id(id))))
                .transpose()?;
            Ok(Referent::with_options(item, options))
        }
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

fn artifact_id(artifact: &Artifact) -> ObjectResult<ObjectId> {
    artifact.require_id()
}

impl Node {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Directory(_) => ArtifactKind::Directory,
            Self::File(_) => ArtifactKind::File,
            Self::Symlink(_) => ArtifactKind::Symlink,
        }
    }

    pub fn to_data(&self) -> ObjectResult<NodeData> {
        Ok(match self {
            Self::Directory(node) => NodeData::Directory(DirectoryNodeData {
                entries: node
                    .entries
                    .iter()
                    .map(|(name, edge)| Ok((name.clone(), edge.to_data(artifact_id)?)))
                    .collect::<ObjectResult<_>>()?,
            }),
            Self::File(node) => NodeData::File(FileNodeData {
                contents: node.contents.require_id()?,
                dependencies: node
                    .dependencies
                    .iter()
                    .map(|(reference, dependency)| {
                        let data = dependency
                            .as_ref()
                            .map(|d| dependency_to_string(d).map(ReferentData::String))
                            .transpose()?;
                        Ok((reference.clone(), data))
                    })
                    .collect::<ObjectResult<_>>()?,
                executable: node.executable,
            }),
            Self::Symlink(node) => NodeData::Symlink(SymlinkNodeData {
                artifact: node
                    .artifact
                    .as_ref()
                    .map(|edge| edge.to_data(artifact_id))
                    .transpose()?,
                path: node.path.clone(),
            }),
        })
    }

    pub fn from_data(data: NodeData) -> ObjectResult<Self> {
        Ok(match data {
            NodeData::Directory(data) => Self::Directory(DirectoryNode {
                entries: data
                    .entries
                    .into_iter()
                    .map(|(name, edge)| {
                        crate::path::validate_name(&name)?;
                        Ok((name, Edge::from_data(edge, Artifact::with_id)?))
                    })
                    .collect::<ObjectResult<_>>()?,
            }),
            NodeData::File(data) => Self::File(FileNode {
                contents: Blob::with_id(data.contents)?,
                dependencies: data
                    .dependencies
                    .into_iter()
                    .map(|(reference, dependency)| {
                        Ok((reference, dependency.map(dependency_from_data).transpose()?))
                    })
                    .collect::<ObjectResult<_>>()?,
                executable: data.executable,
            }),
            NodeData::Symlink(data) => Self::Symlink(SymlinkNode {
                artifact: data
                    .artifact
                    .map(|edge| Edge::from_data(edge, Artifact::with_id))
                    .transpose()?,
                path: data.path,
            }),
        })
    }

    fn children(&self) -> Vec<Object> {
        match self {
            Self::Directory(node) => node.entries.values().filter_map(Edge::child).collect(),
            Self::File(node) => {
                let mut children = vec![Object::Blob(node.contents.clone())];
                children.extend(
                    node.dependencies
                        .values()
                        .flatten()
                        .filter_map(|dependency| dependency.item.as_ref())
                        .filter_map(Edge::child),
                );
                children
            }
            Self::Symlink(node) => node.artifact.iter().filter_map(Edge::child).collect(),
        }
    }
}

impl ObjectBody for GraphBody {
    const KIND: ObjectKind = ObjectKind::Graph;
    type Data = GraphData;

    fn to_data(&self) -> ObjectResult<GraphData> {
        Ok(GraphData {
            nodes: self
                .nodes
                .iter()
                .map(Node::to_data)
                .collect::<ObjectResult<_>>()?,
        })
    }

    fn from_data(data: GraphData) -> ObjectResult<Self> {
        Ok(Self {
            nodes: data
                .nodes
                .into_iter()
                .map(Node::from_data)
                .collect::<ObjectResult<_>>()?,
        })
    }

    fn children(&self) -> Vec<Object> {
        self.nodes.iter().flat_map(Node::children).collect()
    }

    fn into_object(handle: Graph) -> Object {
        Object::Graph(handle)
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

impl GraphRef {
    pub fn new(graph: Graph, index: usize) -> Self {
        Self { graph, index }
    }

    pub(crate) fn to_data(&self) -> ObjectResult<GraphRefData> {
        Ok(GraphRefData {
            graph: self.graph.require_id()?,
            index: self.index,
        })
    }

    pub(crate) fn from_data(data: GraphRefData) -> ObjectResult<Self> {
        Ok(Self {
            graph: Graph::with_id(data.graph)?,
            index: data.index,
        })
    }

    pub(crate) fn child(&self) -> Object {
        Object::Graph(self.graph.clone())
    }

    async fn node(&self, handle: &dyn Handle) -> ObjectResult<Node> {
        let body = self.graph.load(handle).await?;
        body.nodes
            .get(self.index)
            .cloned()
            .ok_or(ObjectError::InvalidGraphIndex {
                index: self.index,
                len: body.nodes.len(),
            })
    }

    fn mismatch(&self, expected: ArtifactKind, actual: &Node) -> ObjectError {
        ObjectError::NodeKindMismatch {
            index: self.index,
            expected,
            actual: actual.kind(),
        }
    }

    pub(crate) async fn directory_node(&self, handle: &dyn Handle) -> ObjectResult<DirectoryNode> {
        match self.node(handle).await? {
            Node::Directory(node) => Ok(node),
            other => Err(self.mismatch(ArtifactKind::Directory, &other)),
        }
    }

    pub(crate) async fn file_node(&self, handle: &dyn Handle) -> ObjectResult<FileNode> {
        match self.node(handle).await? {
            Node::File(node) => Ok(node),
            other => Err(self.mismatch(ArtifactKind::File, &other)),
        }
    }

    pub(crate) async fn symlink_node(&self, handle: &dyn Handle) -> ObjectResult<SymlinkNode> {
        match self.node(handle).await? {
            Node::Symlink(node) => Ok(node),
            other => Err(self.mismatch(ArtifactKind::Symlink, &other)),
        }
    }

    /// Turn a node edge into an artifact, resolving relative pointers
    /// against this view's graph.
    pub(crate) fn artifact(&self, edge: &Edge<Artifact>) -> Artifact {
        match edge {
            Edge::Object(artifact) => artifact.clone(),
            Edge::Pointer(pointer) => self.pointer_artifact(pointer),
        }
    }

    pub(crate) fn object(&self, edge: &Edge<Object>) -> Object {
        match edge {
            Edge::Object(object) => object.clone(),
            Edge::Pointer(pointer) => self.pointer_artifact(pointer).into(),
        }
    }

    fn pointer_artifact(&self, pointer: &Pointer) -> Artifact {
        let graph = pointer
            .graph
            .clone()
            .unwrap_or_else(|| self.graph.clone());
        Artifact::with_graph(graph, pointer.index, pointer.kind)
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// One input to [`Graph::new`].
#[derive(Clone, Debug)]
pub enum GraphArg {
    Graph(Graph),
    Nodes(Vec<NodeArg>),
}

/// A node whose edges may still be bare indices.
#[derive(Clone, Debug)]
pub enum NodeArg {
    Directory {
        entries: BTreeMap<String, EdgeArg<Artifact>>,
    },
    File {
        contents: Blob,
        dependencies: BTreeMap<String, Option<Referent<Option<EdgeArg<Object>>>>>,
        executable: bool,
    },
    Symlink {
        artifact: Option<EdgeArg<Artifact>>,
        path: Option<String>,
    },
}

/// An edge before kind inference.
#[derive(Clone, Debug)]
pub enum EdgeArg<T> {
    Index(usize),
    Pointer {
        graph: Option<Graph>,
        index: usize,
        kind: Option<ArtifactKind>,
    },
    Object(T),
}

impl<T> EdgeArg<T> {
    fn rebase(self, offset: usize) -> Self {
        match self {
            Self::Index(index) => Self::Index(index + offset),
            Self::Pointer {
                graph: None,
                index,
                kind,
            } => Self::Pointer {
                graph: None,
                index: index + offset,
                kind,
            },
            other => other,
        }
    }

    fn from_edge(edge: Edge<T>) -> Self {
        match edge {
            Edge::Pointer(pointer) => Self::Pointer {
                graph: pointer.graph,
                index: pointer.index,
                kind: Some(pointer.kind),
            },
            Edge::Object(object) => Self::Object(object),
        }
    }

    async fn into_edge(self, kinds: &[ArtifactKind], handle: &dyn Handle) -> ObjectResult<Edge<T>> {
        let (graph, index, kind) = match self {
            Self::Object(object) => return Ok(Edge::Object(object)),
            Self::Index(index) => (None, index, None),
            Self::Pointer { graph, index, kind } => (graph, index, kind),
        };
        let kind = match (&graph, kind) {
            (None, given) => {
                let inferred = *kinds.get(index).ok_or(ObjectError::InvalidGraphIndex {
                    index,
                    len: kinds.len(),
                })?;
                if let Some(given) = given {
                    if given != inferred {
                        return Err(ObjectError::NodeKindMismatch {
                            index,
                            expected: given,
                            actual: inferred,
                        });
                    }
                }
                inferred
            }
            (Some(_), Some(given)) => given,
            (Some(other), None) => {
                let body = other.load(handle).await?;
                body.nodes
                    .get(index)
                    .map(Node::kind)
                    .ok_or(ObjectError::InvalidGraphIndex {
                        index,
                        len: body.nodes.len(),
                    })?
            }
        };
        Ok(Edge::Pointer(Pointer { graph, index, kind }))
    }
}

impl NodeArg {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Directory { .. } => ArtifactKind::Directory,
            Self::File { .. } => ArtifactKind::File,
            Self::Symlink { .. } => ArtifactKind::Symlink,
        }
    }

    fn from_node(node: &Node) -> Self {
        match node.clone() {
            Node::Directory(node) => Self::Directory {
                entries: node
                    .entries
                    .into_iter()
                    .map(|(name, edge)| (name, EdgeArg::from_edge(edge)))
                    .collect(),
            },
            Node::File(node) => Self::File {
                contents: node.contents,
                dependencies: node
                    .dependencies
                    .into_iter()
                    .map(|(reference, dependency)| {
                        let dependency = dependency
                            .map(|d| d.map(|item| item.map(EdgeArg::from_edge)));
                        (reference, dependency)
                    })
                    .collect(),
                executable: node.executable,
            },
            Node::Symlink(node) => Self::Symlink {
                artifact: node.artifact.map(EdgeArg::from_edge),
                path: node.path,
            },
        }
    }

    /// Shift every relative index by `offset`.
    fn rebase(self, offset: usize) -> Self {
        match self {
            Self::Directory { entries } => Self::Directory {
                entries: entries
                    .into_iter()
                    .map(|(name, edge)| (name, edge.rebase(offset)))
                    .collect(),
            },
            Self::File {
                contents,
                dependencies,
                executable,
            } => Self::File {
                contents,
                dependencies: dependencies
                    .into_iter()
                    .map(|(reference, dependency)| {
                        let dependency =
                            dependency.map(|d| d.map(|item| item.map(|e| e.rebase(offset))));
                        (reference, dependency)
                    })
                    .collect(),
                executable,
            },
            Self::Symlink { artifact, path } => Self::Symlink {
                artifact: artifact.map(|edge| edge.rebase(offset)),
                path,
            },
        }
    }

    async fn into_node(self, kinds: &[ArtifactKind], handle: &dyn Handle) -> ObjectResult<Node> {
        Ok(match self {
            Self::Directory { entries } => {
                let mut out = BTreeMap::new();
                for (name, edge) in entries {
                    crate::path::validate_name(&name)?;
                    out.insert(name, edge.into_edge(kinds, handle).await?);
                }
                Node::Directory(DirectoryNode { entries: out })
            }
            Self::File {
                contents,
                dependencies,
                executable,
            } => {
                let mut out = BTreeMap::new();
                for (reference, dependency) in dependencies {
                    let dependency = match dependency {
                        None => None,
                        Some(referent) => {
                            let item = match referent.item {
                                Some(edge) => Some(edge.into_edge(kinds, handle).await?),
                                None => None,
                            };
                            Some(Referent::with_options(item, referent.options))
                        }
                    };
                    out.insert(reference, dependency);
                }
                Node::File(FileNode {
                    contents,
                    dependencies: out,
                    executable,
                })
            }
            Self::Symlink { artifact, path } => {
                if artifact.is_none() && path.is_none() {
                    return Err(ObjectError::InvalidSymlink {
                        reason: "a symlink node needs an artifact or a path".to_string(),
                    });
                }
                let artifact = match artifact {
                    Some(edge) => Some(edge.into_edge(kinds, handle).await?),
                    None => None,
                };
                Node::Symlink(SymlinkNode { artifact, path })
            }
        })
    }
}

impl Graph {
    pub fn with_nodes(nodes: Vec<Node>) -> Self {
        Self::with_body(GraphBody { nodes })
    }

    /// Merge graphs and raw node lists into one graph.
    ///
    /// Nodes are concatenated in argument order. Relative indices in each
    /// argument are shifted by the number of nodes before it, then every
    /// bare index is given a kind by looking it up in the merged list.
    pub async fn new(args: Vec<GraphArg>, handle: &dyn Handle) -> ObjectResult<Self> {
        let mut merged: Vec<NodeArg> = Vec::new();
        for arg in args {
            let nodes = match arg {
                GraphArg::Graph(graph) => graph
                    .load(handle)
                    .await?
                    .nodes
                    .iter()
                    .map(NodeArg::from_node)
                    .collect(),
                GraphArg::Nodes(nodes) => nodes,
            };
            let offset = merged.len();
            merged.extend(nodes.into_iter().map(|node| node.rebase(offset)));
        }
        let kinds: Vec<ArtifactKind> = merged.iter().map(NodeArg::kind).collect();
        let mut nodes = Vec::with_capacity(merged.len());
        for node in merged {
            nodes.push(node.into_node(&kinds, handle).await?);
        }
        tracing::debug!(nodes = nodes.len(), "built graph");
        Ok(Self::with_nodes(nodes))
    }

    pub async fn nodes(&self, handle: &dyn Handle) -> ObjectResult<Vec<Node>> {
        Ok(self.load(handle).await?.nodes.clone())
    }

    /// A view artifact for node `index`.
    pub async fn get(&self, index: usize, handle: &dyn Handle) -> ObjectResult<Artifact> {
        let body = self.load(handle).await?;
        let node = body.nodes.get(index).ok_or(ObjectError::InvalidGraphIndex {
            index,
            len: body.nodes.len(),
        })?;
        Ok(Artifact::with_graph(self.clone(), index, node.kind()))
    }
}

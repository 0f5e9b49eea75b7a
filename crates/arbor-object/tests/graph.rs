//! Graph cycles, views, and merging.

use std::collections::BTreeMap;

use arbor_object::{
    Artifact, Blob, DirectoryBody, Edge, EdgeArg, Graph, GraphArg, Node, NodeArg, ObjectError,
};
use arbor_store::InMemoryHandle;
use arbor_types::ArtifactKind;

fn dir_node(entries: Vec<(&str, EdgeArg<Artifact>)>) -> NodeArg {
    NodeArg::Directory {
        entries: entries
            .into_iter()
            .map(|(name, edge)| (name.to_string(), edge))
            .collect(),
    }
}

fn file_node(text: &str) -> NodeArg {
    NodeArg::File {
        contents: Blob::leaf(text.to_string()),
        dependencies: BTreeMap::new(),
        executable: false,
    }
}

fn view_index(artifact: &Artifact) -> usize {
    let Artifact::Directory(directory) = artifact else {
        panic!("expected a directory view");
    };
    match &*directory.body().unwrap() {
        DirectoryBody::Graph(reference) => reference.index,
        DirectoryBody::Node { .. } => panic!("expected a graph view"),
    }
}

async fn cyclic_graph(handle: &InMemoryHandle) -> Graph {
    Graph::new(
        vec![GraphArg::Nodes(vec![
            dir_node(vec![("self", EdgeArg::Index(0))]),
            dir_node(vec![]),
        ])],
        handle,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn cycle_resolves_back_to_its_own_node() {
    let handle = InMemoryHandle::new();
    let graph = cyclic_graph(&handle).await;
    let Artifact::Directory(root) = graph.get(0, &handle).await.unwrap() else {
        panic!("node 0 is a directory");
    };
    let inner = root.try_get("self", &handle).await.unwrap().unwrap();
    assert_eq!(view_index(&inner), 0);
    let deeper = root.try_get("self/self/self", &handle).await.unwrap().unwrap();
    assert_eq!(view_index(&deeper), 0);
}

#[tokio::test]
async fn cycle_survives_store_and_reload() {
    let handle = InMemoryHandle::new();
    let graph = cyclic_graph(&handle).await;
    let view = graph.get(0, &handle).await.unwrap();
    let view_id = view.store(&handle).await.unwrap();
    assert!(graph.is_stored());

    let fresh = Artifact::with_id(view_id.clone()).unwrap();
    let Artifact::Directory(fresh) = fresh else {
        panic!("expected a directory");
    };
    let inner = fresh.try_get("self", &handle).await.unwrap().unwrap();
    // The view of node 0 rebuilt from a reloaded graph has the same id.
    assert_eq!(inner.id(&handle).unwrap(), view_id);
}

#[tokio::test]
async fn view_entries_resolve_through_the_graph() {
    let handle = InMemoryHandle::new();
    let graph = Graph::new(
        vec![GraphArg::Nodes(vec![
            dir_node(vec![("readme", EdgeArg::Index(1))]),
            file_node("hello"),
        ])],
        &handle,
    )
    .await
    .unwrap();
    let Artifact::Directory(root) = graph.get(0, &handle).await.unwrap() else {
        panic!("node 0 is a directory");
    };
    let Some(Artifact::File(readme)) = root.try_get("readme", &handle).await.unwrap() else {
        panic!("readme is a file");
    };
    assert_eq!(readme.text(&handle).await.unwrap(), "hello");
}

#[tokio::test]
async fn merging_rebases_later_fragments() {
    let handle = InMemoryHandle::new();
    let g1 = Graph::new(
        vec![GraphArg::Nodes(vec![
            dir_node(vec![("f", EdgeArg::Index(1))]),
            file_node("one"),
        ])],
        &handle,
    )
    .await
    .unwrap();
    let g2 = Graph::new(
        vec![GraphArg::Nodes(vec![
            NodeArg::Symlink {
                artifact: Some(EdgeArg::Index(1)),
                path: None,
            },
            dir_node(vec![("link", EdgeArg::Index(0))]),
        ])],
        &handle,
    )
    .await
    .unwrap();
    // A third fragment given as raw nodes refers to its own node 0.
    let g3 = vec![
        dir_node(vec![("me", EdgeArg::Index(0)), ("other", EdgeArg::Index(1))]),
        file_node("three"),
    ];

    let merged = Graph::new(
        vec![GraphArg::Graph(g1), GraphArg::Graph(g2), GraphArg::Nodes(g3)],
        &handle,
    )
    .await
    .unwrap();
    let nodes = merged.nodes(&handle).await.unwrap();
    assert_eq!(nodes.len(), 6);

    let pointer = |node: &Node, name: &str| -> (usize, ArtifactKind) {
        let edge = match node {
            Node::Directory(directory) => directory.entries[name].clone(),
            Node::Symlink(symlink) => symlink.artifact.clone().unwrap(),
            Node::File(_) => panic!("files have no entries"),
        };
        let Edge::Pointer(pointer) = edge else {
            panic!("expected a pointer");
        };
        assert!(pointer.graph.is_none());
        (pointer.index, pointer.kind)
    };

    assert_eq!(pointer(&nodes[0], "f"), (1, ArtifactKind::File));
    assert_eq!(pointer(&nodes[2], ""), (3, ArtifactKind::Directory));
    assert_eq!(pointer(&nodes[3], "link"), (2, ArtifactKind::Symlink));
    assert_eq!(pointer(&nodes[4], "me"), (4, ArtifactKind::Directory));
    assert_eq!(pointer(&nodes[4], "other"), (5, ArtifactKind::File));
}

#[tokio::test]
async fn out_of_range_index_fails_loudly() {
    let handle = InMemoryHandle::new();
    let result = Graph::new(
        vec![GraphArg::Nodes(vec![dir_node(vec![("x", EdgeArg::Index(7))])])],
        &handle,
    )
    .await;
    assert!(matches!(
        result,
        Err(ObjectError::InvalidGraphIndex { index: 7, len: 1 })
    ));
}

#[tokio::test]
async fn absolute_pointer_into_another_graph() {
    let handle = InMemoryHandle::new();
    let library = Graph::new(vec![GraphArg::Nodes(vec![file_node("lib")])], &handle)
        .await
        .unwrap();
    library.store(&handle).await.unwrap();

    let app = Graph::new(
        vec![GraphArg::Nodes(vec![dir_node(vec![(
            "lib",
            EdgeArg::Pointer {
                graph: Some(library.clone()),
                index: 0,
                kind: None,
            },
        )])])],
        &handle,
    )
    .await
    .unwrap();
    let Artifact::Directory(root) = app.get(0, &handle).await.unwrap() else {
        panic!("node 0 is a directory");
    };
    let Some(Artifact::File(lib)) = root.try_get("lib", &handle).await.unwrap() else {
        panic!("lib is a file");
    };
    assert_eq!(lib.text(&handle).await.unwrap(), "lib");

    // The other graph is a child of this one; a relative pointer would not be.
    let children = app.children(&handle).await.unwrap();
    assert!(children.contains(&arbor_object::Object::Graph(library)));
}

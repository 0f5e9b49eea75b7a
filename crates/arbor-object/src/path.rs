use std::collections::VecDeque;
use std::fmt;

use arbor_store::Handle;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, BoxStream, StreamExt};

use crate::directory::Directory;
use crate::error::{ObjectError, ObjectResult};
use crate::object::Artifact;

/// Symlink hops allowed in one resolution before giving up.
const MAX_SYMLINK_HOPS: usize = 40;

/// One component of a slash-separated path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Component {
    /// A leading `/`.
    Root,
    /// `..`
    Parent,
    Normal(String),
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("/"),
            Self::Parent => f.write_str(".."),
            Self::Normal(name) => f.write_str(name),
        }
    }
}

/// Split a path into components. `.` and empty segments are dropped.
pub fn components(path: &str) -> Vec<Component> {
    let mut out = Vec::new();
    if path.starts_with('/') {
        out.push(Component::Root);
    }
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => out.push(Component::Parent),
            name => out.push(Component::Normal(name.to_string())),
        }
    }
    out
}

/// Check that `name` is usable as a directory entry name.
pub fn validate_name(name: &str) -> ObjectResult<()> {
    let reason = match name {
        "" => "names must not be empty",
        "." | ".." => "names must not be . or ..",
        _ if name.contains('/') => "names must not contain /",
        _ => return Ok(()),
    };
    Err(ObjectError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

fn join(components: impl IntoIterator<Item = Component>) -> String {
    components
        .into_iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join("/")
}

impl Directory {
    /// Resolve `path` beneath this directory.
    ///
    /// Returns `None` when a component names no entry or is looked up in
    /// something other than a directory. Symlinks met along
    /// the way are followed: an artifact-only symlink is replaced by its
    /// artifact, a path-only symlink is read relative to the directory that
    /// holds it, and an artifact with a path finishes the lookup inside that
    /// artifact, carrying along whatever components remain. `..` may not
    /// climb above `self`.
    pub fn try_get<'a>(
        &'a self,
        path: &'a str,
        handle: &'a dyn Handle,
    ) -> BoxFuture<'a, ObjectResult<Option<Artifact>>> {
        async move {
            let invalid = |reason: String| ObjectError::InvalidPath {
                path: path.to_string(),
                reason,
            };
            let mut pending: VecDeque<Component> = components(path).into();
            let mut parents: Vec<Directory> = Vec::new();
            let mut current = Artifact::Directory(self.clone());
            let mut hops = 0;

            while let Some(component) = pending.pop_front() {
                let name = match component {
                    Component::Root => {
                        return Err(invalid("a path inside a directory cannot be absolute".into()))
                    }
                    Component::Parent => {
                        current = parents
                            .pop()
                            .map(Artifact::Directory)
                            .ok_or_else(|| ObjectError::PathIsExternal {
                                path: path.to_string(),
                            })?;
                        continue;
                    }
                    Component::Normal(name) => name,
                };

                let Artifact::Directory(directory) = &current else {
                    return Ok(None);
                };
                let Some(entry) = directory.try_get_entry(&name, handle).await? else {
                    return Ok(None);
                };
                parents.push(directory.clone());
                current = entry;

                let Artifact::Symlink(symlink) = current.clone() else {
                    continue;
                };
                hops += 1;
                if hops > MAX_SYMLINK_HOPS {
                    return Err(ObjectError::InvalidSymlink {
                        reason: format!("more than {MAX_SYMLINK_HOPS} symlinks in {path:?}"),
                    });
                }
                let artifact = match symlink.artifact(handle).await? {
                    Some(Artifact::Symlink(target)) => match target.resolve(handle).await? {
                        Some(resolved) => Some(resolved),
                        None => return Ok(None),
                    },
                    other => other,
                };
                match (artifact, symlink.path(handle).await?) {
                    (None, None) => {
                        return Err(ObjectError::InvalidSymlink {
                            reason: "a symlink needs an artifact or a path".to_string(),
                        })
                    }
                    (Some(artifact), None) => current = artifact,
                    (None, Some(target)) => {
                        // The symlink's own directory is the top of the stack.
                        let holder = parents.pop().ok_or_else(|| ObjectError::PathIsExternal {
                            path: path.to_string(),
                        })?;
                        current = Artifact::Directory(holder);
                        for component in components(&target).into_iter().rev() {
                            pending.push_front(component);
                        }
                    }
                    (Some(Artifact::Directory(root)), Some(target)) => {
                        let rest = join(pending);
                        let combined = if rest.is_empty() {
                            target
                        } else {
                            format!("{target}/{rest}")
                        };
                        return root.try_get(&combined, handle).await;
                    }
                    (Some(_), Some(_)) => {
                        return Err(ObjectError::InvalidSymlink {
                            reason: "a path can only be followed inside a directory".to_string(),
                        })
                    }
                }
            }
            Ok(Some(current))
        }
        .boxed()
    }

    /// Like [`Directory::try_get`], but a missing entry is an error.
    pub async fn get(&self, path: &str, handle: &dyn Handle) -> ObjectResult<Artifact> {
        self.try_get(path, handle)
            .await?
            .ok_or_else(|| ObjectError::EntryNotFound {
                path: path.to_string(),
            })
    }

    /// Every `(relative path, artifact)` beneath this directory, depth
    /// first, each directory before its contents.
    ///
    /// The stream is lazy. Walking a graph view of a cyclic graph does not
    /// terminate on its own, so the consumer decides when to stop.
    pub fn walk<'a>(
        &self,
        handle: &'a dyn Handle,
    ) -> BoxStream<'a, ObjectResult<(String, Artifact)>> {
        let stack = vec![Frame::Unopened {
            prefix: String::new(),
            directory: self.clone(),
        }];
        stream::try_unfold(stack, move |stack| walk_step(stack, handle)).boxed()
    }
}

enum Frame {
    Unopened {
        prefix: String,
        directory: Directory,
    },
    Open {
        prefix: String,
        entries: std::collections::btree_map::IntoIter<String, Artifact>,
    },
}

async fn walk_step(
    mut stack: Vec<Frame>,
    handle: &dyn Handle,
) -> ObjectResult<Option<((String, Artifact), Vec<Frame>)>> {
    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Unopened { prefix, directory } => {
                let entries = directory.entries(handle).await?;
                stack.push(Frame::Open {
                    prefix,
                    entries: entries.into_iter(),
                });
            }
            Frame::Open {
                prefix,
                mut entries,
            } => {
                let Some((name, artifact)) = entries.next() else {
                    continue;
                };
                let path = if prefix.is_empty() {
                    name
                } else {
                    format!("{prefix}/{name}")
                };
                stack.push(Frame::Open { prefix, entries });
                if let Artifact::Directory(directory) = &artifact {
                    stack.push(Frame::Unopened {
                        prefix: path.clone(),
                        directory: directory.clone(),
                    });
                }
                return Ok(Some(((path, artifact), stack)));
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::Blob;
    use crate::file::File;
    use crate::symlink::{Symlink, SymlinkArg};
    use arbor_store::InMemoryHandle;
    use futures::TryStreamExt;
    use std::collections::BTreeMap;

    fn dir(entries: Vec<(&str, Artifact)>) -> Directory {
        Directory::with_entries(
            entries
                .into_iter()
                .map(|(name, artifact)| (name.to_string(), artifact))
                .collect::<BTreeMap<_, _>>(),
        )
        .unwrap()
    }

    fn file(text: &str) -> File {
        File::with_contents(Blob::leaf(text.to_string()), false)
    }

    // ----- components / names -----

    #[test]
    fn components_drop_dots_and_empty_segments() {
        assert_eq!(
            components("/a/./b//../c/"),
            vec![
                Component::Root,
                Component::Normal("a".into()),
                Component::Normal("b".into()),
                Component::Parent,
                Component::Normal("c".into()),
            ]
        );
        assert!(components("").is_empty());
        assert!(components(".").is_empty());
        assert_eq!(join(components("a/../b")), "a/../b");
    }

    #[test]
    fn validate_name_rejects_special_names() {
        assert!(validate_name("ok.txt").is_ok());
        for bad in ["", ".", "..", "a/b"] {
            assert!(matches!(
                validate_name(bad),
                Err(ObjectError::InvalidName { .. })
            ));
        }
    }

    // ----- try_get -----

    #[tokio::test]
    async fn dots_and_parents_inside_the_root() {
        let handle = InMemoryHandle::new();
        let target = file("x");
        let root = dir(vec![
            ("a", dir(vec![("t", target.clone().into())]).into()),
            ("b", dir(vec![]).into()),
        ]);
        let found = root.try_get("b/../a/./t", &handle).await.unwrap();
        assert_eq!(found, Some(Artifact::File(target)));
        assert_eq!(
            root.try_get("", &handle).await.unwrap(),
            Some(Artifact::Directory(root.clone()))
        );
    }

    #[tokio::test]
    async fn absolute_path_is_invalid() {
        let handle = InMemoryHandle::new();
        let root = dir(vec![]);
        assert!(matches!(
            root.try_get("/a", &handle).await,
            Err(ObjectError::InvalidPath { .. })
        ));
    }

    #[tokio::test]
    async fn descending_into_a_file_finds_nothing() {
        let handle = InMemoryHandle::new();
        let root = dir(vec![("f", file("x").into())]);
        assert_eq!(root.try_get("f/g", &handle).await.unwrap(), None);
        assert!(matches!(
            root.get("f/g", &handle).await,
            Err(ObjectError::EntryNotFound { path }) if path == "f/g"
        ));
    }

    #[tokio::test]
    async fn get_reports_missing_entries() {
        let handle = InMemoryHandle::new();
        let root = dir(vec![]);
        assert!(matches!(
            root.get("nope", &handle).await,
            Err(ObjectError::EntryNotFound { path }) if path == "nope"
        ));
    }

    #[tokio::test]
    async fn sibling_symlink_with_parent_path() {
        let handle = InMemoryHandle::new();
        let target = file("lib");
        let root = dir(vec![
            ("lib", dir(vec![("libc.so", target.clone().into())]).into()),
            (
                "bin",
                dir(vec![("libc", Symlink::new("../lib/libc.so").unwrap().into())]).into(),
            ),
        ]);
        assert_eq!(
            root.try_get("bin/libc", &handle).await.unwrap(),
            Some(Artifact::File(target))
        );
    }

    #[tokio::test]
    async fn symlink_artifact_with_path_finishes_inside_artifact() {
        let handle = InMemoryHandle::new();
        let target = file("sh");
        let other = dir(vec![("bin", dir(vec![("sh", target.clone().into())]).into())]);
        let link = Symlink::new(SymlinkArg::ArtifactPath {
            artifact: other.into(),
            path: "bin".to_string(),
        })
        .unwrap();
        let root = dir(vec![("tools", link.into())]);
        assert_eq!(
            root.try_get("tools/sh", &handle).await.unwrap(),
            Some(Artifact::File(target))
        );
    }

    #[tokio::test]
    async fn symlink_loop_is_reported() {
        let handle = InMemoryHandle::new();
        let root = dir(vec![
            ("a", Symlink::new("b").unwrap().into()),
            ("b", Symlink::new("a").unwrap().into()),
        ]);
        assert!(matches!(
            root.try_get("a", &handle).await,
            Err(ObjectError::InvalidSymlink { .. })
        ));
    }

    // ----- walk -----

    #[tokio::test]
    async fn walk_is_depth_first_and_restartable() {
        let handle = InMemoryHandle::new();
        let root = dir(vec![
            ("a", dir(vec![("x", file("1").into()), ("y", file("2").into())]).into()),
            ("b", file("3").into()),
        ]);
        root.store(&handle).await.unwrap();

        let fresh = Directory::with_id(root.try_id().unwrap()).unwrap();
        for _ in 0..2 {
            let paths: Vec<String> = fresh
                .walk(&handle)
                .map_ok(|(path, _)| path)
                .try_collect()
                .await
                .unwrap();
            assert_eq!(paths, vec!["a", "a/x", "a/y", "b"]);
        }
    }

    #[tokio::test]
    async fn walk_is_lazy() {
        let handle = InMemoryHandle::new();
        let root = dir(vec![("a", file("1").into()), ("b", file("2").into())]);
        let mut walk = root.walk(&handle);
        let (first, _) = walk.try_next().await.unwrap().unwrap();
        assert_eq!(first, "a");
    }
}

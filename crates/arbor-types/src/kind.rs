use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Width of the kind tag at the start of every object id.
pub const TAG_WIDTH: usize = 3;

/// The kind of a stored object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Raw or chunked byte content.
    Blob,
    /// Name to artifact mapping.
    Directory,
    /// Contents blob plus dependencies and an executable flag.
    File,
    /// Artifact and/or path indirection.
    Symlink,
    /// Bundle of nodes that may reference each other by index.
    Graph,
    /// Description of a process to run.
    Command,
    /// Structured error value.
    Error,
}

impl ObjectKind {
    /// Every kind, in tag order.
    pub const ALL: [ObjectKind; 7] = [
        Self::Blob,
        Self::Directory,
        Self::File,
        Self::Symlink,
        Self::Graph,
        Self::Command,
        Self::Error,
    ];

    /// The fixed three-character id prefix for this kind.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Blob => "blb",
            Self::Directory => "dir",
            Self::File => "fil",
            Self::Symlink => "sym",
            Self::Graph => "gph",
            Self::Command => "cmd",
            Self::Error => "err",
        }
    }

    /// Reverse lookup of [`tag`](Self::tag).
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// The lowercase name used in encoded data (`"directory"`, ...).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Directory => "directory",
            Self::File => "file",
            Self::Symlink => "symlink",
            Self::Graph => "graph",
            Self::Command => "command",
            Self::Error => "error",
        }
    }

    /// Returns `true` for directory, file and symlink.
    pub fn is_artifact(self) -> bool {
        matches!(self, Self::Directory | Self::File | Self::Symlink)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TypeError::InvalidKind(s.to_string()))
    }
}

/// The kinds that may be the target of a directory entry, a symlink, or a
/// graph node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Directory,
    File,
    Symlink,
}

impl ArtifactKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::File => "file",
            Self::Symlink => "symlink",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind: ObjectKind = s.parse()?;
        Self::try_from(kind)
    }
}

impl From<ArtifactKind> for ObjectKind {
    fn from(kind: ArtifactKind) -> Self {
        match kind {
            ArtifactKind::Directory => Self::Directory,
            ArtifactKind::File => Self::File,
            ArtifactKind::Symlink => Self::Symlink,
        }
    }
}

impl TryFrom<ObjectKind> for ArtifactKind {
    type Error = TypeError;

    fn try_from(kind: ObjectKind) -> Result<Self, Self::Error> {
        match kind {
            ObjectKind::Directory => Ok(Self::Directory),
            ObjectKind::File => Ok(Self::File),
            ObjectKind::Symlink => Ok(Self::Symlink),
            other => Err(TypeError::NotAnArtifact {
                kind: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tags_are_injective() {
        let tags: HashSet<&str> = ObjectKind::ALL.iter().map(|k| k.tag()).collect();
        assert_eq!(tags.len(), ObjectKind::ALL.len());
        for tag in &tags {
            assert_eq!(tag.len(), TAG_WIDTH);
        }
    }

    #[test]
    fn tag_lookup_roundtrip() {
        for kind in ObjectKind::ALL {
            assert_eq!(ObjectKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ObjectKind::from_tag("xyz"), None);
    }

    #[test]
    fn display_and_parse() {
        assert_eq!(ObjectKind::Directory.to_string(), "directory");
        assert_eq!("graph".parse::<ObjectKind>().unwrap(), ObjectKind::Graph);
        assert!("tree".parse::<ObjectKind>().is_err());
    }

    #[test]
    fn artifact_conversion() {
        assert_eq!(
            ArtifactKind::try_from(ObjectKind::Symlink).unwrap(),
            ArtifactKind::Symlink
        );
        assert!(matches!(
            ArtifactKind::try_from(ObjectKind::Blob),
            Err(TypeError::NotAnArtifact { .. })
        ));
        assert!("command".parse::<ArtifactKind>().is_err());
        assert_eq!(ObjectKind::from(ArtifactKind::File), ObjectKind::File);
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&ArtifactKind::Directory).unwrap();
        assert_eq!(json, "\"directory\"");
        let kind: ObjectKind = serde_json::from_str("\"command\"").unwrap();
        assert_eq!(kind, ObjectKind::Command);
    }
}

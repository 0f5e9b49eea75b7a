use arbor_types::{ObjectId, ObjectKind};

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g. `"arbor-directory-v1"`) that is
/// prepended to every hash computation, so a blob and a directory with
/// identical canonical bytes still hash differently.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentHasher {
    kind: ObjectKind,
    domain: &'static str,
}

impl ContentHasher {
    pub const BLOB: Self = Self::new(ObjectKind::Blob, "arbor-blob-v1");
    pub const DIRECTORY: Self = Self::new(ObjectKind::Directory, "arbor-directory-v1");
    pub const FILE: Self = Self::new(ObjectKind::File, "arbor-file-v1");
    pub const SYMLINK: Self = Self::new(ObjectKind::Symlink, "arbor-symlink-v1");
    pub const GRAPH: Self = Self::new(ObjectKind::Graph, "arbor-graph-v1");
    pub const COMMAND: Self = Self::new(ObjectKind::Command, "arbor-command-v1");
    pub const ERROR: Self = Self::new(ObjectKind::Error, "arbor-error-v1");

    const fn new(kind: ObjectKind, domain: &'static str) -> Self {
        Self { kind, domain }
    }

    /// The hasher for objects of `kind`.
    pub const fn for_kind(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Blob => Self::BLOB,
            ObjectKind::Directory => Self::DIRECTORY,
            ObjectKind::File => Self::FILE,
            ObjectKind::Symlink => Self::SYMLINK,
            ObjectKind::Graph => Self::GRAPH,
            ObjectKind::Command => Self::COMMAND,
            ObjectKind::Error => Self::ERROR,
        }
    }

    /// Hash canonical bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ObjectId::from_digest(self.kind, hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected object id.
    pub fn verify(&self, data: &[u8], expected: &ObjectId) -> bool {
        self.hash(data) == *expected
    }

    pub fn domain(&self) -> &'static str {
        self.domain
    }
}

/// Hash canonical bytes of any kind.
pub fn hash_object(kind: ObjectKind, data: &[u8]) -> ObjectId {
    ContentHasher::for_kind(kind).hash(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let id1 = ContentHasher::BLOB.hash(b"hello world");
        let id2 = ContentHasher::BLOB.hash(b"hello world");
        assert_eq!(id1, id2);
    }

    #[test]
    fn different_domains_produce_different_digests() {
        let data = b"same content";
        let blob = ContentHasher::BLOB.hash(data);
        let dir = ContentHasher::DIRECTORY.hash(data);
        assert_ne!(blob.digest(), dir.digest());
    }

    #[test]
    fn id_tag_matches_kind() {
        for kind in ObjectKind::ALL {
            let id = hash_object(kind, b"{}");
            assert_eq!(id.kind(), kind);
        }
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::FILE.hash(b"original");
        assert!(ContentHasher::FILE.verify(b"original", &id));
        assert!(!ContentHasher::FILE.verify(b"tampered", &id));
    }

    #[test]
    fn domains_are_distinct() {
        let mut domains: Vec<&str> = ObjectKind::ALL
            .iter()
            .map(|k| ContentHasher::for_kind(*k).domain())
            .collect();
        domains.sort_unstable();
        domains.dedup();
        assert_eq!(domains.len(), ObjectKind::ALL.len());
    }
}

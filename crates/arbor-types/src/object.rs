use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::kind::{ObjectKind, TAG_WIDTH};

const SEPARATOR: char = '_';

/// Content-addressed identifier for any stored object.
///
/// The string form is `<tag>_<digest>`: a three-character kind tag followed by
/// the lowercase hex of the object's canonical-bytes digest. Identical content
/// of the same kind always produces the same `ObjectId`, and ids of different
/// kinds never collide because the tags differ.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// Build an id from a kind and a precomputed 32-byte digest.
    pub fn from_digest(kind: ObjectKind, digest: &[u8; 32]) -> Self {
        Self(format!("{}{SEPARATOR}{}", kind.tag(), hex::encode(digest)))
    }

    /// Parse and validate an id string.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        kind_of(s)?;
        let suffix = &s[TAG_WIDTH..];
        let Some(digest) = suffix.strip_prefix(SEPARATOR) else {
            return Err(invalid(s, "missing separator after kind tag"));
        };
        if digest.is_empty() {
            return Err(invalid(s, "empty digest"));
        }
        if !digest
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
        {
            return Err(invalid(s, "digest must be lowercase alphanumeric"));
        }
        Ok(Self(s.to_string()))
    }

    /// The kind encoded in this id's tag.
    pub fn kind(&self) -> ObjectKind {
        // Every constructor validates the tag.
        match ObjectKind::from_tag(&self.0[..TAG_WIDTH]) {
            Some(kind) => kind,
            None => unreachable!("object id with unknown tag: {}", self.0),
        }
    }

    /// The full string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The digest part, without tag and separator.
    pub fn digest(&self) -> &str {
        &self.0[TAG_WIDTH + 1..]
    }

    /// Short representation: tag plus the first 8 digest characters.
    pub fn short(&self) -> String {
        let digest = self.digest();
        let end = digest.len().min(8);
        format!("{}{SEPARATOR}{}", &self.0[..TAG_WIDTH], &digest[..end])
    }
}

/// Look up the kind of an arbitrary id string from its tag.
pub fn kind_of(id: &str) -> Result<ObjectKind, TypeError> {
    let Some(tag) = id.get(..TAG_WIDTH) else {
        return Err(invalid(id, "shorter than the kind tag"));
    };
    ObjectKind::from_tag(tag).ok_or_else(|| invalid(id, &format!("unknown kind tag {tag:?}")))
}

fn invalid(id: &str, reason: &str) -> TypeError {
    TypeError::InvalidId {
        id: id.to_string(),
        reason: reason.to_string(),
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn digest(seed: u8) -> [u8; 32] {
        [seed; 32]
    }

    #[test]
    fn from_digest_is_deterministic() {
        let a = ObjectId::from_digest(ObjectKind::File, &digest(7));
        let b = ObjectId::from_digest(ObjectKind::File, &digest(7));
        assert_eq!(a, b);
    }

    #[test]
    fn same_digest_different_kind_differs() {
        let a = ObjectId::from_digest(ObjectKind::File, &digest(7));
        let b = ObjectId::from_digest(ObjectKind::Directory, &digest(7));
        assert_ne!(a, b);
    }

    #[test]
    fn kind_follows_tag() {
        for kind in ObjectKind::ALL {
            let id = ObjectId::from_digest(kind, &digest(1));
            assert!(id.as_str().starts_with(kind.tag()));
            assert_eq!(id.kind(), kind);
            assert_eq!(kind_of(id.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn kind_of_rejects_short_and_unknown() {
        assert!(matches!(kind_of("di"), Err(TypeError::InvalidId { .. })));
        assert!(matches!(kind_of(""), Err(TypeError::InvalidId { .. })));
        assert!(matches!(kind_of("xyz_00"), Err(TypeError::InvalidId { .. })));
        assert_eq!(kind_of("dir").unwrap(), ObjectKind::Directory);
    }

    #[test]
    fn parse_validates_shape() {
        assert!(ObjectId::parse("dir_abc123").is_ok());
        assert!(ObjectId::parse("dir").is_err());
        assert!(ObjectId::parse("dir_").is_err());
        assert!(ObjectId::parse("dirabc").is_err());
        assert!(ObjectId::parse("dir_ABC").is_err());
        assert!(ObjectId::parse("foo_abc").is_err());
    }

    #[test]
    fn short_is_tag_plus_eight() {
        let id = ObjectId::from_digest(ObjectKind::Blob, &digest(0xab));
        assert_eq!(id.short(), "blb_abababab");
        assert_eq!(format!("{id:?}"), "ObjectId(blb_abababab)");
    }

    #[test]
    fn display_is_full_string() {
        let id = ObjectId::from_digest(ObjectKind::Graph, &digest(2));
        let display = format!("{id}");
        assert_eq!(display.len(), TAG_WIDTH + 1 + 64);
        assert_eq!(display, id.as_str());
    }

    #[test]
    fn serde_roundtrip() {
        let id = ObjectId::from_digest(ObjectKind::Command, &digest(9));
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let parsed: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn serde_rejects_bad_id() {
        let result: Result<ObjectId, _> = serde_json::from_str("\"nope\"");
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn kind_of_is_stable(bytes in proptest::array::uniform32(any::<u8>()), idx in 0usize..7) {
            let kind = ObjectKind::ALL[idx];
            let id = ObjectId::from_digest(kind, &bytes);
            prop_assert_eq!(kind_of(id.as_str()).unwrap(), kind);
            let reparsed: ObjectId = id.as_str().parse().unwrap();
            prop_assert_eq!(reparsed.kind(), kind);
        }
    }
}

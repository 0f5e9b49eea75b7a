//! Small serde helpers shared by the canonical data types.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;

use crate::error::{ObjectError, ObjectResult};

pub(crate) fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub(crate) fn decode_base64(string: &str) -> ObjectResult<Bytes> {
    STANDARD
        .decode(string)
        .map(Bytes::from)
        .map_err(|e| ObjectError::Serialization(format!("invalid base64: {e}")))
}

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}

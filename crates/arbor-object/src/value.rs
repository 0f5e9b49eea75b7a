use std::collections::BTreeMap;

use arbor_types::ObjectId;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::codec::{decode_base64, encode_base64};
use crate::error::{ObjectError, ObjectResult};
use crate::mutation::{Mutation, MutationData};
use crate::object::{Artifact, Object};
use crate::template::{Placeholder, Template, TemplateData};

/// A value that can appear in command arguments, environments, and outputs.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Bytes),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Object(Object),
    Mutation(Box<Mutation>),
    Template(Template),
    Placeholder(Placeholder),
}

/// Canonical value data. JSON-native values are written as themselves;
/// everything else is `{"kind": ..., "value": ...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueData {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<ValueData>),
    Tagged(TaggedValueData),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TaggedValueData {
    Map(BTreeMap<String, ValueData>),
    Object(ObjectId),
    /// Base64.
    Bytes(String),
    Mutation(Box<MutationData>),
    Template(TemplateData),
    Placeholder(Placeholder),
}

impl Value {
    /// Every object embedded anywhere in this value, in order.
    pub fn objects(&self) -> Vec<Object> {
        let mut out = Vec::new();
        self.collect_objects(&mut out);
        out
    }

    fn collect_objects(&self, out: &mut Vec<Object>) {
        match self {
            Self::Object(object) => out.push(object.clone()),
            Self::Array(values) => values.iter().for_each(|v| v.collect_objects(out)),
            Self::Map(map) => map.values().for_each(|v| v.collect_objects(out)),
            Self::Template(template) => out.extend(template.objects()),
            Self::Mutation(mutation) => out.extend(mutation.objects()),
            _ => {}
        }
    }

    pub fn to_data(&self) -> ObjectResult<ValueData> {
        Ok(match self {
            Self::Null => ValueData::Null,
            Self::Bool(b) => ValueData::Bool(*b),
            Self::Int(i) => ValueData::Int(*i),
            // JSON writes NaN and infinities as null.
            Self::Float(f) if !f.is_finite() => {
                return Err(ObjectError::InvalidValue(format!("{f} has no canonical encoding")))
            }
            Self::Float(f) => ValueData::Float(*f),
            Self::String(s) => ValueData::String(s.clone()),
            Self::Array(values) => ValueData::Array(
                values
                    .iter()
                    .map(Value::to_data)
                    .collect::<ObjectResult<_>>()?,
            ),
            Self::Bytes(bytes) => ValueData::Tagged(TaggedValueData::Bytes(encode_base64(bytes))),
            Self::Map(map) => ValueData::Tagged(TaggedValueData::Map(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), v.to_data()?)))
                    .collect::<ObjectResult<_>>()?,
            )),
            Self::Object(object) => ValueData::Tagged(TaggedValueData::Object(object.require_id()?)),
            Self::Mutation(mutation) => {
                ValueData::Tagged(TaggedValueData::Mutation(Box::new(mutation.to_data()?)))
            }
            Self::Template(template) => {
                ValueData::Tagged(TaggedValueData::Template(template.to_data()?))
            }
            Self::Placeholder(placeholder) => {
                ValueData::Tagged(TaggedValueData::Placeholder(placeholder.clone()))
            }
        })
    }

    pub fn from_data(data: ValueData) -> ObjectResult<Self> {
        Ok(match data {
            ValueData::Null => Self::Null,
            ValueData::Bool(b) => Self::Bool(b),
            ValueData::Int(i) => Self::Int(i),
            ValueData::Float(f) => Self::Float(f),
            ValueData::String(s) => Self::String(s),
            ValueData::Array(values) => Self::Array(
                values
                    .into_iter()
                    .map(Value::from_data)
                    .collect::<ObjectResult<_>>()?,
            ),
            ValueData::Tagged(tagged) => match tagged {
                TaggedValueData::Map(map) => Self::Map(
                    map.into_iter()
                        .map(|(k, v)| Ok((k, Value::from_data(v)?)))
                        .collect::<ObjectResult<_>>()?,
                ),
                TaggedValueData::Object(id) => Self::Object(Object::with_id(id)),
                TaggedValueData::Bytes(encoded) => Self::Bytes(decode_base64(&encoded)?),
                TaggedValueData::Mutation(data) => {
                    Self::Mutation(Box::new(Mutation::from_data(*data)?))
                }
                TaggedValueData::Template(data) => Self::Template(Template::from_data(data)),
                TaggedValueData::Placeholder(p) => Self::Placeholder(p),
            },
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => |$v:ident| $body:expr),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from($v: $ty) -> Self {
                    $body
                }
            }
        )*
    };
}

value_from! {
    bool => |v| Value::Bool(v),
    i64 => |v| Value::Int(v),
    f64 => |v| Value::Float(v),
    &str => |v| Value::String(v.to_string()),
    String => |v| Value::String(v),
    Bytes => |v| Value::Bytes(v),
    Vec<Value> => |v| Value::Array(v),
    BTreeMap<String, Value> => |v| Value::Map(v),
    Object => |v| Value::Object(v),
    Artifact => |v| Value::Object(v.into()),
    Mutation => |v| Value::Mutation(Box::new(v)),
    Template => |v| Value::Template(v),
    Placeholder => |v| Value::Placeholder(v),
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

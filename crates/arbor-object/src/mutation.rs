use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ObjectError, ObjectResult};
use crate::object::Object;
use crate::template::{Template, TemplateComponent};
use crate::value::{Value, ValueData};

/// How to fold a value into one slot of a map.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    Set(Value),
    Unset,
    SetIfUnset(Value),
    Prepend(Vec<Value>),
    Append(Vec<Value>),
    Prefix {
        template: Template,
        separator: Option<String>,
    },
    Suffix {
        template: Template,
        separator: Option<String>,
    },
    Merge(BTreeMap<String, Value>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Set,
    Unset,
    SetIfUnset,
    Prepend,
    Append,
    Prefix,
    Suffix,
    Merge,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MutationData {
    pub kind: MutationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ValueData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<ValueData>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<ValueData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
}

/// A non-list value becomes a one-element list; absent and null become empty.
fn as_list(value: Option<&Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(values)) => values.clone(),
        Some(other) => vec![other.clone()],
    }
}

fn as_template(key: &str, value: &Value) -> ObjectResult<Template> {
    Ok(match value {
        Value::String(s) => Template::from(s.as_str()),
        Value::Template(t) => t.clone(),
        Value::Object(o) => Template::from(o.clone()),
        Value::Placeholder(p) => Template::from(p.clone()),
        other => {
            return Err(ObjectError::InvalidValue(format!(
                "cannot prefix or suffix {key:?}: existing value {other:?} is not a template"
            )))
        }
    })
}

fn separated(first: Template, separator: &Option<String>, second: Template) -> Template {
    let separator = separator.clone().unwrap_or_default();
    first + separator + second
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::Set(_) => MutationKind::Set,
            Self::Unset => MutationKind::Unset,
            Self::SetIfUnset(_) => MutationKind::SetIfUnset,
            Self::Prepend(_) => MutationKind::Prepend,
            Self::Append(_) => MutationKind::Append,
            Self::Prefix { .. } => MutationKind::Prefix,
            Self::Suffix { .. } => MutationKind::Suffix,
            Self::Merge(_) => MutationKind::Merge,
        }
    }

    /// Prepend one value, or every element of an array.
    pub fn prepend(value: impl Into<Value>) -> Self {
        Self::Prepend(as_list(Some(&value.into())))
    }

    /// Append one value, or every element of an array.
    pub fn append(value: impl Into<Value>) -> Self {
        Self::Append(as_list(Some(&value.into())))
    }

    /// Return a copy of `map` with this mutation applied at `key`.
    pub fn apply(
        &self,
        map: &BTreeMap<String, Value>,
        key: &str,
    ) -> ObjectResult<BTreeMap<String, Value>> {
        let mut result = map.clone();
        let existing = map.get(key);
        match self {
            Self::Set(value) => {
                result.insert(key.to_string(), value.clone());
            }
            Self::Unset => {
                result.remove(key);
            }
            Self::SetIfUnset(value) => {
                if existing.is_none() {
                    result.insert(key.to_string(), value.clone());
                }
            }
            Self::Prepend(values) => {
                let mut list = values.clone();
                list.extend(as_list(existing));
                result.insert(key.to_string(), Value::Array(list));
            }
            Self::Append(values) => {
                let mut list = as_list(existing);
                list.extend(values.iter().cloned());
                result.insert(key.to_string(), Value::Array(list));
            }
            Self::Prefix {
                template,
                separator,
            } => {
                let value = match existing {
                    None => template.clone(),
                    Some(existing) => {
                        separated(template.clone(), separator, as_template(key, existing)?)
                    }
                };
                result.insert(key.to_string(), Value::Template(value));
            }
            Self::Suffix {
                template,
                separator,
            } => {
                let value = match existing {
                    None => template.clone(),
                    Some(existing) => {
                        separated(as_template(key, existing)?, separator, template.clone())
                    }
                };
                result.insert(key.to_string(), Value::Template(value));
            }
            Self::Merge(values) => {
                let mut merged = match existing {
                    Some(Value::Map(existing)) => existing.clone(),
                    _ => BTreeMap::new(),
                };
                merged.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
                result.insert(key.to_string(), Value::Map(merged));
            }
        }
        Ok(result)
    }

    pub fn objects(&self) -> Vec<Object> {
        match self {
            Self::Set(value) | Self::SetIfUnset(value) => value.objects(),
            Self::Unset => Vec::new(),
            Self::Prepend(values) | Self::Append(values) => {
                values.iter().flat_map(Value::objects).collect()
            }
            Self::Prefix { template, .. } | Self::Suffix { template, .. } => template.objects(),
            Self::Merge(values) => values.values().flat_map(Value::objects).collect(),
        }
    }

    pub fn to_data(&self) -> ObjectResult<MutationData> {
        let mut data = MutationData {
            kind: self.kind(),
            value: None,
            values: None,
            template: None,
            separator: None,
        };
        match self {
            Self::Set(value) | Self::SetIfUnset(value) => data.value = Some(value.to_data()?),
            Self::Unset => {}
            Self::Prepend(values) | Self::Append(values) => {
                data.values = Some(
                    values
                        .iter()
                        .map(Value::to_data)
                        .collect::<ObjectResult<_>>()?,
                );
            }
            Self::Prefix {
                template,
                separator,
            }
            | Self::Suffix {
                template,
                separator,
            } => {
                data.template = Some(Value::Template(template.clone()).to_data()?);
                data.separator = separator.clone();
            }
            Self::Merge(values) => data.value = Some(Value::Map(values.clone()).to_data()?),
        }
        Ok(data)
    }

    pub fn from_data(data: MutationData) -> ObjectResult<Self> {
        let value = data.value.map(Value::from_data).transpose()?;
        let values = || -> ObjectResult<Vec<Value>> {
            data.values
                .clone()
                .unwrap_or_default()
                .into_iter()
                .map(Value::from_data)
                .collect()
        };
        let template = || -> ObjectResult<Template> {
            let value = data
                .template
                .clone()
                .map(Value::from_data)
                .transpose()?
                .unwrap_or(Value::String(String::new()));
            as_template("template", &value)
        };
        Ok(match data.kind {
            MutationKind::Set => Self::Set(value.unwrap_or_default()),
            MutationKind::Unset => Self::Unset,
            MutationKind::SetIfUnset => Self::SetIfUnset(value.unwrap_or_default()),
            MutationKind::Prepend => Self::Prepend(values()?),
            MutationKind::Append => Self::Append(values()?),
            MutationKind::Prefix => Self::Prefix {
                template: template()?,
                separator: data.separator.clone(),
            },
            MutationKind::Suffix => Self::Suffix {
                template: template()?,
                separator: data.separator.clone(),
            },
            MutationKind::Merge => match value {
                Some(Value::Map(map)) => Self::Merge(map),
                None => Self::Merge(BTreeMap::new()),
                Some(other) => {
                    return Err(ObjectError::InvalidValue(format!(
                        "a merge mutation needs a map, found {other:?}"
                    )))
                }
            },
        })
    }
}

/// The string rendering of a template that holds only strings.
pub fn template_string(template: &Template) -> Option<String> {
    template
        .components()
        .iter()
        .map(|component| match component {
            TemplateComponent::String(s) => Some(s.as_str()),
            _ => None,
        })
        .collect()
}

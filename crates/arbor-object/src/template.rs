use std::ops::Add;

use arbor_types::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::ObjectResult;
use crate::object::{Artifact, Object};

/// A named slot filled in when a command runs, e.g. `output`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placeholder {
    pub name: String,
}

impl Placeholder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TemplateComponent {
    String(String),
    Placeholder(Placeholder),
    Object(Object),
}

/// A sequence of strings, placeholders, and objects.
///
/// Adjacent string components are always merged, so two templates with the
/// same rendering have the same components.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Template {
    components: Vec<TemplateComponent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateData {
    #[serde(default)]
    pub components: Vec<TemplateComponentData>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateComponentData {
    String(String),
    Tagged(TaggedComponentData),
}

/// Object components are tagged `artifact` on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TaggedComponentData {
    Placeholder(Placeholder),
    Artifact(ObjectId),
}

impl Template {
    pub fn new(components: impl IntoIterator<Item = TemplateComponent>) -> Self {
        let mut merged: Vec<TemplateComponent> = Vec::new();
        for component in components {
            if let TemplateComponent::String(next) = &component {
                if let Some(TemplateComponent::String(last)) = merged.last_mut() {
                    last.push_str(next);
                    continue;
                }
            }
            merged.push(component);
        }
        Self { components: merged }
    }

    pub fn components(&self) -> &[TemplateComponent] {
        &self.components
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Concatenate `templates` with `separator` between each pair.
    pub fn join(templates: impl IntoIterator<Item = Template>, separator: &str) -> Self {
        let mut components = Vec::new();
        for (i, template) in templates.into_iter().enumerate() {
            if i > 0 && !separator.is_empty() {
                components.push(TemplateComponent::String(separator.to_string()));
            }
            components.extend(template.components);
        }
        Self::new(components)
    }

    pub fn objects(&self) -> Vec<Object> {
        self.components
            .iter()
            .filter_map(|component| match component {
                TemplateComponent::Object(object) => Some(object.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn to_data(&self) -> ObjectResult<TemplateData> {
        Ok(TemplateData {
            components: self
                .components
                .iter()
                .map(|component| {
                    Ok(match component {
                        TemplateComponent::String(s) => TemplateComponentData::String(s.clone()),
                        TemplateComponent::Placeholder(p) => {
                            TemplateComponentData::Tagged(TaggedComponentData::Placeholder(p.clone()))
                        }
                        TemplateComponent::Object(o) => {
                            TemplateComponentData::Tagged(TaggedComponentData::Artifact(o.require_id()?))
                        }
                    })
                })
                .collect::<ObjectResult<_>>()?,
        })
    }

    pub fn from_data(data: TemplateData) -> Self {
        Self::new(data.components.into_iter().map(|component| match component {
            TemplateComponentData::String(s) => TemplateComponent::String(s),
            TemplateComponentData::Tagged(TaggedComponentData::Placeholder(p)) => {
                TemplateComponent::Placeholder(p)
            }
            TemplateComponentData::Tagged(TaggedComponentData::Artifact(id)) => {
                TemplateComponent::Object(Object::with_id(id))
            }
        }))
    }
}

impl From<&str> for Template {
    fn from(value: &str) -> Self {
        Self::new([TemplateComponent::String(value.to_string())])
    }
}

impl From<String> for Template {
    fn from(value: String) -> Self {
        Self::new([TemplateComponent::String(value)])
    }
}

impl From<Placeholder> for Template {
    fn from(value: Placeholder) -> Self {
        Self::new([TemplateComponent::Placeholder(value)])
    }
}

impl From<Object> for Template {
    fn from(value: Object) -> Self {
        Self::new([TemplateComponent::Object(value)])
    }
}

impl From<Artifact> for Template {
    fn from(value: Artifact) -> Self {
        Self::from(Object::from(value))
    }
}

impl Add<Template> for Template {
    type Output = Template;

    fn add(self, rhs: Template) -> Template {
        Template::new(self.components.into_iter().chain(rhs.components))
    }
}

impl Add<&str> for Template {
    type Output = Template;

    fn add(self, rhs: &str) -> Template {
        self + Template::from(rhs)
    }
}

impl Add<String> for Template {
    type Output = Template;

    fn add(self, rhs: String) -> Template {
        self + Template::from(rhs)
    }
}

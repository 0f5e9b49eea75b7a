use std::collections::BTreeMap;

use arbor_store::Handle;
use arbor_types::{ObjectId, ObjectKind};
use serde::{Deserialize, Serialize};

use crate::error::ObjectResult;
use crate::handle::{ObjectBody, ObjectHandle};
use crate::module::{Module, ModuleData};
use crate::object::Object;
use crate::referent::{Referent, ReferentData};

/// A stored error: message, code, diagnostics, locations, and a cause.
pub type ErrorObject = ObjectHandle<ErrorBody>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LocationFile {
    /// A file inside the runtime, by name.
    Internal(String),
    Module(Module),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Location {
    pub symbol: Option<String>,
    pub file: LocationFile,
    pub range: Range,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub location: Option<Location>,
    pub message: String,
    pub severity: Severity,
}

/// The cause of an error: another error object, or an error body held
/// inline.
#[derive(Clone, Debug, PartialEq)]
pub enum ErrorSource {
    Object(ErrorObject),
    Inline(Box<ErrorBody>),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ErrorBody {
    pub code: Option<String>,
    pub diagnostics: Option<Vec<Diagnostic>>,
    pub location: Option<Location>,
    pub message: Option<String>,
    pub source: Option<Referent<ErrorSource>>,
    pub stack: Option<Vec<Location>>,
    pub values: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Data forms
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LocationFileData {
    Internal(String),
    Module(ModuleData),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub file: LocationFileData,
    pub range: Range,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationData>,
    pub message: String,
    pub severity: Severity,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorSourceData {
    Id(ObjectId),
    Inline(Box<ErrorData>),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Vec<DiagnosticData>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ReferentData<ErrorSourceData>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<Vec<LocationData>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, String>,
}

impl Location {
    pub fn to_data(&self) -> ObjectResult<LocationData> {
        Ok(LocationData {
            symbol: self.symbol.clone(),
            file: match &self.file {
                LocationFile::Internal(name) => LocationFileData::Internal(name.clone()),
                LocationFile::Module(module) => LocationFileData::Module(module.to_data()?),
            },
            range: self.range,
        })
    }

    pub fn from_data(data: LocationData) -> ObjectResult<Self> {
        Ok(Self {
            symbol: data.symbol,
            file: match data.file {
                LocationFileData::Internal(name) => LocationFile::Internal(name),
                LocationFileData::Module(module) => LocationFile::Module(Module::from_data(module)?),
            },
            range: data.range,
        })
    }

    fn object(&self) -> Option<Object> {
        match &self.file {
            LocationFile::Module(module) => module.object(),
            LocationFile::Internal(_) => None,
        }
    }
}

impl Diagnostic {
    pub fn to_data(&self) -> ObjectResult<DiagnosticData> {
        Ok(DiagnosticData {
            location: self.location.as_ref().map(Location::to_data).transpose()?,
            message: self.message.clone(),
            severity: self.severity,
        })
    }

    pub fn from_data(data: DiagnosticData) -> ObjectResult<Self> {
        Ok(Self {
            location: data.location.map(Location::from_data).transpose()?,
            message: data.message,
            severity: data.severity,
        })
    }
}

fn map_all<T, U>(items: &[T], f: impl Fn(&T) -> ObjectResult<U>) -> ObjectResult<Vec<U>> {
    items.iter().map(f).collect()
}

impl ErrorBody {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    fn locations(&self) -> impl Iterator<Item = &Location> {
        let diagnostics = self
            .diagnostics
            .iter()
            .flatten()
            .filter_map(|d| d.location.as_ref());
        self.location
            .iter()
            .chain(self.stack.iter().flatten())
            .chain(diagnostics)
    }
}

impl ObjectBody for ErrorBody {
    const KIND: ObjectKind = ObjectKind::Error;
    type Data = ErrorData;

    fn to_data(&self) -> ObjectResult<ErrorData> {
        let source = match &self.source {
            None => None,
            Some(source) => Some(ReferentData::Map {
                item: match &source.item {
                    ErrorSource::Object(error) => ErrorSourceData::Id(error.require_id()?),
                    ErrorSource::Inline(body) => ErrorSourceData::Inline(Box::new(body.to_data()?)),
                },
                options: source.options.clone(),
            }),
        };
        Ok(ErrorData {
            code: self.code.clone(),
            diagnostics: self
                .diagnostics
                .as_deref()
                .map(|d| map_all(d, Diagnostic::to_data))
                .transpose()?,
            location: self.location.as_ref().map(Location::to_data).transpose()?,
            message: self.message.clone(),
            source,
            stack: self
                .stack
                .as_deref()
                .map(|s| map_all(s, Location::to_data))
                .transpose()?,
            values: self.values.clone(),
        })
    }

    fn from_data(data: ErrorData) -> ObjectResult<Self> {
        let source = match data.source {
            None => None,
            Some(ReferentData::String(string)) => Some(Referent::from_data_string_with(
                &string,
                |item| Ok(ErrorSource::Object(ErrorObject::with_id(ObjectId::parse(item)?)?)),
            )?),
            Some(ReferentData::Map { item, options }) => {
                let item = match item {
                    ErrorSourceData::Id(id) => ErrorSource::Object(ErrorObject::with_id(id)?),
                    ErrorSourceData::Inline(data) => {
                        ErrorSource::Inline(Box::new(ErrorBody::from_data(*data)?))
                    }
                };
                Some(Referent::with_options(item, options))
            }
        };
        Ok(Self {
            code: data.code,
            diagnostics: data
                .diagnostics
                .map(|d| d.into_iter().map(Diagnostic::from_data).collect())
                .transpose()?,
            location: data.location.map(Location::from_data).transpose()?,
            message: data.message,
            source,
            stack: data
                .stack
                .map(|s| s.into_iter().map(Location::from_data).collect())
                .transpose()?,
            values: data.values,
        })
    }

    /// The source error object and every module object named by a location.
    /// An inline source contributes its own children.
    fn children(&self) -> Vec<Object> {
        let mut children: Vec<Object> = self.locations().filter_map(Location::object).collect();
        match self.source.as_ref().map(|s| &s.item) {
            Some(ErrorSource::Object(error)) => children.push(Object::Error(error.clone())),
            Some(ErrorSource::Inline(body)) => children.extend(body.children()),
            None => {}
        }
        children
    }

    fn into_object(handle: ErrorObject) -> Object {
        Object::Error(handle)
    }
}

impl ErrorObject {
    pub fn new(body: ErrorBody) -> Self {
        Self::with_body(body)
    }

    pub async fn code(&self, handle: &dyn Handle) -> ObjectResult<Option<String>> {
        Ok(self.load(handle).await?.code.clone())
    }

    pub async fn message(&self, handle: &dyn Handle) -> ObjectResult<Option<String>> {
        Ok(self.load(handle).await?.message.clone())
    }

    pub async fn diagnostics(&self, handle: &dyn Handle) -> ObjectResult<Option<Vec<Diagnostic>>> {
        Ok(self.load(handle).await?.diagnostics.clone())
    }

    pub async fn location(&self, handle: &dyn Handle) -> ObjectResult<Option<Location>> {
        Ok(self.load(handle).await?.location.clone())
    }

    pub async fn stack(&self, handle: &dyn Handle) -> ObjectResult<Option<Vec<Location>>> {
        Ok(self.load(handle).await?.stack.clone())
    }

    pub async fn values(&self, handle: &dyn Handle) -> ObjectResult<BTreeMap<String, String>> {
        Ok(self.load(handle).await?.values.clone())
    }

    /// The cause of this error. An inline source is wrapped in a new,
    /// unstored error object.
    pub async fn source(&self, handle: &dyn Handle) -> ObjectResult<Option<Referent<ErrorObject>>> {
        let body = self.load(handle).await?;
        Ok(body.source.clone().map(|source| {
            source.map(|item| match item {
                ErrorSource::Object(error) => error,
                ErrorSource::Inline(body) => ErrorObject::new(*body),
            })
        }))
    }
}

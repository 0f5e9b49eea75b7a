use arbor_types::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::ObjectResult;
use crate::object::Object;
use crate::referent::{Referent, ReferentData};

/// The language or object kind a module is interpreted as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    Js,
    Ts,
    Dts,
    Object,
    Artifact,
    Blob,
    Directory,
    File,
    Symlink,
    Graph,
    Command,
}

/// What a module refers to: a stored object or a path.
#[derive(Clone, Debug, PartialEq)]
pub enum ModuleItem {
    Object(Object),
    Path(String),
}

impl ModuleItem {
    fn to_data_string(&self) -> ObjectResult<String> {
        match self {
            Self::Object(object) => Ok(object.require_id()?.to_string()),
            Self::Path(path) => Ok(path.clone()),
        }
    }

    /// A string that parses as an id is an object, anything else a path.
    fn from_data_string(item: &str) -> Self {
        match ObjectId::parse(item) {
            Ok(id) => Self::Object(Object::with_id(id)),
            Err(_) => Self::Path(item.to_string()),
        }
    }
}

/// A module referenced from an error location or a command executable.
#[derive(Clone, Debug, PartialEq)]
pub struct Module {
    pub kind: ModuleKind,
    pub referent: Referent<ModuleItem>,
}

/// Written with the referent in string form. The map form is also read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModuleData {
    pub kind: ModuleKind,
    pub referent: ReferentData<String>,
}

impl Module {
    pub fn new(kind: ModuleKind, referent: Referent<ModuleItem>) -> Self {
        Self { kind, referent }
    }

    /// The object this module refers to, if any.
    pub fn object(&self) -> Option<Object> {
        match &self.referent.item {
            ModuleItem::Object(object) => Some(object.clone()),
            ModuleItem::Path(_) => None,
        }
    }

    pub fn to_data(&self) -> ObjectResult<ModuleData> {
        Ok(ModuleData {
            kind: self.kind,
            referent: ReferentData::String(
                self.referent
                    .to_data_string_with(ModuleItem::to_data_string)?,
            ),
        })
    }

    pub fn from_data(data: ModuleData) -> ObjectResult<Self> {
        let referent = match data.referent {
            ReferentData::String(string) => {
                Referent::from_data_string_with(&string, |item| {
                    Ok(ModuleItem::from_data_string(item))
                })?
            }
            ReferentData::Map { item, options } => {
                Referent::with_options(ModuleItem::from_data_string(&item), options)
            }
        };
        Ok(Self {
            kind: data.kind,
            referent,
        })
    }
}

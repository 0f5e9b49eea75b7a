use std::collections::BTreeMap;

use arbor_store::Handle;
use arbor_types::{ObjectId, ObjectKind};
use serde::{Deserialize, Serialize};

use crate::blob::Blob;
use crate::error::ObjectResult;
use crate::handle::{ObjectBody, ObjectHandle};
use crate::module::{Module, ModuleData};
use crate::object::{Artifact, Object};
use crate::value::{Value, ValueData};

/// How to run a process: executable, arguments, environment, and mounts.
pub type Command = ObjectHandle<CommandBody>;

#[derive(Clone, Debug, PartialEq)]
pub enum Executable {
    /// An artifact, optionally with a path inside it.
    Artifact {
        artifact: Artifact,
        path: Option<String>,
    },
    /// An export of a module.
    Module {
        module: Module,
        export: Option<String>,
    },
    /// A path looked up on the host.
    Path { path: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Mount {
    pub source: Artifact,
    pub target: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandBody {
    pub args: Vec<Value>,
    pub cwd: Option<String>,
    pub env: BTreeMap<String, Value>,
    pub executable: Option<Executable>,
    pub host: String,
    pub mounts: Vec<Mount>,
    pub stdin: Option<Blob>,
    pub user: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecutableData {
    Artifact {
        artifact: ObjectId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    Module {
        module: ModuleData,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        export: Option<String>,
    },
    Path {
        path: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MountData {
    pub source: ObjectId,
    pub target: String,
}

/// `args`, `env`, and `host` are always written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandData {
    #[serde(default)]
    pub args: Vec<ValueData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, ValueData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<ExecutableData>,
    #[serde(default)]
    pub host: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<MountData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl Executable {
    fn to_data(&self) -> ObjectResult<ExecutableData> {
        Ok(match self {
            Self::Artifact { artifact, path } => ExecutableData::Artifact {
                artifact: artifact.require_id()?,
                path: path.clone(),
            },
            Self::Module { module, export } => ExecutableData::Module {
                module: module.to_data()?,
                export: export.clone(),
            },
            Self::Path { path } => ExecutableData::Path { path: path.clone() },
        })
    }

    fn from_data(data: ExecutableData) -> ObjectResult<Self> {
        Ok(match data {
            ExecutableData::Artifact { artifact, path } => Self::Artifact {
                artifact: Artifact::with_id(artifact)?,
                path,
            },
            ExecutableData::Module { module, export } => Self::Module {
                module: Module::from_data(module)?,
                export,
            },
            ExecutableData::Path { path } => Self::Path { path },
        })
    }

    fn object(&self) -> Option<Object> {
        match self {
            Self::Artifact { artifact, .. } => Some(artifact.as_object()),
            Self::Module { module, .. } => module.object(),
            Self::Path { .. } => None,
        }
    }
}

impl ObjectBody for CommandBody {
    const KIND: ObjectKind = ObjectKind::Command;
    type Data = CommandData;

    fn to_data(&self) -> ObjectResult<CommandData> {
        Ok(CommandData {
            args: self
                .args
                .iter()
                .map(Value::to_data)
                .collect::<ObjectResult<_>>()?,
            cwd: self.cwd.clone(),
            env: self
                .env
                .iter()
                .map(|(k, v)| Ok((k.clone(), v.to_data()?)))
                .collect::<ObjectResult<_>>()?,
            executable: self.executable.as_ref().map(Executable::to_data).transpose()?,
            host: self.host.clone(),
            mounts: self
                .mounts
                .iter()
                .map(|mount| {
                    Ok(MountData {
                        source: mount.source.require_id()?,
                        target: mount.target.clone(),
                    })
                })
                .collect::<ObjectResult<_>>()?,
            stdin: self.stdin.as_ref().map(Blob::require_id).transpose()?,
            user: self.user.clone(),
        })
    }

    fn from_data(data: CommandData) -> ObjectResult<Self> {
        Ok(Self {
            args: data
                .args
                .into_iter()
                .map(Value::from_data)
                .collect::<ObjectResult<_>>()?,
            cwd: data.cwd,
            env: data
                .env
                .into_iter()
                .map(|(k, v)| Ok((k, Value::from_data(v)?)))
                .collect::<ObjectResult<_>>()?,
            executable: data.executable.map(Executable::from_data).transpose()?,
            host: data.host,
            mounts: data
                .mounts
                .into_iter()
                .map(|mount| {
                    Ok(Mount {
                        source: Artifact::with_id(mount.source)?,
                        target: mount.target,
                    })
                })
                .collect::<ObjectResult<_>>()?,
            stdin: data.stdin.map(Blob::with_id).transpose()?,
            user: data.user,
        })
    }

    fn children(&self) -> Vec<Object> {
        let mut children: Vec<Object> = self.args.iter().flat_map(Value::objects).collect();
        children.extend(self.env.values().flat_map(Value::objects));
        children.extend(self.executable.as_ref().and_then(Executable::object));
        children.extend(self.mounts.iter().map(|mount| mount.source.as_object()));
        children.extend(self.stdin.iter().cloned().map(Object::Blob));
        children
    }

    fn into_object(handle: Command) -> Object {
        Object::Command(handle)
    }
}

impl Command {
    pub fn new(body: CommandBody) -> Self {
        Self::with_body(body)
    }

    pub async fn args(&self, handle: &dyn Handle) -> ObjectResult<Vec<Value>> {
        Ok(self.load(handle).await?.args.clone())
    }

    pub async fn cwd(&self, handle: &dyn Handle) -> ObjectResult<Option<String>> {
        Ok(self.load(handle).await?.cwd.clone())
    }

    pub async fn env(&self, handle: &dyn Handle) -> ObjectResult<BTreeMap<String, Value>> {
        Ok(self.load(handle).await?.env.clone())
    }

    pub async fn executable(&self, handle: &dyn Handle) -> ObjectResult<Option<Executable>> {
        Ok(self.load(handle).await?.executable.clone())
    }

    pub async fn host(&self, handle: &dyn Handle) -> ObjectResult<String> {
        Ok(self.load(handle).await?.host.clone())
    }

    pub async fn mounts(&self, handle: &dyn Handle) -> ObjectResult<Vec<Mount>> {
        Ok(self.load(handle).await?.mounts.clone())
    }

    pub async fn stdin(&self, handle: &dyn Handle) -> ObjectResult<Option<Blob>> {
        Ok(self.load(handle).await?.stdin.clone())
    }

    pub async fn user(&self, handle: &dyn Handle) -> ObjectResult<Option<String>> {
        Ok(self.load(handle).await?.user.clone())
    }
}

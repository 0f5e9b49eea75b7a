//! The arbor object model.
//!
//! Every value that arbor persists is an object of one of seven kinds. An
//! object is referenced through a cheap, clonable handle that may hold its
//! id, its body, or both, and fills in whichever is missing on demand.
//!
//! # Key Types
//!
//! - [`Object`] / [`Artifact`] -- closed unions over the kinds
//! - [`Blob`], [`Directory`], [`File`], [`Symlink`], [`Graph`], [`Command`],
//!   [`ErrorObject`] -- typed handles, one per kind
//! - [`Pointer`] / [`Edge`] -- references into a graph's node list
//! - [`Referent`] -- a value plus provenance options
//! - [`Value`], [`Mutation`], [`Template`] -- structured data around objects
//! - [`Unresolved`] -- values with pending work, consumed by [`resolve`] and
//!   [`store`]
//!
//! # Design Rules
//!
//! 1. Bodies are never mutated after construction.
//! 2. A body is encoded only after each of its children has an id.
//! 3. `store` makes exactly one batch submission, children first.
//! 4. Decoding never fetches: ids become id-only handles.
//! 5. All storage goes through an explicit [`Handle`](arbor_store::Handle).

pub mod blob;
mod codec;
pub mod command;
pub mod directory;
pub mod error;
pub mod error_object;
pub mod file;
pub mod graph;
pub mod handle;
pub mod module;
pub mod mutation;
pub mod object;
pub mod path;
pub mod referent;
pub mod resolve;
mod state;
pub mod store;
pub mod symlink;
pub mod template;
pub mod value;

pub use blob::{Blob, BlobArg, BlobBody, BlobChild};
pub use command::{Command, CommandBody, Executable, Mount};
pub use directory::{Directory, DirectoryArg, DirectoryBody, EntryArg};
pub use error::{ObjectError, ObjectResult};
pub use error_object::{
    Diagnostic, ErrorBody, ErrorObject, ErrorSource, Location, LocationFile, Position, Range,
    Severity,
};
pub use file::{File, FileBody, FileDependency};
pub use graph::{
    dependency_from_string, dependency_to_string, Dependency, DirectoryNode, Edge, EdgeArg, FileNode,
    Graph, GraphArg, GraphBody, GraphRef, Node, NodeArg, Pointer, SymlinkNode,
};
pub use handle::{ObjectBody, ObjectHandle};
pub use module::{Module, ModuleItem, ModuleKind};
pub use mutation::{Mutation, MutationKind};
pub use object::{Artifact, Object};
pub use path::Component;
pub use referent::{Referent, ReferentOptions};
pub use resolve::{resolve, Unresolved};
pub use store::store;
pub use symlink::{Symlink, SymlinkArg, SymlinkBody};
pub use template::{Placeholder, Template, TemplateComponent};
pub use value::Value;

//! Store handle boundary for arbor.
//!
//! The object model never touches bytes on disk or on the wire directly. It
//! talks to a [`Handle`], which provides exactly three things:
//!
//! - a deterministic hash from `(kind, canonical bytes)` to an [`ObjectId`]
//! - lookup of canonical bytes by id
//! - persistence of an ordered batch of `(id, bytes)` pairs
//!
//! # Backends
//!
//! - [`InMemoryHandle`] -- `HashMap`-based handle for tests and embedding
//! - [`FsHandle`] -- one file per object under `<root>/objects/`
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written; rewriting an id is a no-op.
//! 2. Every write is verified against the handle's own hash before it lands.
//! 3. A batch is the only side-effecting call the object model makes.
//! 4. The handle never interprets object contents.
//!
//! [`ObjectId`]: arbor_types::ObjectId

pub mod error;
pub mod fs;
pub mod hasher;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::{FsHandle, FsHandleConfig};
pub use hasher::ContentHasher;
pub use memory::InMemoryHandle;
pub use traits::{Handle, PutItem};

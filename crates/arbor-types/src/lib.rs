//! Foundation types for arbor.
//!
//! Every object in the store is addressed by an [`ObjectId`] whose first three
//! characters are a fixed kind tag. This crate owns that mapping and nothing
//! else; hashing is performed by a store handle and bodies live in
//! `arbor-object`.
//!
//! # Key Types
//!
//! - [`ObjectKind`] -- The seven object kinds and their tags
//! - [`ArtifactKind`] -- The subset of kinds that can appear in a directory
//! - [`ObjectId`] -- Content-addressed identifier `<tag>_<digest>`
//! - [`kind_of`] -- Tag lookup on an arbitrary id string

pub mod error;
pub mod kind;
pub mod object;

pub use error::TypeError;
pub use kind::{ArtifactKind, ObjectKind};
pub use object::{kind_of, ObjectId};

//! Compute pipeline documents
//!
//! This crate parses the declarative JSON pipeline document (textures and compute
//! passes), resolves its format vocabulary, and turns it into validated, typed
//! descriptors. It has no GPU dependency: everything here can be checked before a
//! device exists.

mod binding;
mod descriptor;
mod document;
mod error;
mod format;
mod validate;

pub use binding::{AuxiliaryRole, BindingClass, BindingSlot, BindingSource, BindingTable};
pub use descriptor::{AuxiliaryTextures, Dimension, DispatchExtent, PassDescriptor, PipelineDescriptor, TextureDescriptor, TextureExtent};
pub use document::{PassEntry, PipelineDocument, TextureEntry};
pub use error::DocumentError;
pub use format::{ComponentType, FilterMode, FormatError, FormatKind, InternalFormat, PixelFormat, PixelType, WrapMode};
pub use validate::{ReferenceIssue, ReferenceProblem};

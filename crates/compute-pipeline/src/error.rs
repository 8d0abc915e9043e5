use crate::backend::BackendError;
use compute_pipeline_doc::{Dimension, DocumentError, ReferenceIssue};
use std::path::PathBuf;

/// Errors that abort a pipeline operation
///
/// Everything raised by `load` and `reload` leaves the manager in the state it
/// had before the call.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to read pipeline document {path}: {source}")]
    DocumentIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid pipeline document: {0}")]
    Document(#[from] DocumentError),
    #[error("texture \"{texture}\": failed to read {path}: {source}")]
    TextureIo {
        texture: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("texture \"{texture}\": {path} holds {actual} bytes but the declared size and format need {expected}")]
    TextureSize { texture: String, path: PathBuf, expected: u64, actual: u64 },
    #[error("pass \"{pass}\": failed to read shader {path}: {source}")]
    ShaderIo {
        pass: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{resource}: {source}")]
    Backend {
        resource: String,
        #[source]
        source: BackendError,
    },
    #[error("{} unresolved texture reference(s), first: {}", .0.len(), .0.first().map(ToString::to_string).unwrap_or_default())]
    UnresolvedReferences(Vec<ReferenceIssue>),
    #[error("pipeline document does not name a final image")]
    NoFinalImage,
    #[error("final image: {0}")]
    FinalImage(#[source] LookupError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("texture \"{0}\" is 3D and cannot be read back")]
    ReadBackUnsupported(String),
    #[error("failed to write export {path}: {source}")]
    ExportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode export {path}: {source}")]
    ExportEncode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("cannot {operation} while the pipeline is {state}")]
    InvalidState { operation: &'static str, state: &'static str },
}

/// A texture lookup that did not produce a resource
///
/// Lookups happen inside the per-frame loop, so callers treat every variant as
/// recoverable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("texture \"{0}\" not found")]
    NotFound(String),
    #[error("texture lookup with an empty name")]
    EmptyName,
    #[error("texture \"{name}\" is {actual}, expected {expected}")]
    WrongDimension { name: String, expected: Dimension, actual: Dimension },
}

impl PipelineError {
    pub(crate) fn backend(resource: impl Into<String>, source: BackendError) -> Self {
        Self::Backend {
            resource: resource.into(),
            source,
        }
    }
}

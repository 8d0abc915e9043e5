use crate::{Dimension, FormatError, InternalFormat, PixelFormat, TextureExtent};

/// Errors that make a pipeline document unusable
///
/// All of these are configuration errors: the document itself breaks the
/// declarative contract, so loading must stop before any GPU work happens.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("malformed pipeline document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("texture \"{texture}\": {source}")]
    Format {
        texture: String,
        #[source]
        source: FormatError,
    },
    #[error("texture \"{texture}\" ({dimension}) is missing required field \"{field}\"")]
    MissingField { texture: String, dimension: Dimension, field: &'static str },
    #[error("texture name \"{name}\" is declared as {first} and again as {second}")]
    DuplicateTexture { name: String, first: Dimension, second: Dimension },
    #[error("pass name \"{0}\" is declared more than once")]
    DuplicatePass(String),
    #[error("texture \"{texture}\": internal format {internal} has {} channels but pixel format {pixel} has {}", .internal.channels(), .pixel.channels())]
    ChannelMismatch { texture: String, internal: InternalFormat, pixel: PixelFormat },
    #[error("texture \"{0}\" has a zero-sized extent")]
    ZeroExtent(String),
    #[error("texture \"{texture}\" extent {extent} is too large to address")]
    ExtentTooLarge { texture: String, extent: TextureExtent },
    #[error("pass \"{0}\" has a zero dispatch extent")]
    ZeroDispatch(String),
    #[error("a {0} has an empty name")]
    EmptyName(&'static str),
}

//! Format vocabulary resolver
//!
//! Maps the configuration strings used in pipeline documents ("RGBA16F",
//! "CLAMP_TO_EDGE", "LINEAR", ...) to typed enumerations. Resolution is total over
//! the documented vocabulary and fails with a [`FormatError`] for anything else;
//! there is no fallback value.

use std::fmt;
use std::str::FromStr;

/// Which vocabulary a string was resolved against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    InternalFormat,
    PixelFormat,
    PixelType,
    Wrap,
    Filter,
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InternalFormat => write!(f, "Internal format"),
            Self::PixelFormat => write!(f, "Pixel format"),
            Self::PixelType => write!(f, "Pixel type"),
            Self::Wrap => write!(f, "Wrap parameter"),
            Self::Filter => write!(f, "Filter parameter"),
        }
    }
}

/// A configuration string outside the vocabulary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("{kind} \"{value}\" unimplemented")]
    Unknown { kind: FormatKind, value: String },
}

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident: $kind:expr, {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every accepted value, in vocabulary order
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The configuration string naming this value
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = FormatError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(FormatError::Unknown { kind: $kind, value: s.to_string() }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary! {
    /// Storage layout of a texture on the GPU
    InternalFormat: FormatKind::InternalFormat, {
        R8 => "R8",
        Rg8 => "RG8",
        Rgb8 => "RGB8",
        Rgba8 => "RGBA8",
        R16 => "R16",
        Rg16 => "RG16",
        Rgb16 => "RGB16",
        Rgba16 => "RGBA16",
        R16F => "R16F",
        Rg16F => "RG16F",
        Rgba16F => "RGBA16F",
        R32F => "R32F",
        Rg32F => "RG32F",
        Rgb32F => "RGB32F",
        Rgba32F => "RGBA32F",
        /// Packed unsigned float, 4 bytes per texel
        R11FG11FB10F => "R11F_G11F_B10F",
    }
}

vocabulary! {
    /// Channel layout of uploaded pixel data
    PixelFormat: FormatKind::PixelFormat, {
        Red => "RED",
        Rg => "RG",
        Rgb => "RGB",
        Bgr => "BGR",
        Rgba => "RGBA",
        Bgra => "BGRA",
    }
}

vocabulary! {
    /// Element type of uploaded pixel data
    PixelType: FormatKind::PixelType, {
        Byte => "BYTE",
        Short => "SHORT",
        Int => "INT",
        HalfFloat => "HALF_FLOAT",
        Float => "FLOAT",
        UnsignedByte => "UNSIGNED_BYTE",
    }
}

vocabulary! {
    /// Texture coordinate wrapping
    WrapMode: FormatKind::Wrap, {
        ClampToEdge => "CLAMP_TO_EDGE",
        Repeat => "REPEAT",
        ClampToBorder => "CLAMP_TO_BORDER",
    }
}

vocabulary! {
    /// Minification and magnification filter
    FilterMode: FormatKind::Filter, {
        Nearest => "NEAREST",
        Linear => "LINEAR",
    }
}

/// Scalar representation of one channel in GPU storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    UNorm8,
    UNorm16,
    Float16,
    Float32,
    /// Channels share one packed 32-bit word
    PackedFloat,
}

impl InternalFormat {
    /// Number of channels stored per texel
    pub fn channels(self) -> u32 {
        match self {
            Self::R8 | Self::R16 | Self::R16F | Self::R32F => 1,
            Self::Rg8 | Self::Rg16 | Self::Rg16F | Self::Rg32F => 2,
            Self::Rgb8 | Self::Rgb16 | Self::Rgb32F | Self::R11FG11FB10F => 3,
            Self::Rgba8 | Self::Rgba16 | Self::Rgba16F | Self::Rgba32F => 4,
        }
    }

    pub fn component_type(self) -> ComponentType {
        match self {
            Self::R8 | Self::Rg8 | Self::Rgb8 | Self::Rgba8 => ComponentType::UNorm8,
            Self::R16 | Self::Rg16 | Self::Rgb16 | Self::Rgba16 => ComponentType::UNorm16,
            Self::R16F | Self::Rg16F | Self::Rgba16F => ComponentType::Float16,
            Self::R32F | Self::Rg32F | Self::Rgb32F | Self::Rgba32F => ComponentType::Float32,
            Self::R11FG11FB10F => ComponentType::PackedFloat,
        }
    }

    /// Size of one stored texel in bytes
    pub fn bytes_per_texel(self) -> u32 {
        match self.component_type() {
            ComponentType::UNorm8 => self.channels(),
            ComponentType::UNorm16 | ComponentType::Float16 => self.channels() * 2,
            ComponentType::Float32 => self.channels() * 4,
            ComponentType::PackedFloat => 4,
        }
    }
}

impl PixelFormat {
    pub fn channels(self) -> u32 {
        match self {
            Self::Red => 1,
            Self::Rg => 2,
            Self::Rgb | Self::Bgr => 3,
            Self::Rgba | Self::Bgra => 4,
        }
    }

    /// Whether red and blue are swapped relative to storage order
    pub fn is_bgr_order(self) -> bool {
        matches!(self, Self::Bgr | Self::Bgra)
    }
}

impl PixelType {
    pub fn size_in_bytes(self) -> u32 {
        match self {
            Self::Byte | Self::UnsignedByte => 1,
            Self::Short | Self::HalfFloat => 2,
            Self::Int | Self::Float => 4,
        }
    }
}

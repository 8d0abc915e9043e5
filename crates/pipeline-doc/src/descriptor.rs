//! Typed pipeline descriptors
//!
//! A [`PipelineDescriptor`] is a [`PipelineDocument`] with every format string
//! resolved, every required dimension present, and texture names checked for
//! uniqueness across all dimensionalities.

use crate::{DocumentError, FilterMode, InternalFormat, PassEntry, PipelineDocument, PixelFormat, PixelType, TextureEntry, WrapMode};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
    D1,
    D2,
    D3,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::D1 => write!(f, "1D"),
            Self::D2 => write!(f, "2D"),
            Self::D3 => write!(f, "3D"),
        }
    }
}

/// Texture size in texels, tagged with its dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureExtent {
    D1 { width: u32 },
    D2 { width: u32, height: u32 },
    D3 { width: u32, height: u32, depth: u32 },
}

impl TextureExtent {
    pub fn dimension(&self) -> Dimension {
        match self {
            Self::D1 { .. } => Dimension::D1,
            Self::D2 { .. } => Dimension::D2,
            Self::D3 { .. } => Dimension::D3,
        }
    }

    pub fn width(&self) -> u32 {
        match *self {
            Self::D1 { width } | Self::D2 { width, .. } | Self::D3 { width, .. } => width,
        }
    }

    /// Height in texels; 1 for 1D textures
    pub fn height(&self) -> u32 {
        match *self {
            Self::D1 { .. } => 1,
            Self::D2 { height, .. } | Self::D3 { height, .. } => height,
        }
    }

    /// Depth in texels; 1 for 1D and 2D textures
    pub fn depth(&self) -> u32 {
        match *self {
            Self::D3 { depth, .. } => depth,
            _ => 1,
        }
    }

    /// Number of texels, or `None` when it does not fit in a `u64`
    pub fn texel_count(&self) -> Option<u64> {
        (self.width() as u64).checked_mul(self.height() as u64)?.checked_mul(self.depth() as u64)
    }
}

impl fmt::Display for TextureExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::D1 { width } => write!(f, "{width}"),
            Self::D2 { width, height } => write!(f, "{width}x{height}"),
            Self::D3 { width, height, depth } => write!(f, "{width}x{height}x{depth}"),
        }
    }
}

/// A fully resolved texture declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub name: String,
    /// Initial contents, relative to the resource root
    pub source_file: Option<PathBuf>,
    pub extent: TextureExtent,
    pub internal_format: InternalFormat,
    pub pixel_format: PixelFormat,
    pub pixel_type: PixelType,
    pub wrap: WrapMode,
    pub filter: FilterMode,
    pub persist_across_reload: bool,
}

impl TextureDescriptor {
    pub fn dimension(&self) -> Dimension {
        self.extent.dimension()
    }

    /// Number of bytes a source file must hold to fill the whole texture
    ///
    /// `None` when the size overflows; resolved descriptors never overflow.
    pub fn expected_upload_len(&self) -> Option<u64> {
        self.extent
            .texel_count()?
            .checked_mul(self.pixel_format.channels() as u64)?
            .checked_mul(self.pixel_type.size_in_bytes() as u64)
    }

    /// Whether `other` describes GPU storage identical to this one
    ///
    /// Storage is identical when extent and all three formats agree; sampling
    /// state and source file do not affect it.
    pub fn same_storage(&self, other: &TextureDescriptor) -> bool {
        self.extent == other.extent && self.internal_format == other.internal_format && self.pixel_format == other.pixel_format && self.pixel_type == other.pixel_type
    }
}

/// Compute dispatch size in workgroups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchExtent {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl fmt::Display for DispatchExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// The five single-texture auxiliary binding roles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuxiliaryTextures {
    pub input: Option<String>,
    pub output: Option<String>,
    pub kernel: Option<String>,
    pub bias: Option<String>,
    pub aux: Option<String>,
}

/// A fully resolved compute pass declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassDescriptor {
    pub name: String,
    /// Shader file path relative to the shader root
    pub source: PathBuf,
    pub dispatch: DispatchExtent,
    pub bound_images: Vec<String>,
    pub bound_samplers: Vec<String>,
    pub auxiliary: AuxiliaryTextures,
}

/// A validated pipeline: textures in creation order and passes in execution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDescriptor {
    /// All textures, 1D first, then 2D, then 3D, each in declaration order
    pub textures: Vec<TextureDescriptor>,
    pub passes: Vec<PassDescriptor>,
    pub final_image: Option<String>,
}

impl PipelineDescriptor {
    /// Parses and resolves a pipeline document from JSON content
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        PipelineDocument::from_json(json)?.resolve()
    }

    pub fn texture(&self, name: &str) -> Option<&TextureDescriptor> {
        self.textures.iter().find(|texture| texture.name == name)
    }

    pub fn pass(&self, name: &str) -> Option<&PassDescriptor> {
        self.passes.iter().find(|pass| pass.name == name)
    }
}

impl PipelineDocument {
    /// Resolves format strings and checks the document's structural invariants
    ///
    /// Fails on the first unknown format string, missing dimension, zero extent,
    /// channel-count disagreement, or duplicated texture or pass name.
    pub fn resolve(self) -> Result<PipelineDescriptor, DocumentError> {
        let mut textures = Vec::new();
        let mut seen: HashMap<String, Dimension> = HashMap::new();

        let groups = [(Dimension::D1, self.textures_1d), (Dimension::D2, self.textures_2d), (Dimension::D3, self.textures_3d)];
        for (dimension, entries) in groups {
            for entry in entries {
                let texture = resolve_texture(entry, dimension)?;
                if let Some(&first) = seen.get(&texture.name) {
                    return Err(DocumentError::DuplicateTexture {
                        name: texture.name,
                        first,
                        second: dimension,
                    });
                }
                seen.insert(texture.name.clone(), dimension);
                textures.push(texture);
            }
        }

        let mut pass_names = HashSet::new();
        let mut passes = Vec::with_capacity(self.passes.len());
        for entry in self.passes {
            let pass = resolve_pass(entry)?;
            if !pass_names.insert(pass.name.clone()) {
                return Err(DocumentError::DuplicatePass(pass.name));
            }
            passes.push(pass);
        }

        Ok(PipelineDescriptor {
            textures,
            passes,
            final_image: self.final_image,
        })
    }
}

fn resolve_texture(entry: TextureEntry, dimension: Dimension) -> Result<TextureDescriptor, DocumentError> {
    if entry.name.is_empty() {
        return Err(DocumentError::EmptyName("texture"));
    }

    let format_error = |source| DocumentError::Format {
        texture: entry.name.clone(),
        source,
    };
    let internal_format: InternalFormat = entry.internal_format.parse().map_err(format_error)?;
    let pixel_format: PixelFormat = entry.pixel_format.parse().map_err(format_error)?;
    let pixel_type: PixelType = entry.pixel_type.parse().map_err(format_error)?;
    let wrap: WrapMode = entry.texture_wrap.parse().map_err(format_error)?;
    let filter: FilterMode = entry.filter.parse().map_err(format_error)?;

    let require = |value: Option<u32>, field: &'static str| {
        value.ok_or_else(|| DocumentError::MissingField {
            texture: entry.name.clone(),
            dimension,
            field,
        })
    };
    let extent = match dimension {
        Dimension::D1 => TextureExtent::D1 { width: entry.width },
        Dimension::D2 => TextureExtent::D2 {
            width: entry.width,
            height: require(entry.height, "height")?,
        },
        Dimension::D3 => TextureExtent::D3 {
            width: entry.width,
            height: require(entry.height, "height")?,
            depth: require(entry.depth, "depth")?,
        },
    };

    // Largest texel is four 32-bit channels, on upload and in storage
    match extent.texel_count() {
        Some(0) => return Err(DocumentError::ZeroExtent(entry.name)),
        Some(count) if count.checked_mul(16).is_some_and(|bytes| bytes <= isize::MAX as u64) => {}
        _ => return Err(DocumentError::ExtentTooLarge { texture: entry.name, extent }),
    }

    if internal_format.channels() != pixel_format.channels() {
        return Err(DocumentError::ChannelMismatch {
            texture: entry.name,
            internal: internal_format,
            pixel: pixel_format,
        });
    }

    Ok(TextureDescriptor {
        name: entry.name,
        source_file: entry.file_name.filter(|file| !file.is_empty()).map(PathBuf::from),
        extent,
        internal_format,
        pixel_format,
        pixel_type,
        wrap,
        filter,
        persist_across_reload: entry.persist_across_reload,
    })
}

fn resolve_pass(entry: PassEntry) -> Result<PassDescriptor, DocumentError> {
    if entry.name.is_empty() {
        return Err(DocumentError::EmptyName("pass"));
    }

    let dispatch = DispatchExtent {
        x: entry.dispatch_size_x,
        y: entry.dispatch_size_y,
        z: entry.dispatch_size_z,
    };
    if dispatch.x == 0 || dispatch.y == 0 || dispatch.z == 0 {
        return Err(DocumentError::ZeroDispatch(entry.name));
    }

    // An empty role string means the role is unused
    let role = |value: Option<String>| value.filter(|name| !name.is_empty());

    Ok(PassDescriptor {
        name: entry.name,
        source: PathBuf::from(entry.source),
        dispatch,
        bound_images: entry.bound_images,
        bound_samplers: entry.bound_samplers,
        auxiliary: AuxiliaryTextures {
            input: role(entry.input_tex),
            output: role(entry.output_tex),
            kernel: role(entry.kernel_tex),
            bias: role(entry.bias_tex),
            aux: role(entry.aux_tex),
        },
    })
}

//! GPU backend seam
//!
//! The pipeline manager drives the GPU through [`GpuBackend`], a small
//! GL-shaped command interface: numbered image and sampler units, a current
//! program, named uniforms, memory barriers and dispatches. [`WgpuBackend`]
//! maps it onto wgpu; [`RecordingBackend`] records the calls without a device.

mod convert;
mod recording;
mod wgpu_backend;

pub use recording::{BackendCall, RecordingBackend};
pub use wgpu_backend::WgpuBackend;

use compute_pipeline_doc::{DispatchExtent, InternalFormat, PixelFormat, PixelType, TextureDescriptor};

/// Opaque texture object id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub(crate) u64);

/// Opaque program object id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub(crate) u64);

/// Typed value for a named uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    UInt(u32),
    Bool(bool),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    /// Column-major 4x4 matrix
    Mat4([f32; 16]),
}

impl UniformValue {
    /// Size of the value in a std140 uniform block
    pub fn size_in_bytes(&self) -> usize {
        match self {
            Self::Float(_) | Self::Int(_) | Self::UInt(_) | Self::Bool(_) => 4,
            Self::Vec2(_) => 8,
            Self::Vec3(_) => 12,
            Self::Mat4(_) => 64,
        }
    }

    /// Little-endian bytes as laid out in a uniform block
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Float(value) => value.to_le_bytes().to_vec(),
            Self::Int(value) => value.to_le_bytes().to_vec(),
            Self::UInt(value) => value.to_le_bytes().to_vec(),
            Self::Bool(value) => u32::from(*value).to_le_bytes().to_vec(),
            Self::Vec2(value) => bytemuck::cast_slice(value).to_vec(),
            Self::Vec3(value) => bytemuck::cast_slice(value).to_vec(),
            Self::Mat4(value) => bytemuck::cast_slice(value).to_vec(),
        }
    }
}

/// Failures reported by a GPU backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("internal format {0} is not supported by this backend")]
    UnsupportedFormat(InternalFormat),
    #[error("cannot upload {pixel_format}/{pixel_type} data into {internal} storage")]
    UnsupportedConversion {
        internal: InternalFormat,
        pixel_format: PixelFormat,
        pixel_type: PixelType,
    },
    #[error("upload holds {actual} bytes, expected {expected}")]
    UploadSize { expected: usize, actual: usize },
    #[error("unknown texture handle {0:?}")]
    UnknownTexture(TextureHandle),
    #[error("unknown program handle {0:?}")]
    UnknownProgram(ProgramHandle),
    #[error("no program is in use")]
    NoProgram,
    #[error("program {0:?} is not linked")]
    ProgramNotLinked(ProgramHandle),
    #[error("shader resource at set {group} binding {binding} has nothing bound")]
    IncompleteBinding { group: u32, binding: u32 },
    #[error("image unit {unit} is read-write but {format} storage is not read-write on this device")]
    ReadWriteImage { unit: u32, format: InternalFormat },
    #[error("GPU validation failed: {0}")]
    Validation(String),
    #[error("failed to request a GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to request a GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("failed to read back texture: {0}")]
    ReadBack(String),
}

/// Command interface the pipeline manager drives
///
/// Bindings are global state: a texture bound at a unit stays bound until the
/// unit is rebound or unbound, regardless of which program is in use.
pub trait GpuBackend {
    /// Allocates storage for `descriptor`, optionally initialized from bytes laid
    /// out as the descriptor's pixel format and type
    fn create_texture(&mut self, descriptor: &TextureDescriptor, contents: Option<&[u8]>) -> Result<TextureHandle, BackendError>;

    /// Releases a texture; unknown or already destroyed handles are ignored
    fn destroy_texture(&mut self, texture: TextureHandle);

    fn is_texture(&self, texture: TextureHandle) -> bool;

    /// Downloads a texture as tightly packed RGBA f32 texels
    ///
    /// Channels the storage format lacks read as 0, alpha as 1.
    fn read_texture(&mut self, texture: TextureHandle) -> Result<Vec<f32>, BackendError>;

    /// Creates an empty program object
    fn create_program(&mut self, label: &str) -> ProgramHandle;

    /// Compiles and links compute shader source into `program`
    ///
    /// # Returns
    /// The compiler's diagnostic log on failure
    fn compile_program(&mut self, program: ProgramHandle, source: &str) -> Result<(), String>;

    /// Releases a program; unknown or already destroyed handles are ignored
    fn destroy_program(&mut self, program: ProgramHandle);

    fn is_program(&self, program: ProgramHandle) -> bool;

    /// Makes `program` current for uniform pushes and dispatches
    fn use_program(&mut self, program: ProgramHandle);

    /// Binds a texture for read-write image access at `unit`, using its own format
    fn bind_image(&mut self, unit: u32, texture: TextureHandle);

    /// Binds a texture for filtered read-only access at `unit`
    fn bind_sampler(&mut self, unit: u32, texture: TextureHandle);

    /// Clears the image binding at `unit`
    fn unbind_image(&mut self, unit: u32);

    /// Clears the sampled texture binding at `unit`
    fn unbind_sampler(&mut self, unit: u32);

    /// Sets a named uniform of `program`; a name the program lacks is a no-op
    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: UniformValue);

    /// Makes all prior texture fetch and image writes visible to later commands
    fn memory_barrier(&mut self);

    /// Dispatches the current program
    fn dispatch(&mut self, extent: DispatchExtent) -> Result<(), BackendError>;

    fn push_debug_group(&mut self, label: &str);

    fn pop_debug_group(&mut self);

    /// Called once before the first pass of a frame
    fn begin_frame(&mut self) {}

    /// Called once after the last pass of a frame
    fn end_frame(&mut self) {}
}

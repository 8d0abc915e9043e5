//! wgpu implementation of the backend seam
//!
//! GLSL compute shaders address resources by descriptor set:
//!
//! | set | binding       | resource                                      |
//! |-----|---------------|-----------------------------------------------|
//! | 0   | image unit    | storage image (`image2D`, `image3D`, ...)     |
//! | 1   | sampler unit  | sampled texture (`texture2D`, ...)            |
//! | 2   | 0             | uniform block, member names are uniform names |
//! | 3   | sampler unit  | `sampler` built from the texture's wrap/filter |
//!
//! Every dispatch is recorded and submitted on its own, so queue order makes
//! prior writes visible to later passes and a memory barrier needs no command.
//!
//! `bool` is not host-shareable, so boolean uniforms such as `shouldAccumulate`
//! must be declared as `uint` block members; they receive 0 or 1.
//!
//! An image declared without `readonly` or `writeonly` is a read-write storage
//! texture. Those need `TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES` and a format
//! the adapter reports as `STORAGE_READ_WRITE` (`r32float` on every adapter,
//! `rgba32float` and friends on most desktop ones).

use super::{BackendError, GpuBackend, ProgramHandle, TextureHandle, UniformValue, convert};
use compute_pipeline_doc::{DispatchExtent, FilterMode, InternalFormat, TextureDescriptor, TextureExtent, WrapMode};
use std::collections::{BTreeMap, HashMap};
use wgpu::naga;

const IMAGE_SET: u32 = 0;
const TEXTURE_SET: u32 = 1;
const UNIFORM_SET: u32 = 2;
const SAMPLER_SET: u32 = 3;

/// Device features used when the adapter offers them
const OPTIONAL_FEATURES: wgpu::Features = wgpu::Features::FLOAT32_FILTERABLE
    .union(wgpu::Features::TEXTURE_FORMAT_16BIT_NORM)
    .union(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER)
    .union(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES);

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    internal_format: InternalFormat,
    wrap: WrapMode,
    filter: FilterMode,
    /// Format supports `imageLoad` and `imageStore` through one binding
    read_write: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResourceKind {
    /// `read_write` when the shader may both load and store
    StorageImage { read_write: bool },
    SampledTexture,
    Sampler,
    UniformBlock,
    Unsupported,
}

#[derive(Debug, Clone, Copy)]
struct ResourceSlot {
    group: u32,
    binding: u32,
    kind: ResourceKind,
}

#[derive(Debug, Clone, Copy)]
struct UniformMember {
    offset: usize,
    size: usize,
}

/// Resources and uniforms a compute entry point actually uses
#[derive(Debug, Default)]
struct ProgramInterface {
    resources: Vec<ResourceSlot>,
    uniforms: HashMap<String, UniformMember>,
    uniform_block_size: usize,
}

impl ProgramInterface {
    /// Reflects a validated module
    ///
    /// Globals the entry point never touches are left out, matching the bind
    /// group layout wgpu derives for the pipeline.
    fn reflect(module: &naga::Module, info: &naga::valid::ModuleInfo) -> Self {
        let mut interface = Self::default();
        let Some(entry_point) = module.entry_points.iter().position(|ep| ep.stage == naga::ShaderStage::Compute) else {
            return interface;
        };
        let usage = info.get_entry_point(entry_point);

        for (handle, variable) in module.global_variables.iter() {
            let Some(binding) = &variable.binding else {
                continue;
            };
            if usage[handle].is_empty() {
                continue;
            }

            let kind = match (variable.space, &module.types[variable.ty].inner) {
                (naga::AddressSpace::Handle, naga::TypeInner::Image { class: naga::ImageClass::Storage { access, .. }, .. }) => ResourceKind::StorageImage {
                    read_write: access.contains(naga::StorageAccess::LOAD | naga::StorageAccess::STORE),
                },
                (naga::AddressSpace::Handle, naga::TypeInner::Image { .. }) => ResourceKind::SampledTexture,
                (naga::AddressSpace::Handle, naga::TypeInner::Sampler { .. }) => ResourceKind::Sampler,
                (naga::AddressSpace::Uniform, naga::TypeInner::Struct { members, span }) if binding.group == UNIFORM_SET && binding.binding == 0 => {
                    for member in members {
                        let Some(name) = &member.name else {
                            continue;
                        };
                        let size = module.types[member.ty].inner.size(module.to_ctx()) as usize;
                        interface.uniforms.insert(name.clone(), UniformMember { offset: member.offset as usize, size });
                    }
                    interface.uniform_block_size = (*span as usize).next_multiple_of(16);
                    ResourceKind::UniformBlock
                }
                _ => ResourceKind::Unsupported,
            };

            interface.resources.push(ResourceSlot {
                group: binding.group,
                binding: binding.binding,
                kind,
            });
        }

        interface
    }
}

struct LinkedProgram {
    pipeline: wgpu::ComputePipeline,
    interface: ProgramInterface,
    uniform_data: Vec<u8>,
    uniform_buffer: Option<wgpu::Buffer>,
}

struct GpuProgram {
    label: String,
    linked: Option<LinkedProgram>,
}

/// A bound resource resolved for one dispatch
#[derive(Debug, Clone, Copy)]
enum Resolved {
    Image(TextureHandle),
    Texture(TextureHandle),
    Sampler(WrapMode, FilterMode),
    Uniforms,
}

/// Backend running compute passes on a wgpu device
pub struct WgpuBackend {
    /// Source of adapter-specific format features, absent for wrapped devices
    adapter: Option<wgpu::Adapter>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    textures: HashMap<TextureHandle, GpuTexture>,
    programs: HashMap<ProgramHandle, GpuProgram>,
    samplers: HashMap<(WrapMode, FilterMode), wgpu::Sampler>,
    images: BTreeMap<u32, TextureHandle>,
    sampled: BTreeMap<u32, TextureHandle>,
    current_program: Option<ProgramHandle>,
    debug_groups: Vec<String>,
    next_id: u64,
}

impl WgpuBackend {
    /// Opens the default high-performance adapter and a device on it
    pub fn new() -> Result<Self, BackendError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("compute-pipeline"),
            required_features: adapter.features() & OPTIONAL_FEATURES,
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: Default::default(),
        }))?;

        let info = adapter.get_info();
        tracing::info!(adapter = %info.name, backend = ?info.backend, "GPU device ready");
        Ok(Self {
            adapter: Some(adapter),
            ..Self::from_device(device, queue)
        })
    }

    /// Wraps an existing device and queue
    ///
    /// Without the adapter only the formats' guaranteed features are known, so
    /// read-write storage is limited to what every adapter supports.
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            adapter: None,
            device,
            queue,
            textures: HashMap::new(),
            programs: HashMap::new(),
            samplers: HashMap::new(),
            images: BTreeMap::new(),
            sampled: BTreeMap::new(),
            current_program: None,
            debug_groups: Vec::new(),
            next_id: 0,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Capabilities of `format` on this device
    fn format_features(&self, format: wgpu::TextureFormat) -> wgpu::TextureFormatFeatures {
        match &self.adapter {
            Some(adapter) if self.device.features().contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES) => adapter.get_texture_format_features(format),
            _ => format.guaranteed_format_features(self.device.features()),
        }
    }

    fn pop_validation_error(&self) -> Option<String> {
        pollster::block_on(self.device.pop_error_scope()).map(|error| error.to_string())
    }

    /// Maps every resource the current program uses to what is bound for it
    fn resolve_bindings(&self, interface: &ProgramInterface) -> Result<Vec<(ResourceSlot, Resolved)>, BackendError> {
        let bound = |units: &BTreeMap<u32, TextureHandle>, unit: u32| units.get(&unit).copied().filter(|texture| self.textures.contains_key(texture));

        interface
            .resources
            .iter()
            .map(|&slot| {
                let resolved = match (slot.group, slot.kind) {
                    (IMAGE_SET, ResourceKind::StorageImage { read_write }) => {
                        let texture = bound(&self.images, slot.binding);
                        if let Some(gpu) = texture.and_then(|texture| self.textures.get(&texture))
                            && read_write
                            && !gpu.read_write
                        {
                            return Err(BackendError::ReadWriteImage {
                                unit: slot.binding,
                                format: gpu.internal_format,
                            });
                        }
                        texture.map(Resolved::Image)
                    }
                    (TEXTURE_SET, ResourceKind::SampledTexture) => bound(&self.sampled, slot.binding).map(Resolved::Texture),
                    (SAMPLER_SET, ResourceKind::Sampler) => bound(&self.sampled, slot.binding)
                        .and_then(|texture| self.textures.get(&texture))
                        .map(|texture| Resolved::Sampler(texture.wrap, texture.filter)),
                    (UNIFORM_SET, ResourceKind::UniformBlock) => Some(Resolved::Uniforms),
                    _ => None,
                };
                resolved.map(|resolved| (slot, resolved)).ok_or(BackendError::IncompleteBinding {
                    group: slot.group,
                    binding: slot.binding,
                })
            })
            .collect()
    }
}

fn texture_format(format: InternalFormat) -> wgpu::TextureFormat {
    use wgpu::TextureFormat as F;
    match format {
        InternalFormat::R8 => F::R8Unorm,
        InternalFormat::Rg8 => F::Rg8Unorm,
        InternalFormat::Rgb8 | InternalFormat::Rgba8 => F::Rgba8Unorm,
        InternalFormat::R16 => F::R16Unorm,
        InternalFormat::Rg16 => F::Rg16Unorm,
        InternalFormat::Rgb16 | InternalFormat::Rgba16 => F::Rgba16Unorm,
        InternalFormat::R16F => F::R16Float,
        InternalFormat::Rg16F => F::Rg16Float,
        InternalFormat::Rgba16F => F::Rgba16Float,
        InternalFormat::R32F => F::R32Float,
        InternalFormat::Rg32F => F::Rg32Float,
        InternalFormat::Rgb32F | InternalFormat::Rgba32F => F::Rgba32Float,
        InternalFormat::R11FG11FB10F => F::Rg11b10Ufloat,
    }
}

fn texture_size(extent: TextureExtent) -> (wgpu::TextureDimension, wgpu::Extent3d) {
    let dimension = match extent {
        TextureExtent::D1 { .. } => wgpu::TextureDimension::D1,
        TextureExtent::D2 { .. } => wgpu::TextureDimension::D2,
        TextureExtent::D3 { .. } => wgpu::TextureDimension::D3,
    };
    let size = wgpu::Extent3d {
        width: extent.width(),
        height: extent.height(),
        depth_or_array_layers: extent.depth(),
    };
    (dimension, size)
}

/// Creates a sampler for a texture's wrap and filter state
///
/// # Arguments
/// * `device` - The wgpu device to create the sampler on
/// * `wrap` - Address mode on all three axes
/// * `filter` - Minification and magnification filter
fn create_sampler(device: &wgpu::Device, wrap: WrapMode, filter: FilterMode) -> wgpu::Sampler {
    let address_mode = match wrap {
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::ClampToBorder if device.features().contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER) => wgpu::AddressMode::ClampToBorder,
        WrapMode::ClampToBorder => {
            tracing::warn!("device lacks clamp-to-border addressing, using clamp-to-edge");
            wgpu::AddressMode::ClampToEdge
        }
    };
    let filter_mode = match filter {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    };

    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(&format!("Sampler {wrap} {filter}")),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: filter_mode,
        min_filter: filter_mode,
        mipmap_filter: wgpu::FilterMode::Nearest,
        lod_min_clamp: 0.0,
        lod_max_clamp: 0.0,
        compare: None,
        anisotropy_clamp: 1,
        border_color: (address_mode == wgpu::AddressMode::ClampToBorder).then_some(wgpu::SamplerBorderColor::TransparentBlack),
    })
}

impl GpuBackend for WgpuBackend {
    fn create_texture(&mut self, descriptor: &TextureDescriptor, contents: Option<&[u8]>) -> Result<TextureHandle, BackendError> {
        let format = texture_format(descriptor.internal_format);
        if !self.device.features().contains(format.required_features()) {
            return Err(BackendError::UnsupportedFormat(descriptor.internal_format));
        }
        let storage = contents.map(|bytes| convert::upload_to_storage(descriptor, bytes)).transpose()?;

        let features = self.format_features(format);
        let storage_binding = features.allowed_usages.contains(wgpu::TextureUsages::STORAGE_BINDING);
        let read_write = storage_binding && features.flags.contains(wgpu::TextureFormatFeatureFlags::STORAGE_READ_WRITE);
        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST;
        if storage_binding {
            usage |= wgpu::TextureUsages::STORAGE_BINDING;
        }
        if !read_write {
            tracing::debug!(texture = %descriptor.name, ?format, "format has no read-write storage on this device");
        }

        let (dimension, size) = texture_size(descriptor.extent);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&descriptor.name),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension,
            format,
            usage,
            view_formats: &[],
        });

        if let Some(storage) = &storage {
            let texel_size = convert::StorageLayout::of(descriptor.internal_format).texel_size() as u32;
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                storage,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(size.width * texel_size),
                    rows_per_image: Some(size.height),
                },
                size,
            );
        }

        if let Some(error) = self.pop_validation_error() {
            texture.destroy();
            return Err(BackendError::Validation(error));
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let handle = TextureHandle(self.allocate_id());
        self.textures.insert(
            handle,
            GpuTexture {
                texture,
                view,
                internal_format: descriptor.internal_format,
                wrap: descriptor.wrap,
                filter: descriptor.filter,
                read_write,
            },
        );
        Ok(handle)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if let Some(gpu) = self.textures.remove(&texture) {
            gpu.texture.destroy();
            self.images.retain(|_, bound| *bound != texture);
            self.sampled.retain(|_, bound| *bound != texture);
        }
    }

    fn is_texture(&self, texture: TextureHandle) -> bool {
        self.textures.contains_key(&texture)
    }

    fn read_texture(&mut self, texture: TextureHandle) -> Result<Vec<f32>, BackendError> {
        let gpu = self.textures.get(&texture).ok_or(BackendError::UnknownTexture(texture))?;
        let size = gpu.texture.size();
        let texel_size = convert::StorageLayout::of(gpu.internal_format).texel_size() as u32;

        // Rows in a copy buffer must be 256-byte aligned
        let unpadded_bytes_per_row = size.width * texel_size;
        let padded_bytes_per_row = unpadded_bytes_per_row.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let rows = size.height * size.depth_or_array_layers;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Read-back Buffer"),
            size: padded_bytes_per_row as u64 * rows as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Read-back Encoder") });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(size.height),
                },
            },
            size,
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = buffer.slice(..);
        let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        self.device.poll(wgpu::PollType::Wait).map_err(|error| BackendError::ReadBack(error.to_string()))?;
        pollster::block_on(receiver.receive())
            .ok_or_else(|| BackendError::ReadBack("mapping callback was dropped".to_string()))?
            .map_err(|error| BackendError::ReadBack(error.to_string()))?;

        let mut storage = Vec::with_capacity((unpadded_bytes_per_row * rows) as usize);
        {
            let data = buffer_slice.get_mapped_range();
            for row in data.chunks_exact(padded_bytes_per_row as usize) {
                storage.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
            }
        }
        buffer.unmap();

        Ok(convert::storage_to_rgba32f(gpu.internal_format, &storage))
    }

    fn create_program(&mut self, label: &str) -> ProgramHandle {
        let handle = ProgramHandle(self.allocate_id());
        self.programs.insert(
            handle,
            GpuProgram {
                label: label.to_string(),
                linked: None,
            },
        );
        handle
    }

    fn compile_program(&mut self, program: ProgramHandle, source: &str) -> Result<(), String> {
        let Some(entry) = self.programs.get_mut(&program) else {
            return Err(BackendError::UnknownProgram(program).to_string());
        };
        entry.linked = None;

        let mut frontend = naga::front::glsl::Frontend::default();
        let options = naga::front::glsl::Options::from(naga::ShaderStage::Compute);
        let module = frontend.parse(&options, source).map_err(|errors| errors.emit_to_string(source))?;

        let mut validator = naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all());
        let info = validator.validate(&module).map_err(|error| error.emit_to_string(source))?;
        let interface = ProgramInterface::reflect(&module, &info);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&entry.label),
            source: wgpu::ShaderSource::Glsl {
                shader: source.into(),
                stage: naga::ShaderStage::Compute,
                defines: Default::default(),
            },
        });
        let pipeline = self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(&entry.label),
            layout: None,
            module: &shader_module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(error.to_string());
        }

        let uniform_buffer = (interface.uniform_block_size > 0).then(|| {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{} uniforms", entry.label)),
                size: interface.uniform_block_size as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        tracing::debug!(program = %entry.label, resources = interface.resources.len(), uniforms = interface.uniforms.len(), "linked compute program");
        entry.linked = Some(LinkedProgram {
            pipeline,
            uniform_data: vec![0; interface.uniform_block_size],
            interface,
            uniform_buffer,
        });
        Ok(())
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program).is_some() && self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn is_program(&self, program: ProgramHandle) -> bool {
        self.programs.contains_key(&program)
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current_program = Some(program);
    }

    fn bind_image(&mut self, unit: u32, texture: TextureHandle) {
        self.images.insert(unit, texture);
    }

    fn bind_sampler(&mut self, unit: u32, texture: TextureHandle) {
        self.sampled.insert(unit, texture);
    }

    fn unbind_image(&mut self, unit: u32) {
        self.images.remove(&unit);
    }

    fn unbind_sampler(&mut self, unit: u32) {
        self.sampled.remove(&unit);
    }

    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: UniformValue) {
        let Some(linked) = self.programs.get_mut(&program).and_then(|entry| entry.linked.as_mut()) else {
            return;
        };
        let Some(member) = linked.interface.uniforms.get(name) else {
            return;
        };
        if member.size != value.size_in_bytes() {
            tracing::debug!(uniform = name, expected = member.size, actual = value.size_in_bytes(), "uniform size mismatch, ignoring push");
            return;
        }
        linked.uniform_data[member.offset..member.offset + member.size].copy_from_slice(&value.to_bytes());
    }

    fn memory_barrier(&mut self) {
        tracing::trace!("memory barrier");
    }

    fn dispatch(&mut self, extent: DispatchExtent) -> Result<(), BackendError> {
        let program = self.current_program.ok_or(BackendError::NoProgram)?;
        let linked = self
            .programs
            .get(&program)
            .ok_or(BackendError::UnknownProgram(program))?
            .linked
            .as_ref()
            .ok_or(BackendError::ProgramNotLinked(program))?;
        let resolved = self.resolve_bindings(&linked.interface)?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        for (_, binding) in &resolved {
            if let Resolved::Sampler(wrap, filter) = *binding {
                self.samplers.entry((wrap, filter)).or_insert_with(|| create_sampler(&self.device, wrap, filter));
            }
        }

        if let Some(buffer) = &linked.uniform_buffer {
            self.queue.write_buffer(buffer, 0, &linked.uniform_data);
        }

        let group_count = resolved.iter().map(|(slot, _)| slot.group + 1).max().unwrap_or(0);
        let mut bind_groups = Vec::with_capacity(group_count as usize);
        for group in 0..group_count {
            let entries: Vec<wgpu::BindGroupEntry> = resolved
                .iter()
                .filter(|(slot, _)| slot.group == group)
                .filter_map(|(slot, binding)| {
                    let resource = match *binding {
                        Resolved::Image(texture) | Resolved::Texture(texture) => wgpu::BindingResource::TextureView(&self.textures.get(&texture)?.view),
                        Resolved::Sampler(wrap, filter) => wgpu::BindingResource::Sampler(self.samplers.get(&(wrap, filter))?),
                        Resolved::Uniforms => linked.uniform_buffer.as_ref()?.as_entire_binding(),
                    };
                    Some(wgpu::BindGroupEntry { binding: slot.binding, resource })
                })
                .collect();

            bind_groups.push(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("set {group}")),
                layout: &linked.pipeline.get_bind_group_layout(group),
                entries: &entries,
            }));
        }

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Dispatch Encoder") });
        for label in &self.debug_groups {
            encoder.push_debug_group(label);
        }
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: self.debug_groups.last().map(String::as_str),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&linked.pipeline);
            for (group, bind_group) in bind_groups.iter().enumerate() {
                compute_pass.set_bind_group(group as u32, bind_group, &[]);
            }
            compute_pass.dispatch_workgroups(extent.x, extent.y, extent.z);
        }
        for _ in &self.debug_groups {
            encoder.pop_debug_group();
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        match self.pop_validation_error() {
            Some(error) => Err(BackendError::Validation(error)),
            None => Ok(()),
        }
    }

    fn push_debug_group(&mut self, label: &str) {
        self.debug_groups.push(label.to_string());
    }

    fn pop_debug_group(&mut self) {
        self.debug_groups.pop();
    }

    fn end_frame(&mut self) {
        if let Err(error) = self.device.poll(wgpu::PollType::Poll) {
            tracing::warn!(%error, "device poll failed");
        }
    }
}

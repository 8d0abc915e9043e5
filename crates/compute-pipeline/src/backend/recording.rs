//! Device-free backend that records every command
//!
//! Texture contents are kept in storage layout so that uploads, read-backs and
//! exports behave like the GPU path. Shader sources are accepted unless they
//! contain a `#error` directive line, which fails compilation with the
//! directive's message as the log.

use super::{BackendError, GpuBackend, ProgramHandle, TextureHandle, UniformValue, convert};
use compute_pipeline_doc::{DispatchExtent, TextureDescriptor};
use std::collections::BTreeMap;

/// One command received by a [`RecordingBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    /// A texture was allocated; `uploaded` when initial contents were given
    CreateTexture { texture: TextureHandle, name: String, uploaded: bool },
    DestroyTexture(TextureHandle),
    CreateProgram { program: ProgramHandle, label: String },
    /// A compile attempt and whether it linked
    CompileProgram { program: ProgramHandle, linked: bool },
    DestroyProgram(ProgramHandle),
    UseProgram(ProgramHandle),
    /// Read-write image binding
    BindImage { unit: u32, texture: TextureHandle },
    /// Filtered read-only binding
    BindSampler { unit: u32, texture: TextureHandle },
    UnbindImage { unit: u32 },
    UnbindSampler { unit: u32 },
    SetUniform { program: ProgramHandle, name: String, value: UniformValue },
    MemoryBarrier,
    Dispatch(DispatchExtent),
    PushDebugGroup(String),
    PopDebugGroup,
    /// Start of a `run_frame`
    BeginFrame,
    EndFrame,
}

#[derive(Debug)]
struct RecordedTexture {
    descriptor: TextureDescriptor,
    storage: Vec<u8>,
}

#[derive(Debug)]
struct RecordedProgram {
    label: String,
    source: Option<String>,
    linked: bool,
}

/// Backend that keeps textures in memory and logs each command as a [`BackendCall`]
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<BackendCall>,
    textures: BTreeMap<TextureHandle, RecordedTexture>,
    programs: BTreeMap<ProgramHandle, RecordedProgram>,
    current_program: Option<ProgramHandle>,
    next_id: u64,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands received so far, oldest first
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Returns and forgets the recorded commands
    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }

    /// Number of live textures
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Number of live programs
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Source last compiled into `program`
    pub fn program_source(&self, program: ProgramHandle) -> Option<&str> {
        self.programs.get(&program)?.source.as_deref()
    }

    pub fn program_label(&self, program: ProgramHandle) -> Option<&str> {
        self.programs.get(&program).map(|p| p.label.as_str())
    }

    /// Overwrites a texture's storage bytes, standing in for a shader write
    pub fn write_storage(&mut self, texture: TextureHandle, bytes: &[u8]) -> Result<(), BackendError> {
        let recorded = self.textures.get_mut(&texture).ok_or(BackendError::UnknownTexture(texture))?;
        if bytes.len() != recorded.storage.len() {
            return Err(BackendError::UploadSize {
                expected: recorded.storage.len(),
                actual: bytes.len(),
            });
        }
        recorded.storage.copy_from_slice(bytes);
        Ok(())
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl GpuBackend for RecordingBackend {
    fn create_texture(&mut self, descriptor: &TextureDescriptor, contents: Option<&[u8]>) -> Result<TextureHandle, BackendError> {
        let layout = convert::StorageLayout::of(descriptor.internal_format);
        let storage = match contents {
            Some(bytes) => convert::upload_to_storage(descriptor, bytes)?,
            None => {
                let len = descriptor
                    .extent
                    .texel_count()
                    .and_then(|count| usize::try_from(count).ok())
                    .and_then(|count| count.checked_mul(layout.texel_size()))
                    .ok_or_else(|| BackendError::Validation(format!("texture {} is too large", descriptor.name)))?;
                vec![0; len]
            }
        };

        let texture = TextureHandle(self.allocate_id());
        self.calls.push(BackendCall::CreateTexture {
            texture,
            name: descriptor.name.clone(),
            uploaded: contents.is_some(),
        });
        self.textures.insert(
            texture,
            RecordedTexture {
                descriptor: descriptor.clone(),
                storage,
            },
        );
        Ok(texture)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_some() {
            self.calls.push(BackendCall::DestroyTexture(texture));
        }
    }

    fn is_texture(&self, texture: TextureHandle) -> bool {
        self.textures.contains_key(&texture)
    }

    fn read_texture(&mut self, texture: TextureHandle) -> Result<Vec<f32>, BackendError> {
        let recorded = self.textures.get(&texture).ok_or(BackendError::UnknownTexture(texture))?;
        Ok(convert::storage_to_rgba32f(recorded.descriptor.internal_format, &recorded.storage))
    }

    fn create_program(&mut self, label: &str) -> ProgramHandle {
        let program = ProgramHandle(self.allocate_id());
        self.calls.push(BackendCall::CreateProgram {
            program,
            label: label.to_string(),
        });
        self.programs.insert(
            program,
            RecordedProgram {
                label: label.to_string(),
                source: None,
                linked: false,
            },
        );
        program
    }

    fn compile_program(&mut self, program: ProgramHandle, source: &str) -> Result<(), String> {
        let Some(recorded) = self.programs.get_mut(&program) else {
            return Err(BackendError::UnknownProgram(program).to_string());
        };

        let error = source.lines().map(str::trim_start).find_map(|line| line.strip_prefix("#error"));
        recorded.source = Some(source.to_string());
        recorded.linked = error.is_none();
        self.calls.push(BackendCall::CompileProgram {
            program,
            linked: recorded.linked,
        });

        match error {
            Some(message) => Err(format!("ERROR: 0:0: '#error' :{message}")),
            None => Ok(()),
        }
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program).is_some() {
            self.calls.push(BackendCall::DestroyProgram(program));
            if self.current_program == Some(program) {
                self.current_program = None;
            }
        }
    }

    fn is_program(&self, program: ProgramHandle) -> bool {
        self.programs.contains_key(&program)
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current_program = Some(program);
        self.calls.push(BackendCall::UseProgram(program));
    }

    fn bind_image(&mut self, unit: u32, texture: TextureHandle) {
        self.calls.push(BackendCall::BindImage { unit, texture });
    }

    fn bind_sampler(&mut self, unit: u32, texture: TextureHandle) {
        self.calls.push(BackendCall::BindSampler { unit, texture });
    }

    fn unbind_image(&mut self, unit: u32) {
        self.calls.push(BackendCall::UnbindImage { unit });
    }

    fn unbind_sampler(&mut self, unit: u32) {
        self.calls.push(BackendCall::UnbindSampler { unit });
    }

    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: UniformValue) {
        self.calls.push(BackendCall::SetUniform {
            program,
            name: name.to_string(),
            value,
        });
    }

    fn memory_barrier(&mut self) {
        self.calls.push(BackendCall::MemoryBarrier);
    }

    fn dispatch(&mut self, extent: DispatchExtent) -> Result<(), BackendError> {
        let program = self.current_program.ok_or(BackendError::NoProgram)?;
        let recorded = self.programs.get(&program).ok_or(BackendError::UnknownProgram(program))?;
        if !recorded.linked {
            return Err(BackendError::ProgramNotLinked(program));
        }
        self.calls.push(BackendCall::Dispatch(extent));
        Ok(())
    }

    fn push_debug_group(&mut self, label: &str) {
        self.calls.push(BackendCall::PushDebugGroup(label.to_string()));
    }

    fn pop_debug_group(&mut self) {
        self.calls.push(BackendCall::PopDebugGroup);
    }

    fn begin_frame(&mut self) {
        self.calls.push(BackendCall::BeginFrame);
    }

    fn end_frame(&mut self) {
        self.calls.push(BackendCall::EndFrame);
    }
}

//! Compute passes
//!
//! A [`ComputePass`] owns one program object compiled from a shader file after
//! `#include` expansion. A pass whose source fails to assemble or compile keeps
//! its program object and binding table but is not dispatchable; the failure
//! does not stop the rest of the pipeline from loading.

use crate::PipelineError;
use crate::backend::{BackendError, GpuBackend, ProgramHandle, UniformValue};
use crate::config::PipelineConfig;
use crate::preprocess::Preprocessor;
use compute_pipeline_doc::{BindingTable, PassDescriptor};
use glam::{Mat4, Vec2, Vec3};

/// Compilation outcome of a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassStatus {
    /// Linked and dispatchable
    Ready,
    /// Preprocessor or compiler diagnostic log
    Failed(String),
}

/// One compute dispatch of the pipeline with its program and binding table
#[derive(Debug)]
pub struct ComputePass {
    /// Declaration the pass was created from
    descriptor: PassDescriptor,
    /// Units assigned to the pass's textures, computed once at creation
    bindings: BindingTable,
    /// Program object; `None` once destroyed
    program: Option<ProgramHandle>,
    /// Outcome of the last compile
    status: PassStatus,
}

impl ComputePass {
    /// Reads, assembles and compiles the pass's shader
    ///
    /// An unreadable top-level shader file is an error. Include and compile
    /// failures produce a pass in the [`PassStatus::Failed`] state instead.
    ///
    /// # Arguments
    /// * `backend` - Backend owning the program object
    /// * `descriptor` - Resolved pass declaration
    /// * `config` - Supplies the shader root and include depth limit
    pub fn create<B: GpuBackend>(backend: &mut B, descriptor: PassDescriptor, config: &PipelineConfig) -> Result<Self, PipelineError> {
        let path = config.shader_root.join(&descriptor.source);
        let text = std::fs::read_to_string(&path).map_err(|source| PipelineError::ShaderIo {
            pass: descriptor.name.clone(),
            path: path.clone(),
            source,
        })?;

        let program = backend.create_program(&descriptor.name);
        let origin = descriptor.source.display().to_string();
        let status = match Preprocessor::new(&config.shader_root, config.max_include_depth).expand(&text, &origin) {
            Ok(source) => match backend.compile_program(program, &source) {
                Ok(()) => PassStatus::Ready,
                Err(log) => PassStatus::Failed(log),
            },
            Err(error) => PassStatus::Failed(error.to_string()),
        };

        match &status {
            PassStatus::Ready => tracing::info!(pass = %descriptor.name, source = %origin, dispatch = %descriptor.dispatch, "registered pass"),
            PassStatus::Failed(log) => tracing::error!(pass = %descriptor.name, source = %origin, "shader compilation failed:\n{log}"),
        }

        let bindings = BindingTable::for_pass(&descriptor);
        Ok(Self {
            descriptor,
            bindings,
            program: Some(program),
            status,
        })
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &PassDescriptor {
        &self.descriptor
    }

    /// Image and sampler units assigned at load time
    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    /// Program object; `None` once destroyed
    pub fn program(&self) -> Option<ProgramHandle> {
        self.program
    }

    pub fn status(&self) -> &PassStatus {
        &self.status
    }

    pub fn is_dispatchable(&self) -> bool {
        self.program.is_some() && self.status == PassStatus::Ready
    }

    /// Makes the pass's program current
    pub fn activate<B: GpuBackend>(&self, backend: &mut B) {
        if let Some(program) = self.program {
            backend.use_program(program);
        }
    }

    fn push<B: GpuBackend>(&self, backend: &mut B, name: &str, value: UniformValue) {
        if let Some(program) = self.program {
            backend.set_uniform(program, name, value);
        }
    }

    pub fn push_float<B: GpuBackend>(&self, backend: &mut B, name: &str, value: f32) {
        self.push(backend, name, UniformValue::Float(value));
    }

    pub fn push_int<B: GpuBackend>(&self, backend: &mut B, name: &str, value: i32) {
        self.push(backend, name, UniformValue::Int(value));
    }

    pub fn push_uint<B: GpuBackend>(&self, backend: &mut B, name: &str, value: u32) {
        self.push(backend, name, UniformValue::UInt(value));
    }

    pub fn push_bool<B: GpuBackend>(&self, backend: &mut B, name: &str, value: bool) {
        self.push(backend, name, UniformValue::Bool(value));
    }

    pub fn push_vec2<B: GpuBackend>(&self, backend: &mut B, name: &str, value: Vec2) {
        self.push(backend, name, UniformValue::Vec2(value.to_array()));
    }

    pub fn push_vec3<B: GpuBackend>(&self, backend: &mut B, name: &str, value: Vec3) {
        self.push(backend, name, UniformValue::Vec3(value.to_array()));
    }

    pub fn push_mat4<B: GpuBackend>(&self, backend: &mut B, name: &str, value: Mat4) {
        self.push(backend, name, UniformValue::Mat4(value.to_cols_array()));
    }

    /// Dispatches the current program at the pass's static extent
    pub fn dispatch<B: GpuBackend>(&self, backend: &mut B) -> Result<(), BackendError> {
        let program = self.program.ok_or(BackendError::NoProgram)?;
        if self.status != PassStatus::Ready {
            return Err(BackendError::ProgramNotLinked(program));
        }
        backend.dispatch(self.descriptor.dispatch)
    }

    /// Releases the program object; calling it again does nothing
    pub fn destroy<B: GpuBackend>(&mut self, backend: &mut B) {
        if let Some(program) = self.program.take() {
            backend.destroy_program(program);
        }
    }
}

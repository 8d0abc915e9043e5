//! Declarative GPU compute pipelines
//!
//! This crate loads a JSON pipeline document (see [`document`]) and turns it into
//! live GPU state: named 1D, 2D and 3D textures plus an ordered list of GLSL
//! compute passes. [`PipelineManager::run_frame`] then executes every pass once
//! per frame, binding textures by name, pushing per-frame camera and
//! accumulation uniforms, and fencing each dispatch with memory barriers.
//!
//! GPU access goes through the [`backend::GpuBackend`] trait. [`backend::WgpuBackend`]
//! drives a real device; [`backend::RecordingBackend`] records the command stream
//! for headless validation and tests.

pub mod backend;
mod config;
mod diagnostics;
mod error;
mod export;
mod frame;
mod manager;
mod pass;
mod preprocess;
mod registry;
mod texture;

pub use compute_pipeline_doc as document;
pub use config::{PipelineConfig, ReferenceCheck};
pub use diagnostics::{Diagnostic, DiagnosticKind, FrameReport};
pub use error::{LookupError, PipelineError};
pub use export::ExportFormat;
pub use frame::{Camera, FrameState};
pub use manager::{ManagerState, PipelineManager};
pub use pass::{ComputePass, PassStatus};
pub use preprocess::{PreprocessError, Preprocessor};
pub use registry::TextureRegistry;
pub use texture::TextureResource;

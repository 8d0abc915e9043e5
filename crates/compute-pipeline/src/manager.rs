//! Pipeline manager
//!
//! [`PipelineManager`] owns the texture registry and the ordered pass list built
//! from a pipeline document and drives them through the backend once per frame.
//!
//! ```text
//! Unloaded --load--> Loading --ok--> Ready --reload--> Reloading --ok--> Ready
//!    ^                  |                                   |
//!    +------failed------+              Ready <----failed----+
//!
//! any state --destroy--> Destroyed
//! ```
//!
//! `load` and `reload` are all-or-nothing: new resources are built beside the
//! current ones and only replace them once everything was created. The registry
//! is only mutated by those two calls, never by `run_frame`.

use crate::backend::GpuBackend;
use crate::config::{PipelineConfig, ReferenceCheck};
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticLog, FrameReport};
use crate::export::ExportFormat;
use crate::frame::FrameState;
use crate::pass::ComputePass;
use crate::registry::TextureRegistry;
use crate::texture::TextureResource;
use crate::{LookupError, PipelineError};
use compute_pipeline_doc::{BindingClass, BindingSlot, BindingTable, Dimension, PipelineDescriptor, TextureDescriptor};
use std::fmt;
use std::path::{Path, PathBuf};

/// Lifecycle state of a [`PipelineManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// Nothing loaded yet
    Unloaded,
    /// First load in progress
    Loading,
    /// A pipeline is installed and frames run
    Ready,
    /// Rebuilding from the document; the previous pipeline stays installed
    Reloading,
    /// Every resource released; only `destroy` is accepted
    Destroyed,
}

impl ManagerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Reloading => "reloading",
            Self::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A texture in a load being assembled
enum StagedTexture {
    Created(TextureResource),
    /// Carried over from the current registry on commit
    Kept(String),
}

/// Resources built by a load that has not been committed yet
#[derive(Default)]
struct Staged {
    textures: Vec<StagedTexture>,
    passes: Vec<ComputePass>,
}

impl Staged {
    fn discard<B: GpuBackend>(self, backend: &mut B) {
        for texture in self.textures {
            if let StagedTexture::Created(mut texture) = texture {
                texture.destroy(backend);
            }
        }
        for mut pass in self.passes {
            pass.destroy(backend);
        }
    }
}

/// Runs a declarative pipeline of compute passes over named textures
pub struct PipelineManager<B: GpuBackend> {
    backend: B,
    config: PipelineConfig,
    state: ManagerState,
    /// Document the current pipeline was loaded from, relative paths resolved
    document_path: Option<PathBuf>,
    descriptor: Option<PipelineDescriptor>,
    registry: TextureRegistry,
    /// Execution order
    passes: Vec<ComputePass>,
    log: DiagnosticLog,
}

impl<B: GpuBackend> PipelineManager<B> {
    /// Creates an empty manager driving `backend`; call [`Self::load`] next
    pub fn new(backend: B, config: PipelineConfig) -> Self {
        Self {
            backend,
            config,
            state: ManagerState::Unloaded,
            document_path: None,
            descriptor: None,
            registry: TextureRegistry::new(),
            passes: Vec::new(),
            log: DiagnosticLog::default(),
        }
    }

    /// Loads a pipeline document and eagerly creates every texture and pass
    ///
    /// Replaces the current pipeline when one is loaded; nothing is carried over.
    ///
    /// # Arguments
    /// * `document` - Document path, relative to the shader root
    ///
    /// # Returns
    /// An error for malformed documents, unreadable or mis-sized resources and
    /// unreadable shaders. The manager then keeps its previous state. Shader
    /// compile failures are not errors; the affected passes are skipped per frame.
    pub fn load(&mut self, document: impl AsRef<Path>) -> Result<(), PipelineError> {
        self.ensure_not_destroyed("load a pipeline")?;
        let path = self.config.shader_root.join(document);
        let descriptor = read_document(&path)?;
        self.install(descriptor, Some(path), ManagerState::Loading, false)
    }

    /// Loads an already resolved pipeline, for documents that do not live on disk
    pub fn load_descriptor(&mut self, descriptor: PipelineDescriptor) -> Result<(), PipelineError> {
        self.ensure_not_destroyed("load a pipeline")?;
        self.install(descriptor, None, ManagerState::Loading, false)
    }

    /// Rebuilds the pipeline from its document
    ///
    /// The document is read again when the pipeline came from a file. Passes are
    /// always recompiled. Textures flagged `persistAcrossReload` whose storage and
    /// sampling declaration did not change keep their GPU object and contents;
    /// every other texture is recreated.
    pub fn reload(&mut self) -> Result<(), PipelineError> {
        if self.state != ManagerState::Ready {
            return Err(PipelineError::InvalidState {
                operation: "reload",
                state: self.state.as_str(),
            });
        }

        let descriptor = match &self.document_path {
            Some(path) => read_document(path)?,
            None => match &self.descriptor {
                Some(descriptor) => descriptor.clone(),
                None => return Ok(()),
            },
        };
        let path = self.document_path.clone();
        self.install(descriptor, path, ManagerState::Reloading, true)
    }

    fn install(&mut self, descriptor: PipelineDescriptor, path: Option<PathBuf>, transition: ManagerState, keep_persistent: bool) -> Result<(), PipelineError> {
        let previous = self.state;
        self.state = transition;

        let issues = descriptor.reference_issues();
        if !issues.is_empty() {
            match self.config.reference_check {
                ReferenceCheck::Strict => {
                    self.state = previous;
                    return Err(PipelineError::UnresolvedReferences(issues));
                }
                ReferenceCheck::Lenient => {
                    for issue in &issues {
                        tracing::warn!("{issue}");
                    }
                }
            }
        }

        let current = keep_persistent.then_some(&self.registry);
        let staged = match stage(&mut self.backend, &self.config, &descriptor, current) {
            Ok(staged) => staged,
            Err(error) => {
                self.state = previous;
                return Err(error);
            }
        };

        self.commit(staged);
        tracing::info!(
            textures = self.registry.len(),
            passes = self.passes.len(),
            failed = self.passes.iter().filter(|pass| !pass.is_dispatchable()).count(),
            "{} pipeline",
            if transition == ManagerState::Reloading { "reloaded" } else { "loaded" }
        );

        self.descriptor = Some(descriptor);
        self.document_path = path;
        self.log.clear();
        self.state = ManagerState::Ready;
        Ok(())
    }

    /// Swaps staged resources in and releases the ones they replace
    fn commit(&mut self, staged: Staged) {
        // Old programs go first; none of them survive a reload
        for mut pass in std::mem::take(&mut self.passes) {
            pass.destroy(&mut self.backend);
        }

        let mut previous = std::mem::take(&mut self.registry);
        for texture in staged.textures {
            let texture = match texture {
                StagedTexture::Created(texture) => Some(texture),
                StagedTexture::Kept(name) => previous.remove(&name),
            };
            if let Some(texture) = texture
                && let Err(mut duplicate) = self.registry.insert(texture)
            {
                duplicate.destroy(&mut self.backend);
            }
        }
        for mut texture in previous.drain() {
            texture.destroy(&mut self.backend);
        }

        self.passes = staged.passes;
    }

    /// Executes every pass once, in declaration order
    ///
    /// Never fails: unresolved bindings leave their unit unbound, passes whose
    /// shader failed to compile are skipped, and both are recorded in the report.
    pub fn run_frame(&mut self, frame: &FrameState) -> FrameReport {
        let mut report = FrameReport {
            frame_index: frame.frame_index,
            ..FrameReport::default()
        };
        if self.state != ManagerState::Ready {
            tracing::debug!(state = %self.state, "run_frame ignored");
            return report;
        }

        self.backend.begin_frame();
        for pass in &self.passes {
            if !pass.is_dispatchable() {
                report.skipped.push(pass.name().to_string());
                continue;
            }
            let Some(program) = pass.program() else {
                continue;
            };

            let span = tracing::debug_span!("pass", name = %pass.name());
            let _enter = span.enter();

            self.backend.push_debug_group(pass.name());
            pass.activate(&mut self.backend);

            for slot in pass.bindings().slots() {
                match resolve_slot(&self.registry, slot) {
                    Ok(texture) => match slot.class {
                        BindingClass::Image => texture.bind_as_image(&mut self.backend, slot.unit),
                        BindingClass::Sampler => texture.bind(&mut self.backend, slot.unit),
                    },
                    Err(kind) => {
                        // Clear whatever an earlier pass left on the unit
                        match slot.class {
                            BindingClass::Image => self.backend.unbind_image(slot.unit),
                            BindingClass::Sampler => self.backend.unbind_sampler(slot.unit),
                        }
                        let diagnostic = Diagnostic {
                            pass: pass.name().to_string(),
                            slot: Some(slot.clone()),
                            kind,
                        };
                        self.log.emit(&diagnostic);
                        report.diagnostics.push(diagnostic);
                    }
                }
                pass.push_int(&mut self.backend, &slot.uniform, slot.unit as i32);
            }

            frame.push(&mut self.backend, program);

            self.backend.memory_barrier();
            match pass.dispatch(&mut self.backend) {
                Ok(()) => report.dispatched += 1,
                Err(error) => {
                    let diagnostic = Diagnostic {
                        pass: pass.name().to_string(),
                        slot: None,
                        kind: DiagnosticKind::DispatchFailed(error.to_string()),
                    };
                    self.log.emit(&diagnostic);
                    report.diagnostics.push(diagnostic);
                }
            }
            self.backend.memory_barrier();
            self.backend.pop_debug_group();
        }
        self.backend.end_frame();

        report
    }

    /// Looks a texture up by name, whatever its dimensionality
    pub fn find_texture(&self, name: &str) -> Result<&TextureResource, LookupError> {
        self.registry.get(name)
    }

    /// Looks a 1D texture up by name
    ///
    /// # Returns
    /// [`LookupError::WrongDimension`] when the name belongs to a 2D or 3D texture
    pub fn find_texture_1d_by_name(&self, name: &str) -> Result<&TextureResource, LookupError> {
        self.registry.get_with_dimension(name, Dimension::D1)
    }

    /// Looks a 2D texture up by name
    pub fn find_texture_2d_by_name(&self, name: &str) -> Result<&TextureResource, LookupError> {
        self.registry.get_with_dimension(name, Dimension::D2)
    }

    /// Looks a 3D texture up by name
    pub fn find_texture_3d_by_name(&self, name: &str) -> Result<&TextureResource, LookupError> {
        self.registry.get_with_dimension(name, Dimension::D3)
    }

    /// The 2D texture the document designates as the pipeline's result
    ///
    /// # Returns
    /// [`PipelineError::NoFinalImage`] when the document names none, and
    /// [`PipelineError::FinalImage`] when the named texture is absent or not 2D
    pub fn final_image(&self) -> Result<&TextureResource, PipelineError> {
        let descriptor = self.descriptor.as_ref().ok_or(PipelineError::InvalidState {
            operation: "get the final image",
            state: self.state.as_str(),
        })?;
        let name = descriptor.final_image.as_deref().ok_or(PipelineError::NoFinalImage)?;
        self.registry.get_with_dimension(name, Dimension::D2).map_err(PipelineError::FinalImage)
    }

    /// Reads the final image back and writes it to the export directory
    pub fn export_final_image(&mut self, format: ExportFormat) -> Result<PathBuf, PipelineError> {
        let name = self.final_image()?.name().to_string();
        self.export_texture(&name, format)
    }

    /// Reads a 1D or 2D texture back and writes it to the export directory
    pub fn export_texture(&mut self, name: &str, format: ExportFormat) -> Result<PathBuf, PipelineError> {
        let texture = self.registry.get(name)?;
        texture.export(&mut self.backend, &self.config.export_dir, format)
    }

    /// Looks a pass up by name
    pub fn pass(&self, name: &str) -> Option<&ComputePass> {
        self.passes.iter().find(|pass| pass.name() == name)
    }

    /// Passes in execution order
    pub fn passes(&self) -> impl Iterator<Item = &ComputePass> {
        self.passes.iter()
    }

    pub fn pass_names(&self) -> impl Iterator<Item = &str> {
        self.passes.iter().map(ComputePass::name)
    }

    /// Unit assignments of the named pass
    pub fn binding_table(&self, pass: &str) -> Option<&BindingTable> {
        self.pass(pass).map(ComputePass::bindings)
    }

    /// Texture names in creation order
    pub fn texture_names(&self) -> impl Iterator<Item = &str> {
        self.registry.names()
    }

    pub fn registry(&self) -> &TextureRegistry {
        &self.registry
    }

    /// Resolved document of the installed pipeline
    pub fn descriptor(&self) -> Option<&PipelineDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn document_path(&self) -> Option<&Path> {
        self.document_path.as_deref()
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Releases every texture and program; calling it again does nothing
    pub fn destroy(&mut self) {
        if self.state == ManagerState::Destroyed {
            return;
        }
        for mut pass in self.passes.drain(..) {
            pass.destroy(&mut self.backend);
        }
        for mut texture in self.registry.drain() {
            texture.destroy(&mut self.backend);
        }
        self.descriptor = None;
        self.state = ManagerState::Destroyed;
        tracing::info!("destroyed pipeline");
    }

    fn ensure_not_destroyed(&self, operation: &'static str) -> Result<(), PipelineError> {
        match self.state {
            ManagerState::Destroyed => Err(PipelineError::InvalidState {
                operation,
                state: self.state.as_str(),
            }),
            _ => Ok(()),
        }
    }
}

fn read_document(path: &Path) -> Result<PipelineDescriptor, PipelineError> {
    let json = std::fs::read_to_string(path).map_err(|source| PipelineError::DocumentIo {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(PipelineDescriptor::from_json(&json)?)
}

/// Whether a live texture can stand in for a new declaration across a reload
fn persists(current: &TextureDescriptor, declared: &TextureDescriptor) -> bool {
    declared.persist_across_reload && current.same_storage(declared) && current.wrap == declared.wrap && current.filter == declared.filter
}

/// Creates every texture and pass of `descriptor` without touching the live pipeline
///
/// On failure everything created so far is released again.
fn stage<B: GpuBackend>(backend: &mut B, config: &PipelineConfig, descriptor: &PipelineDescriptor, current: Option<&TextureRegistry>) -> Result<Staged, PipelineError> {
    let mut staged = Staged::default();

    for declared in &descriptor.textures {
        let kept = current
            .and_then(|registry| registry.get(&declared.name).ok())
            .is_some_and(|texture| texture.handle().is_some() && persists(texture.descriptor(), declared));
        if kept {
            tracing::debug!(texture = %declared.name, "keeping texture across reload");
            staged.textures.push(StagedTexture::Kept(declared.name.clone()));
            continue;
        }

        match TextureResource::create(backend, declared.clone(), &config.resource_root) {
            Ok(texture) => staged.textures.push(StagedTexture::Created(texture)),
            Err(error) => {
                staged.discard(backend);
                return Err(error);
            }
        }
    }

    for declared in &descriptor.passes {
        match ComputePass::create(backend, declared.clone(), config) {
            Ok(pass) => staged.passes.push(pass),
            Err(error) => {
                staged.discard(backend);
                return Err(error);
            }
        }
    }

    Ok(staged)
}

fn resolve_slot<'r>(registry: &'r TextureRegistry, slot: &BindingSlot) -> Result<&'r TextureResource, DiagnosticKind> {
    let texture = registry.get(&slot.texture).map_err(|_| DiagnosticKind::TextureNotFound)?;
    match slot.required_dimension() {
        Some(expected) if texture.dimension() != expected => Err(DiagnosticKind::RoleDimensionMismatch {
            expected,
            actual: texture.dimension(),
        }),
        _ => Ok(texture),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, RecordingBackend, UniformValue};
    use compute_pipeline_doc::DocumentError;
    use std::fs;
    use tempfile::TempDir;

    const SHADER: &str = "#version 450\nlayout(local_size_x = 16, local_size_y = 16) in;\nvoid main() {}\n";

    fn accum_document(bound_image: &str) -> String {
        format!(
            r#"{{
                "textures2D": [
                    {{ "name": "accum", "width": 512, "height": 512, "internalFormat": "RGBA32F", "pixelFormat": "RGBA", "pixelType": "FLOAT", "textureWrap": "CLAMP_TO_EDGE", "filter": "NEAREST" }}
                ],
                "passes": [
                    {{ "name": "trace", "source": "trace.comp", "dispatchSizeX": 32, "dispatchSizeY": 32, "dispatchSizeZ": 1, "boundImages": ["{bound_image}"] }}
                ],
                "finalImage": "accum"
            }}"#
        )
    }

    fn workspace(document: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pipeline.json"), document).unwrap();
        fs::write(dir.path().join("trace.comp"), SHADER).unwrap();
        dir
    }

    fn manager(dir: &TempDir) -> PipelineManager<RecordingBackend> {
        PipelineManager::new(RecordingBackend::new(), PipelineConfig::rooted_at(dir.path()))
    }

    #[test]
    fn test_load_and_run_single_pass() {
        let dir = workspace(&accum_document("accum"));
        let mut manager = manager(&dir);
        manager.load("pipeline.json").unwrap();

        assert_eq!(manager.state(), ManagerState::Ready);
        let accum = manager.find_texture_2d_by_name("accum").unwrap();
        assert_eq!(accum.descriptor().extent.width(), 512);

        let report = manager.run_frame(&FrameState::default());
        assert!(report.is_clean());
        assert_eq!(report.dispatched, 1);
    }

    #[test]
    fn test_load_creates_every_resource_eagerly() {
        let document = r#"{
            "textures1D": [{ "name": "bias", "width": 16, "internalFormat": "R32F", "pixelFormat": "RED", "pixelType": "FLOAT", "textureWrap": "REPEAT", "filter": "NEAREST" }],
            "textures2D": [{ "name": "accum", "width": 8, "height": 8, "internalFormat": "RGBA16F", "pixelFormat": "RGBA", "pixelType": "FLOAT", "textureWrap": "REPEAT", "filter": "LINEAR" }],
            "textures3D": [{ "name": "volume", "width": 4, "height": 4, "depth": 4, "internalFormat": "RGBA8", "pixelFormat": "RGBA", "pixelType": "UNSIGNED_BYTE", "textureWrap": "CLAMP_TO_EDGE", "filter": "LINEAR" }],
            "passes": [
                { "name": "trace", "source": "trace.comp", "dispatchSizeX": 1, "dispatchSizeY": 1, "dispatchSizeZ": 1, "boundImages": ["accum"], "outputTex": "volume" },
                { "name": "blend", "source": "trace.comp", "dispatchSizeX": 1, "dispatchSizeY": 1, "dispatchSizeZ": 1, "boundSamplers": ["accum"], "biasTex": "bias" }
            ]
        }"#;
        let dir = workspace(document);
        let mut manager = manager(&dir);
        manager.load("pipeline.json").unwrap();

        for name in ["bias", "accum", "volume"] {
            let handle = manager.find_texture(name).unwrap().handle().unwrap();
            assert!(manager.backend().is_texture(handle));
        }
        for pass in manager.passes() {
            assert!(manager.backend().is_program(pass.program().unwrap()));
        }
        assert_eq!(manager.texture_names().collect::<Vec<_>>(), ["bias", "accum", "volume"]);
        assert_eq!(manager.pass_names().collect::<Vec<_>>(), ["trace", "blend"]);
        assert!(!manager.backend().calls().iter().any(|call| matches!(call, BackendCall::Dispatch(_))));
    }

    #[test]
    fn test_missing_texture_is_reported_and_frame_completes() {
        let dir = workspace(&accum_document("missing"));
        let mut manager = manager(&dir);
        manager.load("pipeline.json").unwrap();
        manager.backend_mut().take_calls();

        let report = manager.run_frame(&FrameState::default());
        assert_eq!(report.missing_textures().collect::<Vec<_>>(), ["missing"]);
        assert_eq!(report.dispatched, 1);

        let calls = manager.backend_mut().take_calls();
        assert!(!calls.iter().any(|call| matches!(call, BackendCall::BindImage { .. })));
        assert!(calls.contains(&BackendCall::UnbindImage { unit: 0 }));
        assert!(calls.iter().any(|call| matches!(call, BackendCall::SetUniform { name, value: UniformValue::Int(0), .. } if name == "missing")));

        let second = manager.run_frame(&FrameState::default());
        assert_eq!(second.diagnostics.len(), 1);
    }

    #[test]
    fn test_final_image_lookup() {
        let dir = workspace(&accum_document("accum"));
        let mut manager = manager(&dir);
        manager.load("pipeline.json").unwrap();
        assert_eq!(manager.final_image().unwrap().name(), "accum");

        let document = accum_document("accum").replace(r#""finalImage": "accum""#, r#""finalImage": "nowhere""#);
        fs::write(dir.path().join("pipeline.json"), document).unwrap();
        manager.reload().unwrap();
        assert!(matches!(
            manager.final_image(),
            Err(PipelineError::FinalImage(LookupError::NotFound(ref name))) if name == "nowhere"
        ));
    }

    #[test]
    fn test_missing_include_skips_only_that_pass() {
        let document = r#"{
            "textures2D": [{ "name": "accum", "width": 4, "height": 4, "internalFormat": "RGBA32F", "pixelFormat": "RGBA", "pixelType": "FLOAT", "textureWrap": "REPEAT", "filter": "NEAREST" }],
            "passes": [
                { "name": "broken", "source": "broken.comp", "dispatchSizeX": 1, "dispatchSizeY": 1, "dispatchSizeZ": 1, "boundImages": ["accum"] },
                { "name": "trace", "source": "trace.comp", "dispatchSizeX": 1, "dispatchSizeY": 1, "dispatchSizeZ": 1, "boundImages": ["accum"] }
            ]
        }"#;
        let dir = workspace(document);
        fs::write(dir.path().join("broken.comp"), "#version 450\n#include \"util.glsl\"\nvoid main() {}\n").unwrap();

        let mut manager = manager(&dir);
        manager.load("pipeline.json").unwrap();
        assert!(!manager.pass("broken").unwrap().is_dispatchable());

        let report = manager.run_frame(&FrameState::default());
        assert_eq!(report.skipped, ["broken"]);
        assert_eq!(report.dispatched, 1);

        fs::write(dir.path().join("util.glsl"), "vec4 shade(vec2 uv) { return vec4(uv, 0.0, 1.0); }\n").unwrap();
        manager.reload().unwrap();
        assert!(manager.pass("broken").unwrap().is_dispatchable());
        assert_eq!(manager.run_frame(&FrameState::default()).dispatched, 2);
    }

    #[test]
    fn test_duplicate_names_across_dimensions_fail_load() {
        let document = r#"{
            "textures2D": [{ "name": "shared", "width": 4, "height": 4, "internalFormat": "RGBA32F", "pixelFormat": "RGBA", "pixelType": "FLOAT", "textureWrap": "REPEAT", "filter": "NEAREST" }],
            "textures3D": [{ "name": "shared", "width": 4, "height": 4, "depth": 4, "internalFormat": "RGBA32F", "pixelFormat": "RGBA", "pixelType": "FLOAT", "textureWrap": "REPEAT", "filter": "NEAREST" }]
        }"#;
        let dir = workspace(document);
        let mut manager = manager(&dir);

        let err = manager.load("pipeline.json").unwrap_err();
        assert!(matches!(err, PipelineError::Document(DocumentError::DuplicateTexture { ref name, .. }) if name == "shared"));
        assert_eq!(manager.state(), ManagerState::Unloaded);
        assert_eq!(manager.backend().texture_count(), 0);
    }

    #[test]
    fn test_reload_preserves_structure() {
        let document = r#"{
            "textures2D": [{ "name": "accum", "width": 4, "height": 4, "internalFormat": "RGBA32F", "pixelFormat": "RGBA", "pixelType": "FLOAT", "textureWrap": "REPEAT", "filter": "NEAREST" }],
            "textures3D": [{ "name": "volume", "width": 2, "height": 2, "depth": 2, "internalFormat": "RGBA32F", "pixelFormat": "RGBA", "pixelType": "FLOAT", "textureWrap": "REPEAT", "filter": "LINEAR" }],
            "passes": [{ "name": "trace", "source": "trace.comp", "dispatchSizeX": 1, "dispatchSizeY": 1, "dispatchSizeZ": 1, "boundImages": ["accum"], "boundSamplers": ["accum"], "inputTex": "volume", "outputTex": "volume" }]
        }"#;
        let dir = workspace(document);
        let mut manager = manager(&dir);
        manager.load("pipeline.json").unwrap();
        let names: Vec<String> = manager.texture_names().map(String::from).collect();
        let table = manager.binding_table("trace").unwrap().clone();

        manager.reload().unwrap();
        manager.reload().unwrap();

        assert_eq!(manager.texture_names().collect::<Vec<_>>(), names);
        assert_eq!(manager.binding_table("trace").unwrap(), &table);
        assert_eq!(manager.backend().texture_count(), 2);
        assert_eq!(manager.backend().program_count(), 1);
    }

    #[test]
    fn test_persistent_texture_keeps_contents_across_reload() {
        let document = r#"{
            "textures2D": [
                { "name": "accum", "width": 1, "height": 1, "internalFormat": "RGBA32F", "pixelFormat": "RGBA", "pixelType": "FLOAT", "textureWrap": "REPEAT", "filter": "NEAREST", "persistAcrossReload": true },
                { "name": "scratch", "width": 1, "height": 1, "internalFormat": "RGBA32F", "pixelFormat": "RGBA", "pixelType": "FLOAT", "textureWrap": "REPEAT", "filter": "NEAREST" }
            ]
        }"#;
        let dir = workspace(document);
        let mut manager = manager(&dir);
        manager.load("pipeline.json").unwrap();

        let accum = manager.find_texture("accum").unwrap().handle().unwrap();
        let scratch = manager.find_texture("scratch").unwrap().handle().unwrap();
        let texel: Vec<u8> = [0.25f32, 0.5, 0.75, 1.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        manager.backend_mut().write_storage(accum, &texel).unwrap();

        manager.reload().unwrap();

        let kept = manager.find_texture("accum").unwrap();
        assert_eq!(kept.handle(), Some(accum));
        let contents = manager.backend_mut().read_texture(accum).unwrap();
        assert_eq!(contents, [0.25, 0.5, 0.75, 1.0]);

        let recreated = manager.find_texture("scratch").unwrap().handle().unwrap();
        assert_ne!(recreated, scratch);
        assert!(!manager.backend().is_texture(scratch));
        assert_eq!(manager.texture_names().collect::<Vec<_>>(), ["accum", "scratch"]);
    }

    #[test]
    fn test_failed_reload_keeps_previous_pipeline() {
        let dir = workspace(&accum_document("accum"));
        let mut manager = manager(&dir);
        manager.load("pipeline.json").unwrap();
        let accum = manager.find_texture("accum").unwrap().handle().unwrap();
        let program = manager.pass("trace").unwrap().program().unwrap();

        fs::remove_file(dir.path().join("trace.comp")).unwrap();
        let err = manager.reload().unwrap_err();
        assert!(matches!(err, PipelineError::ShaderIo { ref pass, .. } if pass == "trace"));

        assert_eq!(manager.state(), ManagerState::Ready);
        assert_eq!(manager.find_texture("accum").unwrap().handle(), Some(accum));
        assert_eq!(manager.pass("trace").unwrap().program(), Some(program));
        assert_eq!(manager.backend().texture_count(), 1);
        assert_eq!(manager.backend().program_count(), 1);
        assert_eq!(manager.run_frame(&FrameState::default()).dispatched, 1);
    }

    #[test]
    fn test_strict_reference_check_fails_load() {
        let dir = workspace(&accum_document("missing"));
        let mut manager = PipelineManager::new(RecordingBackend::new(), PipelineConfig::rooted_at(dir.path()).with_reference_check(ReferenceCheck::Strict));

        let err = manager.load("pipeline.json").unwrap_err();
        let PipelineError::UnresolvedReferences(issues) = err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].slot.texture, "missing");
        assert_eq!(manager.state(), ManagerState::Unloaded);
        assert_eq!(manager.backend().texture_count(), 0);
    }

    #[test]
    fn test_frame_command_order() {
        let dir = workspace(&accum_document("accum"));
        let mut manager = manager(&dir);
        manager.load("pipeline.json").unwrap();
        let accum = manager.find_texture("accum").unwrap().handle().unwrap();
        let program = manager.pass("trace").unwrap().program().unwrap();
        manager.backend_mut().take_calls();

        let mut frame = FrameState::default();
        frame.advance(Default::default(), 0.016, true);
        let report = manager.run_frame(&frame);
        assert_eq!(report.frame_index, 1);

        let calls = manager.backend_mut().take_calls();
        assert_eq!(
            calls[..5],
            [
                BackendCall::BeginFrame,
                BackendCall::PushDebugGroup("trace".to_string()),
                BackendCall::UseProgram(program),
                BackendCall::BindImage { unit: 0, texture: accum },
                BackendCall::SetUniform {
                    program,
                    name: "accum".to_string(),
                    value: UniformValue::Int(0)
                },
            ]
        );
        let frame_uniforms = &calls[5..19];
        assert!(frame_uniforms.iter().all(|call| matches!(call, BackendCall::SetUniform { .. })));
        assert!(frame_uniforms.contains(&BackendCall::SetUniform {
            program,
            name: "accumulationIndex".to_string(),
            value: UniformValue::UInt(1)
        }));
        assert_eq!(
            calls[19..],
            [
                BackendCall::MemoryBarrier,
                BackendCall::Dispatch(compute_pipeline_doc::DispatchExtent { x: 32, y: 32, z: 1 }),
                BackendCall::MemoryBarrier,
                BackendCall::PopDebugGroup,
                BackendCall::EndFrame,
            ]
        );
    }

    #[test]
    fn test_role_with_wrong_dimension_is_left_unbound() {
        let document = r#"{
            "textures2D": [{ "name": "accum", "width": 4, "height": 4, "internalFormat": "RGBA32F", "pixelFormat": "RGBA", "pixelType": "FLOAT", "textureWrap": "REPEAT", "filter": "NEAREST" }],
            "passes": [{ "name": "trace", "source": "trace.comp", "dispatchSizeX": 1, "dispatchSizeY": 1, "dispatchSizeZ": 1, "boundSamplers": ["accum"], "inputTex": "accum", "kernelTex": "accum" }]
        }"#;
        let dir = workspace(document);
        let mut manager = manager(&dir);
        manager.load("pipeline.json").unwrap();
        let accum = manager.find_texture("accum").unwrap().handle().unwrap();
        manager.backend_mut().take_calls();

        let report = manager.run_frame(&FrameState::default());
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(
            report.diagnostics[0].kind,
            DiagnosticKind::RoleDimensionMismatch {
                expected: Dimension::D3,
                actual: Dimension::D2
            }
        );

        let binds: Vec<_> = manager
            .backend()
            .calls()
            .iter()
            .filter_map(|call| match call {
                BackendCall::BindSampler { unit, texture } => Some((*unit, *texture)),
                _ => None,
            })
            .collect();
        assert_eq!(binds, [(0, accum), (2, accum)]);
        assert!(manager.backend().calls().contains(&BackendCall::UnbindSampler { unit: 1 }));
    }

    #[test]
    fn test_missed_binding_clears_unit_left_by_earlier_pass() {
        let document = r#"{
            "textures2D": [{ "name": "accum", "width": 4, "height": 4, "internalFormat": "RGBA32F", "pixelFormat": "RGBA", "pixelType": "FLOAT", "textureWrap": "REPEAT", "filter": "NEAREST" }],
            "passes": [
                { "name": "first", "source": "trace.comp", "dispatchSizeX": 1, "dispatchSizeY": 1, "dispatchSizeZ": 1, "boundImages": ["accum"], "boundSamplers": ["accum"] },
                { "name": "second", "source": "trace.comp", "dispatchSizeX": 1, "dispatchSizeY": 1, "dispatchSizeZ": 1, "boundImages": ["missing"], "boundSamplers": ["gone"] }
            ]
        }"#;
        let dir = workspace(document);
        let mut manager = manager(&dir);
        manager.load("pipeline.json").unwrap();
        let second = manager.pass("second").unwrap().program().unwrap();
        manager.backend_mut().take_calls();

        let report = manager.run_frame(&FrameState::default());
        assert_eq!(report.missing_textures().collect::<Vec<_>>(), ["missing", "gone"]);

        let calls = manager.backend_mut().take_calls();
        let start = calls.iter().position(|call| *call == BackendCall::UseProgram(second)).unwrap();
        let end = calls.iter().rposition(|call| matches!(call, BackendCall::Dispatch(_))).unwrap();
        let second_pass = &calls[start..end];
        assert_eq!(second_pass[1], BackendCall::UnbindImage { unit: 0 });
        assert!(second_pass.contains(&BackendCall::UnbindSampler { unit: 0 }));
        assert!(!second_pass.iter().any(|call| matches!(call, BackendCall::BindImage { .. } | BackendCall::BindSampler { .. })));
    }

    #[test]
    fn test_export_final_image() {
        let document = accum_document("accum").replace(r#""width": 512, "height": 512"#, r#""width": 2, "height": 2"#);
        let dir = workspace(&document);
        let mut manager = manager(&dir);
        manager.load("pipeline.json").unwrap();

        let raw = manager.export_final_image(ExportFormat::Raw).unwrap();
        assert_eq!(raw, dir.path().join("accum.bin"));
        assert_eq!(fs::read(&raw).unwrap().len(), 2 * 2 * 4 * 4);

        let png = manager.export_final_image(ExportFormat::Png).unwrap();
        assert_eq!(png, dir.path().join("accum_0.png"));
    }

    #[test]
    fn test_lifecycle_guards() {
        let dir = workspace(&accum_document("accum"));
        let mut manager = manager(&dir);

        assert!(matches!(manager.reload(), Err(PipelineError::InvalidState { state: "unloaded", .. })));
        assert_eq!(manager.run_frame(&FrameState::default()).dispatched, 0);
        assert!(matches!(manager.final_image(), Err(PipelineError::InvalidState { .. })));

        manager.load("pipeline.json").unwrap();
        manager.destroy();
        manager.destroy();
        assert_eq!(manager.state(), ManagerState::Destroyed);
        assert_eq!(manager.backend().texture_count(), 0);
        assert_eq!(manager.backend().program_count(), 0);
        assert!(matches!(manager.load("pipeline.json"), Err(PipelineError::InvalidState { state: "destroyed", .. })));
    }
}

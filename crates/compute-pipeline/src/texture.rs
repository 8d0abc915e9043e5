//! GPU texture resources
//!
//! A [`TextureResource`] owns one backend texture created eagerly from its
//! descriptor. Source files are size-checked against the declared extent and
//! formats before anything is uploaded.

use crate::backend::{GpuBackend, TextureHandle};
use crate::export::{self, ExportFormat};
use crate::PipelineError;
use compute_pipeline_doc::{Dimension, TextureDescriptor};
use std::path::{Path, PathBuf};

/// A named texture and the backend object holding its texels
#[derive(Debug)]
pub struct TextureResource {
    /// Declaration the texture was created from
    descriptor: TextureDescriptor,
    /// Backend object; `None` once destroyed
    handle: Option<TextureHandle>,
}

impl TextureResource {
    /// Allocates the texture and uploads its source file, if any
    ///
    /// # Arguments
    /// * `backend` - Backend owning the GPU object
    /// * `descriptor` - Resolved texture declaration
    /// * `resource_root` - Directory the descriptor's source file is relative to
    ///
    /// # Returns
    /// The live resource, or an error naming the texture and file
    pub fn create<B: GpuBackend>(backend: &mut B, descriptor: TextureDescriptor, resource_root: &Path) -> Result<Self, PipelineError> {
        let contents = match &descriptor.source_file {
            Some(file) => Some(read_source(&descriptor, &resource_root.join(file))?),
            None => None,
        };

        let handle = backend
            .create_texture(&descriptor, contents.as_deref())
            .map_err(|source| PipelineError::backend(format!("texture \"{}\"", descriptor.name), source))?;

        tracing::info!(
            texture = %descriptor.name,
            dimension = %descriptor.dimension(),
            extent = %descriptor.extent,
            format = %descriptor.internal_format,
            uploaded = contents.is_some(),
            "registered texture"
        );

        Ok(Self {
            descriptor,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    pub fn dimension(&self) -> Dimension {
        self.descriptor.dimension()
    }

    /// Backend handle; `None` once destroyed
    pub fn handle(&self) -> Option<TextureHandle> {
        self.handle
    }

    /// Binds the texture for filtered read-only access at `unit`
    pub fn bind<B: GpuBackend>(&self, backend: &mut B, unit: u32) {
        if let Some(handle) = self.handle {
            backend.bind_sampler(unit, handle);
        }
    }

    /// Binds the texture for read-write image access at `unit`
    pub fn bind_as_image<B: GpuBackend>(&self, backend: &mut B, unit: u32) {
        if let Some(handle) = self.handle {
            backend.bind_image(unit, handle);
        }
    }

    /// Downloads the contents as tightly packed RGBA f32 texels
    ///
    /// Only 1D and 2D textures can be read back.
    pub fn read_back<B: GpuBackend>(&self, backend: &mut B) -> Result<Vec<f32>, PipelineError> {
        if self.dimension() == Dimension::D3 {
            return Err(PipelineError::ReadBackUnsupported(self.descriptor.name.clone()));
        }
        let handle = self.handle.ok_or_else(|| PipelineError::InvalidState {
            operation: "read back a texture",
            state: "destroyed",
        })?;
        backend.read_texture(handle).map_err(|source| PipelineError::backend(format!("texture \"{}\"", self.descriptor.name), source))
    }

    /// Reads the texture back and writes it to `dir`
    ///
    /// # Returns
    /// Path of the written file
    pub fn export<B: GpuBackend>(&self, backend: &mut B, dir: &Path, format: ExportFormat) -> Result<PathBuf, PipelineError> {
        let rgba = self.read_back(backend)?;
        let path = match format {
            ExportFormat::Raw => export::write_raw(dir, self.name(), &rgba)?,
            ExportFormat::Png => export::write_png(dir, self.name(), self.descriptor.extent.width(), self.descriptor.extent.height(), rgba)?,
        };
        tracing::info!(texture = %self.name(), path = %path.display(), %format, "exported texture");
        Ok(path)
    }

    /// Releases the GPU object; calling it again does nothing
    pub fn destroy<B: GpuBackend>(&mut self, backend: &mut B) {
        if let Some(handle) = self.handle.take() {
            backend.destroy_texture(handle);
            tracing::debug!(texture = %self.descriptor.name, "destroyed texture");
        }
    }
}

fn read_source(descriptor: &TextureDescriptor, path: &Path) -> Result<Vec<u8>, PipelineError> {
    let bytes = std::fs::read(path).map_err(|source| PipelineError::TextureIo {
        texture: descriptor.name.clone(),
        path: path.to_path_buf(),
        source,
    })?;

    let expected = descriptor.expected_upload_len().unwrap_or(u64::MAX);
    if bytes.len() as u64 != expected {
        return Err(PipelineError::TextureSize {
            texture: descriptor.name.clone(),
            path: path.to_path_buf(),
            expected,
            actual: bytes.len() as u64,
        });
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, RecordingBackend};
    use compute_pipeline_doc::PipelineDescriptor;

    fn descriptor(file: Option<&str>) -> TextureDescriptor {
        let file = file.map(|f| format!(r#""fileName": "{f}","#)).unwrap_or_default();
        let json = format!(
            r#"{{ "textures2D": [{{ "name": "noise", "width": 2, "height": 2, {file} "internalFormat": "RGBA32F", "pixelFormat": "RGBA", "pixelType": "FLOAT", "textureWrap": "REPEAT", "filter": "LINEAR" }}] }}"#
        );
        PipelineDescriptor::from_json(&json).unwrap().textures.remove(0)
    }

    #[test]
    fn test_create_without_file_allocates_zeroed_storage() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut backend = RecordingBackend::new();
        let texture = TextureResource::create(&mut backend, descriptor(None), dir.path()).unwrap();

        let handle = texture.handle().unwrap();
        assert!(backend.is_texture(handle));
        assert_eq!(texture.read_back(&mut backend).unwrap(), vec![0.0; 16]);
        assert!(matches!(&backend.calls()[0], BackendCall::CreateTexture { uploaded: false, .. }));
    }

    #[test]
    fn test_size_mismatch_names_texture_and_file() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("noise.bin"), vec![0u8; 60]).unwrap();

        let mut backend = RecordingBackend::new();
        let err = TextureResource::create(&mut backend, descriptor(Some("noise.bin")), dir.path()).unwrap_err();
        match err {
            PipelineError::TextureSize { texture, path, expected, actual } => {
                assert_eq!(texture, "noise");
                assert_eq!(path, dir.path().join("noise.bin"));
                assert_eq!((expected, actual), (64, 60));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(backend.texture_count(), 0);
    }

    #[test]
    fn test_missing_file_is_a_resource_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut backend = RecordingBackend::new();
        let err = TextureResource::create(&mut backend, descriptor(Some("absent.bin")), dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::TextureIo { ref texture, .. } if texture == "noise"));
    }

    #[test]
    fn test_bind_and_destroy() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut backend = RecordingBackend::new();
        let mut texture = TextureResource::create(&mut backend, descriptor(None), dir.path()).unwrap();
        let handle = texture.handle().unwrap();

        texture.bind(&mut backend, 3);
        texture.bind_as_image(&mut backend, 1);
        texture.destroy(&mut backend);
        texture.destroy(&mut backend);

        assert_eq!(
            backend.take_calls()[1..],
            [
                BackendCall::BindSampler { unit: 3, texture: handle },
                BackendCall::BindImage { unit: 1, texture: handle },
                BackendCall::DestroyTexture(handle),
            ]
        );
        assert!(texture.handle().is_none());
        assert!(matches!(texture.read_back(&mut backend), Err(PipelineError::InvalidState { .. })));
    }

    #[test]
    fn test_raw_export_round_trips_through_upload() {
        let dir = tempfile::TempDir::new().unwrap();
        let texels: Vec<f32> = (0..16).map(|i| i as f32 * 0.125 - 0.5).collect();
        let bytes: Vec<u8> = texels.iter().flat_map(|v| v.to_le_bytes()).collect();
        std::fs::write(dir.path().join("noise.bin"), &bytes).unwrap();

        let mut backend = RecordingBackend::new();
        let texture = TextureResource::create(&mut backend, descriptor(Some("noise.bin")), dir.path()).unwrap();
        let export_dir = tempfile::TempDir::new().unwrap();
        let exported = texture.export(&mut backend, export_dir.path(), ExportFormat::Raw).unwrap();
        assert_eq!(std::fs::read(&exported).unwrap(), bytes);

        let reloaded = TextureResource::create(&mut backend, descriptor(Some("noise.bin")), export_dir.path()).unwrap();
        assert_eq!(reloaded.read_back(&mut backend).unwrap(), texels);
    }
}

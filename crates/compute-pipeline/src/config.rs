//! Pipeline manager configuration

use std::path::{Path, PathBuf};

/// How unresolved pass-to-texture references are treated at load time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReferenceCheck {
    /// Warn at load and skip the affected bindings every frame
    #[default]
    Lenient,
    /// Fail the load
    Strict,
}

/// Filesystem roots and load policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Base directory of pipeline documents, shader sources and includes
    pub shader_root: PathBuf,
    /// Base directory of texture source files
    pub resource_root: PathBuf,
    /// Directory receiving raw and PNG exports
    pub export_dir: PathBuf,
    pub reference_check: ReferenceCheck,
    /// Nesting limit for `#include` expansion
    pub max_include_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            shader_root: PathBuf::from("shaders"),
            resource_root: PathBuf::from("resources"),
            export_dir: PathBuf::from("."),
            reference_check: ReferenceCheck::Lenient,
            max_include_depth: 32,
        }
    }
}

impl PipelineConfig {
    pub fn with_shader_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.shader_root = path.into();
        self
    }

    pub fn with_resource_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.resource_root = path.into();
        self
    }

    pub fn with_export_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.export_dir = path.into();
        self
    }

    pub fn with_reference_check(mut self, check: ReferenceCheck) -> Self {
        self.reference_check = check;
        self
    }

    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    /// Uses one directory for shaders, resources and exports
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self::default().with_shader_root(root).with_resource_root(root).with_export_dir(root)
    }
}

//! Disk export of read-back texture contents

use crate::PipelineError;
use std::fmt;
use std::path::{Path, PathBuf};

/// On-disk encoding of an exported texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Headerless little-endian RGBA f32, row-major, written to `<name>.bin`
    Raw,
    /// 8-bit RGBA PNG, written to the first free `<name>_<counter>.png`
    Png,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::Png => write!(f, "png"),
        }
    }
}

/// Writes RGBA f32 texels as a raw binary dump
pub(crate) fn write_raw(dir: &Path, name: &str, rgba: &[f32]) -> Result<PathBuf, PipelineError> {
    let path = dir.join(format!("{name}.bin"));
    let bytes: Vec<u8> = rgba.iter().flat_map(|value| value.to_le_bytes()).collect();
    std::fs::write(&path, bytes).map_err(|source| PipelineError::ExportIo { path: path.clone(), source })?;
    Ok(path)
}

/// Writes RGBA f32 texels as an 8-bit PNG without overwriting earlier exports
pub(crate) fn write_png(dir: &Path, name: &str, width: u32, height: u32, rgba: Vec<f32>) -> Result<PathBuf, PipelineError> {
    let path = next_png_path(dir, name);
    let image = image::Rgba32FImage::from_raw(width, height, rgba).ok_or_else(|| PipelineError::ExportEncode {
        path: path.clone(),
        source: image::ImageError::Parameter(image::error::ParameterError::from_kind(image::error::ParameterErrorKind::DimensionMismatch)),
    })?;

    image::DynamicImage::ImageRgba32F(image)
        .to_rgba8()
        .save(&path)
        .map_err(|source| PipelineError::ExportEncode { path: path.clone(), source })?;
    Ok(path)
}

/// First `<name>_<counter>.png` in `dir` that does not exist yet
pub(crate) fn next_png_path(dir: &Path, name: &str) -> PathBuf {
    (0u32..)
        .map(|counter| dir.join(format!("{name}_{counter}.png")))
        .find(|path| !path.exists())
        .unwrap_or_else(|| dir.join(format!("{name}.png")))
}

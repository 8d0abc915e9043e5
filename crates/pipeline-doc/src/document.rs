//! Pipeline document parser
//!
//! This module holds the raw serde schema of the JSON pipeline document. Values
//! are kept as written (format names are still strings); [`PipelineDocument::resolve`]
//! turns a parsed document into typed descriptors.

use serde::{Deserialize, Serialize};

/// One texture entry in `textures1D`, `textures2D` or `textures3D`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureEntry {
    /// Registry key, unique across all dimensionalities
    pub name: String,
    pub width: u32,
    /// Required for 2D and 3D textures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Required for 3D textures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    pub internal_format: String,
    pub pixel_format: String,
    pub pixel_type: String,
    pub texture_wrap: String,
    pub filter: String,
    /// Initial contents, relative to the resource root; absent means GPU-allocated only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Keep the GPU object and its contents across reloads when the entry is unchanged
    #[serde(default)]
    pub persist_across_reload: bool,
}

/// One compute pass entry in `passes`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassEntry {
    pub name: String,
    /// Shader file path relative to the shader root
    pub source: String,
    pub dispatch_size_x: u32,
    pub dispatch_size_y: u32,
    pub dispatch_size_z: u32,
    /// Textures bound read-write at image units 0, 1, ...
    #[serde(default)]
    pub bound_images: Vec<String>,
    /// Textures bound read-only at sampler units 0, 1, ...
    #[serde(default)]
    pub bound_samplers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_tex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bias_tex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_tex: Option<String>,
}

/// Raw pipeline document as parsed from JSON
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDocument {
    #[serde(rename = "textures1D", default)]
    pub textures_1d: Vec<TextureEntry>,
    #[serde(rename = "textures2D", default)]
    pub textures_2d: Vec<TextureEntry>,
    #[serde(rename = "textures3D", default)]
    pub textures_3d: Vec<TextureEntry>,
    /// Passes in execution order
    #[serde(default)]
    pub passes: Vec<PassEntry>,
    /// Name of the 2D texture presented or exported by the application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_image: Option<String>,
}

impl PipelineDocument {
    /// Parses a pipeline document from JSON content
    ///
    /// # Arguments
    /// * `json` - JSON string containing the document
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_parsing() {
        let json = r#"{
            "textures2D": [
                {
                    "name": "accum",
                    "width": 512,
                    "height": 512,
                    "internalFormat": "RGBA32F",
                    "pixelFormat": "RGBA",
                    "pixelType": "FLOAT",
                    "textureWrap": "CLAMP_TO_EDGE",
                    "filter": "LINEAR"
                }
            ],
            "passes": [
                {
                    "name": "trace",
                    "source": "trace.comp",
                    "dispatchSizeX": 32,
                    "dispatchSizeY": 32,
                    "dispatchSizeZ": 1,
                    "boundImages": ["accum"],
                    "kernelTex": "weights"
                }
            ],
            "finalImage": "accum"
        }"#;

        let document = PipelineDocument::from_json(json).unwrap();
        assert!(document.textures_1d.is_empty());
        assert!(document.textures_3d.is_empty());
        assert_eq!(document.textures_2d.len(), 1);
        assert_eq!(document.final_image.as_deref(), Some("accum"));

        let texture = &document.textures_2d[0];
        assert_eq!(texture.name, "accum");
        assert_eq!(texture.height, Some(512));
        assert_eq!(texture.depth, None);
        assert_eq!(texture.file_name, None);
        assert!(!texture.persist_across_reload);

        let pass = &document.passes[0];
        assert_eq!(pass.dispatch_size_x, 32);
        assert_eq!(pass.bound_images, vec!["accum".to_string()]);
        assert!(pass.bound_samplers.is_empty());
        assert_eq!(pass.kernel_tex.as_deref(), Some("weights"));
        assert_eq!(pass.input_tex, None);
    }

    #[test]
    fn test_missing_required_field_is_an_error() {
        let json = r#"{
            "passes": [
                { "name": "trace", "source": "trace.comp", "dispatchSizeX": 1, "dispatchSizeY": 1 }
            ]
        }"#;
        let err = PipelineDocument::from_json(json).unwrap_err();
        assert!(err.to_string().contains("dispatchSizeZ"));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(PipelineDocument::from_json("{ \"passes\": [ }").is_err());
        assert!(PipelineDocument::from_json("{ \"textures2D\": {} }").is_err());
    }
}

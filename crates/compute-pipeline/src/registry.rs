//! Name-keyed texture registry
//!
//! One namespace holds 1D, 2D and 3D textures; a lookup is a single map access
//! and the dimensionality is a property of the found resource.

use crate::texture::TextureResource;
use crate::LookupError;
use compute_pipeline_doc::Dimension;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct TextureRegistry {
    /// Creation order
    textures: Vec<TextureResource>,
    index: HashMap<String, usize>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a texture, handing it back if the name is taken
    pub fn insert(&mut self, texture: TextureResource) -> Result<(), TextureResource> {
        if self.index.contains_key(texture.name()) {
            return Err(texture);
        }
        self.index.insert(texture.name().to_string(), self.textures.len());
        self.textures.push(texture);
        Ok(())
    }

    /// Looks a texture up by name, whatever its dimensionality
    pub fn get(&self, name: &str) -> Result<&TextureResource, LookupError> {
        if name.is_empty() {
            return Err(LookupError::EmptyName);
        }
        self.index
            .get(name)
            .map(|&position| &self.textures[position])
            .ok_or_else(|| LookupError::NotFound(name.to_string()))
    }

    /// Looks a texture up by name and requires a dimensionality
    pub fn get_with_dimension(&self, name: &str, dimension: Dimension) -> Result<&TextureResource, LookupError> {
        let texture = self.get(name)?;
        if texture.dimension() != dimension {
            return Err(LookupError::WrongDimension {
                name: name.to_string(),
                expected: dimension,
                actual: texture.dimension(),
            });
        }
        Ok(texture)
    }

    /// Textures in creation order
    pub fn iter(&self) -> impl Iterator<Item = &TextureResource> {
        self.textures.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.textures.iter().map(TextureResource::name)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Removes a texture, keeping the creation order of the rest
    pub fn remove(&mut self, name: &str) -> Option<TextureResource> {
        let position = self.index.remove(name)?;
        let texture = self.textures.remove(position);
        for index in self.index.values_mut() {
            if *index > position {
                *index -= 1;
            }
        }
        Some(texture)
    }

    /// Removes every texture, in creation order
    pub fn drain(&mut self) -> impl Iterator<Item = TextureResource> + '_ {
        self.index.clear();
        self.textures.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;
    use compute_pipeline_doc::PipelineDescriptor;

    fn registry(backend: &mut RecordingBackend) -> TextureRegistry {
        let json = r#"{
            "textures1D": [{ "name": "bias", "width": 4, "internalFormat": "R32F", "pixelFormat": "RED", "pixelType": "FLOAT", "textureWrap": "REPEAT", "filter": "NEAREST" }],
            "textures2D": [{ "name": "accum", "width": 4, "height": 4, "internalFormat": "RGBA32F", "pixelFormat": "RGBA", "pixelType": "FLOAT", "textureWrap": "REPEAT", "filter": "NEAREST" }],
            "textures3D": [{ "name": "volume", "width": 2, "height": 2, "depth": 2, "internalFormat": "RGBA16F", "pixelFormat": "RGBA", "pixelType": "FLOAT", "textureWrap": "REPEAT", "filter": "NEAREST" }]
        }"#;
        let dir = std::env::temp_dir();
        let mut registry = TextureRegistry::new();
        for descriptor in PipelineDescriptor::from_json(json).unwrap().textures {
            registry.insert(TextureResource::create(backend, descriptor, &dir).unwrap()).unwrap();
        }
        registry
    }

    #[test]
    fn test_lookup_across_dimensions() {
        let mut backend = RecordingBackend::new();
        let registry = registry(&mut backend);

        assert_eq!(registry.get("volume").unwrap().dimension(), Dimension::D3);
        assert_eq!(registry.get_with_dimension("bias", Dimension::D1).unwrap().name(), "bias");
        assert_eq!(registry.get("missing").unwrap_err(), LookupError::NotFound("missing".to_string()));
        assert_eq!(registry.get("").unwrap_err(), LookupError::EmptyName);
        assert_eq!(
            registry.get_with_dimension("accum", Dimension::D3).unwrap_err(),
            LookupError::WrongDimension {
                name: "accum".to_string(),
                expected: Dimension::D3,
                actual: Dimension::D2
            }
        );
        assert_eq!(registry.names().collect::<Vec<_>>(), ["bias", "accum", "volume"]);
    }

    #[test]
    fn test_duplicate_insert_is_refused_and_remove_reindexes() {
        let mut backend = RecordingBackend::new();
        let mut registry = registry(&mut backend);

        let json = r#"{ "textures2D": [{ "name": "bias", "width": 1, "height": 1, "internalFormat": "R8", "pixelFormat": "RED", "pixelType": "UNSIGNED_BYTE", "textureWrap": "REPEAT", "filter": "NEAREST" }] }"#;
        let descriptor = PipelineDescriptor::from_json(json).unwrap().textures.remove(0);
        let duplicate = TextureResource::create(&mut backend, descriptor, &std::env::temp_dir()).unwrap();
        assert!(registry.insert(duplicate).is_err());
        assert_eq!(registry.get("bias").unwrap().dimension(), Dimension::D1);

        assert_eq!(registry.remove("bias").unwrap().name(), "bias");
        assert_eq!(registry.get("volume").unwrap().name(), "volume");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.drain().count(), 2);
        assert!(registry.is_empty());
    }
}

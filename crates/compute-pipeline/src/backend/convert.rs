//! Texel layout conversion between upload data, GPU storage and read-back
//!
//! GPU storage never has three channels: 3-channel formats are stored with a
//! padding alpha, except the packed R11F_G11F_B10F format.

use super::BackendError;
use compute_pipeline_doc::{ComponentType, InternalFormat, PixelFormat, PixelType, TextureDescriptor};
use half::f16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StorageLayout {
    pub channels: usize,
    pub component: ComponentType,
}

impl StorageLayout {
    pub fn of(format: InternalFormat) -> Self {
        let component = format.component_type();
        let channels = match (format.channels(), component) {
            (3, ComponentType::PackedFloat) => 3,
            (3, _) => 4,
            (n, _) => n as usize,
        };
        Self { channels, component }
    }

    pub fn texel_size(&self) -> usize {
        match self.component {
            ComponentType::UNorm8 => self.channels,
            ComponentType::UNorm16 | ComponentType::Float16 => self.channels * 2,
            ComponentType::Float32 => self.channels * 4,
            ComponentType::PackedFloat => 4,
        }
    }
}

/// Converts upload bytes into the storage layout of the descriptor's internal format
pub(crate) fn upload_to_storage(descriptor: &TextureDescriptor, bytes: &[u8]) -> Result<Vec<u8>, BackendError> {
    let expected = descriptor.expected_upload_len().and_then(|len| usize::try_from(len).ok()).unwrap_or(usize::MAX);
    if bytes.len() != expected {
        return Err(BackendError::UploadSize { expected, actual: bytes.len() });
    }

    let layout = StorageLayout::of(descriptor.internal_format);
    let pixel_format = descriptor.pixel_format;
    let pixel_type = descriptor.pixel_type;
    if layout.component == ComponentType::PackedFloat {
        return Err(BackendError::UnsupportedConversion {
            internal: descriptor.internal_format,
            pixel_format,
            pixel_type,
        });
    }

    let exact = matches!(
        (pixel_type, layout.component),
        (PixelType::UnsignedByte, ComponentType::UNorm8) | (PixelType::HalfFloat, ComponentType::Float16) | (PixelType::Float, ComponentType::Float32)
    );
    if exact && !pixel_format.is_bgr_order() && pixel_format.channels() as usize == layout.channels {
        return Ok(bytes.to_vec());
    }

    let source_channels = pixel_format.channels() as usize;
    let element_size = pixel_type.size_in_bytes() as usize;
    let texel_count = bytes.len() / (source_channels * element_size);
    let mut storage = Vec::with_capacity(texel_count * layout.texel_size());
    let mut texel = [0.0f32; 4];

    for source in bytes.chunks_exact(source_channels * element_size) {
        for (channel, element) in source.chunks_exact(element_size).enumerate() {
            texel[channel] = decode_element(pixel_type, element);
        }
        if pixel_format.is_bgr_order() {
            texel.swap(0, 2);
        }
        for channel in 0..layout.channels {
            let value = match channel {
                c if c < source_channels => texel[c],
                3 => 1.0,
                _ => 0.0,
            };
            encode_component(layout.component, value, &mut storage);
        }
    }

    Ok(storage)
}

/// Expands storage bytes into tightly packed RGBA f32 texels
///
/// Channels the internal format does not declare read as 0, alpha as 1.
pub(crate) fn storage_to_rgba32f(format: InternalFormat, bytes: &[u8]) -> Vec<f32> {
    let layout = StorageLayout::of(format);
    let declared = format.channels() as usize;
    let mut rgba = Vec::with_capacity(bytes.len() / layout.texel_size() * 4);

    for texel in bytes.chunks_exact(layout.texel_size()) {
        let mut values = [0.0, 0.0, 0.0, 1.0];
        match layout.component {
            ComponentType::PackedFloat => {
                let bits = u32::from_le_bytes([texel[0], texel[1], texel[2], texel[3]]);
                values[0] = decode_small_float(bits & 0x7ff, 6);
                values[1] = decode_small_float((bits >> 11) & 0x7ff, 6);
                values[2] = decode_small_float((bits >> 22) & 0x3ff, 5);
            }
            component => {
                let size = layout.texel_size() / layout.channels;
                for (channel, element) in texel.chunks_exact(size).enumerate().take(declared) {
                    values[channel] = decode_component(component, element);
                }
            }
        }
        rgba.extend_from_slice(&values);
    }

    rgba
}

fn decode_element(pixel_type: PixelType, element: &[u8]) -> f32 {
    match pixel_type {
        PixelType::UnsignedByte => element[0] as f32 / u8::MAX as f32,
        PixelType::Byte => (element[0] as i8 as f32 / i8::MAX as f32).max(-1.0),
        PixelType::Short => (i16::from_le_bytes([element[0], element[1]]) as f32 / i16::MAX as f32).max(-1.0),
        PixelType::Int => (i32::from_le_bytes([element[0], element[1], element[2], element[3]]) as f64 / i32::MAX as f64).max(-1.0) as f32,
        PixelType::HalfFloat => f16::from_bits(u16::from_le_bytes([element[0], element[1]])).to_f32(),
        PixelType::Float => f32::from_le_bytes([element[0], element[1], element[2], element[3]]),
    }
}

fn encode_component(component: ComponentType, value: f32, out: &mut Vec<u8>) {
    match component {
        ComponentType::UNorm8 => out.push((value.clamp(0.0, 1.0) * u8::MAX as f32).round() as u8),
        ComponentType::UNorm16 => out.extend_from_slice(&((value.clamp(0.0, 1.0) * u16::MAX as f32).round() as u16).to_le_bytes()),
        ComponentType::Float16 => out.extend_from_slice(&f16::from_f32(value).to_bits().to_le_bytes()),
        ComponentType::Float32 => out.extend_from_slice(&value.to_le_bytes()),
        ComponentType::PackedFloat => unreachable!("packed storage is rejected before encoding"),
    }
}

fn decode_component(component: ComponentType, element: &[u8]) -> f32 {
    match component {
        ComponentType::UNorm8 => element[0] as f32 / u8::MAX as f32,
        ComponentType::UNorm16 => u16::from_le_bytes([element[0], element[1]]) as f32 / u16::MAX as f32,
        ComponentType::Float16 => f16::from_bits(u16::from_le_bytes([element[0], element[1]])).to_f32(),
        ComponentType::Float32 => f32::from_le_bytes([element[0], element[1], element[2], element[3]]),
        ComponentType::PackedFloat => 0.0,
    }
}

/// Decodes an unsigned float with a 5-bit exponent and `mantissa_bits` of mantissa
fn decode_small_float(bits: u32, mantissa_bits: u32) -> f32 {
    let exponent = (bits >> mantissa_bits) & 0x1f;
    let mantissa = (bits & ((1 << mantissa_bits) - 1)) as f32 / (1 << mantissa_bits) as f32;
    match exponent {
        0 => mantissa * 2f32.powi(-14),
        0x1f if mantissa == 0.0 => f32::INFINITY,
        0x1f => f32::NAN,
        _ => (1.0 + mantissa) * 2f32.powi(exponent as i32 - 15),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compute_pipeline_doc::PipelineDescriptor;

    fn texture(internal: &str, pixel: &str, ty: &str, width: u32) -> TextureDescriptor {
        let json = format!(
            r#"{{ "textures1D": [{{ "name": "t", "width": {width}, "internalFormat": "{internal}", "pixelFormat": "{pixel}", "pixelType": "{ty}", "textureWrap": "REPEAT", "filter": "NEAREST" }}] }}"#
        );
        PipelineDescriptor::from_json(&json).unwrap().textures.remove(0)
    }

    #[test]
    fn test_matching_layout_is_copied_verbatim() {
        let descriptor = texture("RGBA32F", "RGBA", "FLOAT", 2);
        let bytes: Vec<u8> = bytemuck::cast_slice(&[0.5f32, -1.0, 3.25, 1.0, 0.0, 2.0, 4.0, 8.0]).to_vec();
        assert_eq!(upload_to_storage(&descriptor, &bytes).unwrap(), bytes);
        assert_eq!(storage_to_rgba32f(descriptor.internal_format, &bytes), [0.5, -1.0, 3.25, 1.0, 0.0, 2.0, 4.0, 8.0]);
    }

    #[test]
    fn test_float_data_converts_to_half_storage() {
        let descriptor = texture("RG16F", "RG", "FLOAT", 1);
        let storage = upload_to_storage(&descriptor, bytemuck::cast_slice(&[1.5f32, -0.25])).unwrap();
        assert_eq!(storage.len(), 4);
        assert_eq!(storage_to_rgba32f(descriptor.internal_format, &storage), [1.5, -0.25, 0.0, 1.0]);
    }

    #[test]
    fn test_bgra_bytes_are_swizzled() {
        let descriptor = texture("RGBA8", "BGRA", "UNSIGNED_BYTE", 1);
        let storage = upload_to_storage(&descriptor, &[10, 20, 30, 40]).unwrap();
        assert_eq!(storage, [30, 20, 10, 40]);
    }

    #[test]
    fn test_rgb_storage_is_padded_with_alpha() {
        let descriptor = texture("RGB32F", "RGB", "FLOAT", 1);
        let storage = upload_to_storage(&descriptor, bytemuck::cast_slice(&[0.1f32, 0.2, 0.3])).unwrap();
        assert_eq!(storage.len(), 16);
        assert_eq!(storage_to_rgba32f(descriptor.internal_format, &storage), [0.1, 0.2, 0.3, 1.0]);
    }

    #[test]
    fn test_wrong_length_is_rejected() {
        let descriptor = texture("R32F", "RED", "FLOAT", 4);
        assert!(matches!(
            upload_to_storage(&descriptor, &[0; 12]),
            Err(BackendError::UploadSize { expected: 16, actual: 12 })
        ));
    }

    #[test]
    fn test_packed_float_upload_is_rejected_but_decodes() {
        let descriptor = texture("R11F_G11F_B10F", "RGB", "FLOAT", 1);
        assert!(matches!(upload_to_storage(&descriptor, &[0; 12]), Err(BackendError::UnsupportedConversion { .. })));

        // r = 1.0 (exponent 15), g = 0.5 (exponent 14), b = 2.0 (exponent 16)
        let bits: u32 = (15 << 6) | ((14 << 6) << 11) | ((16 << 5) << 22);
        assert_eq!(storage_to_rgba32f(descriptor.internal_format, &bits.to_le_bytes()), [1.0, 0.5, 2.0, 1.0]);
    }

    #[test]
    fn test_unorm8_reads_back_normalized() {
        let descriptor = texture("R8", "RED", "UNSIGNED_BYTE", 2);
        let storage = upload_to_storage(&descriptor, &[0, 255]).unwrap();
        assert_eq!(storage_to_rgba32f(descriptor.internal_format, &storage), [0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0]);
    }
}

//! Per-pass binding tables
//!
//! Images and samplers are numbered independently. Listed entries take units
//! 0..n in list order; the auxiliary roles that are present follow at n, n+1, ...
//! in role order. A table is computed once per pass at load time and reused
//! every frame.

use crate::{Dimension, PassDescriptor};
use std::fmt;

/// Shader access class of a binding unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingClass {
    /// Read-write storage image, format-locked to the texture's internal format
    Image,
    /// Read-only filtered texture
    Sampler,
}

impl fmt::Display for BindingClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Sampler => write!(f, "sampler"),
        }
    }
}

/// Fixed single-texture binding roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuxiliaryRole {
    Input,
    Output,
    Kernel,
    Bias,
    Aux,
}

impl AuxiliaryRole {
    /// Sampler-class roles in binding order
    pub const SAMPLER_ROLES: [Self; 4] = [Self::Input, Self::Kernel, Self::Bias, Self::Aux];
    /// Image-class roles in binding order
    pub const IMAGE_ROLES: [Self; 1] = [Self::Output];

    /// Uniform that receives the role's unit index
    pub fn uniform_name(self) -> &'static str {
        match self {
            Self::Input => "inputTex",
            Self::Output => "outputTex",
            Self::Kernel => "kernelTex",
            Self::Bias => "biasTex",
            Self::Aux => "auxTex",
        }
    }

    pub fn class(self) -> BindingClass {
        match self {
            Self::Output => BindingClass::Image,
            Self::Input | Self::Kernel | Self::Bias | Self::Aux => BindingClass::Sampler,
        }
    }

    /// Dimensionality a texture must have to fill this role
    pub fn dimension(self) -> Dimension {
        match self {
            Self::Output | Self::Input | Self::Aux => Dimension::D3,
            Self::Kernel => Dimension::D2,
            Self::Bias => Dimension::D1,
        }
    }
}

impl fmt::Display for AuxiliaryRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uniform_name())
    }
}

/// Where a binding slot was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingSource {
    /// `boundImages` / `boundSamplers` entry at the given list position
    Listed(usize),
    Role(AuxiliaryRole),
}

/// One texture assigned to one binding unit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingSlot {
    pub class: BindingClass,
    pub unit: u32,
    pub texture: String,
    /// Int uniform set to `unit` before dispatch
    pub uniform: String,
    pub source: BindingSource,
}

impl BindingSlot {
    /// Dimensionality constraint on the bound texture, if any
    pub fn required_dimension(&self) -> Option<Dimension> {
        match self.source {
            BindingSource::Listed(_) => None,
            BindingSource::Role(role) => Some(role.dimension()),
        }
    }
}

impl fmt::Display for BindingSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} <- \"{}\" ({})", self.class, self.unit, self.texture, self.uniform)
    }
}

/// Unit assignment for every texture a pass binds
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BindingTable {
    pub images: Vec<BindingSlot>,
    pub samplers: Vec<BindingSlot>,
}

impl BindingTable {
    /// Computes the binding table of a pass
    ///
    /// # Arguments
    /// * `pass` - Resolved pass descriptor
    ///
    /// # Returns
    /// Image slots followed by the output role, and sampler slots followed by
    /// the input, kernel, bias and aux roles, each class numbered from 0
    pub fn for_pass(pass: &PassDescriptor) -> Self {
        let images = build_slots(BindingClass::Image, &pass.bound_images, &AuxiliaryRole::IMAGE_ROLES, pass);
        let samplers = build_slots(BindingClass::Sampler, &pass.bound_samplers, &AuxiliaryRole::SAMPLER_ROLES, pass);
        Self { images, samplers }
    }

    /// All slots, images first
    pub fn slots(&self) -> impl Iterator<Item = &BindingSlot> {
        self.images.iter().chain(self.samplers.iter())
    }

    pub fn len(&self) -> usize {
        self.images.len() + self.samplers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.samplers.is_empty()
    }
}

fn build_slots(class: BindingClass, listed: &[String], roles: &[AuxiliaryRole], pass: &PassDescriptor) -> Vec<BindingSlot> {
    let mut slots: Vec<BindingSlot> = listed
        .iter()
        .enumerate()
        .map(|(index, texture)| BindingSlot {
            class,
            unit: index as u32,
            texture: texture.clone(),
            uniform: texture.clone(),
            source: BindingSource::Listed(index),
        })
        .collect();

    for &role in roles {
        let Some(texture) = role_texture(pass, role) else {
            continue;
        };
        slots.push(BindingSlot {
            class,
            unit: slots.len() as u32,
            texture: texture.to_string(),
            uniform: role.uniform_name().to_string(),
            source: BindingSource::Role(role),
        });
    }

    slots
}

fn role_texture(pass: &PassDescriptor, role: AuxiliaryRole) -> Option<&str> {
    let aux = &pass.auxiliary;
    match role {
        AuxiliaryRole::Input => aux.input.as_deref(),
        AuxiliaryRole::Output => aux.output.as_deref(),
        AuxiliaryRole::Kernel => aux.kernel.as_deref(),
        AuxiliaryRole::Bias => aux.bias.as_deref(),
        AuxiliaryRole::Aux => aux.aux.as_deref(),
    }
}

//! Parameter → material formulas for the custom material types.

use crate::engine::{Material, MaterialKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const GLASS_IOR_RANGE: (f32, f32) = (1.0, 2.333);
pub const GLASS_MIN_ALPHA: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaterialType {
    #[default]
    Default,
    Wood,
    PaintedMatte,
    Metal,
    Plastic,
    Glass,
}

impl MaterialType {
    pub fn is_custom(self) -> bool {
        self != Self::Default
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MaterialParameters {
    pub color: [f32; 3],
    pub roughness: f32,
    pub metalness: f32,
    pub opacity: f32,
    /// Glass only: mapped to index of refraction.
    pub refraction: f32,
    pub clearcoat: f32,
}

impl Default for MaterialParameters {
    fn default() -> Self {
        Self {
            color: [0.8, 0.8, 0.8],
            roughness: 0.5,
            metalness: 0.0,
            opacity: 1.0,
            refraction: 1.5,
            clearcoat: 0.0,
        }
    }
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParameterPatch {
    pub color: Option<[f32; 3]>,
    pub roughness: Option<f32>,
    pub metalness: Option<f32>,
    pub opacity: Option<f32>,
    pub refraction: Option<f32>,
    pub clearcoat: Option<f32>,
}

impl MaterialParameters {
    pub fn patched(&self, patch: &ParameterPatch) -> Self {
        Self {
            color: patch.color.unwrap_or(self.color),
            roughness: patch.roughness.unwrap_or(self.roughness),
            metalness: patch.metalness.unwrap_or(self.metalness),
            opacity: patch.opacity.unwrap_or(self.opacity),
            refraction: patch.refraction.unwrap_or(self.refraction),
            clearcoat: patch.clearcoat.unwrap_or(self.clearcoat),
        }
    }
}

/// Cache key over the type and the serialized parameters.
pub fn cache_key(material_type: MaterialType, params: &MaterialParameters) -> String {
    let bytes = serde_json::to_vec(&(material_type, params)).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    let hex: String = digest.iter().take(12).map(|b| format!("{b:02x}")).collect();
    format!("{material_type:?}:{hex}")
}

pub fn build_material(material_type: MaterialType, params: &MaterialParameters) -> Material {
    let color = params.color.map(|c| c.clamp(0.0, 1.0));
    let opacity = params.opacity.clamp(0.0, 1.0);
    let name = format!("{material_type:?}");
    match material_type {
        MaterialType::Default => Material {
            name,
            color,
            roughness: params.roughness.clamp(0.0, 1.0),
            metalness: params.metalness.clamp(0.0, 1.0),
            ..Material::default()
        }
        .with_opacity(opacity),
        MaterialType::Wood => Material {
            name,
            color,
            roughness: params.roughness.clamp(0.5, 1.0),
            metalness: 0.0,
            ..Material::default()
        },
        MaterialType::PaintedMatte => Material {
            name,
            color,
            roughness: params.roughness.max(0.8).min(1.0),
            metalness: 0.0,
            clearcoat: 0.0,
            ..Material::default()
        },
        MaterialType::Metal => Material {
            name,
            kind: MaterialKind::Physical,
            color,
            roughness: params.roughness.clamp(0.05, 0.6),
            metalness: params.metalness.clamp(0.7, 1.0),
            ..Material::default()
        },
        MaterialType::Plastic => Material {
            name,
            kind: MaterialKind::Physical,
            color,
            roughness: params.roughness.clamp(0.1, 0.7),
            metalness: 0.0,
            clearcoat: params.clearcoat.clamp(0.0, 1.0),
            ..Material::default()
        },
        MaterialType::Glass => {
            let alpha = opacity.clamp(GLASS_MIN_ALPHA, 1.0);
            Material {
                name,
                kind: MaterialKind::Physical,
                color,
                roughness: params.roughness.clamp(0.0, 0.2),
                metalness: 0.0,
                transmission: 1.0 - alpha,
                ior: params.refraction.clamp(GLASS_IOR_RANGE.0, GLASS_IOR_RANGE.1),
                opacity: alpha,
                transparent: true,
                depth_write: false,
                ..Material::default()
            }
        }
    }
}

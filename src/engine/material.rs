use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    Standard,
    Physical,
    Basic,
    LineBasic,
    LineDashed,
}

/// Plain-data material description. Whatever the renderer uploads is derived
/// from these values, so two equal descriptions render identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub kind: MaterialKind,
    pub color: [f32; 3],
    pub opacity: f32,
    pub transparent: bool,
    pub metalness: f32,
    pub roughness: f32,
    pub emissive: [f32; 3],
    pub emissive_intensity: f32,
    pub transmission: f32,
    pub ior: f32,
    pub clearcoat: f32,
    pub depth_test: bool,
    pub depth_write: bool,
    pub dash_size: f32,
    pub gap_size: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: MaterialKind::Standard,
            color: [1.0, 1.0, 1.0],
            opacity: 1.0,
            transparent: false,
            metalness: 0.0,
            roughness: 1.0,
            emissive: [0.0, 0.0, 0.0],
            emissive_intensity: 1.0,
            transmission: 0.0,
            ior: 1.5,
            clearcoat: 0.0,
            depth_test: true,
            depth_write: true,
            dash_size: 0.0,
            gap_size: 0.0,
        }
    }
}

impl Material {
    pub fn standard(name: &str, color: [f32; 3]) -> Self {
        Self {
            name: name.to_string(),
            color,
            ..Self::default()
        }
    }

    pub fn basic(name: &str, color: [f32; 3]) -> Self {
        Self {
            name: name.to_string(),
            kind: MaterialKind::Basic,
            color,
            ..Self::default()
        }
    }

    pub fn line(name: &str, color: [f32; 3]) -> Self {
        Self {
            name: name.to_string(),
            kind: MaterialKind::LineBasic,
            color,
            ..Self::default()
        }
    }

    pub fn dashed_line(name: &str, color: [f32; 3], dash_size: f32, gap_size: f32) -> Self {
        Self {
            name: name.to_string(),
            kind: MaterialKind::LineDashed,
            color,
            dash_size,
            gap_size,
            ..Self::default()
        }
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self.transparent = self.opacity < 1.0;
        self
    }

    /// Drawn on top of everything else (overlays, gizmo handles, labels).
    pub fn always_on_top(mut self) -> Self {
        self.depth_test = false;
        self.depth_write = false;
        self
    }
}

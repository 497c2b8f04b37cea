use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSettings {
    pub color: [f32; 3],
    pub intensity: f32,
    /// Direction the sunlight travels in, not where it comes from.
    pub direction: [f32; 3],
    pub ambient_intensity: f32,
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            intensity: 1.0,
            direction: [0.0, -1.0, -0.5],
            ambient_intensity: 0.4,
        }
    }
}

impl LightSettings {
    /// Normalised travel direction; falls back to straight down.
    pub fn direction(&self) -> Vec3 {
        Vec3::from(self.direction).try_normalize().unwrap_or(Vec3::NEG_Y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSettings {
    pub ground_visible: bool,
    /// Named lighting preset, e.g. "studio" or "sunset". `None` removes it.
    pub preset: Option<String>,
    pub exposure: f32,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            ground_visible: false,
            preset: None,
            exposure: 1.0,
        }
    }
}

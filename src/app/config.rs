use crate::interaction::AnnotationStyle;
use crate::materials::EffectColors;
use crate::selection::HighlightStyle;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Tunables for a [`Studio`](super::Studio). Missing keys take their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub max_import_bytes: u64,
    pub rebuild_debounce_ms: u64,
    pub loading_min_duration_ms: u64,
    pub loading_stability_delay_ms: u64,
    pub point_marker_radius: f32,
    pub measurement_decimals: usize,
    pub show_primitives: bool,
    pub hover_color: [f32; 3],
    pub selection_color: [f32; 3],
    pub overlay_opacity: f32,
    pub outline_color: [f32; 3],
    pub cue_color: [f32; 3],
}

impl Default for StudioConfig {
    fn default() -> Self {
        let effects = EffectColors::default();
        let highlight = HighlightStyle::default();
        Self {
            max_import_bytes: 100 * 1024 * 1024,
            rebuild_debounce_ms: 50,
            loading_min_duration_ms: 300,
            loading_stability_delay_ms: 100,
            point_marker_radius: 0.05,
            measurement_decimals: 2,
            show_primitives: true,
            hover_color: effects.hover,
            selection_color: effects.selection,
            overlay_opacity: effects.overlay_opacity,
            outline_color: highlight.outline_color,
            cue_color: highlight.cue_color,
        }
    }
}

impl StudioConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_import_bytes == 0 {
            return Err(ConfigError::Invalid("max_import_bytes must be above zero".into()));
        }
        if !(self.point_marker_radius > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "point_marker_radius must be positive, got {}",
                self.point_marker_radius
            )));
        }
        if !(0.0..=1.0).contains(&self.overlay_opacity) {
            return Err(ConfigError::Invalid(format!(
                "overlay_opacity must be within 0..=1, got {}",
                self.overlay_opacity
            )));
        }
        Ok(())
    }

    pub fn rebuild_debounce(&self) -> Duration {
        Duration::from_millis(self.rebuild_debounce_ms)
    }

    pub fn loading_min_duration(&self) -> Duration {
        Duration::from_millis(self.loading_min_duration_ms)
    }

    pub fn loading_stability_delay(&self) -> Duration {
        Duration::from_millis(self.loading_stability_delay_ms)
    }

    pub fn effect_colors(&self) -> EffectColors {
        EffectColors {
            hover: self.hover_color,
            selection: self.selection_color,
            overlay_opacity: self.overlay_opacity,
        }
    }

    pub fn highlight_style(&self) -> HighlightStyle {
        HighlightStyle {
            outline_color: self.outline_color,
            cue_color: self.cue_color,
        }
    }

    pub fn annotation_style(&self) -> AnnotationStyle {
        AnnotationStyle {
            point_radius: self.point_marker_radius,
            decimals: self.measurement_decimals,
            ..AnnotationStyle::default()
        }
    }
}

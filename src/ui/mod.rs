//! Panel view-model. Holds what the object tree, properties panel and
//! toasts show, fed entirely from [`StudioEvent`]s; user actions come back
//! out as [`StudioCommand`]s.

use crate::app::{StudioCommand, StudioEvent};
use crate::interaction::ToolType;
use crate::scene::metadata::ObjectMetadata;
use crate::scene::tree::filter_tree;
use crate::scene::{ModelId, SceneObject};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelEntry {
    pub id: ModelId,
    pub name: String,
    pub size: u64,
}

pub struct UiState {
    show_object_panel: bool,
    summary: String,
    tree: Vec<SceneObject>,
    search: String,
    selected_only: bool,
    selected: Option<ObjectMetadata>,
    selection_count: usize,
    active_tool: ToolType,
    loading: bool,
    models: Vec<ModelEntry>,
    last_measurement: Option<String>,
    toasts: Vec<Toast>,
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}

impl UiState {
    pub fn new() -> Self {
        Self {
            show_object_panel: true,
            summary: String::new(),
            tree: Vec::new(),
            search: String::new(),
            selected_only: false,
            selected: None,
            selection_count: 0,
            active_tool: ToolType::Select,
            loading: false,
            models: Vec::new(),
            last_measurement: None,
            toasts: Vec::new(),
        }
    }

    pub fn apply(&mut self, event: &StudioEvent) {
        match event {
            StudioEvent::ToolChanged { tool } => self.active_tool = *tool,
            StudioEvent::PointCreated { position, .. } => {
                self.toast(
                    ToastLevel::Info,
                    format!("Point added at ({:.2}, {:.2}, {:.2})", position.x, position.y, position.z),
                );
            }
            StudioEvent::MeasurementCreated { measurement } => {
                self.last_measurement = Some(measurement.label.clone());
                self.toast(ToastLevel::Info, format!("Measured {}", measurement.label));
            }
            StudioEvent::SelectionChanged { selected, count } => {
                self.selected = selected.clone();
                self.selection_count = *count;
            }
            StudioEvent::SceneTreeChanged { tree } => self.tree = tree.clone(),
            StudioEvent::ModelLoaded { id, name, size } => {
                self.models.push(ModelEntry {
                    id: *id,
                    name: name.clone(),
                    size: *size,
                });
                self.toast(ToastLevel::Info, format!("Loaded {name}"));
            }
            StudioEvent::ModelRemoved { id } => self.models.retain(|model| model.id != *id),
            StudioEvent::ImportFailed { name, message } => {
                self.toast(ToastLevel::Error, format!("Could not import {name}: {message}"));
            }
            StudioEvent::LoadingChanged { loading } => self.loading = *loading,
            StudioEvent::ObjectDeleted { id } => {
                if self.selected.as_ref().is_some_and(|selected| selected.id == *id) {
                    self.selected = None;
                }
            }
        }
        self.refresh_summary();
    }

    fn toast(&mut self, level: ToastLevel, message: String) {
        if level == ToastLevel::Error {
            log::warn!("{message}");
        }
        self.toasts.push(Toast { level, message });
    }

    fn refresh_summary(&mut self) {
        if !self.show_object_panel {
            return;
        }
        let mut summary = String::new();
        for model in &self.models {
            summary.push_str(&format!("{} ({:.1} KB)\n", model.name, model.size as f64 / 1024.0));
        }
        let objects: usize = self.tree.iter().map(SceneObject::count).sum();
        summary.push_str(&format!("Objects: {objects}"));
        if let Some(label) = &self.last_measurement {
            summary.push_str(&format!("\nLast measurement: {label}"));
        }
        self.summary = summary;
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn set_object_panel_visible(&mut self, visible: bool) {
        self.show_object_panel = visible;
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    pub fn set_selected_only(&mut self, selected_only: bool) {
        self.selected_only = selected_only;
    }

    /// Tree as the panel shows it, after search and selection filters.
    pub fn visible_tree(&self) -> Vec<SceneObject> {
        filter_tree(&self.tree, &self.search, self.selected_only)
    }

    pub fn selected(&self) -> Option<&ObjectMetadata> {
        self.selected.as_ref()
    }

    pub fn selection_count(&self) -> usize {
        self.selection_count
    }

    pub fn active_tool(&self) -> ToolType {
        self.active_tool
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn models(&self) -> &[ModelEntry] {
        &self.models
    }

    pub fn take_toasts(&mut self) -> Vec<Toast> {
        std::mem::take(&mut self.toasts)
    }

    /// Delete button on the properties panel.
    pub fn delete_selected(&self) -> Option<StudioCommand> {
        let selected = self.selected.as_ref()?;
        Some(StudioCommand::DeleteObject {
            id: selected.id.clone(),
        })
    }

    /// Row click in the object tree.
    pub fn select_row(&self, id: &str, multi: bool) -> StudioCommand {
        StudioCommand::Select {
            id: Some(id.to_string()),
            multi,
        }
    }
}

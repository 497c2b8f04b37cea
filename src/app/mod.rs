//! Studio coordinator.
//!
//! [`Studio`] owns the scene graph and every interaction component, and is
//! the only place that sequences them. Hosts drive it three ways: pointer
//! events, direct method calls, and [`StudioCommand`]s sent through a
//! channel so panels can trigger imports or deletions without a reference to
//! the studio. Everything observable comes back as [`StudioEvent`]s.

pub mod config;
pub mod input;
pub mod settings;
pub mod timing;

#[cfg(test)]
mod tests;

pub use config::{ConfigError, StudioConfig};
pub use input::{Modifiers, PointerButton, PointerEvent, PointerPhase, PointerType};
pub use settings::{EnvironmentSettings, LightSettings};

use crate::assets::{
    AssetError, GltfImporter, ImportJob, ImportManager, ImportMode, ImportOutcome, ImportRequest, ImportTicket,
    ModelImporter,
};
use crate::engine::{
    Engine, GeometryShape, Light, LightKind, Material, MaterialSlot, NodeId, NodeKind, NodeRole, PrimitiveShape,
    SceneNode, Transform,
};
use crate::interaction::{AnnotationFactory, RaycastIndex, ToolContext, ToolEffect, ToolManager, ToolType};
use crate::materials::{MaterialManager, MaterialParameters, MaterialType, ParameterPatch};
use crate::render::camera::CameraController;
use crate::render::gizmo::TransformGizmo;
use crate::scene::metadata::{self, ObjectMetadata};
use crate::scene::serialization::{self, SerializationError};
use crate::scene::tree::{TreeInputs, TreeSynchronizer};
use crate::scene::{descriptor_id, LoadedModel, Measurement, ModelId, ModelRegistry, ObjectType, SceneObject};
use crate::selection::SelectionManager;
use glam::{Quat, Vec3};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Instant;

const GROUND_SIZE: f32 = 50.0;
const SUN_DISTANCE: f32 = 10.0;

/// Requests a panel can make without holding the studio.
#[derive(Debug, Clone)]
pub enum StudioCommand {
    ImportFile { path: PathBuf, mode: ImportMode },
    ImportBytes { name: String, bytes: Vec<u8>, mode: ImportMode },
    SwitchModel(ModelId),
    RemoveModel(ModelId),
    SetTool(ToolType),
    Select { id: Option<String>, multi: bool },
    DeleteObject { id: String },
    ClearMeasurements,
    SetVisibility { id: String, visible: bool },
    AddPrimitive(PrimitiveShape),
    SetMaterialType {
        id: String,
        material_type: MaterialType,
        parameters: MaterialParameters,
    },
    UpdateMaterial { id: String, patch: ParameterPatch },
    SetLights(LightSettings),
    SetEnvironment(EnvironmentSettings),
    SetShowPrimitives(bool),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StudioEvent {
    ToolChanged { tool: ToolType },
    PointCreated { id: String, position: Vec3 },
    MeasurementCreated { measurement: Measurement },
    /// Properties of the primary selection, or `None` when nothing is selected.
    SelectionChanged { selected: Option<ObjectMetadata>, count: usize },
    SceneTreeChanged { tree: Vec<SceneObject> },
    ModelLoaded { id: ModelId, name: String, size: u64 },
    ModelRemoved { id: ModelId },
    ImportFailed { name: String, message: String },
    LoadingChanged { loading: bool },
    ObjectDeleted { id: String },
}

/// Splits the studio into the borrowed view tool handlers take.
macro_rules! tool_context {
    ($studio:expr) => {
        ToolContext {
            engine: &mut $studio.engine,
            raycast: &mut $studio.raycast,
            selection: &mut $studio.selection,
            materials: &mut $studio.materials,
            annotations: &mut $studio.annotations,
            gizmo: &mut $studio.gizmo,
            camera: &mut $studio.camera,
        }
    };
}

pub struct Studio {
    config: StudioConfig,
    engine: Engine,
    raycast: RaycastIndex,
    tools: ToolManager,
    selection: SelectionManager,
    materials: MaterialManager,
    annotations: AnnotationFactory,
    gizmo: TransformGizmo,
    camera: CameraController,
    models: ModelRegistry,
    measurements: Vec<Measurement>,
    tree: TreeSynchronizer,
    imports: ImportManager,
    importer: Box<dyn ModelImporter>,
    command_tx: Sender<StudioCommand>,
    command_rx: Receiver<StudioCommand>,
    events: Vec<StudioEvent>,
    lights: LightSettings,
    environment: EnvironmentSettings,
    ambient_light: NodeId,
    sun_light: NodeId,
    ground: NodeId,
    environment_node: Option<NodeId>,
    show_primitives: bool,
    clock: Instant,
    shut_down: bool,
}

impl Studio {
    pub fn new(config: StudioConfig) -> Result<Self, ConfigError> {
        Self::with_importer(config, Box::new(GltfImporter::new()))
    }

    pub fn with_importer(config: StudioConfig, importer: Box<dyn ModelImporter>) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut engine = Engine::new();
        let lights = LightSettings::default();
        let environment = EnvironmentSettings::default();

        let ambient_light = spawn(
            &mut engine,
            light_node("Ambient Light", LightKind::Ambient, [1.0, 1.0, 1.0], lights.ambient_intensity),
        );
        let sun_light = spawn(
            &mut engine,
            light_node("Directional Light", LightKind::Directional, lights.color, lights.intensity),
        );
        let ground = ground_node(&mut engine, environment.ground_visible);
        let ground = spawn(&mut engine, ground);

        let (command_tx, command_rx) = mpsc::channel();
        let clock = Instant::now();
        let mut tree = TreeSynchronizer::new(
            config.rebuild_debounce(),
            config.loading_min_duration(),
            config.loading_stability_delay(),
        );
        tree.request_now(clock);

        let mut studio = Self {
            raycast: RaycastIndex::new(),
            tools: ToolManager::new(),
            selection: SelectionManager::new(config.highlight_style()),
            materials: MaterialManager::new(config.effect_colors()),
            annotations: AnnotationFactory::new(config.annotation_style()),
            gizmo: TransformGizmo::new(),
            camera: CameraController::new(Vec3::new(0.0, 2.0, 6.0), -std::f32::consts::FRAC_PI_2, -0.3),
            models: ModelRegistry::new(),
            measurements: Vec::new(),
            tree,
            imports: ImportManager::new(config.max_import_bytes),
            importer,
            command_tx,
            command_rx,
            events: Vec::new(),
            show_primitives: config.show_primitives,
            config,
            engine,
            lights,
            environment,
            ambient_light,
            sun_light,
            ground,
            environment_node: None,
            clock,
            shut_down: false,
        };
        studio.apply_light_settings();
        log::info!("Studio ready");
        Ok(studio)
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn camera(&self) -> &CameraController {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraController {
        &mut self.camera
    }

    pub fn models(&self) -> &[LoadedModel] {
        self.models.models()
    }

    pub fn current_model(&self) -> Option<&LoadedModel> {
        self.models.current()
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn active_tool(&self) -> ToolType {
        self.tools.active()
    }

    pub fn tools(&self) -> &ToolManager {
        &self.tools
    }

    pub fn selection(&self) -> Vec<NodeId> {
        self.selection.selected()
    }

    pub fn materials(&self) -> &MaterialManager {
        &self.materials
    }

    pub fn light_settings(&self) -> LightSettings {
        self.lights
    }

    pub fn environment_settings(&self) -> &EnvironmentSettings {
        &self.environment
    }

    pub fn ground(&self) -> NodeId {
        self.ground
    }

    pub fn scene_tree(&self) -> &[SceneObject] {
        self.tree.tree()
    }

    pub fn filtered_tree(&self, search: &str, selected_only: bool) -> Vec<SceneObject> {
        self.tree.filtered(search, selected_only)
    }

    pub fn rebuild_count(&self) -> u64 {
        self.tree.rebuild_count()
    }

    pub fn is_rebuild_pending(&self) -> bool {
        self.tree.is_pending()
    }

    pub fn is_loading(&self) -> bool {
        self.tree.is_loading()
    }

    pub fn is_importing(&self) -> bool {
        self.imports.is_busy()
    }

    pub fn command_sender(&self) -> Sender<StudioCommand> {
        self.command_tx.clone()
    }

    pub fn drain_events(&mut self) -> Vec<StudioEvent> {
        std::mem::take(&mut self.events)
    }

    /// One frame: commands, imports, gizmo follow-up, loading indicator and a
    /// rebuild if one is due.
    pub fn update(&mut self, now: Instant) {
        if self.shut_down {
            return;
        }
        self.clock = now;

        while let Ok(command) = self.command_rx.try_recv() {
            self.apply_command(command);
        }
        self.pump_imports();
        self.gizmo.sync(&mut self.engine);

        self.tree.set_busy(self.imports.is_busy() || self.tree.is_pending(), now);
        if let Some(loading) = self.tree.tick_loading(now) {
            self.events.push(StudioEvent::LoadingChanged { loading });
        }

        let selection = self.selection.selected_set();
        let inputs = TreeInputs {
            models: &self.models,
            show_primitives: self.show_primitives,
            selection: &selection,
        };
        if let Some(outcome) = self.tree.poll(now, &self.engine, inputs) {
            if outcome.changed || outcome.failed {
                self.events.push(StudioEvent::SceneTreeChanged {
                    tree: self.tree.tree().to_vec(),
                });
            }
        }
    }

    pub fn apply_command(&mut self, command: StudioCommand) {
        log::debug!("Command: {}", command_name(&command));
        match command {
            StudioCommand::ImportFile { path, mode } => {
                let _ = self.import_file(&path, mode);
            }
            StudioCommand::ImportBytes { name, bytes, mode } => {
                let _ = self.import_bytes(name, bytes, mode);
            }
            StudioCommand::SwitchModel(id) => {
                self.switch_model(id);
            }
            StudioCommand::RemoveModel(id) => {
                self.remove_model(id);
            }
            StudioCommand::SetTool(tool) => {
                self.set_tool(tool);
            }
            StudioCommand::Select { id, multi } => {
                self.select_by_id(id.as_deref(), multi);
            }
            StudioCommand::DeleteObject { id } => {
                self.delete_object(&id);
            }
            StudioCommand::ClearMeasurements => self.clear_measurements(),
            StudioCommand::SetVisibility { id, visible } => {
                self.set_object_visibility(&id, visible);
            }
            StudioCommand::AddPrimitive(shape) => {
                self.add_primitive(shape);
            }
            StudioCommand::SetMaterialType {
                id,
                material_type,
                parameters,
            } => {
                self.set_material_type(&id, material_type, parameters);
            }
            StudioCommand::UpdateMaterial { id, patch } => {
                self.update_material(&id, &patch);
            }
            StudioCommand::SetLights(settings) => self.set_light_settings(settings),
            StudioCommand::SetEnvironment(settings) => self.set_environment(settings),
            StudioCommand::SetShowPrimitives(show) => self.set_show_primitives(show),
        }
    }

    pub fn handle_pointer(&mut self, event: &PointerEvent) {
        if self.shut_down {
            return;
        }
        let effects = {
            let mut ctx = tool_context!(self);
            self.tools.handle_pointer(&mut ctx, event)
        };
        self.apply_effects(effects);
    }

    pub fn set_tool(&mut self, tool: ToolType) -> bool {
        let changed = {
            let mut ctx = tool_context!(self);
            self.tools.set_tool(&mut ctx, tool)
        };
        if changed {
            self.events.push(StudioEvent::ToolChanged { tool });
        }
        changed
    }

    /// Escape key: abandons a pending measurement or drag.
    pub fn cancel_interactions(&mut self) {
        let mut ctx = tool_context!(self);
        self.tools.cancel_interactions(&mut ctx);
    }

    fn apply_effects(&mut self, effects: Vec<ToolEffect>) {
        for effect in effects {
            match effect {
                ToolEffect::PointCreated { node, position } => {
                    self.events.push(StudioEvent::PointCreated {
                        id: descriptor_id(ObjectType::Point.id_prefix(), node),
                        position,
                    });
                }
                ToolEffect::MeasurementCreated(measurement) => {
                    self.measurements.push(measurement.clone());
                    self.events.push(StudioEvent::MeasurementCreated { measurement });
                }
                ToolEffect::SelectionChanged => self.emit_selection_changed(),
                ToolEffect::MeasurementMoved { node, start, end } => {
                    if let Some(measurement) = self.measurements.iter_mut().find(|m| m.node == node) {
                        measurement.start_point = start;
                        measurement.end_point = end;
                    }
                    self.raycast.invalidate();
                    self.tree.request(self.clock);
                }
                ToolEffect::SceneChanged => {
                    self.raycast.invalidate();
                    self.tree.request(self.clock);
                }
            }
        }
    }

    fn emit_selection_changed(&mut self) {
        let selected = self
            .selection
            .primary()
            .and_then(|node| metadata::extract(&self.engine, &self.models, node));
        self.events.push(StudioEvent::SelectionChanged {
            selected,
            count: self.selection.selected().len(),
        });
        // Selected flags in the tree follow the selection.
        self.tree.request(self.clock);
    }

    // --- import lifecycle -------------------------------------------------

    pub fn import_bytes(
        &mut self,
        name: impl Into<String>,
        bytes: Vec<u8>,
        mode: ImportMode,
    ) -> Result<ImportTicket, AssetError> {
        let name = name.into();
        let result = ImportRequest::new(name.clone(), bytes).and_then(|request| self.imports.begin(request, mode));
        self.report_begin(&name, result)
    }

    pub fn import_file(&mut self, path: &Path, mode: ImportMode) -> Result<ImportTicket, AssetError> {
        let result = self.imports.begin_from_path(path, mode);
        self.report_begin(&path.display().to_string(), result)
    }

    fn report_begin(
        &mut self,
        name: &str,
        result: Result<ImportTicket, AssetError>,
    ) -> Result<ImportTicket, AssetError> {
        match &result {
            Ok(_) => self.tree.set_busy(true, self.clock),
            Err(err) => {
                log::warn!("Import of {name} rejected: {err}");
                self.events.push(StudioEvent::ImportFailed {
                    name: name.to_string(),
                    message: err.to_string(),
                });
            }
        }
        result
    }

    /// Hands the started import to the caller, for hosts that run parsing
    /// on their own schedule. Finish it with [`run_import_job`](Self::run_import_job).
    pub fn take_import_job(&mut self) -> Option<ImportJob> {
        self.imports.take_job()
    }

    /// Runs a job and applies its outcome. Returns the new model when the
    /// job was still current and succeeded.
    pub fn run_import_job(&mut self, job: ImportJob) -> Option<ModelId> {
        let result = job.run(&mut self.engine, self.importer.as_mut());
        let outcome = self.imports.complete(&mut self.engine, job, result);
        self.apply_import_outcome(outcome)
    }

    fn pump_imports(&mut self) {
        while let Some(job) = self.imports.take_job() {
            self.run_import_job(job);
        }
    }

    fn apply_import_outcome(&mut self, outcome: ImportOutcome) -> Option<ModelId> {
        match outcome {
            ImportOutcome::Ready {
                name,
                size,
                mode,
                model,
                ..
            } => {
                // The outgoing model goes first so two current models never
                // coexist in the scene.
                if mode == ImportMode::Replace {
                    if let Some(previous) = self.models.current().map(|model| model.id) {
                        log::info!("Replacing model {:?}", previous);
                        self.remove_model(previous);
                    }
                }
                if let Err(err) = self.engine.add_to_scene(model.root) {
                    log::warn!("Could not attach imported model {name}: {err}");
                    let _ = self.engine.dispose_subtree(model.root);
                    self.events.push(StudioEvent::ImportFailed {
                        name,
                        message: err.to_string(),
                    });
                    return None;
                }
                let id = self.models.register(name.clone(), model.root, model.bounds, size as usize);
                self.camera.frame_bounds_preserve_orientation(&model.bounds);
                self.raycast.invalidate();
                self.tree.request_now(self.clock);
                log::info!("Model {:?} loaded: {name}", id);
                self.events.push(StudioEvent::ModelLoaded { id, name, size });
                Some(id)
            }
            ImportOutcome::Failed { name, error, .. } => {
                self.events.push(StudioEvent::ImportFailed {
                    name,
                    message: error.to_string(),
                });
                None
            }
            ImportOutcome::Superseded { .. } => None,
        }
    }

    // --- models -----------------------------------------------------------

    /// Makes `id` the current, visible model and hides the others.
    pub fn switch_model(&mut self, id: ModelId) -> bool {
        if !self.models.set_current(id) {
            log::warn!("switch_model: unknown model {:?}", id);
            return false;
        }
        let roots: Vec<(ModelId, NodeId)> = self.models.models().iter().map(|m| (m.id, m.root)).collect();
        for (model, root) in roots {
            if let Some(node) = self.engine.node_mut(root) {
                node.visible = model == id;
            }
        }
        self.raycast.invalidate();
        self.tree.request_now(self.clock);
        true
    }

    pub fn remove_model(&mut self, id: ModelId) -> bool {
        let Some(model) = self.models.take(id) else {
            log::warn!("remove_model: unknown model {:?}", id);
            return false;
        };
        self.dispose_subtree(model.root);
        log::info!("Model {:?} removed: {}", id, model.name);
        self.events.push(StudioEvent::ModelRemoved { id });
        true
    }

    /// Releases everything that refers into `root`'s subtree, then frees it.
    /// Returns whether the subtree existed.
    fn dispose_subtree(&mut self, root: NodeId) -> bool {
        if !self.engine.contains(root) {
            return false;
        }
        {
            let mut ctx = tool_context!(self);
            self.tools.release_subtree(&mut ctx, root);
        }
        let selection_changed = self.selection.forget_subtree(&mut self.engine, &mut self.materials, root);
        self.materials.release_subtree(&mut self.engine, root);
        match self.engine.dispose_subtree(root) {
            Ok(report) => log::debug!(
                "Disposed {} nodes, {} materials, {} geometries",
                report.nodes,
                report.materials,
                report.geometries
            ),
            Err(err) => {
                log::warn!("Failed to dispose subtree {:?}: {err}", root);
                return false;
            }
        }
        self.measurements.retain(|measurement| measurement.node != root);
        self.raycast.invalidate();
        self.tree.request_now(self.clock);
        if selection_changed {
            self.emit_selection_changed();
        }
        true
    }

    // --- objects ------------------------------------------------------------

    /// Finds the node behind a descriptor id, using the same id rule as the
    /// tree builder.
    pub fn resolve(&self, id: &str) -> Option<NodeId> {
        self.engine
            .descendants(self.engine.root())
            .into_iter()
            .find(|node| self.descriptor_for(*node).as_deref() == Some(id))
    }

    fn descriptor_for(&self, node: NodeId) -> Option<String> {
        if self.models.by_root(node).is_some() {
            return Some(descriptor_id(ObjectType::Model.id_prefix(), node));
        }
        let object_type = metadata::classify(&self.engine, node)?;
        Some(descriptor_id(object_type.id_prefix(), node))
    }

    pub fn inspect(&self, id: &str) -> Option<ObjectMetadata> {
        let node = self.resolve(id)?;
        metadata::extract(&self.engine, &self.models, node)
    }

    /// Deletes a point, measurement or primitive. Model roots go through
    /// [`remove_model`](Self::remove_model).
    pub fn delete_object(&mut self, id: &str) -> bool {
        let Some(node) = self.resolve(id) else {
            log::warn!("delete_object: unknown id {id}");
            return false;
        };
        if let Some(model) = self.models.by_root(node).map(|model| model.id) {
            return self.remove_model(model);
        }
        let deletable = self.engine.node(node).is_some_and(|n| {
            matches!(n.role, NodeRole::Point | NodeRole::MeasurementGroup | NodeRole::Primitive(_))
        });
        if !deletable {
            log::warn!("delete_object: {id} cannot be deleted");
            return false;
        }
        if !self.dispose_subtree(node) {
            return false;
        }
        log::info!("Deleted {id}");
        self.events.push(StudioEvent::ObjectDeleted { id: id.to_string() });
        true
    }

    pub fn clear_measurements(&mut self) {
        let measurements = std::mem::take(&mut self.measurements);
        if measurements.is_empty() {
            return;
        }
        // A pending measurement belongs to the set being cleared.
        {
            let mut ctx = tool_context!(self);
            self.tools.cancel_measurement(&mut ctx);
        }
        for measurement in measurements {
            if self.dispose_subtree(measurement.node) {
                self.events.push(StudioEvent::ObjectDeleted { id: measurement.id });
            }
        }
        log::info!("Measurements cleared");
    }

    pub fn set_object_visibility(&mut self, id: &str, visible: bool) -> bool {
        let Some(node) = self.resolve(id).and_then(|node| self.engine.node_mut(node)) else {
            log::warn!("set_object_visibility: unknown id {id}");
            return false;
        };
        node.visible = visible;
        self.raycast.invalidate();
        self.tree.request_now(self.clock);
        true
    }

    /// Tree-panel selection; `None` clears.
    pub fn select_by_id(&mut self, id: Option<&str>, multi: bool) -> bool {
        let target = match id {
            Some(id) => match self.resolve(id) {
                Some(node) => Some(node),
                None => {
                    log::warn!("select_by_id: unknown id {id}");
                    return false;
                }
            },
            None => None,
        };
        let changed = self.selection.select(&mut self.engine, &mut self.materials, target, multi);
        if changed {
            self.emit_selection_changed();
        }
        changed
    }

    /// Adds a primitive resting on the ground plane, selects it and returns
    /// its descriptor id.
    pub fn add_primitive(&mut self, shape: PrimitiveShape) -> Option<String> {
        let geometry_shape = shape.geometry();
        let lift = match &geometry_shape {
            // Planes lie flat instead of standing up.
            GeometryShape::Plane { .. } => 0.0,
            other => -other.bounds().min.y,
        };
        let rotation = match shape {
            PrimitiveShape::Plane => Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
            _ => Quat::IDENTITY,
        };
        let geometry = self.engine.create_geometry(geometry_shape);
        let material = self
            .engine
            .create_material(Material::standard(shape.label(), [0.8, 0.8, 0.8]));
        let node = SceneNode::mesh(shape.label(), geometry, MaterialSlot::Single(material))
            .with_role(NodeRole::Primitive(shape))
            .with_transform(Transform {
                translation: Vec3::new(0.0, lift, 0.0),
                rotation,
                scale: Vec3::ONE,
            });
        let node = self.engine.create_node(node);
        if let Err(err) = self.engine.add_to_scene(node) {
            log::warn!("Could not add primitive: {err}");
            let _ = self.engine.dispose_subtree(node);
            return None;
        }
        self.raycast.invalidate();
        self.tree.request(self.clock);
        if self.selection.select(&mut self.engine, &mut self.materials, Some(node), false) {
            self.emit_selection_changed();
        }
        Some(descriptor_id(ObjectType::Primitive.id_prefix(), node))
    }

    fn meshes_under(&self, id: &str) -> Vec<NodeId> {
        let Some(node) = self.resolve(id) else {
            log::warn!("Material change on unknown id {id}");
            return Vec::new();
        };
        self.engine
            .descendants(node)
            .into_iter()
            .filter(|id| {
                self.engine
                    .node(*id)
                    .is_some_and(|n| n.kind == NodeKind::Mesh && n.material.is_some() && !n.is_helper())
            })
            .collect()
    }

    pub fn set_material_type(&mut self, id: &str, material_type: MaterialType, parameters: MaterialParameters) {
        for mesh in self.meshes_under(id) {
            self.materials
                .set_material_type(&mut self.engine, mesh, material_type, parameters.clone());
        }
    }

    pub fn update_material(&mut self, id: &str, patch: &ParameterPatch) {
        for mesh in self.meshes_under(id) {
            self.materials.update_parameters(&mut self.engine, mesh, patch);
        }
    }

    // --- settings -----------------------------------------------------------

    pub fn set_show_primitives(&mut self, show: bool) {
        if self.show_primitives != show {
            self.show_primitives = show;
            self.tree.request_now(self.clock);
        }
    }

    pub fn set_light_settings(&mut self, settings: LightSettings) {
        self.lights = settings;
        self.apply_light_settings();
    }

    fn apply_light_settings(&mut self) {
        let settings = self.lights;
        if let Some(node) = self.engine.node_mut(self.ambient_light) {
            if let Some(light) = node.light.as_mut() {
                light.intensity = settings.ambient_intensity;
            }
        }
        if let Some(node) = self.engine.node_mut(self.sun_light) {
            let direction = settings.direction();
            node.transform.translation = -direction * SUN_DISTANCE;
            node.transform.rotation = Quat::from_rotation_arc(Vec3::NEG_Z, direction);
            if let Some(light) = node.light.as_mut() {
                light.color = settings.color;
                light.intensity = settings.intensity;
            }
        }
    }

    pub fn set_environment(&mut self, settings: EnvironmentSettings) {
        if let Some(ground) = self.engine.node_mut(self.ground) {
            ground.visible = settings.ground_visible;
        }
        if settings.preset != self.environment.preset {
            if let Some(previous) = self.environment_node.take() {
                self.dispose_subtree(previous);
            }
            if let Some(preset) = &settings.preset {
                let node = SceneNode::group(preset.clone()).with_role(NodeRole::Environment);
                let node = spawn(&mut self.engine, node);
                if let Some(n) = self.engine.node_mut(node) {
                    n.metadata
                        .insert("exposure".into(), serde_json::json!(settings.exposure));
                }
                self.environment_node = Some(node);
            }
        } else if let Some(node) = self.environment_node.and_then(|node| self.engine.node_mut(node)) {
            node.metadata
                .insert("exposure".into(), serde_json::json!(settings.exposure));
        }
        log::info!("Environment: {:?}", settings);
        self.environment = settings;
        self.raycast.invalidate();
        self.tree.request_now(self.clock);
    }

    // --- persistence --------------------------------------------------------

    pub fn export_measurements(&self, path: &Path) -> Result<(), SerializationError> {
        let data: Vec<_> = self
            .measurements
            .iter()
            .filter_map(|m| self.engine.node(m.node).and_then(|n| n.measurement))
            .collect();
        serialization::save_measurements_to_file(&data, path)
    }

    /// Recreates saved measurements next to the existing ones.
    pub fn import_measurements(&mut self, path: &Path) -> Result<usize, SerializationError> {
        let data = serialization::load_measurements_from_file(path)?;
        let mut created = 0;
        for entry in data {
            match self
                .annotations
                .create_measurement(&mut self.engine, entry.start_point, entry.end_point)
            {
                Ok(measurement) => {
                    self.measurements.push(measurement.clone());
                    self.events.push(StudioEvent::MeasurementCreated { measurement });
                    created += 1;
                }
                Err(err) => log::warn!("Could not recreate measurement: {err}"),
            }
        }
        self.raycast.invalidate();
        self.tree.request(self.clock);
        Ok(created)
    }

    pub fn export_tree(&self, path: &Path) -> Result<(), SerializationError> {
        serialization::save_tree_to_file(self.tree.tree(), path)
    }

    // --- teardown -------------------------------------------------------------

    /// Cancels imports and interactions, reverses highlights and frees every
    /// resource the interaction components own. Later calls are no-ops.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.imports.cancel_all();
        {
            let mut ctx = tool_context!(self);
            self.tools.cancel_interactions(&mut ctx);
        }
        self.selection.teardown(&mut self.engine, &mut self.materials);
        self.gizmo.detach(&mut self.engine);
        self.materials.dispose(&mut self.engine);
        self.shut_down = true;
        log::info!("Studio shut down");
    }
}

impl Drop for Studio {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn command_name(command: &StudioCommand) -> &'static str {
    match command {
        StudioCommand::ImportFile { .. } => "import_file",
        StudioCommand::ImportBytes { .. } => "import_bytes",
        StudioCommand::SwitchModel(_) => "switch_model",
        StudioCommand::RemoveModel(_) => "remove_model",
        StudioCommand::SetTool(_) => "set_tool",
        StudioCommand::Select { .. } => "select",
        StudioCommand::DeleteObject { .. } => "delete_object",
        StudioCommand::ClearMeasurements => "clear_measurements",
        StudioCommand::SetVisibility { .. } => "set_visibility",
        StudioCommand::AddPrimitive(_) => "add_primitive",
        StudioCommand::SetMaterialType { .. } => "set_material_type",
        StudioCommand::UpdateMaterial { .. } => "update_material",
        StudioCommand::SetLights(_) => "set_lights",
        StudioCommand::SetEnvironment(_) => "set_environment",
        StudioCommand::SetShowPrimitives(_) => "set_show_primitives",
    }
}

fn spawn(engine: &mut Engine, node: SceneNode) -> NodeId {
    let id = engine.create_node(node);
    if let Err(err) = engine.add_to_scene(id) {
        log::warn!("Could not attach scene setup node: {err}");
    }
    id
}

fn light_node(name: &str, kind: LightKind, color: [f32; 3], intensity: f32) -> SceneNode {
    let mut node = SceneNode::new(name, NodeKind::Light);
    node.light = Some(Light {
        kind,
        color,
        intensity,
    });
    node
}

fn ground_node(engine: &mut Engine, visible: bool) -> SceneNode {
    let geometry = engine.create_geometry(GeometryShape::Plane {
        width: GROUND_SIZE,
        height: GROUND_SIZE,
    });
    let material = engine.create_material(Material::standard("Ground", [0.55, 0.55, 0.55]));
    SceneNode::mesh("Ground", geometry, MaterialSlot::Single(material))
        .with_role(NodeRole::Ground)
        .with_transform(Transform {
            rotation: Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
            ..Transform::IDENTITY
        })
        .with_visible(visible)
}

//! Tool state machine.
//!
//! Holds the active tool and routes pointer input to its handler. The only
//! tool-internal state is the measure tool's pending start point and the
//! move tool's drag; switching tools cancels both.

pub mod annotations;
pub mod raycast;

pub use annotations::{clear_preview_line, format_distance, AnnotationFactory, AnnotationStyle, PreviewLine};
pub use raycast::{Hit, HitFilter, RaycastError, RaycastIndex};

use crate::app::input::{PointerButton, PointerEvent, PointerPhase, PointerType};
use crate::engine::{Engine, NodeId, NodeRole, Ray};
use crate::materials::MaterialManager;
use crate::render::camera::CameraController;
use crate::render::gizmo::TransformGizmo;
use crate::scene::Measurement;
use crate::selection::SelectionManager;
use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    #[default]
    Select,
    Point,
    Measure,
    Move,
}

/// Borrowed view of everything a tool handler may touch.
pub struct ToolContext<'a> {
    pub engine: &'a mut Engine,
    pub raycast: &'a mut RaycastIndex,
    pub selection: &'a mut SelectionManager,
    pub materials: &'a mut MaterialManager,
    pub annotations: &'a mut AnnotationFactory,
    pub gizmo: &'a mut TransformGizmo,
    pub camera: &'a mut CameraController,
}

/// What a handler did, for the coordinator to turn into events.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolEffect {
    PointCreated { node: NodeId, position: Vec3 },
    MeasurementCreated(Measurement),
    SelectionChanged,
    /// A dragged measurement now spans `start..end` in world space.
    MeasurementMoved { node: NodeId, start: Vec3, end: Vec3 },
    /// Nodes were added to or removed from the scene.
    SceneChanged,
}

#[derive(Debug)]
struct PendingMeasure {
    start: Vec3,
    current: Vec3,
    preview: Option<PreviewLine>,
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    node: NodeId,
    plane_point: Vec3,
    plane_normal: Vec3,
    offset: Vec3,
}

#[derive(Debug, Default)]
pub struct ToolManager {
    active: ToolType,
    pending: Option<PendingMeasure>,
    drag: Option<DragState>,
    hovered: Option<NodeId>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> ToolType {
        self.active
    }

    pub fn pending_start(&self) -> Option<Vec3> {
        self.pending.as_ref().map(|pending| pending.start)
    }

    pub fn preview_node(&self) -> Option<NodeId> {
        self.pending
            .as_ref()
            .and_then(|pending| pending.preview.as_ref())
            .map(PreviewLine::node)
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn hovered(&self) -> Option<NodeId> {
        self.hovered
    }

    /// Returns whether the tool changed.
    pub fn set_tool(&mut self, ctx: &mut ToolContext<'_>, tool: ToolType) -> bool {
        if tool == self.active {
            return false;
        }
        self.cancel_interactions(ctx);
        log::info!("Tool changed: {:?} -> {:?}", self.active, tool);
        self.active = tool;
        true
    }

    /// Drops every in-progress interaction: pending measurement and its
    /// preview, an active drag (camera controls come back), the gizmo and the
    /// hover tint.
    pub fn cancel_interactions(&mut self, ctx: &mut ToolContext<'_>) {
        self.cancel_measurement(ctx);
        self.end_drag(ctx);
        ctx.gizmo.detach(ctx.engine);
        self.clear_hover(ctx);
    }

    pub fn cancel_measurement(&mut self, ctx: &mut ToolContext<'_>) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        clear_preview_line(ctx.engine, pending.preview);
        log::debug!("Pending measurement cancelled");
        true
    }

    /// Lets go of anything referring into `root`'s subtree. Run before the
    /// subtree is disposed.
    pub fn release_subtree(&mut self, ctx: &mut ToolContext<'_>, root: NodeId) {
        let inside = |engine: &Engine, node: NodeId| node == root || engine.is_ancestor(root, node);
        if self.drag.is_some_and(|drag| inside(ctx.engine, drag.node)) {
            self.end_drag(ctx);
        }
        if ctx.gizmo.target().is_some_and(|target| inside(ctx.engine, target)) {
            ctx.gizmo.detach(ctx.engine);
        }
        if self.hovered.is_some_and(|node| inside(ctx.engine, node)) {
            self.clear_hover(ctx);
        }
    }

    pub fn handle_pointer(&mut self, ctx: &mut ToolContext<'_>, event: &PointerEvent) -> Vec<ToolEffect> {
        if event.is_navigation_gesture() {
            // The camera owns multi-finger gestures, so a drag cannot survive one.
            self.end_drag(ctx);
            return Vec::new();
        }
        let ray = ctx.camera.ray_from_screen(event.position);
        match event.phase {
            PointerPhase::Down => self.pointer_down(ctx, event, &ray),
            PointerPhase::Move => self.pointer_move(ctx, event, &ray),
            PointerPhase::Up => {
                self.end_drag(ctx);
                Vec::new()
            }
            PointerPhase::Cancel => {
                self.end_drag(ctx);
                self.clear_hover(ctx);
                Vec::new()
            }
        }
    }

    fn pointer_down(&mut self, ctx: &mut ToolContext<'_>, event: &PointerEvent, ray: &Ray) -> Vec<ToolEffect> {
        match event.button {
            PointerButton::Secondary => {
                self.cancel_measurement(ctx);
                return Vec::new();
            }
            PointerButton::Middle => return Vec::new(),
            PointerButton::Primary => {}
        }
        match self.active {
            ToolType::Select => self.select_click(ctx, event, ray),
            ToolType::Point => self.point_click(ctx, ray),
            ToolType::Measure => self.measure_click(ctx, ray),
            ToolType::Move => {
                self.move_press(ctx, ray);
                Vec::new()
            }
        }
    }

    fn pointer_move(&mut self, ctx: &mut ToolContext<'_>, event: &PointerEvent, ray: &Ray) -> Vec<ToolEffect> {
        if self.drag.is_some() {
            return self.drag_to(ctx, ray);
        }
        match self.active {
            ToolType::Measure => self.update_preview(ctx, ray),
            ToolType::Select if event.pointer_type != PointerType::Touch => self.update_hover(ctx, ray),
            _ => {}
        }
        Vec::new()
    }

    fn select_click(&mut self, ctx: &mut ToolContext<'_>, event: &PointerEvent, ray: &Ray) -> Vec<ToolEffect> {
        let multi = event.modifiers.multi_select();
        let target = ctx
            .raycast
            .intersect(ctx.engine, ray, HitFilter::All)
            .map(|hit| owning_node(ctx.engine, hit.node));
        let changed = ctx.selection.select(ctx.engine, ctx.materials, target, multi);
        if changed {
            vec![ToolEffect::SelectionChanged]
        } else {
            Vec::new()
        }
    }

    fn point_click(&mut self, ctx: &mut ToolContext<'_>, ray: &Ray) -> Vec<ToolEffect> {
        let Some(hit) = ctx.raycast.intersect(ctx.engine, ray, HitFilter::MeshesOnly) else {
            return Vec::new();
        };
        let node = match ctx.annotations.create_point(ctx.engine, hit.point) {
            Ok(node) => node,
            Err(err) => {
                log::warn!("Failed to create point marker: {err}");
                return Vec::new();
            }
        };
        ctx.raycast.invalidate();
        let mut effects = vec![
            ToolEffect::PointCreated {
                node,
                position: hit.point,
            },
            ToolEffect::SceneChanged,
        ];
        if ctx.selection.select(ctx.engine, ctx.materials, Some(node), false) {
            effects.push(ToolEffect::SelectionChanged);
        }
        effects
    }

    fn measure_click(&mut self, ctx: &mut ToolContext<'_>, ray: &Ray) -> Vec<ToolEffect> {
        let Some(hit) = ctx.raycast.intersect(ctx.engine, ray, HitFilter::All) else {
            return Vec::new();
        };

        let Some(pending) = self.pending.take() else {
            let preview = match ctx
                .annotations
                .update_preview_line(ctx.engine, hit.point, hit.point, None)
            {
                Ok(preview) => Some(preview),
                Err(err) => {
                    log::warn!("Failed to create measurement preview: {err}");
                    None
                }
            };
            self.pending = Some(PendingMeasure {
                start: hit.point,
                current: hit.point,
                preview,
            });
            return Vec::new();
        };

        clear_preview_line(ctx.engine, pending.preview);
        let measurement = match ctx
            .annotations
            .create_measurement(ctx.engine, pending.start, hit.point)
        {
            Ok(measurement) => measurement,
            Err(err) => {
                log::warn!("Failed to create measurement: {err}");
                return Vec::new();
            }
        };
        ctx.raycast.invalidate();
        let group = measurement.node;
        let mut effects = vec![ToolEffect::MeasurementCreated(measurement), ToolEffect::SceneChanged];
        if ctx.selection.select(ctx.engine, ctx.materials, Some(group), false) {
            effects.push(ToolEffect::SelectionChanged);
        }
        effects
    }

    /// Redraws the preview to the current hit; with no hit the line stays at
    /// the last known point.
    fn update_preview(&mut self, ctx: &mut ToolContext<'_>, ray: &Ray) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        let Some(hit) = ctx.raycast.intersect(ctx.engine, ray, HitFilter::All) else {
            return;
        };
        pending.current = hit.point;
        let existing = pending.preview.take();
        match ctx
            .annotations
            .update_preview_line(ctx.engine, pending.start, pending.current, existing)
        {
            Ok(preview) => pending.preview = Some(preview),
            Err(err) => log::warn!("Failed to update measurement preview: {err}"),
        }
    }

    fn update_hover(&mut self, ctx: &mut ToolContext<'_>, ray: &Ray) {
        let target = ctx
            .raycast
            .intersect(ctx.engine, ray, HitFilter::MeshesOnly)
            .map(|hit| hit.node);
        if target == self.hovered {
            return;
        }
        self.clear_hover(ctx);
        if let Some(node) = target {
            ctx.materials.set_hover_effect(ctx.engine, node, true);
            self.hovered = Some(node);
        }
    }

    fn clear_hover(&mut self, ctx: &mut ToolContext<'_>) {
        if let Some(node) = self.hovered.take() {
            if ctx.engine.contains(node) {
                ctx.materials.set_hover_effect(ctx.engine, node, false);
            }
        }
    }

    fn move_press(&mut self, ctx: &mut ToolContext<'_>, ray: &Ray) {
        let Some(hit) = ctx.raycast.intersect(ctx.engine, ray, HitFilter::All) else {
            ctx.gizmo.detach(ctx.engine);
            return;
        };
        let node = owning_node(ctx.engine, hit.node);
        if let Err(err) = ctx.gizmo.attach(ctx.engine, node) {
            log::warn!("Failed to attach transform gizmo: {err}");
            return;
        }
        let Some(position) = ctx.engine.world_position(node) else {
            return;
        };
        self.drag = Some(DragState {
            node,
            plane_point: hit.point,
            plane_normal: -ctx.camera.basis().0,
            offset: position - hit.point,
        });
        ctx.camera.set_controls_enabled(false);
    }

    /// Moves the dragged node under the pointer. A measurement group carries
    /// its endpoints along so exports and the panel see where it now is.
    fn drag_to(&mut self, ctx: &mut ToolContext<'_>, ray: &Ray) -> Vec<ToolEffect> {
        let Some(drag) = self.drag else {
            return Vec::new();
        };
        let Some(point) = ray.intersect_plane(drag.plane_point, drag.plane_normal) else {
            return Vec::new();
        };
        let world = point + drag.offset;
        let Some(before) = ctx.engine.world_position(drag.node) else {
            self.end_drag(ctx);
            return Vec::new();
        };
        let local = match ctx.engine.parent(drag.node).and_then(|p| ctx.engine.world_matrix(p)) {
            Some(parent) => parent.inverse().transform_point3(world),
            None => world,
        };
        match ctx.engine.node_mut(drag.node) {
            Some(node) => node.transform.translation = local,
            None => {
                self.end_drag(ctx);
                return Vec::new();
            }
        }
        ctx.gizmo.sync(ctx.engine);

        let delta = world - before;
        let Some(data) = ctx
            .engine
            .node_mut(drag.node)
            .and_then(|node| node.measurement.as_mut())
        else {
            return Vec::new();
        };
        data.start_point += delta;
        data.end_point += delta;
        vec![ToolEffect::MeasurementMoved {
            node: drag.node,
            start: data.start_point,
            end: data.end_point,
        }]
    }

    /// Ends a drag however it terminated; camera controls always come back.
    fn end_drag(&mut self, ctx: &mut ToolContext<'_>) {
        if self.drag.take().is_some() {
            log::debug!("Drag ended");
        }
        ctx.camera.set_controls_enabled(true);
    }
}

/// Clicking part of a measurement selects the whole measurement.
fn owning_node(engine: &Engine, node: NodeId) -> NodeId {
    let is_part = engine
        .node(node)
        .is_some_and(|n| n.role == NodeRole::MeasurementPart);
    match engine.parent(node) {
        Some(parent) if is_part && engine.node(parent).is_some_and(|p| p.role == NodeRole::MeasurementGroup) => {
            parent
        }
        _ => node,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::input::Modifiers;
    use crate::engine::{GeometryShape, Material, MaterialSlot, SceneNode, Transform};
    use crate::materials::EffectColors;
    use crate::selection::HighlightStyle;
    use glam::Vec2;

    struct Rig {
        engine: Engine,
        raycast: RaycastIndex,
        selection: SelectionManager,
        materials: MaterialManager,
        annotations: AnnotationFactory,
        gizmo: TransformGizmo,
        camera: CameraController,
        tools: ToolManager,
    }

    impl Rig {
        fn new() -> Self {
            // Looking straight down -Z from z = 10; screen centre hits the origin.
            let mut camera = CameraController::new(Vec3::new(0.0, 0.0, 10.0), -std::f32::consts::FRAC_PI_2, 0.0);
            camera.set_viewport(100.0, 100.0);
            Self {
                engine: Engine::new(),
                raycast: RaycastIndex::new(),
                selection: SelectionManager::new(HighlightStyle::default()),
                materials: MaterialManager::new(EffectColors::default()),
                annotations: AnnotationFactory::new(AnnotationStyle::default()),
                gizmo: TransformGizmo::new(),
                camera,
                tools: ToolManager::new(),
            }
        }

        fn split(&mut self) -> (&mut ToolManager, ToolContext<'_>) {
            (
                &mut self.tools,
                ToolContext {
                    engine: &mut self.engine,
                    raycast: &mut self.raycast,
                    selection: &mut self.selection,
                    materials: &mut self.materials,
                    annotations: &mut self.annotations,
                    gizmo: &mut self.gizmo,
                    camera: &mut self.camera,
                },
            )
        }

        fn send(&mut self, event: PointerEvent) -> Vec<ToolEffect> {
            let (tools, mut ctx) = self.split();
            tools.handle_pointer(&mut ctx, &event)
        }

        fn set_tool(&mut self, tool: ToolType) {
            let (tools, mut ctx) = self.split();
            tools.set_tool(&mut ctx, tool);
        }

        /// Large plane in z = 0 facing the camera.
        fn add_backdrop(&mut self) -> NodeId {
            let geometry = self.engine.create_geometry(GeometryShape::Plane {
                width: 100.0,
                height: 100.0,
            });
            let material = self.engine.create_material(Material::default());
            let node = self
                .engine
                .create_node(SceneNode::mesh("backdrop", geometry, MaterialSlot::Single(material)));
            self.engine.add_to_scene(node).unwrap();
            node
        }

        /// Screen position whose ray hits the z = 0 plane at `world`.
        fn screen_for(&self, world: Vec3) -> Vec2 {
            let half = (self.camera.fov_y * 0.5).tan();
            let depth = self.camera.position.z - world.z;
            let ndc = Vec2::new(world.x / (depth * half), world.y / (depth * half));
            Vec2::new((ndc.x + 1.0) * 0.5 * 100.0, (1.0 - ndc.y) * 0.5 * 100.0)
        }

        fn click(&mut self, world: Vec3) -> Vec<ToolEffect> {
            let position = self.screen_for(world);
            self.send(PointerEvent::new(PointerPhase::Down, position))
        }
    }

    fn measurement_of(effects: &[ToolEffect]) -> Option<&Measurement> {
        effects.iter().find_map(|effect| match effect {
            ToolEffect::MeasurementCreated(m) => Some(m),
            _ => None,
        })
    }

    #[test]
    fn two_click_measurement_is_three_four_five() {
        let mut rig = Rig::new();
        rig.add_backdrop();
        rig.set_tool(ToolType::Measure);

        assert!(rig.click(Vec3::ZERO).is_empty());
        assert!(rig.tools.pending_start().is_some());
        let effects = rig.click(Vec3::new(3.0, 4.0, 0.0));
        let measurement = measurement_of(&effects).unwrap();
        assert!((measurement.distance - 5.0).abs() < 1e-3);
        assert!(rig.tools.pending_start().is_none());
        assert!(rig.tools.preview_node().is_none());
        assert_eq!(rig.selection.selected(), vec![measurement.node]);
    }

    #[test]
    fn pointer_moves_keep_one_preview_line() {
        let mut rig = Rig::new();
        rig.add_backdrop();
        rig.set_tool(ToolType::Measure);
        rig.click(Vec3::ZERO);
        let after_first_click = rig.engine.resource_counts();
        for step in 1..30 {
            let position = rig.screen_for(Vec3::new(step as f32 * 0.1, 0.0, 0.0));
            rig.send(PointerEvent::new(PointerPhase::Move, position));
        }
        assert_eq!(rig.engine.resource_counts(), after_first_click);
        let preview = rig.tools.preview_node().unwrap();
        let GeometryShape::Line { points, .. } = rig
            .engine
            .geometry(rig.engine.node(preview).unwrap().geometry.unwrap())
            .unwrap()
        else {
            panic!("preview is not a line");
        };
        assert!((points[1].x - 2.9).abs() < 1e-3);
    }

    #[test]
    fn secondary_click_and_tool_switch_cancel_pending_measure() {
        let mut rig = Rig::new();
        rig.add_backdrop();
        let baseline = rig.engine.resource_counts();
        rig.set_tool(ToolType::Measure);
        rig.click(Vec3::ZERO);
        let position = rig.screen_for(Vec3::ZERO);
        rig.send(PointerEvent::new(PointerPhase::Down, position).with_button(PointerButton::Secondary));
        assert!(rig.tools.pending_start().is_none());
        assert_eq!(rig.engine.resource_counts(), baseline);

        rig.click(Vec3::ZERO);
        rig.set_tool(ToolType::Select);
        assert!(rig.tools.pending_start().is_none());
        assert_eq!(rig.engine.resource_counts(), baseline);
    }

    #[test]
    fn multi_touch_does_not_disturb_pending_measure() {
        let mut rig = Rig::new();
        rig.add_backdrop();
        rig.set_tool(ToolType::Measure);
        rig.click(Vec3::ZERO);
        let position = rig.screen_for(Vec3::new(1.0, 0.0, 0.0));
        assert!(rig
            .send(PointerEvent::touch(PointerPhase::Down, position, 2))
            .is_empty());
        assert!(rig.tools.pending_start().is_some());
    }

    #[test]
    fn point_tool_ignores_existing_annotations() {
        let mut rig = Rig::new();
        rig.add_backdrop();
        rig.set_tool(ToolType::Point);
        let effects = rig.click(Vec3::new(1.0, 1.0, 0.0));
        let first = effects
            .iter()
            .find_map(|e| match e {
                ToolEffect::PointCreated { node, .. } => Some(*node),
                _ => None,
            })
            .unwrap();
        assert_eq!(rig.selection.selected(), vec![first]);

        // Same spot again: the ray passes the marker and lands on the backdrop.
        let effects = rig.click(Vec3::new(1.0, 1.0, 0.0));
        let second = effects.iter().find_map(|e| match e {
            ToolEffect::PointCreated { node, position } => Some((*node, *position)),
            _ => None,
        });
        let (second, position) = second.unwrap();
        assert_ne!(second, first);
        assert!(position.z.abs() < 1e-4);
    }

    #[test]
    fn select_click_on_measurement_part_selects_group() {
        let mut rig = Rig::new();
        let measurement = rig
            .annotations
            .create_measurement(&mut rig.engine, Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0))
            .unwrap();
        let effects = rig.click(Vec3::ZERO);
        assert_eq!(effects, vec![ToolEffect::SelectionChanged]);
        assert_eq!(rig.selection.selected(), vec![measurement.node]);

        // Modifier-click on empty space keeps the selection; plain miss clears.
        let empty = rig.screen_for(Vec3::new(-3.0, -3.0, 0.0));
        let shift = Modifiers {
            shift: true,
            ..Modifiers::NONE
        };
        rig.send(PointerEvent::new(PointerPhase::Down, empty).with_modifiers(shift));
        assert_eq!(rig.selection.selected().len(), 1);
        rig.send(PointerEvent::new(PointerPhase::Down, empty));
        assert!(rig.selection.is_empty());
    }

    #[test]
    fn hover_tints_and_restores() {
        let mut rig = Rig::new();
        let backdrop = rig.add_backdrop();
        let original = rig.engine.node(backdrop).unwrap().material.clone();
        let centre = rig.screen_for(Vec3::ZERO);
        rig.send(PointerEvent::new(PointerPhase::Move, centre));
        assert_eq!(rig.tools.hovered(), Some(backdrop));
        assert_ne!(rig.engine.node(backdrop).unwrap().material, original);
        rig.send(PointerEvent::new(PointerPhase::Cancel, centre));
        assert_eq!(rig.engine.node(backdrop).unwrap().material, original);
    }

    #[test]
    fn move_drag_disables_camera_until_release() {
        let mut rig = Rig::new();
        let geometry = rig.engine.create_geometry(GeometryShape::cuboid(Vec3::ONE));
        let material = rig.engine.create_material(Material::default());
        let cube = rig.engine.create_node(
            SceneNode::mesh("cube", geometry, MaterialSlot::Single(material))
                .with_transform(Transform::from_translation(Vec3::ZERO)),
        );
        rig.engine.add_to_scene(cube).unwrap();
        rig.set_tool(ToolType::Move);

        rig.send(PointerEvent::new(PointerPhase::Down, rig.screen_for(Vec3::ZERO)));
        assert!(rig.tools.is_dragging());
        assert!(!rig.camera.controls_enabled());
        assert_eq!(rig.gizmo.target(), Some(cube));

        rig.send(PointerEvent::new(PointerPhase::Move, rig.screen_for(Vec3::new(1.0, 0.0, 0.0))));
        let moved = rig.engine.world_position(cube).unwrap();
        assert!(moved.x > 0.5);

        rig.send(PointerEvent::new(PointerPhase::Cancel, rig.screen_for(Vec3::ZERO)));
        assert!(!rig.tools.is_dragging());
        assert!(rig.camera.controls_enabled());

        rig.send(PointerEvent::new(PointerPhase::Down, rig.screen_for(Vec3::new(-8.0, -8.0, 0.0))));
        assert!(rig.gizmo.target().is_none());
    }

    #[test]
    fn second_finger_ends_drag_and_returns_camera() {
        let mut rig = Rig::new();
        rig.add_backdrop();
        rig.set_tool(ToolType::Move);
        let centre = rig.screen_for(Vec3::ZERO);
        rig.send(PointerEvent::touch(PointerPhase::Down, centre, 1));
        assert!(rig.tools.is_dragging());
        assert!(!rig.camera.controls_enabled());

        assert!(rig.send(PointerEvent::touch(PointerPhase::Up, centre, 2)).is_empty());
        assert!(!rig.tools.is_dragging());
        assert!(rig.camera.controls_enabled());
    }

    #[test]
    fn dragged_measurement_carries_its_endpoints() {
        let mut rig = Rig::new();
        let measurement = rig
            .annotations
            .create_measurement(&mut rig.engine, Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0))
            .unwrap();
        rig.set_tool(ToolType::Move);

        rig.send(PointerEvent::new(PointerPhase::Down, rig.screen_for(Vec3::ZERO)));
        assert!(rig.tools.is_dragging());
        let effects = rig.send(PointerEvent::new(PointerPhase::Move, rig.screen_for(Vec3::new(0.0, 1.0, 0.0))));
        let (start, end) = effects
            .iter()
            .find_map(|effect| match effect {
                ToolEffect::MeasurementMoved { node, start, end } if *node == measurement.node => Some((*start, *end)),
                _ => None,
            })
            .unwrap();
        // The drag plane sits at the marker surface, just in front of z = 0.
        assert!(start.y > 0.9 && start.x.abs() < 1e-3);
        assert!((end - start - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-3);

        let data = rig.engine.node(measurement.node).unwrap().measurement.unwrap();
        assert_eq!(data.start_point, start);
        assert!((data.distance - 2.0).abs() < 1e-4);
        let start_marker = rig.engine.children(measurement.node)[0];
        assert!((rig.engine.world_position(start_marker).unwrap() - start).length() < 1e-3);
    }
}

//! Point markers, measurement groups and the measure tool's preview line.
//!
//! Every node built here owns its geometry and material, so disposing the
//! subtree through the engine frees all of it.

use crate::engine::{
    Engine, EngineError, GeometryShape, Material, MaterialSlot, NodeId, NodeKind, NodeRole, SceneNode,
    Transform,
};
use crate::scene::{descriptor_id, Measurement, MeasurementData, ObjectType};
use glam::Vec3;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnotationStyle {
    pub point_radius: f32,
    pub point_color: [f32; 3],
    pub measure_color: [f32; 3],
    pub dash_size: f32,
    pub gap_size: f32,
    pub decimals: usize,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            point_radius: 0.05,
            point_color: [1.0, 0.2, 0.2],
            measure_color: [1.0, 0.85, 0.1],
            dash_size: 0.1,
            gap_size: 0.05,
            decimals: 2,
        }
    }
}

/// Label text for a distance. Uses the same value stored on the measurement.
pub fn format_distance(distance: f32, decimals: usize) -> String {
    format!("{:.*} m", decimals, distance)
}

/// Live preview of a pending measurement. Not `Clone`: exactly one handle
/// exists per line in the scene.
#[derive(Debug, PartialEq, Eq)]
pub struct PreviewLine {
    node: NodeId,
}

impl PreviewLine {
    pub fn node(&self) -> NodeId {
        self.node
    }
}

pub struct AnnotationFactory {
    style: AnnotationStyle,
    points_created: u64,
    measurements_created: u64,
}

impl AnnotationFactory {
    pub fn new(style: AnnotationStyle) -> Self {
        Self {
            style,
            points_created: 0,
            measurements_created: 0,
        }
    }

    pub fn style(&self) -> &AnnotationStyle {
        &self.style
    }

    /// Sphere marker at `position`, attached to the scene root. The name is
    /// unique but carries no identity; the node handle does.
    pub fn create_point(&mut self, engine: &mut Engine, position: Vec3) -> Result<NodeId, EngineError> {
        self.points_created += 1;
        let name = format!("Point_{}_{}", unix_millis(), self.points_created);
        let node = self.marker(engine, name, position, NodeRole::Point, self.style.point_color);
        engine.add_to_scene(node)?;
        log::debug!("Point marker {:?} created at {:?}", node, position);
        Ok(node)
    }

    /// Measurement group: two markers, a dashed line and a hidden label at the
    /// midpoint, attached to the scene root.
    pub fn create_measurement(
        &mut self,
        engine: &mut Engine,
        start: Vec3,
        end: Vec3,
    ) -> Result<Measurement, EngineError> {
        self.measurements_created += 1;
        let data = MeasurementData::between(start, end);
        let label = format_distance(data.distance, self.style.decimals);
        let color = self.style.measure_color;

        let mut group = SceneNode::group(format!("Measurement {}", self.measurements_created))
            .with_role(NodeRole::MeasurementGroup);
        group.measurement = Some(data);
        let group = engine.create_node(group);

        let start_marker = self.marker(engine, "start".into(), start, NodeRole::MeasurementPart, color);
        let end_marker = self.marker(engine, "end".into(), end, NodeRole::MeasurementPart, color);
        let line = self.line(engine, "line", start, end, NodeRole::MeasurementPart);

        let mut text = SceneNode::new("label", NodeKind::Label)
            .with_role(NodeRole::MeasurementPart)
            .with_transform(Transform::from_translation((start + end) * 0.5))
            .with_visible(false);
        text.label = Some(label.clone());
        let text = engine.create_node(text);

        for child in [start_marker, end_marker, line, text] {
            engine.add_child(group, child)?;
        }
        engine.add_to_scene(group)?;
        log::info!("Measurement created: {label}");

        Ok(Measurement {
            id: descriptor_id(ObjectType::Measurement.id_prefix(), group),
            node: group,
            start_point: start,
            end_point: end,
            distance: data.distance,
            label,
        })
    }

    /// Replaces `existing` (disposing it first) with a line from `start` to
    /// `current`.
    pub fn update_preview_line(
        &self,
        engine: &mut Engine,
        start: Vec3,
        current: Vec3,
        existing: Option<PreviewLine>,
    ) -> Result<PreviewLine, EngineError> {
        clear_preview_line(engine, existing);
        let node = self.line(engine, "measure-preview", start, current, NodeRole::Overlay);
        engine.add_to_scene(node)?;
        Ok(PreviewLine { node })
    }

    fn marker(
        &self,
        engine: &mut Engine,
        name: String,
        position: Vec3,
        role: NodeRole,
        color: [f32; 3],
    ) -> NodeId {
        let geometry = engine.create_geometry(GeometryShape::sphere(self.style.point_radius));
        let material = engine.create_material(Material::standard(&name, color));
        engine.create_node(
            SceneNode::mesh(name, geometry, MaterialSlot::Single(material))
                .with_role(role)
                .with_transform(Transform::from_translation(position)),
        )
    }

    fn line(&self, engine: &mut Engine, name: &str, start: Vec3, end: Vec3, role: NodeRole) -> NodeId {
        let geometry = engine.create_geometry(GeometryShape::line(start, end, true));
        let material = engine.create_material(
            Material::dashed_line(name, self.style.measure_color, self.style.dash_size, self.style.gap_size)
                .always_on_top(),
        );
        let mut node = SceneNode::new(name, NodeKind::Line).with_role(role);
        node.geometry = Some(geometry);
        node.material = Some(MaterialSlot::Single(material));
        engine.create_node(node)
    }
}

/// Removes and disposes a preview line. Safe with `None` and with a line
/// whose node is already gone.
pub fn clear_preview_line(engine: &mut Engine, preview: Option<PreviewLine>) -> Option<PreviewLine> {
    if let Some(preview) = preview {
        if engine.contains(preview.node) {
            if let Err(err) = engine.dispose_subtree(preview.node) {
                log::warn!("Failed to dispose preview line: {err}");
            }
        }
    }
    None
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

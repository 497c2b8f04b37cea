//! Uniform description of a scene node for inspector panels.
//!
//! Works the same whether the node came from a primitive, an imported model
//! or an annotation factory; everything is derived from the node's kind, role
//! tag and geometry.

use crate::engine::{Engine, GeometryShape, Light, NodeId, NodeKind, NodeRole};
use crate::scene::{descriptor_id, MeasurementData, ModelRegistry, ObjectType};
use glam::{EulerRot, Vec3};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryStats {
    pub shape: &'static str,
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub size: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub kind: NodeKind,
    pub visible: bool,
    pub helper: bool,
    pub geometry: Option<GeometryStats>,
    pub material_count: usize,
    /// Totals over the node and its descendants.
    pub mesh_count: usize,
    pub total_vertices: usize,
    pub total_triangles: usize,
    pub position: Vec3,
    pub rotation_deg: Vec3,
    pub scale: Vec3,
    pub world_position: Vec3,
    pub original_metadata: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement: Option<MeasurementData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light: Option<Light>,
}

/// Type-tag dispatch shared by the tree builder and the inspector.
pub fn classify(engine: &Engine, id: NodeId) -> Option<ObjectType> {
    let node = engine.node(id)?;
    let object_type = match node.role {
        NodeRole::Primitive(_) => ObjectType::Primitive,
        NodeRole::Point => ObjectType::Point,
        NodeRole::MeasurementGroup | NodeRole::MeasurementPart => ObjectType::Measurement,
        NodeRole::Ground => ObjectType::Ground,
        NodeRole::Environment => ObjectType::Environment,
        NodeRole::Plain | NodeRole::Overlay => match node.kind {
            NodeKind::Group => ObjectType::Group,
            NodeKind::Light => ObjectType::Light,
            NodeKind::Mesh | NodeKind::Line | NodeKind::Label => ObjectType::Mesh,
        },
    };
    Some(object_type)
}

pub fn shape_name(shape: &GeometryShape) -> &'static str {
    match shape {
        GeometryShape::Box { .. } => "box",
        GeometryShape::Sphere { .. } => "sphere",
        GeometryShape::Plane { .. } => "plane",
        GeometryShape::Cylinder { .. } => "cylinder",
        GeometryShape::Line { .. } => "line",
        GeometryShape::Edges { .. } => "edges",
        GeometryShape::TriangleMesh { .. } => "triangle_mesh",
    }
}

pub fn extract(engine: &Engine, models: &ModelRegistry, id: NodeId) -> Option<ObjectMetadata> {
    let node = engine.node(id)?;
    let is_model_root = models.by_root(id).is_some();
    let object_type = if is_model_root {
        ObjectType::Model
    } else {
        classify(engine, id)?
    };

    let geometry = node
        .geometry
        .and_then(|geometry| engine.geometry(geometry))
        .map(|shape| GeometryStats {
            shape: shape_name(shape),
            vertex_count: shape.vertex_count(),
            triangle_count: shape.triangle_count(),
            size: shape.bounds().size(),
        });

    let mut mesh_count = 0;
    let mut total_vertices = 0;
    let mut total_triangles = 0;
    for descendant in engine.descendants(id) {
        let Some(shape) = engine
            .node(descendant)
            .filter(|n| n.kind == NodeKind::Mesh && !n.is_helper() || descendant == id)
            .and_then(|n| n.geometry)
            .and_then(|geometry| engine.geometry(geometry))
        else {
            continue;
        };
        mesh_count += 1;
        total_vertices += shape.vertex_count();
        total_triangles += shape.triangle_count();
    }

    let (rx, ry, rz) = node.transform.rotation.to_euler(EulerRot::XYZ);
    Some(ObjectMetadata {
        id: descriptor_id(object_type.id_prefix(), id),
        name: node.name.clone(),
        object_type,
        kind: node.kind,
        visible: node.visible,
        helper: node.is_helper(),
        geometry,
        material_count: node.material.as_ref().map_or(0, |slot| slot.len()),
        mesh_count,
        total_vertices,
        total_triangles,
        position: node.transform.translation,
        rotation_deg: Vec3::new(rx.to_degrees(), ry.to_degrees(), rz.to_degrees()),
        scale: node.transform.scale,
        world_position: engine.world_position(id).unwrap_or(Vec3::ZERO),
        original_metadata: node.metadata.clone(),
        measurement: node.measurement,
        light: node.light,
    })
}

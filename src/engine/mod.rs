//! Retained scene graph.
//!
//! Stands in for the rendering library the interaction core drives: an arena
//! of nodes with parent/child links, transforms, visibility and material
//! assignment, plus the GPU-side resources (materials, geometries) nodes point
//! at. Resources are created and disposed explicitly so callers can assert
//! that nothing leaks.
//!
//! Node handles are `slotmap` keys. A removed node's handle is never handed
//! out again, so side tables keyed by `NodeId` cannot alias a newer node.

pub mod geometry;
pub mod material;

pub use geometry::{Aabb, GeometryShape, Ray};
pub use material::{Material, MaterialKind};

use crate::scene::MeasurementData;
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use slotmap::{Key, SlotMap};
use std::collections::{BTreeMap, HashSet};

slotmap::new_key_type! {
    pub struct NodeId;
    pub struct MaterialId;
    pub struct GeometryId;
}

impl NodeId {
    /// Stable numeric form of the handle, used to derive descriptor ids.
    pub fn as_u64(self) -> u64 {
        self.data().as_ffi()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("node {0:?} does not exist")]
    MissingNode(NodeId),
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("the scene root cannot be re-parented or removed")]
    RootImmutable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveShape {
    Box,
    Sphere,
    Cylinder,
    Cone,
    Plane,
}

impl PrimitiveShape {
    pub fn label(self) -> &'static str {
        match self {
            Self::Box => "Box",
            Self::Sphere => "Sphere",
            Self::Cylinder => "Cylinder",
            Self::Cone => "Cone",
            Self::Plane => "Plane",
        }
    }

    pub fn geometry(self) -> GeometryShape {
        match self {
            Self::Box => GeometryShape::cuboid(Vec3::ONE),
            Self::Sphere => GeometryShape::sphere(0.5),
            Self::Cylinder => GeometryShape::Cylinder {
                radius_top: 0.5,
                radius_bottom: 0.5,
                height: 1.0,
                radial_segments: 32,
            },
            Self::Cone => GeometryShape::Cylinder {
                radius_top: 0.0,
                radius_bottom: 0.5,
                height: 1.0,
                radial_segments: 32,
            },
            Self::Plane => GeometryShape::Plane {
                width: 1.0,
                height: 1.0,
            },
        }
    }
}

/// What the rendering library would call the object's class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Group,
    Mesh,
    Line,
    Light,
    Label,
}

/// Metadata tag the interaction core attaches to nodes it creates or
/// recognises. Classification dispatches on this, never on node names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Plain,
    Primitive(PrimitiveShape),
    Point,
    MeasurementGroup,
    /// Marker, line or label inside a measurement group.
    MeasurementPart,
    Ground,
    Environment,
    /// Outlines, gizmo handles, preview lines: never listed, never hit.
    Overlay,
}

impl NodeRole {
    pub fn is_helper(self) -> bool {
        !matches!(self, Self::Plain | Self::Primitive(_) | Self::Environment)
    }

    pub fn is_annotation(self) -> bool {
        matches!(
            self,
            Self::Point | Self::MeasurementGroup | Self::MeasurementPart
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightKind {
    Ambient,
    Directional,
    Point,
    Hemisphere,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub kind: LightKind,
    pub color: [f32; 3],
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// A node's material assignment: one material, or one per geometry group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MaterialSlot {
    Single(MaterialId),
    Multi(Vec<MaterialId>),
}

impl MaterialSlot {
    pub fn ids(&self) -> Vec<MaterialId> {
        match self {
            Self::Single(id) => vec![*id],
            Self::Multi(ids) => ids.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multi(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: MaterialId) -> bool {
        match self {
            Self::Single(existing) => *existing == id,
            Self::Multi(ids) => ids.contains(&id),
        }
    }

    /// Always yields a list, converting a single material into a one-element list.
    pub fn appended(&self, id: MaterialId) -> Self {
        let mut ids = self.ids();
        ids.push(id);
        Self::Multi(ids)
    }
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub kind: NodeKind,
    pub role: NodeRole,
    /// Helper flag for nodes whose role does not already imply it.
    pub helper: bool,
    pub transform: Transform,
    pub visible: bool,
    pub material: Option<MaterialSlot>,
    pub geometry: Option<GeometryId>,
    pub light: Option<Light>,
    pub label: Option<String>,
    pub measurement: Option<MeasurementData>,
    /// Key/value pairs captured at import time (e.g. glTF `extras`).
    pub metadata: BTreeMap<String, serde_json::Value>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            role: NodeRole::Plain,
            helper: false,
            transform: Transform::IDENTITY,
            visible: true,
            material: None,
            geometry: None,
            light: None,
            label: None,
            measurement: None,
            metadata: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    pub fn mesh(name: impl Into<String>, geometry: GeometryId, material: MaterialSlot) -> Self {
        let mut node = Self::new(name, NodeKind::Mesh);
        node.geometry = Some(geometry);
        node.material = Some(material);
        node
    }

    pub fn with_role(mut self, role: NodeRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn is_helper(&self) -> bool {
        self.helper || self.role.is_helper()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

#[derive(Debug, Clone)]
struct MaterialRecord {
    material: Material,
    /// Owned by a cache rather than by the nodes using it.
    shared: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub nodes: usize,
    pub materials: usize,
    pub geometries: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisposeReport {
    pub nodes: usize,
    pub materials: usize,
    pub geometries: usize,
}

pub struct Engine {
    nodes: SlotMap<NodeId, SceneNode>,
    materials: SlotMap<MaterialId, MaterialRecord>,
    geometries: SlotMap<GeometryId, GeometryShape>,
    root: NodeId,
    revision: u64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SceneNode::group("Scene"));
        Self {
            nodes,
            materials: SlotMap::with_key(),
            geometries: SlotMap::with_key(),
            root,
            revision: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Bumped on every change to the parent/child structure.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    // --------------------------------------------------------------------
    // Nodes
    // --------------------------------------------------------------------

    /// Creates a detached node. It is not part of the scene until attached.
    pub fn create_node(&mut self, mut node: SceneNode) -> NodeId {
        node.parent = None;
        node.children.clear();
        self.nodes.insert(node)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), EngineError> {
        if child == self.root {
            return Err(EngineError::RootImmutable);
        }
        if !self.nodes.contains_key(parent) {
            return Err(EngineError::MissingNode(parent));
        }
        if !self.nodes.contains_key(child) {
            return Err(EngineError::MissingNode(child));
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(EngineError::Cycle { parent, child });
        }
        self.unlink(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
        self.revision += 1;
        Ok(())
    }

    pub fn add_to_scene(&mut self, child: NodeId) -> Result<(), EngineError> {
        let root = self.root;
        self.add_child(root, child)
    }

    /// Removes the node from its parent, keeping it (and its subtree) alive.
    pub fn detach(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.nodes.contains_key(id) {
            return false;
        }
        let was_linked = self.unlink(id);
        if was_linked {
            self.revision += 1;
        }
        was_linked
    }

    fn unlink(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.nodes.get_mut(id).and_then(|node| node.parent.take()) else {
            return false;
        };
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.retain(|c| *c != id);
        }
        true
    }

    /// True when `ancestor` is a strict ancestor of `node`.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Reachable from the scene root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root || (self.nodes.contains_key(id) && self.is_ancestor(self.root, id))
    }

    /// Pre-order list of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.nodes.contains_key(id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            for child in self.children(current).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut matrix = self.nodes.get(id)?.transform.matrix();
        let mut current = self.parent(id);
        while let Some(parent) = current {
            let node = self.nodes.get(parent)?;
            matrix = node.transform.matrix() * matrix;
            current = node.parent;
        }
        Some(matrix)
    }

    pub fn world_position(&self, id: NodeId) -> Option<Vec3> {
        self.world_matrix(id)
            .map(|matrix| matrix.transform_point3(Vec3::ZERO))
    }

    /// The node and every ancestor are visible.
    pub fn is_visible_in_world(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            match self.nodes.get(node_id) {
                Some(node) if node.visible => current = node.parent,
                _ => return false,
            }
        }
        true
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|id| self.nodes[*id].name == name)
    }

    /// World-space bounds of every geometry in the subtree.
    pub fn subtree_bounds(&self, id: NodeId) -> Aabb {
        self.descendants(id)
            .into_iter()
            .filter_map(|node_id| {
                let geometry = self.nodes.get(node_id)?.geometry?;
                let shape = self.geometries.get(geometry)?;
                let world = self.world_matrix(node_id)?;
                Some(shape.bounds().transformed(&world))
            })
            .fold(Aabb::EMPTY, |acc, bounds| acc.union(&bounds))
    }

    /// Detaches the subtree and removes its nodes, disposing every owned
    /// (non-shared) material and geometry it references.
    pub fn dispose_subtree(&mut self, id: NodeId) -> Result<DisposeReport, EngineError> {
        if id == self.root {
            return Err(EngineError::RootImmutable);
        }
        if !self.nodes.contains_key(id) {
            return Err(EngineError::MissingNode(id));
        }
        self.detach(id);
        let ids = self.descendants(id);
        let mut materials = HashSet::new();
        let mut geometries = HashSet::new();
        let mut report = DisposeReport::default();
        for node_id in ids {
            if let Some(node) = self.nodes.remove(node_id) {
                report.nodes += 1;
                if let Some(slot) = &node.material {
                    materials.extend(slot.ids());
                }
                if let Some(geometry) = node.geometry {
                    geometries.insert(geometry);
                }
            }
        }
        for material in materials {
            let shared = self
                .materials
                .get(material)
                .map(|record| record.shared)
                .unwrap_or(true);
            if !shared && self.materials.remove(material).is_some() {
                report.materials += 1;
            }
        }
        for geometry in geometries {
            if self.geometries.remove(geometry).is_some() {
                report.geometries += 1;
            }
        }
        self.revision += 1;
        Ok(report)
    }

    // --------------------------------------------------------------------
    // Materials
    // --------------------------------------------------------------------

    pub fn create_material(&mut self, material: Material) -> MaterialId {
        self.materials.insert(MaterialRecord {
            material,
            shared: false,
        })
    }

    /// A material owned by a cache; subtree disposal leaves it alone.
    pub fn create_shared_material(&mut self, material: Material) -> MaterialId {
        self.materials.insert(MaterialRecord {
            material,
            shared: true,
        })
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id).map(|record| &record.material)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id).map(|record| &mut record.material)
    }

    pub fn dispose_material(&mut self, id: MaterialId) -> bool {
        if self.materials.remove(id).is_some() {
            true
        } else {
            log::warn!("Material {:?} disposed twice or never created", id);
            false
        }
    }

    // --------------------------------------------------------------------
    // Geometries
    // --------------------------------------------------------------------

    pub fn create_geometry(&mut self, shape: GeometryShape) -> GeometryId {
        self.geometries.insert(shape)
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&GeometryShape> {
        self.geometries.get(id)
    }

    pub fn dispose_geometry(&mut self, id: GeometryId) -> bool {
        if self.geometries.remove(id).is_some() {
            true
        } else {
            log::warn!("Geometry {:?} disposed twice or never created", id);
            false
        }
    }

    pub fn resource_counts(&self) -> ResourceCounts {
        ResourceCounts {
            nodes: self.nodes.len(),
            materials: self.materials.len(),
            geometries: self.geometries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(engine: &mut Engine, name: &str) -> NodeId {
        let geometry = engine.create_geometry(GeometryShape::cuboid(Vec3::ONE));
        let material = engine.create_material(Material::standard(name, [1.0, 1.0, 1.0]));
        engine.create_node(SceneNode::mesh(name, geometry, MaterialSlot::Single(material)))
    }

    #[test]
    fn attach_and_detach_track_revision() {
        let mut engine = Engine::new();
        let node = mesh(&mut engine, "Box");
        let before = engine.revision();
        engine.add_to_scene(node).unwrap();
        assert!(engine.is_attached(node));
        assert!(engine.revision() > before);
        assert!(engine.detach(node));
        assert!(!engine.is_attached(node));
        assert!(!engine.detach(node));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut engine = Engine::new();
        let a = engine.create_node(SceneNode::group("a"));
        let b = engine.create_node(SceneNode::group("b"));
        engine.add_child(a, b).unwrap();
        assert!(matches!(engine.add_child(b, a), Err(EngineError::Cycle { .. })));
        assert!(matches!(
            engine.add_child(a, engine.root()),
            Err(EngineError::RootImmutable)
        ));
    }

    #[test]
    fn dispose_subtree_frees_owned_resources_only() {
        let mut engine = Engine::new();
        let baseline = engine.resource_counts();
        let group = engine.create_node(SceneNode::group("group"));
        let child = mesh(&mut engine, "child");
        let shared = engine.create_shared_material(Material::standard("cache", [0.0, 0.0, 0.0]));
        let geometry = engine.create_geometry(GeometryShape::sphere(1.0));
        let shared_user =
            engine.create_node(SceneNode::mesh("user", geometry, MaterialSlot::Single(shared)));
        engine.add_child(group, child).unwrap();
        engine.add_child(group, shared_user).unwrap();
        engine.add_to_scene(group).unwrap();

        let report = engine.dispose_subtree(group).unwrap();
        assert_eq!(report.nodes, 3);
        assert_eq!(report.materials, 1);
        assert_eq!(report.geometries, 2);
        assert!(engine.material(shared).is_some());
        let counts = engine.resource_counts();
        assert_eq!(counts.nodes, baseline.nodes);
        assert_eq!(counts.materials, baseline.materials + 1);
        assert_eq!(counts.geometries, baseline.geometries);
    }

    #[test]
    fn double_dispose_is_reported_not_fatal() {
        let mut engine = Engine::new();
        let material = engine.create_material(Material::default());
        assert!(engine.dispose_material(material));
        assert!(!engine.dispose_material(material));
    }

    #[test]
    fn world_matrix_composes_parents() {
        let mut engine = Engine::new();
        let parent = engine.create_node(
            SceneNode::group("parent").with_transform(Transform::from_translation(Vec3::X)),
        );
        let child = engine.create_node(
            SceneNode::group("child").with_transform(Transform::from_translation(Vec3::Y)),
        );
        engine.add_child(parent, child).unwrap();
        engine.add_to_scene(parent).unwrap();
        let position = engine.world_position(child).unwrap();
        assert!((position - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn appended_slot_converts_single_to_list() {
        let mut engine = Engine::new();
        let a = engine.create_material(Material::default());
        let b = engine.create_material(Material::default());
        let slot = MaterialSlot::Single(a).appended(b);
        assert_eq!(slot, MaterialSlot::Multi(vec![a, b]));
    }
}

pub mod metadata;
pub mod serialization;
pub mod tree;

use crate::engine::{Aabb, NodeId};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// UI-facing classification of a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Mesh,
    Group,
    Light,
    Primitive,
    Ground,
    Point,
    Measurement,
    Model,
    Environment,
}

impl ObjectType {
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Mesh => "mesh",
            Self::Group => "group",
            Self::Light => "light",
            Self::Primitive => "primitive",
            Self::Ground => "ground",
            Self::Point => "point",
            Self::Measurement => "measurement",
            Self::Model => "model",
            Self::Environment => "environment",
        }
    }

    pub fn is_annotation(self) -> bool {
        matches!(self, Self::Point | Self::Measurement)
    }
}

/// Deterministic descriptor id: the same node always maps to the same id.
pub fn descriptor_id(prefix: &str, node: NodeId) -> String {
    format!("{}-{:x}", prefix, node.as_u64())
}

/// Straight-line distance. Measurement entities, group metadata and label
/// text all go through this one function.
pub fn measure_distance(start: Vec3, end: Vec3) -> f32 {
    (end - start).length()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementData {
    pub start_point: Vec3,
    pub end_point: Vec3,
    pub distance: f32,
}

impl MeasurementData {
    pub fn between(start: Vec3, end: Vec3) -> Self {
        Self {
            start_point: start,
            end_point: end,
            distance: measure_distance(start, end),
        }
    }
}

/// Rebuildable projection of one scene node. Rebuilt wholesale on every tree
/// pass and never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneObject {
    pub id: String,
    #[serde(skip)]
    pub node: NodeId,
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub children: Vec<SceneObject>,
    pub visible: bool,
    pub selected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement_data: Option<MeasurementData>,
}

impl SceneObject {
    /// Equality under (id, name, type, children); ignores flags.
    pub fn same_structure(&self, other: &SceneObject) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.object_type == other.object_type
            && trees_match(&self.children, &other.children)
    }

    pub fn find(&self, id: &str) -> Option<&SceneObject> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    pub fn count(&self) -> usize {
        1 + self.children.iter().map(SceneObject::count).sum::<usize>()
    }
}

pub fn trees_match(a: &[SceneObject], b: &[SceneObject]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_structure(y))
}

pub fn find_object<'a>(tree: &'a [SceneObject], id: &str) -> Option<&'a SceneObject> {
    tree.iter().find_map(|object| object.find(id))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelId(pub u64);

#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub id: ModelId,
    pub name: String,
    pub root: NodeId,
    pub bounds: Aabb,
    /// Source size in bytes.
    pub size: usize,
}

/// Measurement entity, backed one-to-one by a measurement group node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub id: String,
    #[serde(skip)]
    pub node: NodeId,
    pub start_point: Vec3,
    pub end_point: Vec3,
    pub distance: f32,
    pub label: String,
}

/// Models currently held by the scene, in load order.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: Vec<LoadedModel>,
    current: Option<ModelId>,
    next_id: u64,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            models: Vec::new(),
            current: None,
            next_id: 1,
        }
    }

    pub fn models(&self) -> &[LoadedModel] {
        &self.models
    }

    pub fn current(&self) -> Option<&LoadedModel> {
        let current = self.current?;
        self.get(current)
    }

    pub fn get(&self, id: ModelId) -> Option<&LoadedModel> {
        self.models.iter().find(|model| model.id == id)
    }

    pub fn by_root(&self, root: NodeId) -> Option<&LoadedModel> {
        self.models.iter().find(|model| model.root == root)
    }

    pub fn register(&mut self, name: String, root: NodeId, bounds: Aabb, size: usize) -> ModelId {
        let id = ModelId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        self.models.push(LoadedModel {
            id,
            name,
            root,
            bounds,
            size,
        });
        self.current = Some(id);
        id
    }

    pub fn set_current(&mut self, id: ModelId) -> bool {
        if self.get(id).is_some() {
            self.current = Some(id);
            true
        } else {
            false
        }
    }

    pub fn take(&mut self, id: ModelId) -> Option<LoadedModel> {
        let index = self.models.iter().position(|model| model.id == id)?;
        let model = self.models.remove(index);
        if self.current == Some(id) {
            self.current = self.models.last().map(|model| model.id);
        }
        Some(model)
    }

    pub fn clear(&mut self) -> Vec<LoadedModel> {
        self.current = None;
        std::mem::take(&mut self.models)
    }
}

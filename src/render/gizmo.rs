use crate::engine::{
    Engine, EngineError, GeometryShape, Material, MaterialSlot, NodeId, NodeRole, SceneNode, Transform,
};
use glam::{Quat, Vec3};

const HANDLE_THICKNESS: f32 = 0.04;

/// Translate handles attached around the moved object. Handles live in their
/// own overlay group under the scene root so deleting the target never takes
/// the gizmo's resources with it.
pub struct TransformGizmo {
    target: Option<NodeId>,
    root: Option<NodeId>,
    handles: Vec<NodeId>,
    axis_world_len: f32,
}

impl Default for TransformGizmo {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformGizmo {
    pub fn new() -> Self {
        Self {
            target: None,
            root: None,
            handles: Vec::new(),
            axis_world_len: 1.0,
        }
    }

    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    pub fn is_attached(&self) -> bool {
        self.target.is_some()
    }

    pub fn handles(&self) -> &[NodeId] {
        &self.handles
    }

    pub fn attach(&mut self, engine: &mut Engine, target: NodeId) -> Result<(), EngineError> {
        if self.target == Some(target) {
            return Ok(());
        }
        if !engine.contains(target) {
            return Err(EngineError::MissingNode(target));
        }
        self.detach(engine);

        let size = engine.subtree_bounds(target).size().max_element();
        self.axis_world_len = if size > 0.0 { size * 0.75 } else { 1.0 };

        let root = engine.create_node(SceneNode::group("transform-gizmo").with_role(NodeRole::Overlay));
        for (axis, color, name) in [
            (Vec3::X, [1.0, 0.31, 0.31], "gizmo-x"),
            (Vec3::Y, [0.31, 1.0, 0.31], "gizmo-y"),
            (Vec3::Z, [0.31, 0.63, 1.0], "gizmo-z"),
        ] {
            let extent = axis * self.axis_world_len + (Vec3::ONE - axis) * HANDLE_THICKNESS;
            let geometry = engine.create_geometry(GeometryShape::cuboid(extent));
            let material = engine.create_material(Material::basic(name, color).always_on_top());
            let node = engine.create_node(
                SceneNode::mesh(name, geometry, MaterialSlot::Single(material))
                    .with_role(NodeRole::Overlay)
                    .with_transform(Transform {
                        translation: axis * (self.axis_world_len * 0.5),
                        rotation: Quat::IDENTITY,
                        scale: Vec3::ONE,
                    }),
            );
            engine.add_child(root, node)?;
            self.handles.push(node);
        }
        engine.add_to_scene(root)?;

        self.root = Some(root);
        self.target = Some(target);
        self.sync(engine);
        log::debug!("Gizmo attached to {:?}", target);
        Ok(())
    }

    pub fn detach(&mut self, engine: &mut Engine) {
        self.target = None;
        self.handles.clear();
        if let Some(root) = self.root.take() {
            if let Err(err) = engine.dispose_subtree(root) {
                log::warn!("Failed to dispose gizmo handles: {err}");
            }
        }
    }

    /// Follows the target; detaches when the target is gone.
    pub fn sync(&mut self, engine: &mut Engine) {
        let (Some(target), Some(root)) = (self.target, self.root) else {
            return;
        };
        match engine.world_position(target) {
            Some(position) if engine.is_attached(target) => {
                if let Some(node) = engine.node_mut(root) {
                    node.transform.translation = position;
                }
            }
            _ => self.detach(engine),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_and_detach_leave_no_resources() {
        let mut engine = Engine::new();
        let target = engine.create_node(
            SceneNode::group("target").with_transform(Transform::from_translation(Vec3::new(1.0, 2.0, 3.0))),
        );
        engine.add_to_scene(target).unwrap();
        let baseline = engine.resource_counts();

        let mut gizmo = TransformGizmo::new();
        gizmo.attach(&mut engine, target).unwrap();
        assert_eq!(gizmo.target(), Some(target));
        assert_eq!(engine.resource_counts().nodes, baseline.nodes + 4);

        gizmo.detach(&mut engine);
        assert!(!gizmo.is_attached());
        assert_eq!(engine.resource_counts(), baseline);
    }

    #[test]
    fn sync_follows_target_and_drops_deleted_targets() {
        let mut engine = Engine::new();
        let target = engine.create_node(SceneNode::group("target"));
        engine.add_to_scene(target).unwrap();
        let mut gizmo = TransformGizmo::new();
        gizmo.attach(&mut engine, target).unwrap();

        engine.node_mut(target).unwrap().transform.translation = Vec3::X;
        gizmo.sync(&mut engine);
        let root = engine.find_by_name("transform-gizmo").unwrap();
        assert_eq!(engine.world_position(root).unwrap(), Vec3::X);

        engine.dispose_subtree(target).unwrap();
        gizmo.sync(&mut engine);
        assert!(!gizmo.is_attached());
        assert!(engine.find_by_name("transform-gizmo").is_none());
    }

    #[test]
    fn handles_span_each_axis_and_draw_on_top() {
        let mut engine = Engine::new();
        let target = engine.create_node(SceneNode::group("target"));
        engine.add_to_scene(target).unwrap();
        let mut gizmo = TransformGizmo::new();
        gizmo.attach(&mut engine, target).unwrap();

        assert_eq!(gizmo.handles().len(), 3);
        for &handle in gizmo.handles() {
            let node = engine.node(handle).unwrap();
            assert!(node.visible);
            assert_eq!(node.role, NodeRole::Overlay);
        }
        let x = engine.find_by_name("gizmo-x").unwrap();
        assert_eq!(engine.node(x).unwrap().transform.translation, Vec3::X * 0.5);
    }
}

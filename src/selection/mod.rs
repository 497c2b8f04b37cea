//! Selection set and highlight effects.
//!
//! A node is in the selection set exactly when its highlight is applied; both
//! are stored in one entry so they cannot drift apart. Highlight strategy
//! depends on what was selected:
//!
//! * meshes, groups and primitives get the material manager's selection
//!   overlay on every covered mesh plus an edge outline child per mesh;
//! * point markers and measurement groups get a colour and scale cue whose
//!   previous values are recorded and written back on removal.

use crate::engine::{
    Engine, GeometryShape, Material, MaterialId, NodeId, NodeKind, NodeRole, SceneNode,
};
use crate::materials::MaterialManager;
use glam::Vec3;
use std::collections::HashSet;

const CUE_SCALE: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighlightStyle {
    pub outline_color: [f32; 3],
    pub cue_color: [f32; 3],
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            outline_color: [1.0, 0.6, 0.1],
            cue_color: [0.2, 0.9, 1.0],
        }
    }
}

#[derive(Debug)]
enum Highlight {
    Overlay {
        meshes: Vec<NodeId>,
        outlines: Vec<NodeId>,
    },
    Cue {
        scales: Vec<(NodeId, Vec3)>,
        colors: Vec<(MaterialId, [f32; 3])>,
    },
}

#[derive(Debug)]
struct Entry {
    node: NodeId,
    highlight: Highlight,
}

pub struct SelectionManager {
    style: HighlightStyle,
    entries: Vec<Entry>,
}

impl SelectionManager {
    pub fn new(style: HighlightStyle) -> Self {
        Self {
            style,
            entries: Vec::new(),
        }
    }

    /// Selected nodes in selection order.
    pub fn selected(&self) -> Vec<NodeId> {
        self.entries.iter().map(|entry| entry.node).collect()
    }

    pub fn selected_set(&self) -> HashSet<NodeId> {
        self.entries.iter().map(|entry| entry.node).collect()
    }

    pub fn primary(&self) -> Option<NodeId> {
        self.entries.last().map(|entry| entry.node)
    }

    pub fn is_selected(&self, node: NodeId) -> bool {
        self.entries.iter().any(|entry| entry.node == node)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Plain select replaces the selection; multi-select toggles membership.
    /// `None` clears on a plain select and does nothing on multi-select.
    /// Returns whether the selection changed.
    pub fn select(
        &mut self,
        engine: &mut Engine,
        materials: &mut MaterialManager,
        target: Option<NodeId>,
        multi: bool,
    ) -> bool {
        let target = match target {
            Some(node) if engine.contains(node) => node,
            Some(node) => {
                log::warn!("select: node {:?} does not exist", node);
                return false;
            }
            None if multi => return false,
            None => {
                let changed = !self.entries.is_empty();
                self.clear(engine, materials);
                return changed;
            }
        };

        if !self.is_selected(target) && !Self::is_highlightable(engine, target) {
            log::debug!("select: {:?} has nothing to highlight", target);
            return false;
        }

        if multi {
            if self.is_selected(target) {
                self.remove(engine, materials, target);
            } else {
                self.add(engine, materials, target);
            }
            return true;
        }

        if self.entries.len() == 1 && self.entries[0].node == target {
            return false;
        }
        self.clear(engine, materials);
        self.add(engine, materials, target);
        true
    }

    pub fn clear(&mut self, engine: &mut Engine, materials: &mut MaterialManager) {
        while let Some(entry) = self.entries.pop() {
            self.reverse(engine, materials, entry);
        }
    }

    pub fn deselect(&mut self, engine: &mut Engine, materials: &mut MaterialManager, node: NodeId) -> bool {
        if !self.is_selected(node) {
            return false;
        }
        self.remove(engine, materials, node);
        true
    }

    /// Drops every selected node inside `root`'s subtree, reversing its
    /// highlight. Run before the subtree is disposed. Returns whether the
    /// selection changed.
    pub fn forget_subtree(&mut self, engine: &mut Engine, materials: &mut MaterialManager, root: NodeId) -> bool {
        let doomed: Vec<NodeId> = self
            .entries
            .iter()
            .map(|entry| entry.node)
            .filter(|node| *node == root || engine.is_ancestor(root, *node))
            .collect();
        for node in &doomed {
            self.remove(engine, materials, *node);
        }
        !doomed.is_empty()
    }

    /// Reverses all highlights and frees the outline resources.
    pub fn teardown(&mut self, engine: &mut Engine, materials: &mut MaterialManager) {
        if !self.entries.is_empty() {
            log::debug!("Selection teardown with {} selected", self.entries.len());
        }
        self.clear(engine, materials);
    }

    /// Annotations take a cue; anything else needs at least one mesh the
    /// overlay can cover. Lights, empty groups and helpers are not selectable.
    fn is_highlightable(engine: &Engine, node: NodeId) -> bool {
        match engine.node(node).map(|n| n.role) {
            Some(NodeRole::Point | NodeRole::MeasurementGroup) => true,
            Some(_) => engine.descendants(node).into_iter().any(|id| Self::is_overlay_target(engine, id)),
            None => false,
        }
    }

    fn is_overlay_target(engine: &Engine, id: NodeId) -> bool {
        engine.node(id).is_some_and(|n| {
            n.kind == NodeKind::Mesh && n.material.is_some() && n.geometry.is_some() && !n.is_helper()
        })
    }

    fn add(&mut self, engine: &mut Engine, materials: &mut MaterialManager, node: NodeId) {
        let role = engine.node(node).map(|n| n.role).unwrap_or(NodeRole::Plain);
        let highlight = match role {
            NodeRole::Point | NodeRole::MeasurementGroup => self.apply_cue(engine, node),
            _ => self.apply_overlay(engine, materials, node),
        };
        self.entries.push(Entry { node, highlight });
    }

    fn remove(&mut self, engine: &mut Engine, materials: &mut MaterialManager, node: NodeId) {
        if let Some(index) = self.entries.iter().position(|entry| entry.node == node) {
            let entry = self.entries.remove(index);
            self.reverse(engine, materials, entry);
        }
    }

    fn apply_overlay(&self, engine: &mut Engine, materials: &mut MaterialManager, node: NodeId) -> Highlight {
        let meshes: Vec<NodeId> = engine
            .descendants(node)
            .into_iter()
            .filter(|id| Self::is_overlay_target(engine, *id))
            .collect();

        let mut outlines = Vec::with_capacity(meshes.len());
        for &mesh in &meshes {
            materials.set_selection_effect(engine, mesh, true);
            if let Some(outline) = self.create_outline(engine, mesh) {
                outlines.push(outline);
            }
        }
        Highlight::Overlay { meshes, outlines }
    }

    fn create_outline(&self, engine: &mut Engine, mesh: NodeId) -> Option<NodeId> {
        let shape = engine
            .node(mesh)
            .and_then(|n| n.geometry)
            .and_then(|g| engine.geometry(g))
            .map(GeometryShape::edges_of)?;
        let geometry = engine.create_geometry(shape);
        let material = engine.create_material(Material::line("selection-outline", self.style.outline_color));
        let mut outline = SceneNode::new("selection-outline", NodeKind::Line).with_role(NodeRole::Overlay);
        outline.geometry = Some(geometry);
        outline.material = Some(crate::engine::MaterialSlot::Single(material));
        let outline = engine.create_node(outline);
        match engine.add_child(mesh, outline) {
            Ok(()) => Some(outline),
            Err(err) => {
                log::warn!("Could not attach selection outline: {err}");
                // The node is detached; disposing it still frees its resources.
                let _ = engine.dispose_subtree(outline);
                None
            }
        }
    }

    fn apply_cue(&self, engine: &mut Engine, node: NodeId) -> Highlight {
        let mut scales = Vec::new();
        let mut colors = Vec::new();
        for id in engine.descendants(node) {
            let Some(n) = engine.node_mut(id) else {
                continue;
            };
            if n.kind != NodeKind::Mesh && n.kind != NodeKind::Line {
                continue;
            }
            let material_ids = n.material.as_ref().map(|slot| slot.ids()).unwrap_or_default();
            if n.kind == NodeKind::Mesh {
                scales.push((id, n.transform.scale));
                n.transform.scale *= CUE_SCALE;
            }
            for material in material_ids {
                if let Some(m) = engine.material_mut(material) {
                    colors.push((material, m.color));
                    m.color = self.style.cue_color;
                }
            }
        }
        Highlight::Cue { scales, colors }
    }

    fn reverse(&self, engine: &mut Engine, materials: &mut MaterialManager, entry: Entry) {
        match entry.highlight {
            Highlight::Overlay { meshes, outlines } => {
                for outline in outlines {
                    if engine.contains(outline) {
                        if let Err(err) = engine.dispose_subtree(outline) {
                            log::warn!("Failed to dispose selection outline: {err}");
                        }
                    }
                }
                for mesh in meshes {
                    // Another selected entry may still cover this mesh.
                    if !self.covers(mesh) {
                        materials.set_selection_effect(engine, mesh, false);
                    }
                }
            }
            Highlight::Cue { scales, colors } => {
                for (node, scale) in scales {
                    if let Some(n) = engine.node_mut(node) {
                        n.transform.scale = scale;
                    }
                }
                for (material, color) in colors.into_iter().rev() {
                    if let Some(m) = engine.material_mut(material) {
                        m.color = color;
                    }
                }
            }
        }
    }

    fn covers(&self, mesh: NodeId) -> bool {
        self.entries.iter().any(|entry| match &entry.highlight {
            Highlight::Overlay { meshes, .. } => meshes.contains(&mesh),
            Highlight::Cue { .. } => false,
        })
    }
}

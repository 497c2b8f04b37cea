//! Material and effect resource manager.
//!
//! Sole writer of a tracked node's material slot. Every effect (custom
//! material type, hover tint, selection overlay) is folded into one state
//! record per node, and the slot is recomputed from that record plus the
//! original slot captured the first time any effect touched the node. When
//! the last effect goes away the original slot is put back and the capture
//! forgotten.
//!
//! Precedence: a custom material type replaces the slot outright; hover and
//! selection are still tracked but only change appearance on the default
//! path.

pub mod presets;

pub use presets::{MaterialParameters, MaterialType, ParameterPatch};

use crate::engine::{Engine, Material, MaterialId, MaterialSlot, NodeId};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialState {
    pub material_type: MaterialType,
    pub parameters: MaterialParameters,
    pub is_hovered: bool,
    pub is_selected: bool,
}

impl Default for MaterialState {
    fn default() -> Self {
        Self {
            material_type: MaterialType::Default,
            parameters: MaterialParameters::default(),
            is_hovered: false,
            is_selected: false,
        }
    }
}

impl MaterialState {
    fn has_effect(&self) -> bool {
        self.material_type.is_custom() || self.is_hovered || self.is_selected
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectColors {
    pub hover: [f32; 3],
    pub selection: [f32; 3],
    pub overlay_opacity: f32,
}

impl Default for EffectColors {
    fn default() -> Self {
        Self {
            hover: [0.3, 0.6, 1.0],
            selection: [1.0, 0.6, 0.1],
            overlay_opacity: 0.25,
        }
    }
}

struct Tracked {
    state: MaterialState,
    original: MaterialSlot,
    /// Tinted copies of the original materials, live while hovered on the
    /// default path. Owned here, never shared.
    hover_tints: Vec<MaterialId>,
}

pub struct MaterialManager {
    colors: EffectColors,
    cache: HashMap<String, MaterialId>,
    overlay: Option<MaterialId>,
    tracked: HashMap<NodeId, Tracked>,
    disposed: bool,
}

impl MaterialManager {
    pub fn new(colors: EffectColors) -> Self {
        Self {
            colors,
            cache: HashMap::new(),
            overlay: None,
            tracked: HashMap::new(),
            disposed: false,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Shared translucent material appended for the selection effect.
    pub fn overlay_material(&self) -> Option<MaterialId> {
        self.overlay
    }

    pub fn get_state(&self, node: NodeId) -> Option<MaterialState> {
        self.tracked.get(&node).map(|tracked| tracked.state.clone())
    }

    pub fn set_material_type(
        &mut self,
        engine: &mut Engine,
        node: NodeId,
        material_type: MaterialType,
        parameters: MaterialParameters,
    ) {
        self.update_state(engine, node, "set_material_type", |state| {
            state.material_type = material_type;
            state.parameters = parameters;
        });
    }

    pub fn update_parameters(&mut self, engine: &mut Engine, node: NodeId, patch: &ParameterPatch) {
        if !self.disposed && !self.tracked.contains_key(&node) {
            log::warn!("update_parameters on untracked node {:?}", node);
            return;
        }
        self.update_state(engine, node, "update_parameters", |state| {
            state.parameters = state.parameters.patched(patch);
        });
    }

    pub fn set_hover_effect(&mut self, engine: &mut Engine, node: NodeId, hovered: bool) {
        self.update_state(engine, node, "set_hover_effect", |state| {
            state.is_hovered = hovered;
        });
    }

    pub fn set_selection_effect(&mut self, engine: &mut Engine, node: NodeId, selected: bool) {
        self.update_state(engine, node, "set_selection_effect", |state| {
            state.is_selected = selected;
        });
    }

    fn update_state(
        &mut self,
        engine: &mut Engine,
        node: NodeId,
        op: &str,
        change: impl FnOnce(&mut MaterialState),
    ) {
        if self.disposed {
            log::warn!("{op} called after the material manager was disposed");
            return;
        }
        let Some(current_slot) = engine.node(node).and_then(|n| n.material.clone()) else {
            log::warn!("{op}: node {:?} is missing or has no material", node);
            return;
        };

        let mut tracked = match self.tracked.remove(&node) {
            Some(tracked) => tracked,
            None => Tracked {
                state: MaterialState::default(),
                original: current_slot,
                hover_tints: Vec::new(),
            },
        };
        change(&mut tracked.state);

        if !tracked.state.has_effect() {
            self.restore(engine, node, tracked);
            return;
        }
        self.apply(engine, node, &mut tracked);
        self.tracked.insert(node, tracked);
    }

    fn apply(&mut self, engine: &mut Engine, node: NodeId, tracked: &mut Tracked) {
        let state = &tracked.state;
        let default_hover = !state.material_type.is_custom() && state.is_hovered;
        if !default_hover {
            dispose_all(engine, &mut tracked.hover_tints);
        }

        let slot = if state.material_type.is_custom() {
            MaterialSlot::Single(self.cached_material(engine, state.material_type, &state.parameters))
        } else {
            let base = if default_hover {
                if tracked.hover_tints.is_empty() {
                    tracked.hover_tints = self.create_hover_tints(engine, &tracked.original);
                }
                match &tracked.original {
                    MaterialSlot::Single(_) if tracked.hover_tints.len() == 1 => {
                        MaterialSlot::Single(tracked.hover_tints[0])
                    }
                    _ => MaterialSlot::Multi(tracked.hover_tints.clone()),
                }
            } else {
                tracked.original.clone()
            };
            if state.is_selected {
                base.appended(self.overlay(engine))
            } else {
                base
            }
        };

        if let Some(n) = engine.node_mut(node) {
            n.material = Some(slot);
        }
    }

    fn restore(&mut self, engine: &mut Engine, node: NodeId, mut tracked: Tracked) {
        if let Some(n) = engine.node_mut(node) {
            n.material = Some(tracked.original);
        }
        dispose_all(engine, &mut tracked.hover_tints);
    }

    fn create_hover_tints(&self, engine: &mut Engine, original: &MaterialSlot) -> Vec<MaterialId> {
        original
            .ids()
            .into_iter()
            .map(|id| {
                let mut tint = engine.material(id).cloned().unwrap_or_default();
                tint.name = format!("{} (hover)", tint.name);
                tint.emissive = self.colors.hover;
                tint.emissive_intensity = 0.4;
                engine.create_material(tint)
            })
            .collect()
    }

    fn overlay(&mut self, engine: &mut Engine) -> MaterialId {
        if let Some(id) = self.overlay {
            return id;
        }
        let material = Material::basic("selection-overlay", self.colors.selection)
            .with_opacity(self.colors.overlay_opacity);
        let material = Material {
            depth_write: false,
            ..material
        };
        let id = engine.create_shared_material(material);
        self.overlay = Some(id);
        id
    }

    fn cached_material(
        &mut self,
        engine: &mut Engine,
        material_type: MaterialType,
        params: &MaterialParameters,
    ) -> MaterialId {
        let key = presets::cache_key(material_type, params);
        if let Some(id) = self.cache.get(&key) {
            log::debug!("Material cache hit for {key}");
            return *id;
        }
        let id = engine.create_shared_material(presets::build_material(material_type, params));
        self.cache.insert(key, id);
        id
    }

    /// Puts the original slot back on `node` and forgets it. Must run before
    /// the node is disposed, so that disposal frees the original materials
    /// rather than the effect materials.
    pub fn release(&mut self, engine: &mut Engine, node: NodeId) {
        if let Some(tracked) = self.tracked.remove(&node) {
            self.restore(engine, node, tracked);
        }
    }

    pub fn release_subtree(&mut self, engine: &mut Engine, root: NodeId) {
        for node in engine.descendants(root) {
            self.release(engine, node);
        }
    }

    pub fn clear_all(&mut self, engine: &mut Engine) {
        if self.disposed {
            log::warn!("clear_all called after the material manager was disposed");
            return;
        }
        let tracked: Vec<(NodeId, Tracked)> = self.tracked.drain().collect();
        for (node, entry) in tracked {
            self.restore(engine, node, entry);
        }
    }

    pub fn dispose(&mut self, engine: &mut Engine) {
        if self.disposed {
            log::warn!("Material manager disposed twice");
            return;
        }
        self.clear_all(engine);
        for (_, id) in self.cache.drain() {
            engine.dispose_material(id);
        }
        if let Some(id) = self.overlay.take() {
            engine.dispose_material(id);
        }
        self.disposed = true;
    }
}

fn dispose_all(engine: &mut Engine, ids: &mut Vec<MaterialId>) {
    for id in ids.drain(..) {
        engine.dispose_material(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{GeometryShape, SceneNode};

    fn setup(slot_len: usize) -> (Engine, NodeId, MaterialSlot) {
        let mut engine = Engine::new();
        let geometry = engine.create_geometry(GeometryShape::sphere(1.0));
        let ids: Vec<MaterialId> = (0..slot_len)
            .map(|i| engine.create_material(Material::standard(&format!("m{i}"), [0.5, 0.5, 0.5])))
            .collect();
        let slot = if slot_len == 1 {
            MaterialSlot::Single(ids[0])
        } else {
            MaterialSlot::Multi(ids)
        };
        let node = engine.create_node(SceneNode::mesh("mesh", geometry, slot.clone()));
        engine.add_to_scene(node).unwrap();
        (engine, node, slot)
    }

    fn slot(engine: &Engine, node: NodeId) -> MaterialSlot {
        engine.node(node).unwrap().material.clone().unwrap()
    }

    #[test]
    fn selection_round_trip_restores_single_material() {
        let (mut engine, node, original) = setup(1);
        let originals: Vec<Material> = original
            .ids()
            .iter()
            .map(|id| engine.material(*id).unwrap().clone())
            .collect();
        let mut manager = MaterialManager::new(EffectColors::default());

        manager.set_selection_effect(&mut engine, node, true);
        let selected = slot(&engine, node);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected.ids()[1], manager.overlay_material().unwrap());

        manager.set_selection_effect(&mut engine, node, false);
        assert_eq!(slot(&engine, node), original);
        for (id, before) in original.ids().iter().zip(&originals) {
            assert_eq!(engine.material(*id).unwrap(), before);
        }
        assert!(manager.get_state(node).is_none());
    }

    #[test]
    fn hover_and_selection_interleave_without_leaks() {
        let (mut engine, node, original) = setup(2);
        let mut manager = MaterialManager::new(EffectColors::default());
        manager.set_selection_effect(&mut engine, node, true);
        let baseline = engine.resource_counts();

        manager.set_hover_effect(&mut engine, node, true);
        let hovered = slot(&engine, node);
        assert_eq!(hovered.len(), 3);
        assert!(!hovered.contains(original.ids()[0]));
        assert_eq!(engine.resource_counts().materials, baseline.materials + 2);

        manager.set_selection_effect(&mut engine, node, false);
        assert_eq!(slot(&engine, node).len(), 2);
        manager.set_hover_effect(&mut engine, node, false);
        assert_eq!(slot(&engine, node), original);
        assert_eq!(engine.resource_counts().materials, baseline.materials);
    }

    #[test]
    fn custom_type_wins_over_hover_and_selection() {
        let (mut engine, node, original) = setup(1);
        let mut manager = MaterialManager::new(EffectColors::default());
        manager.set_material_type(&mut engine, node, MaterialType::Metal, MaterialParameters::default());
        let metal = slot(&engine, node);
        manager.set_hover_effect(&mut engine, node, true);
        manager.set_selection_effect(&mut engine, node, true);
        assert_eq!(slot(&engine, node), metal);
        let state = manager.get_state(node).unwrap();
        assert!(state.is_hovered && state.is_selected);

        manager.set_material_type(&mut engine, node, MaterialType::Default, MaterialParameters::default());
        assert_eq!(slot(&engine, node).len(), 2, "selection overlay shows again");
        manager.set_hover_effect(&mut engine, node, false);
        manager.set_selection_effect(&mut engine, node, false);
        assert_eq!(slot(&engine, node), original);
    }

    #[test]
    fn identical_requests_share_one_material() {
        let (mut engine, a, _) = setup(1);
        let geometry = engine.create_geometry(GeometryShape::sphere(1.0));
        let material = engine.create_material(Material::default());
        let b = engine.create_node(SceneNode::mesh("b", geometry, MaterialSlot::Single(material)));
        let mut manager = MaterialManager::new(EffectColors::default());
        let params = MaterialParameters::default();
        manager.set_material_type(&mut engine, a, MaterialType::Glass, params.clone());
        manager.set_material_type(&mut engine, b, MaterialType::Glass, params);
        assert_eq!(slot(&engine, a), slot(&engine, b));
        assert_eq!(manager.cached_count(), 1);

        manager.update_parameters(
            &mut engine,
            b,
            &ParameterPatch {
                opacity: Some(0.3),
                ..ParameterPatch::default()
            },
        );
        assert_ne!(slot(&engine, a), slot(&engine, b));
        assert_eq!(manager.cached_count(), 2);
    }

    #[test]
    fn dispose_restores_and_turns_calls_into_noops() {
        let (mut engine, node, original) = setup(1);
        let baseline = engine.resource_counts();
        let mut manager = MaterialManager::new(EffectColors::default());
        manager.set_material_type(&mut engine, node, MaterialType::Wood, MaterialParameters::default());
        manager.set_selection_effect(&mut engine, node, true);
        manager.dispose(&mut engine);

        assert_eq!(slot(&engine, node), original);
        assert_eq!(engine.resource_counts(), baseline);

        manager.set_selection_effect(&mut engine, node, true);
        manager.clear_all(&mut engine);
        manager.dispose(&mut engine);
        assert_eq!(slot(&engine, node), original);
        assert!(manager.get_state(node).is_none());
    }

    #[test]
    fn missing_node_is_a_noop() {
        let (mut engine, node, _) = setup(1);
        engine.dispose_subtree(node).unwrap();
        let mut manager = MaterialManager::new(EffectColors::default());
        manager.set_hover_effect(&mut engine, node, true);
        manager.update_parameters(&mut engine, node, &ParameterPatch::default());
        assert_eq!(manager.tracked_count(), 0);
    }

    #[test]
    fn release_before_disposal_frees_originals() {
        let (mut engine, node, _) = setup(1);
        let mut manager = MaterialManager::new(EffectColors::default());
        manager.set_selection_effect(&mut engine, node, true);
        manager.set_hover_effect(&mut engine, node, true);
        let before = engine.resource_counts();
        manager.release_subtree(&mut engine, node);
        let report = engine.dispose_subtree(node).unwrap();
        assert_eq!(report.materials, 1);
        // Overlay material is shared and stays with the manager.
        assert_eq!(engine.resource_counts().materials, before.materials - 2);
    }
}

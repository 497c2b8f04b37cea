//! Scene tree synchronizer.
//!
//! Projects the live scene graph plus the set of loaded models into the
//! ordered, typed hierarchy the object panels render. The projection is
//! rebuilt wholesale on every pass; [`TreeSynchronizer`] debounces rebuild
//! requests so a streaming import produces one rebuild rather than hundreds.

use crate::app::timing::{Debouncer, LoadingIndicator};
use crate::engine::{Engine, NodeId, NodeRole};
use crate::scene::metadata::classify;
use crate::scene::{descriptor_id, ModelRegistry, ObjectType, SceneObject};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Deeper hierarchies than this are treated as corrupt.
pub const MAX_TREE_DEPTH: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("node {child:?} listed as a child of {parent:?} no longer exists")]
    DanglingChild { parent: NodeId, child: NodeId },
    #[error("scene hierarchy below {0:?} exceeds the maximum depth")]
    DepthExceeded(NodeId),
}

pub type Result<T> = std::result::Result<T, TreeError>;

/// Everything besides the scene graph that shapes a rebuild.
#[derive(Debug, Clone, Copy)]
pub struct TreeInputs<'a> {
    pub models: &'a ModelRegistry,
    pub show_primitives: bool,
    pub selection: &'a HashSet<NodeId>,
}

pub fn build_scene_tree(engine: &Engine, inputs: TreeInputs<'_>) -> Result<Vec<SceneObject>> {
    let mut builder = Builder {
        engine,
        inputs,
        emitted: HashSet::new(),
    };
    let mut out = Vec::new();

    for model in inputs.models.models() {
        if !engine.is_attached(model.root) {
            continue;
        }
        let mut object = builder.describe(model.root, ObjectType::Group, 0)?;
        object.id = descriptor_id(ObjectType::Model.id_prefix(), model.root);
        object.name = model.name.clone();
        // The whole model subtree belongs to the model entry, listed or not.
        builder.emitted.extend(engine.descendants(model.root));
        out.push(object);
    }

    let root = engine.root();
    for id in engine.descendants(root).into_iter().skip(1) {
        if builder.emitted.contains(&id) {
            continue;
        }
        let Some(node) = engine.node(id) else {
            continue;
        };
        let top_level = node.parent() == Some(root);
        let object_type = match node.role {
            NodeRole::Primitive(_) if inputs.show_primitives => ObjectType::Primitive,
            NodeRole::Primitive(_) => continue,
            NodeRole::Point => ObjectType::Point,
            NodeRole::MeasurementGroup => ObjectType::Measurement,
            NodeRole::Ground => ObjectType::Ground,
            NodeRole::Environment if top_level => ObjectType::Environment,
            _ if top_level && !node.is_helper() => match classify(engine, id) {
                Some(object_type) => object_type,
                None => continue,
            },
            _ => continue,
        };
        out.push(builder.describe(id, object_type, 0)?);
    }
    Ok(out)
}

struct Builder<'a> {
    engine: &'a Engine,
    inputs: TreeInputs<'a>,
    emitted: HashSet<NodeId>,
}

impl Builder<'_> {
    fn describe(&mut self, id: NodeId, object_type: ObjectType, depth: usize) -> Result<SceneObject> {
        if depth > MAX_TREE_DEPTH {
            return Err(TreeError::DepthExceeded(id));
        }
        let engine = self.engine;
        let node = engine
            .node(id)
            .ok_or(TreeError::DanglingChild {
                parent: engine.parent(id).unwrap_or(engine.root()),
                child: id,
            })?;
        self.emitted.insert(id);

        let mut children = Vec::new();
        // Annotation subtrees are listed as a single entry.
        if !object_type.is_annotation() {
            for &child in node.children() {
                let child_node = engine.node(child).ok_or(TreeError::DanglingChild {
                    parent: id,
                    child,
                })?;
                if child_node.is_helper() {
                    continue;
                }
                if matches!(child_node.role, NodeRole::Primitive(_)) && !self.inputs.show_primitives {
                    continue;
                }
                let Some(child_type) = classify(engine, child) else {
                    continue;
                };
                children.push(self.describe(child, child_type, depth + 1)?);
            }
        }

        Ok(SceneObject {
            id: descriptor_id(object_type.id_prefix(), id),
            node: id,
            name: node.name.clone(),
            object_type,
            children,
            visible: node.visible,
            selected: self.inputs.selection.contains(&id),
            measurement_data: node.measurement,
        })
    }
}

/// Post-pass filter. A branch is pruned only when neither it nor any
/// descendant matches; matches keep their ancestor chain.
pub fn filter_tree(tree: &[SceneObject], search: &str, selected_only: bool) -> Vec<SceneObject> {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() && !selected_only {
        return tree.to_vec();
    }
    tree.iter()
        .filter_map(|object| filter_object(object, &needle, selected_only))
        .collect()
}

fn filter_object(object: &SceneObject, needle: &str, selected_only: bool) -> Option<SceneObject> {
    let children: Vec<SceneObject> = object
        .children
        .iter()
        .filter_map(|child| filter_object(child, needle, selected_only))
        .collect();
    let name_matches = needle.is_empty() || object.name.to_lowercase().contains(needle);
    let matches = name_matches && (!selected_only || object.selected);
    if !matches && children.is_empty() {
        return None;
    }
    Some(SceneObject {
        children,
        ..object.clone()
    })
}

/// Outcome of one [`TreeSynchronizer::poll`] that ran a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildOutcome {
    /// The new tree differs from the previous one (flags included).
    pub changed: bool,
    pub failed: bool,
}

pub struct TreeSynchronizer {
    debouncer: Debouncer,
    loading: LoadingIndicator,
    tree: Vec<SceneObject>,
    rebuilds: u64,
}

impl TreeSynchronizer {
    pub fn new(debounce: Duration, loading_min: Duration, loading_stability: Duration) -> Self {
        Self {
            debouncer: Debouncer::new(debounce),
            loading: LoadingIndicator::new(loading_min, loading_stability),
            tree: Vec::new(),
            rebuilds: 0,
        }
    }

    pub fn tree(&self) -> &[SceneObject] {
        &self.tree
    }

    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn request(&mut self, now: Instant) {
        self.debouncer.request(now);
    }

    /// Rebuild on the next poll without waiting for the debounce window.
    pub fn request_now(&mut self, now: Instant) {
        self.debouncer.force(now);
    }

    pub fn filtered(&self, search: &str, selected_only: bool) -> Vec<SceneObject> {
        filter_tree(&self.tree, search, selected_only)
    }

    /// Marks external work (imports) that should keep the loading state up.
    pub fn set_busy(&mut self, busy: bool, now: Instant) {
        self.loading.set_busy(busy || self.debouncer.is_pending(), now);
    }

    /// Returns the loading flag when it flipped during this call.
    pub fn tick_loading(&mut self, now: Instant) -> Option<bool> {
        self.loading.tick(now)
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_visible()
    }

    /// Runs the pending rebuild if its window has elapsed. A failed traversal
    /// resets the tree to empty rather than leaving it half built.
    pub fn poll(&mut self, now: Instant, engine: &Engine, inputs: TreeInputs<'_>) -> Option<RebuildOutcome> {
        if !self.debouncer.begin(now) {
            return None;
        }
        let (tree, failed) = match build_scene_tree(engine, inputs) {
            Ok(tree) => (tree, false),
            Err(err) => {
                log::warn!("Scene tree rebuild failed, resetting to empty: {err}");
                (Vec::new(), true)
            }
        };
        self.debouncer.finish();
        self.rebuilds += 1;
        let changed = tree != self.tree;
        log::debug!(
            "Scene tree rebuilt ({} top-level, {} total, changed={})",
            tree.len(),
            tree.iter().map(SceneObject::count).sum::<usize>(),
            changed
        );
        self.tree = tree;
        Some(RebuildOutcome { changed, failed })
    }
}

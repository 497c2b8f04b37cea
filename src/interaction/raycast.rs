//! Raycast index: the cached list of hit-testable nodes and the nearest-hit
//! query over it.
//!
//! Candidates are visible, geometry-bearing meshes reachable from the scene
//! root. Helpers are excluded except point markers and measurement parts,
//! which are user-interactable. The nearest hit along the ray wins; equal
//! distances resolve to the candidate met first in depth-first order.

use crate::engine::{Engine, NodeId, NodeKind, NodeRole, Ray};
use glam::Vec3;

#[derive(Debug, thiserror::Error)]
pub enum RaycastError {
    #[error("candidate {0:?} no longer exists")]
    MissingNode(NodeId),
    #[error("candidate {0:?} is not attached to the scene")]
    DetachedNode(NodeId),
    #[error("ray is not finite or has zero direction")]
    NonFiniteRay,
}

/// Narrows the canonical candidate list for a particular tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HitFilter {
    #[default]
    All,
    /// Scene meshes only: annotations are skipped.
    MeshesOnly,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub node: NodeId,
    pub point: Vec3,
    pub distance: f32,
}

#[derive(Default)]
pub struct RaycastIndex {
    /// Candidates plus the scene revision they were collected at.
    cache: Option<(u64, Vec<NodeId>)>,
}

impl RaycastIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the cached candidate list. Call after structural mutation.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    pub fn intersectable(&mut self, engine: &Engine) -> &[NodeId] {
        let revision = engine.revision();
        let stale = match &self.cache {
            Some((cached_at, _)) => *cached_at != revision,
            None => true,
        };
        if stale {
            let candidates = collect_candidates(engine);
            log::debug!("Raycast index rebuilt: {} candidates", candidates.len());
            self.cache = Some((revision, candidates));
        }
        self.cache
            .as_ref()
            .map(|(_, candidates)| candidates.as_slice())
            .unwrap_or(&[])
    }

    pub fn try_intersect(
        &mut self,
        engine: &Engine,
        ray: &Ray,
        filter: HitFilter,
    ) -> Result<Option<Hit>, RaycastError> {
        if !ray.is_valid() {
            return Err(RaycastError::NonFiniteRay);
        }
        let mut nearest: Option<Hit> = None;
        for &id in self.intersectable(engine) {
            let node = engine.node(id).ok_or(RaycastError::MissingNode(id))?;
            if !engine.is_attached(id) {
                return Err(RaycastError::DetachedNode(id));
            }
            if filter == HitFilter::MeshesOnly && node.role.is_annotation() {
                continue;
            }
            if !engine.is_visible_in_world(id) {
                continue;
            }
            let Some(shape) = node.geometry.and_then(|g| engine.geometry(g)) else {
                continue;
            };
            let Some(world) = engine.world_matrix(id) else {
                continue;
            };
            if world.determinant().abs() < f32::EPSILON {
                continue;
            }
            let local = ray.transformed(&world.inverse());
            let Some(t) = shape.intersect_local(&local) else {
                continue;
            };
            let point = world.transform_point3(local.at(t));
            let distance = (point - ray.origin).length();
            if nearest.map_or(true, |best| distance < best.distance) {
                nearest = Some(Hit {
                    node: id,
                    point,
                    distance,
                });
            }
        }
        Ok(nearest)
    }

    /// Hit-test that never fails: errors are logged and reported as a miss.
    pub fn intersect(&mut self, engine: &Engine, ray: &Ray, filter: HitFilter) -> Option<Hit> {
        match self.try_intersect(engine, ray, filter) {
            Ok(hit) => hit,
            Err(err) => {
                log::warn!("Hit test failed, treating as miss: {err}");
                self.invalidate();
                None
            }
        }
    }
}

fn collect_candidates(engine: &Engine) -> Vec<NodeId> {
    engine
        .descendants(engine.root())
        .into_iter()
        .filter(|id| {
            let Some(node) = engine.node(*id) else {
                return false;
            };
            let interactable_helper = matches!(node.role, NodeRole::Point | NodeRole::MeasurementPart);
            node.kind == NodeKind::Mesh
                && (!node.is_helper() || interactable_helper)
                && node
                    .geometry
                    .and_then(|g| engine.geometry(g))
                    .is_some_and(|shape| shape.is_surface())
        })
        .collect()
}

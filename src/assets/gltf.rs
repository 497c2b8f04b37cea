//! glTF 2.0 importer.
//!
//! Parses `.gltf` (with embedded buffers) and `.glb` through the `gltf` crate
//! and builds the node hierarchy with its transforms, materials and `extras`.
//! Every mesh becomes one triangle mesh holding the decoded positions and
//! indices of all its primitives.

use super::{AssetError, CancelToken, ImportRequest, ImportedModel, ModelFormat, ModelImporter};
use crate::engine::{Engine, GeometryShape, Material, MaterialId, MaterialSlot, NodeId, SceneNode, Transform};
use glam::{Quat, Vec3};
use gltf::mesh::Mode;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

const MAX_NODE_DEPTH: usize = 256;

#[derive(Debug, Default)]
pub struct GltfImporter;

impl GltfImporter {
    pub fn new() -> Self {
        Self
    }
}

impl ModelImporter for GltfImporter {
    fn import(
        &mut self,
        engine: &mut Engine,
        request: &ImportRequest,
        cancel: &CancelToken,
    ) -> Result<ImportedModel, AssetError> {
        if request.format == ModelFormat::Fbx {
            return Err(AssetError::UnsupportedFormat {
                name: request.name.clone(),
            });
        }
        let (document, buffers, _images) = gltf::import_slice(&request.bytes).map_err(|err| AssetError::Parse {
            name: request.name.clone(),
            reason: err.to_string(),
        })?;

        let scene = document.default_scene().or_else(|| document.scenes().next());
        let roots: Vec<gltf::Node> = match &scene {
            Some(scene) => scene.nodes().collect(),
            None => top_level_nodes(&document),
        };
        if roots.is_empty() {
            return Err(AssetError::EmptyModel {
                name: request.name.clone(),
            });
        }

        let stem = Path::new(&request.name)
            .file_stem()
            .and_then(|value| value.to_str())
            .unwrap_or("model");
        let name = scene
            .as_ref()
            .and_then(|scene| scene.name())
            .map(str::to_string)
            .unwrap_or_else(|| stem.to_string());
        let mut root = SceneNode::group(name);
        if let Some(scene) = &scene {
            merge_extras(&mut root.metadata, scene.extras());
        }
        let root = engine.create_node(root);

        let mut builder = Builder {
            buffers: &buffers,
            name: &request.name,
            cancel,
            materials: HashMap::new(),
            visited: HashSet::new(),
        };
        for node in roots {
            if let Err(err) = builder.build_node(engine, root, &node, 0) {
                // Partial subtree is detached; disposing it frees every node
                // and resource created so far.
                if let Err(dispose_err) = engine.dispose_subtree(root) {
                    log::warn!("Failed to dispose partial import of {}: {dispose_err}", request.name);
                }
                return Err(err);
            }
        }

        let bounds = engine.subtree_bounds(root);
        log::info!(
            "Imported {} ({} nodes, bounds {:?})",
            request.name,
            engine.descendants(root).len(),
            bounds.size()
        );
        Ok(ImportedModel { root, bounds })
    }
}

struct Builder<'a> {
    buffers: &'a [gltf::buffer::Data],
    name: &'a str,
    cancel: &'a CancelToken,
    materials: HashMap<usize, MaterialId>,
    visited: HashSet<usize>,
}

impl Builder<'_> {
    fn build_node(
        &mut self,
        engine: &mut Engine,
        parent: NodeId,
        def: &gltf::Node,
        depth: usize,
    ) -> Result<(), AssetError> {
        if self.cancel.is_cancelled() {
            return Err(AssetError::Aborted {
                name: self.name.to_string(),
            });
        }
        if depth > MAX_NODE_DEPTH {
            return Err(self.parse_error(format!("node hierarchy deeper than {MAX_NODE_DEPTH}")));
        }
        let index = def.index();
        if !self.visited.insert(index) {
            return Err(self.parse_error(format!("node {index} is referenced more than once")));
        }

        let name = def.name().map(str::to_string).unwrap_or_else(|| format!("node_{index}"));
        let mut node = match def.mesh() {
            Some(mesh) => self.mesh_node(engine, name, &mesh)?,
            None => SceneNode::group(name),
        };
        node.transform = node_transform(def);
        merge_extras(&mut node.metadata, def.extras());
        let id = engine.create_node(node);
        if let Err(err) = engine.add_child(parent, id) {
            let _ = engine.dispose_subtree(id);
            return Err(err.into());
        }

        for child in def.children() {
            self.build_node(engine, id, &child, depth + 1)?;
        }
        Ok(())
    }

    /// One scene node per glTF mesh; several primitives become a
    /// multi-material slot over a single combined geometry.
    fn mesh_node(&mut self, engine: &mut Engine, name: String, mesh: &gltf::Mesh) -> Result<SceneNode, AssetError> {
        // Decode everything before creating resources so a failure cannot
        // strand materials outside the subtree.
        let buffers = self.buffers;
        let mut positions: Vec<Vec3> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();
        for primitive in mesh.primitives() {
            let reader = primitive.reader(move |buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
            let Some(read) = reader.read_positions() else {
                return Err(self.parse_error(format!("mesh {} has a primitive without POSITION", mesh.index())));
            };
            let local: Vec<Vec3> = read.map(Vec3::from).collect();
            let count = local.len() as u32;
            let order: Vec<u32> = match reader.read_indices() {
                Some(read) => read.into_u32().collect(),
                None => (0..count).collect(),
            };
            if let Some(bad) = order.iter().find(|index| **index >= count) {
                return Err(self.parse_error(format!("mesh {} indexes vertex {bad} of {count}", mesh.index())));
            }
            let base = positions.len() as u32;
            indices.extend(triangle_list(primitive.mode(), &order).into_iter().map(|index| index + base));
            positions.extend(local);
        }
        if positions.is_empty() {
            return Ok(SceneNode::group(name));
        }

        let slots: Vec<MaterialId> = mesh
            .primitives()
            .map(|primitive| self.material(engine, &primitive.material(), mesh.name()))
            .collect();
        let slot = if slots.len() == 1 {
            MaterialSlot::Single(slots[0])
        } else {
            MaterialSlot::Multi(slots)
        };
        let geometry = engine.create_geometry(GeometryShape::TriangleMesh { positions, indices });
        Ok(SceneNode::mesh(name, geometry, slot))
    }

    /// Materials are created once per glTF material index and reused by every
    /// primitive that names it. Primitives without one get their own default.
    fn material(&mut self, engine: &mut Engine, def: &gltf::Material, mesh_name: Option<&str>) -> MaterialId {
        let Some(index) = def.index() else {
            return engine.create_material(Material::standard(mesh_name.unwrap_or("default"), [0.8, 0.8, 0.8]));
        };
        *self
            .materials
            .entry(index)
            .or_insert_with(|| engine.create_material(convert_material(def, index)))
    }

    fn parse_error(&self, reason: String) -> AssetError {
        AssetError::Parse {
            name: self.name.to_string(),
            reason,
        }
    }
}

/// Expands strips and fans into a plain triangle list. Point and line
/// primitives contribute vertices for bounds but nothing to hit.
fn triangle_list(mode: Mode, order: &[u32]) -> Vec<u32> {
    match mode {
        Mode::Triangles => order.chunks_exact(3).flatten().copied().collect(),
        Mode::TriangleStrip => order
            .windows(3)
            .enumerate()
            .flat_map(|(i, w)| if i % 2 == 0 { [w[0], w[1], w[2]] } else { [w[1], w[0], w[2]] })
            .collect(),
        Mode::TriangleFan => match order.split_first() {
            Some((first, rest)) => rest.windows(2).flat_map(|w| [*first, w[0], w[1]]).collect(),
            None => Vec::new(),
        },
        Mode::Points | Mode::Lines | Mode::LineLoop | Mode::LineStrip => Vec::new(),
    }
}

fn convert_material(def: &gltf::Material, index: usize) -> Material {
    let name = def.name().map(str::to_string).unwrap_or_else(|| format!("material_{index}"));
    let pbr = def.pbr_metallic_roughness();
    let [r, g, b, a] = pbr.base_color_factor();
    let mut material = Material::standard(&name, [r, g, b]);
    material.metalness = pbr.metallic_factor().clamp(0.0, 1.0);
    material.roughness = pbr.roughness_factor().clamp(0.0, 1.0);
    material.emissive = def.emissive_factor();
    if def.alpha_mode() == gltf::material::AlphaMode::Blend {
        material = material.with_opacity(a);
    }
    material
}

fn node_transform(def: &gltf::Node) -> Transform {
    let (translation, [x, y, z, w], scale) = def.transform().decomposed();
    Transform {
        translation: Vec3::from(translation),
        rotation: Quat::from_xyzw(x, y, z, w).normalize(),
        scale: Vec3::from(scale),
    }
}

/// Nodes nobody lists as a child, for documents without a `scenes` array.
fn top_level_nodes(document: &gltf::Document) -> Vec<gltf::Node<'_>> {
    let children: HashSet<usize> = document
        .nodes()
        .flat_map(|node| node.children().map(|child| child.index()).collect::<Vec<_>>())
        .collect();
    document.nodes().filter(|node| !children.contains(&node.index())).collect()
}

fn merge_extras(metadata: &mut BTreeMap<String, serde_json::Value>, extras: &gltf::json::Extras) {
    let Some(raw) = extras.as_ref() else {
        return;
    };
    match serde_json::from_str::<serde_json::Value>(raw.get()) {
        Ok(serde_json::Value::Object(map)) => metadata.extend(map),
        Ok(serde_json::Value::Null) => {}
        Ok(other) => {
            metadata.insert("extras".to_string(), other);
        }
        Err(err) => log::warn!("Ignoring unreadable extras: {err}"),
    }
}

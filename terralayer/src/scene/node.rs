//! Scene node types.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use glam::DVec3;

use crate::geometry::SolidDescriptor;

/// Handle of an attached node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Anything the loaders hand to a [`SceneGraph`](super::SceneGraph).
#[derive(Debug, Clone, PartialEq)]
pub enum SceneNode {
    /// Container for other nodes.
    Group(Group),
    /// Renderable geometry owning its GPU resources.
    Mesh(Mesh),
    /// Non-visual, property-bearing entity.
    Entity(Entity),
}

impl SceneNode {
    pub fn name(&self) -> &str {
        match self {
            SceneNode::Group(g) => &g.name,
            SceneNode::Mesh(m) => &m.name,
            SceneNode::Entity(e) => &e.name,
        }
    }

    pub fn as_mesh(&self) -> Option<&Mesh> {
        match self {
            SceneNode::Mesh(m) => Some(m),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    pub name: String,
    pub position: DVec3,
    /// Free-form metadata such as `units`.
    pub metadata: BTreeMap<String, String>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub geometry: Geometry,
    pub material: Material,
    /// Position in scene coordinates (Y-up, origin-relative).
    pub position: DVec3,
}

impl Mesh {
    pub fn new(
        name: impl Into<String>,
        geometry: Geometry,
        material: Material,
        position: DVec3,
    ) -> Self {
        Self {
            name: name.into(),
            geometry,
            material,
            position,
        }
    }
}

/// Mesh geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Ground-aligned rectangle in the scene XZ plane, centered on the mesh
    /// position. `width` runs along X (east), `depth` along -Z (north).
    Plane { width: f64, depth: f64 },
    /// Extruded profile. Profile coordinates are map-plane offsets from the
    /// origin (x east, y north); the solid rises along +Y.
    Extrusion(SolidDescriptor),
    /// Connected line through scene-space vertices.
    Polyline(Vec<DVec3>),
    /// Point markers at scene-space positions.
    Points(Vec<DVec3>),
}

/// RGBA8 texture.
#[derive(Clone, PartialEq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub pixels: Bytes,
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub color: [f32; 4],
    pub texture: Option<Texture>,
    pub transparent: bool,
    pub double_sided: bool,
}

impl Material {
    pub fn solid(color: [f32; 4]) -> Self {
        Self {
            color,
            texture: None,
            transparent: color[3] < 1.0,
            double_sided: false,
        }
    }

    /// Unlit textured material used for raster planes.
    pub fn textured(texture: Texture, transparent: bool) -> Self {
        Self {
            color: [1.0, 1.0, 1.0, 1.0],
            texture: Some(texture),
            transparent,
            double_sided: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entity {
    pub name: String,
    pub properties: BTreeMap<String, String>,
}

impl Entity {
    pub fn new(name: impl Into<String>, properties: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }
}

/// A detached node with its children, ready to be attached in one go.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneTree {
    pub node: SceneNode,
    pub children: Vec<SceneTree>,
}

impl SceneTree {
    pub fn leaf(node: SceneNode) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    pub fn with_children(node: SceneNode, children: Vec<SceneTree>) -> Self {
        Self { node, children }
    }

    /// Number of nodes in the tree, root included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SceneTree::node_count).sum::<usize>()
    }

    /// Meshes anywhere in the tree.
    pub fn meshes(&self) -> Vec<&Mesh> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(tree) = stack.pop() {
            if let SceneNode::Mesh(m) = &tree.node {
                out.push(m);
            }
            stack.extend(tree.children.iter().rev());
        }
        out
    }
}

//! Scene graph boundary.
//!
//! Loaders never own a renderer. They build [`SceneNode`]s and hand them to
//! a [`SceneGraph`], which owns the attached nodes and their resources.
//! [`MemoryScene`] is the in-process implementation used by the CLI and the
//! tests. [`LayerManager`] tracks which logical layer owns which nodes.

mod lifecycle;
mod memory;
mod node;

pub use lifecycle::{FeatureEntry, LayerManager, UpdateHook};
pub use memory::{MemoryScene, ResourceCounts, SceneEvent};
pub use node::{Entity, Geometry, Group, Material, Mesh, NodeId, SceneNode, SceneTree, Texture};

/// Minimal scene graph contract.
pub trait SceneGraph {
    /// Attaches `node` under `parent` (or at the root) and returns its
    /// handle.
    fn attach(&mut self, parent: Option<NodeId>, node: SceneNode) -> NodeId;

    /// Disposes the resources of `id` and all its descendants, then removes
    /// them from the graph. Returns `false` if `id` is not attached.
    fn detach(&mut self, id: NodeId) -> bool;

    fn contains(&self, id: NodeId) -> bool;

    fn node(&self, id: NodeId) -> Option<&SceneNode>;

    fn children(&self, id: NodeId) -> Vec<NodeId>;
}

/// Attaches a detached tree under `parent`, depth first, and returns the
/// handle of its root.
pub fn attach_tree<S>(scene: &mut S, parent: Option<NodeId>, tree: SceneTree) -> NodeId
where
    S: SceneGraph + ?Sized,
{
    let SceneTree { node, children } = tree;
    let id = scene.attach(parent, node);
    for child in children {
        attach_tree(scene, Some(id), child);
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn test_attach_tree() {
        let tree = SceneTree::with_children(
            SceneNode::Group(Group::new("layer")),
            vec![
                SceneTree::leaf(SceneNode::Entity(Entity::new("a_nv", Default::default()))),
                SceneTree::leaf(SceneNode::Mesh(Mesh::new(
                    "b",
                    Geometry::Points(vec![DVec3::ZERO]),
                    Material::solid([1.0, 0.0, 0.0, 1.0]),
                    DVec3::ZERO,
                ))),
            ],
        );
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.meshes().len(), 1);

        let mut scene = MemoryScene::new();
        let root = attach_tree(&mut scene, None, tree);

        assert_eq!(scene.children(root).len(), 2);
        assert_eq!(scene.resources().geometries, 1);
        assert_eq!(scene.node(root).map(SceneNode::name), Some("layer"));
    }
}

//! In-memory scene graph.
//!
//! Keeps nodes in an arena and counts live GPU-style resources so tests and
//! the CLI can check that every detached mesh released its geometry,
//! material and texture.

use std::collections::HashMap;

use serde::Serialize;
use tracing::trace;

use super::node::{NodeId, SceneNode};
use super::SceneGraph;

/// Observable scene mutations, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneEvent {
    Attached { id: NodeId, name: String },
    /// Resources of a node were released.
    Disposed { id: NodeId },
    /// The node was unlinked from its parent.
    Detached { id: NodeId },
}

/// Live resource counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceCounts {
    pub geometries: usize,
    pub materials: usize,
    pub textures: usize,
}

struct Slot {
    node: SceneNode,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed [`SceneGraph`].
#[derive(Default)]
pub struct MemoryScene {
    slots: HashMap<NodeId, Slot>,
    roots: Vec<NodeId>,
    next_id: u64,
    resources: ResourceCounts,
    events: Vec<SceneEvent>,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resources(&self) -> ResourceCounts {
        self.resources
    }

    pub fn events(&self) -> &[SceneEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Number of attached nodes, at any depth.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Attached nodes with the given name.
    pub fn find_by_name(&self, name: &str) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.node.name() == name)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// Number of attached mesh nodes.
    pub fn mesh_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot.node, SceneNode::Mesh(_)))
            .count()
    }

    fn acquire(&mut self, node: &SceneNode) {
        if let SceneNode::Mesh(mesh) = node {
            self.resources.geometries += 1;
            self.resources.materials += 1;
            if mesh.material.texture.is_some() {
                self.resources.textures += 1;
            }
        }
    }

    fn dispose(&mut self, id: NodeId) {
        let textured = match self.slots.get(&id).map(|slot| &slot.node) {
            Some(SceneNode::Mesh(mesh)) => mesh.material.texture.is_some(),
            _ => return,
        };
        self.resources.geometries = self.resources.geometries.saturating_sub(1);
        self.resources.materials = self.resources.materials.saturating_sub(1);
        if textured {
            self.resources.textures = self.resources.textures.saturating_sub(1);
        }
        self.events.push(SceneEvent::Disposed { id });
    }

    /// Post-order list of `id` and its descendants.
    fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![(id, false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                order.push(current);
                continue;
            }
            stack.push((current, true));
            if let Some(slot) = self.slots.get(&current) {
                for child in slot.children.iter().rev() {
                    stack.push((*child, false));
                }
            }
        }
        order
    }
}

impl SceneGraph for MemoryScene {
    fn attach(&mut self, parent: Option<NodeId>, node: SceneNode) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);

        let parent = parent.filter(|p| self.slots.contains_key(p));
        match parent {
            Some(p) => {
                if let Some(slot) = self.slots.get_mut(&p) {
                    slot.children.push(id);
                }
            }
            None => self.roots.push(id),
        }

        self.acquire(&node);
        trace!(id = %id, name = node.name(), "Scene node attached");
        self.events.push(SceneEvent::Attached {
            id,
            name: node.name().to_string(),
        });
        self.slots.insert(
            id,
            Slot {
                node,
                parent,
                children: Vec::new(),
            },
        );
        id
    }

    fn detach(&mut self, id: NodeId) -> bool {
        if !self.slots.contains_key(&id) {
            return false;
        }

        let subtree = self.subtree(id);
        for node in &subtree {
            self.dispose(*node);
        }

        let parent = self.slots.get(&id).and_then(|slot| slot.parent);
        match parent {
            Some(p) => {
                if let Some(slot) = self.slots.get_mut(&p) {
                    slot.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }
        for node in subtree {
            self.slots.remove(&node);
            self.events.push(SceneEvent::Detached { id: node });
        }
        trace!(id = %id, "Scene node detached");
        true
    }

    fn contains(&self, id: NodeId) -> bool {
        self.slots.contains_key(&id)
    }

    fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.slots.get(&id).map(|slot| &slot.node)
    }

    fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.slots
            .get(&id)
            .map(|slot| slot.children.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Geometry, Group, Material, Mesh, Texture};
    use bytes::Bytes;
    use glam::DVec3;

    fn textured_plane(name: &str) -> SceneNode {
        let texture = Texture {
            width: 1,
            height: 1,
            pixels: Bytes::from_static(&[0, 0, 0, 255]),
        };
        SceneNode::Mesh(Mesh::new(
            name,
            Geometry::Plane {
                width: 10.0,
                depth: 10.0,
            },
            Material::textured(texture, false),
            DVec3::ZERO,
        ))
    }

    #[test]
    fn test_attach_counts_resources() {
        let mut scene = MemoryScene::new();
        let group = scene.attach(None, SceneNode::Group(Group::new("layer")));
        let mesh = scene.attach(Some(group), textured_plane("tile"));

        assert_eq!(scene.children(group), vec![mesh]);
        assert_eq!(
            scene.resources(),
            ResourceCounts {
                geometries: 1,
                materials: 1,
                textures: 1
            }
        );
    }

    #[test]
    fn test_detach_group_disposes_subtree_before_unlinking() {
        let mut scene = MemoryScene::new();
        let group = scene.attach(None, SceneNode::Group(Group::new("layer")));
        let a = scene.attach(Some(group), textured_plane("a"));
        let b = scene.attach(Some(group), textured_plane("b"));
        scene.clear_events();

        assert!(scene.detach(group));

        assert!(scene.is_empty());
        assert_eq!(scene.resources(), ResourceCounts::default());
        assert_eq!(
            scene.events(),
            &[
                SceneEvent::Disposed { id: a },
                SceneEvent::Disposed { id: b },
                SceneEvent::Detached { id: a },
                SceneEvent::Detached { id: b },
                SceneEvent::Detached { id: group },
            ]
        );
    }

    #[test]
    fn test_detach_child_keeps_parent() {
        let mut scene = MemoryScene::new();
        let group = scene.attach(None, SceneNode::Group(Group::new("layer")));
        let a = scene.attach(Some(group), textured_plane("a"));

        assert!(scene.detach(a));
        assert!(scene.contains(group));
        assert!(scene.children(group).is_empty());
        assert!(!scene.detach(a), "second detach is a no-op");
    }

    #[test]
    fn test_find_by_name() {
        let mut scene = MemoryScene::new();
        let id = scene.attach(None, SceneNode::Group(Group::new("roads")));
        scene.attach(None, SceneNode::Group(Group::new("rivers")));

        assert_eq!(scene.find_by_name("roads"), vec![id]);
        assert!(scene.find_by_name("lakes").is_empty());
    }
}

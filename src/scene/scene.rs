use std::borrow::Cow;

use slotmap::SlotMap;

use super::light::Light;
use super::mesh::Mesh;
use super::{LightKey, MeshKey, NodeKey};

/// What a scene node carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneObject {
    Group,
    Light(LightKey),
    Mesh(MeshKey),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: Cow<'static, str>,
    pub object: SceneObject,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
}

impl Node {
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }
}

/// Ordered object tree.
///
/// Children keep insertion order, and every traversal is a pre-order
/// depth-first walk from the root, so two walks within one frame visit
/// objects in exactly the same order.
pub struct Scene {
    nodes: SlotMap<NodeKey, Node>,
    lights: SlotMap<LightKey, Light>,
    meshes: SlotMap<MeshKey, Mesh>,
    root: NodeKey,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node {
            name: Cow::Borrowed("Root"),
            object: SceneObject::Group,
            parent: None,
            children: Vec::new(),
        });
        Self {
            nodes,
            lights: SlotMap::with_key(),
            meshes: SlotMap::with_key(),
            root,
        }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeKey {
        self.root
    }

    #[inline]
    #[must_use]
    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    fn attach(
        &mut self,
        parent: NodeKey,
        name: Cow<'static, str>,
        object: SceneObject,
    ) -> NodeKey {
        let parent = if self.nodes.contains_key(parent) {
            parent
        } else {
            log::warn!("Scene: parent node {parent:?} missing, attaching '{name}' to root");
            self.root
        };
        let key = self.nodes.insert(Node {
            name,
            object,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(key);
        key
    }

    pub fn add_group(&mut self, parent: NodeKey, name: impl Into<Cow<'static, str>>) -> NodeKey {
        self.attach(parent, name.into(), SceneObject::Group)
    }

    pub fn add_light(
        &mut self,
        parent: NodeKey,
        name: impl Into<Cow<'static, str>>,
        light: Light,
    ) -> (NodeKey, LightKey) {
        let light_key = self.lights.insert(light);
        let node = self.attach(parent, name.into(), SceneObject::Light(light_key));
        (node, light_key)
    }

    pub fn add_mesh(
        &mut self,
        parent: NodeKey,
        name: impl Into<Cow<'static, str>>,
        mesh: Mesh,
    ) -> (NodeKey, MeshKey) {
        let mesh_key = self.meshes.insert(mesh);
        let node = self.attach(parent, name.into(), SceneObject::Mesh(mesh_key));
        (node, mesh_key)
    }

    /// Removes a node and its whole subtree together with the lights and
    /// meshes they carry. The root cannot be removed.
    pub fn remove_node(&mut self, key: NodeKey) {
        if key == self.root {
            return;
        }
        let Some(node) = self.nodes.get(key) else {
            return;
        };
        if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(p)) {
            parent.children.retain(|&c| c != key);
        }

        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.remove(current) else {
                continue;
            };
            match node.object {
                SceneObject::Light(light) => {
                    self.lights.remove(light);
                }
                SceneObject::Mesh(mesh) => {
                    self.meshes.remove(mesh);
                }
                SceneObject::Group => {}
            }
            stack.extend(node.children);
        }
    }

    #[inline]
    #[must_use]
    pub fn light(&self, key: LightKey) -> Option<&Light> {
        self.lights.get(key)
    }

    #[inline]
    pub fn light_mut(&mut self, key: LightKey) -> Option<&mut Light> {
        self.lights.get_mut(key)
    }

    #[inline]
    #[must_use]
    pub fn mesh(&self, key: MeshKey) -> Option<&Mesh> {
        self.meshes.get(key)
    }

    /// Pre-order depth-first walk over every node, regardless of visibility.
    pub fn traverse(&self, mut visit: impl FnMut(NodeKey, &Node)) {
        let mut stack = vec![self.root];
        while let Some(key) = stack.pop() {
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            visit(key, node);
            stack.extend(node.children.iter().rev().copied());
        }
    }

    /// Appends every light in traversal order to `out`.
    pub fn collect_lights(&self, out: &mut Vec<LightKey>) {
        self.traverse(|_, node| {
            if let SceneObject::Light(light) = node.object {
                out.push(light);
            }
        });
    }

    /// Appends every mesh in traversal order to `out`.
    pub fn collect_meshes(&self, out: &mut Vec<MeshKey>) {
        self.traverse(|_, node| {
            if let SceneObject::Mesh(mesh) = node.object {
                out.push(mesh);
            }
        });
    }
}

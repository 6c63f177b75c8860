//! Scene storage and staged mutations
//!
//! [`SceneData`] owns every node, the per-system-frame staging arrays, the
//! component containers and the scene-level event channels. Node mutators
//! live here and take the node id, so no node ever needs a pointer back to
//! its scene.
//!
//! Mutators only stage. A node gets at most one [`RootMod`] and one
//! [`TransformMod`] per system frame; mutating twice updates the existing
//! record. The staged records are applied by the scene at the end of the
//! system frame.

use std::any::TypeId;
use std::collections::BTreeMap;

use strata_core::{NodeId, TypeRegistry};
use strata_event::EventChannel;
use strata_math::{Quat, Vec3};
use strata_structures::SlotMap;

use crate::component::ComponentContainer;
use crate::config::SceneConfig;
use crate::events::{EDebugDrawLine, EDestroyedNode, ENewNode, ENodeRootChanged, ENodeTransformChanged};
use crate::node::{ModState, Node};

/// Staged parent change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RootMod {
    pub node: NodeId,
    pub root: NodeId,
}

/// Staged local transform
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformMod {
    pub node: NodeId,
    pub position: Vec3,
    pub scale: Vec3,
    pub rotation: Quat,
}

/// Storage behind a [`Scene`](crate::Scene)
pub struct SceneData {
    // Nodes
    pub(crate) nodes: SlotMap<Node, NodeId>,
    pub(crate) root_nodes: Vec<NodeId>,

    // Staging for the current system frame
    pub(crate) root_mods: Vec<RootMod>,
    pub(crate) transform_mods: Vec<TransformMod>,
    pub(crate) system_new_nodes: Vec<NodeId>,
    pub(crate) system_destroyed_nodes: Vec<NodeId>,

    // Bookkeeping for the current update frame
    pub(crate) update_modified_nodes: Vec<NodeId>,
    pub(crate) update_destroyed_nodes: Vec<NodeId>,

    // Components
    pub(crate) components: BTreeMap<TypeId, Box<dyn ComponentContainer>>,
    pub(crate) component_types: TypeRegistry,

    // Channels
    pub(crate) new_node_channel: EventChannel,
    pub(crate) destroyed_node_channel: EventChannel,
    pub(crate) node_local_transform_changed_channel: EventChannel,
    pub(crate) node_world_transform_changed_channel: EventChannel,
    pub(crate) node_root_changed_channel: EventChannel,
    pub(crate) debug_draw_line_channel: EventChannel,
}

impl SceneData {
    pub(crate) fn new(config: &SceneConfig) -> Self {
        let capacity = config.node_channel_capacity;
        Self {
            nodes: SlotMap::new(),
            root_nodes: Vec::new(),
            root_mods: Vec::new(),
            transform_mods: Vec::new(),
            system_new_nodes: Vec::new(),
            system_destroyed_nodes: Vec::new(),
            update_modified_nodes: Vec::new(),
            update_destroyed_nodes: Vec::new(),
            components: BTreeMap::new(),
            component_types: TypeRegistry::new(),
            new_node_channel: EventChannel::new::<ENewNode>(capacity),
            destroyed_node_channel: EventChannel::new::<EDestroyedNode>(capacity),
            node_local_transform_changed_channel: EventChannel::new::<ENodeTransformChanged>(capacity),
            node_world_transform_changed_channel: EventChannel::new::<ENodeTransformChanged>(capacity),
            node_root_changed_channel: EventChannel::new::<ENodeRootChanged>(capacity),
            debug_draw_line_channel: EventChannel::new::<EDebugDrawLine>(config.debug_draw_channel_capacity),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Ordered ids of the current root nodes
    pub fn root_nodes(&self) -> &[NodeId] {
        &self.root_nodes
    }

    /// Root changes staged during the current system frame
    pub fn root_mods(&self) -> &[RootMod] {
        &self.root_mods
    }

    /// Transform changes staged during the current system frame
    pub fn transform_mods(&self) -> &[TransformMod] {
        &self.transform_mods
    }

    pub fn component_types(&self) -> &TypeRegistry {
        &self.component_types
    }

    // ========================================================================
    // Node mutators
    // ========================================================================

    /// Stage a new parent for `node`. A null `root` detaches it.
    ///
    /// Targets that no longer exist when the change is applied leave the
    /// node without a parent.
    pub fn set_root(&mut self, node: NodeId, root: NodeId) {
        if node == root {
            log::warn!("Node {} cannot be its own root", node);
            return;
        }

        if let Some(m) = self.root_mod(node) {
            m.root = root;
        }
    }

    /// Stage `child` to be attached under `parent`
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.set_root(child, parent);
    }

    /// Stage `child` to be detached, if `parent` is its pending root
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        let pending = self.nodes.get(child).map(|n| n.pending_root(self));
        if pending == Some(parent) {
            self.set_root(child, NodeId::NULL);
        }
    }

    pub fn set_local_position(&mut self, node: NodeId, position: Vec3) {
        if let Some(m) = self.transform_mod(node) {
            m.position = position;
        }
    }

    pub fn set_local_scale(&mut self, node: NodeId, scale: Vec3) {
        if let Some(m) = self.transform_mod(node) {
            m.scale = scale;
        }
    }

    pub fn set_local_rotation(&mut self, node: NodeId, rotation: Quat) {
        if let Some(m) = self.transform_mod(node) {
            m.rotation = rotation;
        }
    }

    /// Offset the pending local position
    pub fn translate(&mut self, node: NodeId, offset: Vec3) {
        if let Some(m) = self.transform_mod(node) {
            m.position += offset;
        }
    }

    /// Rename a node. Names are not hierarchy state and apply immediately.
    pub fn set_name(&mut self, node: NodeId, name: impl Into<String>) {
        match self.nodes.get_mut(node) {
            Some(n) => n.name = name.into(),
            None => log::warn!("Cannot rename missing node {}", node),
        }
    }

    /// Queue a debug line for this update frame
    pub fn draw_debug_line(&mut self, start: Vec3, end: Vec3, color: [u8; 4]) {
        self.debug_draw_line_channel
            .append_one(EDebugDrawLine { start, end, color });
    }

    // ========================================================================
    // Staging
    // ========================================================================

    fn root_mod(&mut self, id: NodeId) -> Option<&mut RootMod> {
        let Some(node) = self.nodes.get_mut(id) else {
            log::warn!("Cannot stage a root change for missing node {}", id);
            return None;
        };

        let index = match node.root_mod_index {
            Some(index) => index as usize,
            None => {
                let index = self.root_mods.len();
                node.root_mod_index = Some(index as u32);
                node.mod_state |= ModState::ROOT_PENDING;
                self.root_mods.push(RootMod {
                    node: id,
                    root: node.root,
                });
                index
            }
        };

        self.root_mods.get_mut(index)
    }

    fn transform_mod(&mut self, id: NodeId) -> Option<&mut TransformMod> {
        let Some(node) = self.nodes.get_mut(id) else {
            log::warn!("Cannot stage a transform change for missing node {}", id);
            return None;
        };

        let index = match node.transform_mod_index {
            Some(index) => index as usize,
            None => {
                let index = self.transform_mods.len();
                node.transform_mod_index = Some(index as u32);
                node.mod_state |= ModState::TRANSFORM_PENDING;
                self.transform_mods.push(TransformMod {
                    node: id,
                    position: node.local_position,
                    scale: node.local_scale,
                    rotation: node.local_rotation,
                });
                index
            }
        };

        self.transform_mods.get_mut(index)
    }

    /// Drop every staged record
    pub(crate) fn clear_staging(&mut self) {
        self.root_mods.clear();
        self.transform_mods.clear();
        self.system_new_nodes.clear();
        self.system_destroyed_nodes.clear();
    }

    pub(crate) fn clear_channels(&mut self) {
        self.new_node_channel.clear();
        self.destroyed_node_channel.clear();
        self.node_local_transform_changed_channel.clear();
        self.node_world_transform_changed_channel.clear();
        self.node_root_changed_channel.clear();
        self.debug_draw_line_channel.clear();
    }
}

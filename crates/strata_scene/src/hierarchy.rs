//! Hierarchy maintenance
//!
//! Applies the records staged during a system frame, in this order:
//! 1. Root changes, which relink parents and children. Cycles are checked
//!    against the hierarchy all staged changes produce together, so the
//!    result does not depend on the order changes were issued in.
//! 2. Local transform changes
//! 3. Depth and destruction propagation from every relinked or destroyed
//!    node down its subtree
//! 4. World matrix recomputation, parents before children
//!
//! Then publishes the resulting events and lets component containers react.
//! All traversals use explicit stacks so deep hierarchies can't overflow.

use std::collections::{BTreeMap, BTreeSet};

use strata_core::NodeId;
use strata_math::Mat4;
use strata_structures::{insert_ord, remove_ord};

use crate::events::{EDestroyedNode, ENewNode, ENodeRootChanged, ENodeTransformChanged};
use crate::node::ModState;
use crate::scene_data::{RootMod, SceneData};

/// Events produced while applying one system frame
#[derive(Default)]
struct FrameEvents {
    root_changed: Vec<ENodeRootChanged>,
    local_changed: Vec<ENodeTransformChanged>,
    world_changed: Vec<ENodeTransformChanged>,
    destroyed: Vec<EDestroyedNode>,
}

impl SceneData {
    /// Whether anything is staged for the current system frame
    pub(crate) fn has_staged_changes(&self) -> bool {
        !self.root_mods.is_empty()
            || !self.transform_mods.is_empty()
            || !self.system_new_nodes.is_empty()
            || !self.system_destroyed_nodes.is_empty()
    }

    /// Apply everything staged since the last system frame ended
    pub(crate) fn apply_system_frame(&mut self) {
        let mut events = FrameEvents::default();
        let mut relinked = Vec::new();
        let mut outdated = Vec::new();

        self.apply_root_mods(&mut events, &mut relinked, &mut outdated);
        self.apply_transform_mods(&mut events, &mut outdated);

        let mut starts: Vec<NodeId> = relinked
            .iter()
            .chain(self.system_destroyed_nodes.iter())
            .copied()
            .collect();
        starts.sort_unstable();
        starts.dedup();
        self.update_hierarchy(&starts, &mut events);

        self.update_matrices(&outdated, &mut events);
        self.publish(events);

        log::trace!(
            "Applied system frame: {} new, {} destroyed, {} relinked, {} outdated",
            self.system_new_nodes.len(),
            self.system_destroyed_nodes.len(),
            relinked.len(),
            outdated.len()
        );
        self.clear_staging();
    }

    // ========================================================================
    // Staged records
    // ========================================================================

    fn apply_root_mods(&mut self, events: &mut FrameEvents, relinked: &mut Vec<NodeId>, outdated: &mut Vec<NodeId>) {
        let mut mods = Vec::with_capacity(self.root_mods.len());
        for m in std::mem::take(&mut self.root_mods) {
            let Some(node) = self.nodes.get_mut(m.node) else {
                continue;
            };
            node.root_mod_index = None;
            node.mod_state.remove(ModState::ROOT_PENDING);
            mods.push(RootMod {
                node: m.node,
                root: self.resolve_root(m.node, m.root),
            });
        }
        self.reject_cycles(&mut mods);

        for m in mods {
            let Some(old_root) = self.nodes.get(m.node).map(|n| n.root) else {
                continue;
            };
            if m.root == old_root {
                continue;
            }

            self.unlink(m.node, old_root);
            let (depth, parent_destroyed) = self.link(m.node, m.root);

            let Some(node) = self.nodes.get_mut(m.node) else {
                continue;
            };
            node.root = m.root;
            node.hierarchy_depth = depth;
            node.mod_state.insert(ModState::ROOT_APPLIED);
            if parent_destroyed && !node.is_destroyed() {
                node.mod_state.insert(ModState::DESTROYED_PENDING);
                self.system_destroyed_nodes.push(m.node);
            }

            events.root_changed.push(ENodeRootChanged {
                node: m.node,
                root: m.root,
            });
            self.update_modified_nodes.push(m.node);
            relinked.push(m.node);
            outdated.push(m.node);
        }
    }

    fn apply_transform_mods(&mut self, events: &mut FrameEvents, outdated: &mut Vec<NodeId>) {
        for m in &self.transform_mods {
            let Some(node) = self.nodes.get_mut(m.node) else {
                continue;
            };
            node.transform_mod_index = None;
            node.mod_state.remove(ModState::TRANSFORM_PENDING);
            node.mod_state.insert(ModState::TRANSFORM_APPLIED);
            node.local_position = m.position;
            node.local_scale = m.scale;
            node.local_rotation = m.rotation;

            events.local_changed.push(ENodeTransformChanged { node: m.node });
            self.update_modified_nodes.push(m.node);
            outdated.push(m.node);
        }
        self.transform_mods.clear();
    }

    /// The parent `node` should end up with. Missing parents detach.
    fn resolve_root(&self, node: NodeId, root: NodeId) -> NodeId {
        if !root.is_null() && !self.nodes.contains_key(root) {
            log::warn!("Node {} was attached to missing node {}, detaching it", node, root);
            return NodeId::NULL;
        }
        root
    }

    /// Drop every staged root change that closes a cycle in the hierarchy
    /// all staged changes together would produce.
    ///
    /// A dropped change leaves its node under the current parent, which can
    /// close a cycle through another change, so this repeats until stable.
    fn reject_cycles(&self, mods: &mut Vec<RootMod>) {
        loop {
            let staged: BTreeMap<NodeId, NodeId> = mods.iter().map(|m| (m.node, m.root)).collect();
            let before = mods.len();

            mods.retain(|m| {
                let cyclic = self.reaches(m.root, m.node, &staged);
                if cyclic {
                    log::warn!("Attaching node {} to {} would create a cycle, ignoring", m.node, m.root);
                }
                !cyclic
            });

            if mods.len() == before {
                break;
            }
        }
    }

    /// Whether walking up from `from` through the staged parents, falling
    /// back to current ones, passes `target`
    fn reaches(&self, from: NodeId, target: NodeId, staged: &BTreeMap<NodeId, NodeId>) -> bool {
        let mut visited = BTreeSet::new();
        let mut cursor = from;

        while !cursor.is_null() && visited.insert(cursor) {
            if cursor == target {
                return true;
            }
            cursor = match staged.get(&cursor) {
                Some(root) => *root,
                None => self.nodes.get(cursor).map_or(NodeId::NULL, |n| n.root),
            };
        }
        false
    }

    /// Remove `node` from the child list of `root`, or the root list
    pub(crate) fn unlink(&mut self, node: NodeId, root: NodeId) {
        if root.is_null() {
            remove_ord(&mut self.root_nodes, node);
        } else if let Some(parent) = self.nodes.get_mut(root) {
            remove_ord(&mut parent.children, node);
        }
    }

    /// Add `node` to the child list of `root`, or the root list. Returns the
    /// depth `node` now has and whether its new parent is destroyed.
    fn link(&mut self, node: NodeId, root: NodeId) -> (u32, bool) {
        match self.nodes.get_mut(root) {
            Some(parent) if !root.is_null() => {
                insert_ord(&mut parent.children, node);
                (parent.hierarchy_depth + 1, parent.is_destroyed())
            }
            _ => {
                insert_ord(&mut self.root_nodes, node);
                (0, false)
            }
        }
    }

    // ========================================================================
    // Propagation
    // ========================================================================

    /// Push depth and destruction down from every node in `starts`.
    ///
    /// Only the topmost starts are walked: one whose ancestor is also a
    /// start is reached through that ancestor anyway.
    fn update_hierarchy(&mut self, starts: &[NodeId], events: &mut FrameEvents) {
        let start_set: BTreeSet<NodeId> = starts.iter().copied().collect();
        let mut stack = Vec::new();

        for &start in starts {
            let Some(node) = self.nodes.get(start) else {
                continue;
            };
            if self.has_ancestor_in(node.root, &start_set) {
                continue;
            }

            let (depth, parent_destroyed) = match self.nodes.get(node.root) {
                Some(parent) => (parent.hierarchy_depth + 1, parent.is_destroyed()),
                None => (0, false),
            };
            stack.push((start, depth, parent_destroyed));

            while let Some((id, depth, parent_destroyed)) = stack.pop() {
                let Some(node) = self.nodes.get_mut(id) else {
                    continue;
                };
                node.hierarchy_depth = depth;

                let destroyed = parent_destroyed || node.is_destroyed();
                if destroyed && !node.mod_state.contains(ModState::DESTROYED_APPLIED) {
                    node.mod_state.remove(ModState::DESTROYED_PENDING);
                    node.mod_state.insert(ModState::DESTROYED_APPLIED);
                    events.destroyed.push(EDestroyedNode { node: id });
                    self.update_destroyed_nodes.push(id);
                }

                stack.extend(node.children.iter().map(|child| (*child, depth + 1, destroyed)));
            }
        }
    }

    fn has_ancestor_in(&self, mut cursor: NodeId, set: &BTreeSet<NodeId>) -> bool {
        while let Some(node) = self.nodes.get(cursor) {
            if set.contains(&cursor) {
                return true;
            }
            cursor = node.root;
        }
        false
    }

    /// Sort ids by hierarchy depth, then by id
    pub(crate) fn sort_by_depth(&self, ids: &mut [NodeId]) {
        ids.sort_unstable_by_key(|id| (self.nodes.get(*id).map_or(0, |n| n.hierarchy_depth), *id));
    }

    fn parent_world(&self, id: NodeId) -> Mat4 {
        self.nodes
            .get(id)
            .and_then(|node| self.nodes.get(node.root))
            .map_or(Mat4::IDENTITY, |parent| parent.world_matrix)
    }

    /// Recompute world matrices for every outdated node and its subtree
    fn update_matrices(&mut self, outdated: &[NodeId], events: &mut FrameEvents) {
        let outdated_set: BTreeSet<NodeId> = outdated
            .iter()
            .copied()
            .filter(|id| self.nodes.contains_key(*id))
            .collect();
        let mut ordered: Vec<NodeId> = outdated_set.iter().copied().collect();
        self.sort_by_depth(&mut ordered);

        let mut stack = Vec::new();
        for id in ordered {
            stack.push((id, self.parent_world(id)));

            while let Some((id, parent_world)) = stack.pop() {
                let Some(node) = self.nodes.get_mut(id) else {
                    continue;
                };
                node.world_matrix = parent_world * node.local_matrix();
                events.world_changed.push(ENodeTransformChanged { node: id });

                // Outdated descendants come up later in depth order
                let world = node.world_matrix;
                stack.extend(
                    node.children
                        .iter()
                        .filter(|child| !outdated_set.contains(*child))
                        .map(|child| (*child, world)),
                );
            }
        }
    }

    /// Recompute every world matrix, e.g. after loading
    pub(crate) fn update_all_matrices(&mut self) {
        let mut ids: Vec<NodeId> = self.nodes.keys().collect();
        self.sort_by_depth(&mut ids);

        for id in ids {
            let parent_world = self.parent_world(id);
            if let Some(node) = self.nodes.get_mut(id) {
                node.world_matrix = parent_world * node.local_matrix();
            }
        }
    }

    /// Assign depths by walking down from the root list. Nodes that can't
    /// be reached sit on a cycle and are detached into roots.
    pub(crate) fn initialize_hierarchy_depths(&mut self) {
        let mut reached = BTreeSet::new();
        let mut stack: Vec<(NodeId, u32)> = self.root_nodes.iter().map(|id| (*id, 0)).collect();
        self.assign_depths(&mut stack, &mut reached);

        let unreached: Vec<NodeId> = self.nodes.keys().filter(|id| !reached.contains(id)).collect();
        for id in unreached {
            if reached.contains(&id) {
                continue;
            }

            let Some(root) = self.nodes.get(id).map(|n| n.root) else {
                continue;
            };
            log::warn!("Node {} is part of a hierarchy cycle, detaching it", id);
            self.unlink(id, root);
            if let Some(node) = self.nodes.get_mut(id) {
                node.root = NodeId::NULL;
            }
            insert_ord(&mut self.root_nodes, id);

            stack.push((id, 0));
            self.assign_depths(&mut stack, &mut reached);
        }
    }

    fn assign_depths(&mut self, stack: &mut Vec<(NodeId, u32)>, reached: &mut BTreeSet<NodeId>) {
        while let Some((id, depth)) = stack.pop() {
            if !reached.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get_mut(id) {
                node.hierarchy_depth = depth;
                stack.extend(node.children.iter().map(|child| (*child, depth + 1)));
            }
        }
    }

    // ========================================================================
    // Publishing
    // ========================================================================

    fn publish(&mut self, events: FrameEvents) {
        let new_nodes: Vec<ENewNode> = self
            .system_new_nodes
            .iter()
            .map(|node| ENewNode { node: *node })
            .collect();

        self.new_node_channel.append(&new_nodes);
        self.destroyed_node_channel.append(&events.destroyed);
        self.node_root_changed_channel.append(&events.root_changed);
        self.node_local_transform_changed_channel.append(&events.local_changed);
        self.node_world_transform_changed_channel.append(&events.world_changed);

        if !events.destroyed.is_empty() {
            let mut destroyed: Vec<NodeId> = events.destroyed.iter().map(|e| e.node).collect();
            destroyed.sort_unstable();
            for container in self.components.values_mut() {
                container.remove_instances(&destroyed);
            }
        }

        for container in self.components.values_mut() {
            container.on_end_system_frame();
        }
    }
}

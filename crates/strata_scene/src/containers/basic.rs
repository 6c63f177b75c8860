//! Pooled component storage with lifecycle channels

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};

use strata_core::{ArchiveReader, ArchiveWriter, FromArchive, NodeId, ToArchive, TypeInfo};
use strata_event::EventChannel;
use strata_structures::{insert_ord, remove_ord};

use crate::component::{Component, ComponentContainer, SharedData, TypedComponentContainer};
use crate::events::{EDestroyedComponent, ENewComponent};
use crate::node::{copy_page, ModState, Node};

/// One pooled payload per node.
///
/// Payload slots are reused through a free list. Creation and removal are
/// published on the `"new"` and `"destroy"` channels; the shared data may
/// expose more. Removed instances stay readable until the end of the update
/// frame.
pub struct BasicComponentContainer<C, S = ()> {
    type_info: TypeInfo,
    shared: S,
    new_channel: EventChannel,
    destroyed_channel: EventChannel,
    destroyed: BTreeSet<NodeId>,
    instance_map: BTreeMap<NodeId, usize>,
    instance_nodes: Vec<NodeId>,
    pool: Vec<Option<C>>,
    free_slots: Vec<usize>,
}

impl<C, S> BasicComponentContainer<C, S>
where
    C: Component + ToArchive + FromArchive + Default,
    S: SharedData,
{
    pub fn new() -> Self {
        Self::with_channel_capacity(8)
    }

    pub fn with_channel_capacity(capacity: usize) -> Self {
        Self {
            type_info: C::type_info(),
            shared: S::default(),
            new_channel: EventChannel::new::<ENewComponent>(capacity),
            destroyed_channel: EventChannel::new::<EDestroyedComponent>(capacity),
            destroyed: BTreeSet::new(),
            instance_map: BTreeMap::new(),
            instance_nodes: Vec::new(),
            pool: Vec::new(),
            free_slots: Vec::new(),
        }
    }

    pub fn get(&self, node: NodeId) -> Option<&C> {
        let slot = *self.instance_map.get(&node)?;
        self.pool.get(slot)?.as_ref()
    }

    pub fn get_mut(&mut self, node: NodeId) -> Option<&mut C> {
        let slot = *self.instance_map.get(&node)?;
        self.pool.get_mut(slot)?.as_mut()
    }

    /// Mutable access to an instance together with the shared data, for
    /// instances that report their own modifications
    pub fn get_mut_with_shared(&mut self, node: NodeId) -> Option<(&mut C, &mut S)> {
        let slot = *self.instance_map.get(&node)?;
        let instance = self.pool.get_mut(slot)?.as_mut()?;
        Some((instance, &mut self.shared))
    }

    pub fn shared(&self) -> &S {
        &self.shared
    }

    pub fn shared_mut(&mut self) -> &mut S {
        &mut self.shared
    }

    /// Whether the instance was removed this update frame
    pub fn is_destroyed(&self, node: NodeId) -> bool {
        self.destroyed.contains(&node)
    }

    /// Iterate instances in node order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &C)> {
        self.instance_map
            .iter()
            .filter_map(|(node, slot)| self.pool.get(*slot)?.as_ref().map(|c| (*node, c)))
    }

    fn insert_instance(&mut self, node: NodeId, instance: C) {
        let slot = match self.free_slots.pop() {
            Some(slot) => {
                self.pool[slot] = Some(instance);
                slot
            }
            None => {
                self.pool.push(Some(instance));
                self.pool.len() - 1
            }
        };

        self.instance_map.insert(node, slot);
        insert_ord(&mut self.instance_nodes, node);
    }
}

impl<C, S> Default for BasicComponentContainer<C, S>
where
    C: Component + ToArchive + FromArchive + Default,
    S: SharedData,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C, S> ComponentContainer for BasicComponentContainer<C, S>
where
    C: Component + ToArchive + FromArchive + Default,
    S: SharedData,
{
    fn component_type(&self) -> &TypeInfo {
        &self.type_info
    }

    fn reset(&mut self) {
        self.shared.reset();
        self.new_channel.clear();
        self.destroyed_channel.clear();
        self.destroyed.clear();
        self.instance_map.clear();
        self.instance_nodes.clear();
        self.pool.clear();
        self.free_slots.clear();
    }

    fn to_archive(&self, writer: &mut dyn ArchiveWriter) {
        writer.as_object();
        for (node, instance) in self.iter().filter(|(node, _)| !self.destroyed.contains(node)) {
            writer.object_member(&node.index().to_string(), instance);
        }
    }

    fn from_archive(&mut self, reader: &mut dyn ArchiveReader) {
        self.reset();

        let mut new_events = Vec::new();
        reader.enumerate_object_members(&mut |name, member| {
            let Ok(index) = name.parse::<u32>() else {
                log::warn!("Skipping {} instance with invalid node id '{}'", C::NAME, name);
                return;
            };

            let node = NodeId::restored(index);
            if self.instance_map.contains_key(&node) {
                return;
            }

            let mut instance = C::default();
            instance.from_archive(member);
            self.insert_instance(node, instance);
            new_events.push(ENewComponent { node });
        });

        self.new_channel.append(&new_events);
    }

    fn on_end_system_frame(&mut self) {
        self.shared.on_end_system_frame();
    }

    fn on_end_update_frame(&mut self) {
        for node in std::mem::take(&mut self.destroyed) {
            if let Some(slot) = self.instance_map.remove(&node) {
                self.pool[slot] = None;
                self.free_slots.push(slot);
            }
            remove_ord(&mut self.instance_nodes, node);
        }

        self.shared.on_end_update_frame();
        self.new_channel.clear();
        self.destroyed_channel.clear();
    }

    fn create_instances(&mut self, nodes: &[&Node]) {
        let mut new_events = Vec::with_capacity(nodes.len());

        for node in nodes {
            let id = node.id();
            if self.instance_map.contains_key(&id) {
                continue;
            }

            self.insert_instance(id, C::default());
            new_events.push(ENewComponent { node: id });

            // Instances on nodes that are already gone die with them
            if node.mod_state().contains(ModState::DESTROYED_APPLIED) {
                self.destroyed_channel.append_one(EDestroyedComponent { node: id });
                self.destroyed.insert(id);
            }
        }

        self.new_channel.append(&new_events);
    }

    fn remove_instances(&mut self, nodes: &[NodeId]) {
        let mut destroyed_events = Vec::with_capacity(nodes.len());

        for node in nodes {
            if !self.instance_map.contains_key(node) || !self.destroyed.insert(*node) {
                continue;
            }
            destroyed_events.push(EDestroyedComponent { node: *node });
        }

        self.destroyed_channel.append(&destroyed_events);
    }

    fn has_instance(&self, node: NodeId) -> bool {
        self.instance_map.contains_key(&node)
    }

    fn num_instance_nodes(&self) -> usize {
        self.instance_nodes.len()
    }

    fn get_instance_nodes(&self, start: usize, out: &mut [NodeId]) -> usize {
        copy_page(&self.instance_nodes, start, out)
    }

    fn get_event_channel(&mut self, name: &str) -> Option<&mut EventChannel> {
        match name {
            "new" => Some(&mut self.new_channel),
            "destroy" => Some(&mut self.destroyed_channel),
            _ => self.shared.get_event_channel(name),
        }
    }

    fn reserve_channels(&mut self, capacity: usize) {
        self.new_channel.reserve(capacity);
        self.destroyed_channel.reserve(capacity);
        self.shared.reserve_channels(capacity);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<C, S> TypedComponentContainer for BasicComponentContainer<C, S>
where
    C: Component + ToArchive + FromArchive + Default,
    S: SharedData,
{
    type Component = C;
}

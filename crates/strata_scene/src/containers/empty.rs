//! Presence-only component storage

use std::any::Any;
use std::marker::PhantomData;

use strata_core::{ArchiveReader, ArchiveWriter, FromArchive, NodeId, TypeInfo};
use strata_event::EventChannel;
use strata_structures::{erase_ord, merge_ord_sets};

use crate::component::{Component, ComponentContainer, TypedComponentContainer};
use crate::node::{copy_page, Node};

/// Components with no payload: the ordered set of nodes is all there is.
///
/// Archived as an array of node indices.
pub struct EmptyComponentContainer<C> {
    type_info: TypeInfo,
    instance_nodes: Vec<NodeId>,
    _component: PhantomData<fn() -> C>,
}

impl<C: Component> EmptyComponentContainer<C> {
    pub fn new() -> Self {
        Self {
            type_info: C::type_info(),
            instance_nodes: Vec::new(),
            _component: PhantomData,
        }
    }

    /// Ordered ids of tagged nodes
    pub fn nodes(&self) -> &[NodeId] {
        &self.instance_nodes
    }

    /// Add several batches of nodes in one merge pass. Each batch must be
    /// strictly increasing. Returns how many were already present.
    pub fn insert_batches(&mut self, batches: &[&[NodeId]]) -> usize {
        merge_ord_sets(&mut self.instance_nodes, batches)
    }
}

impl<C: Component> Default for EmptyComponentContainer<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Component> ComponentContainer for EmptyComponentContainer<C> {
    fn component_type(&self) -> &TypeInfo {
        &self.type_info
    }

    fn reset(&mut self) {
        self.instance_nodes.clear();
    }

    fn to_archive(&self, writer: &mut dyn ArchiveWriter) {
        writer.as_array();
        for node in &self.instance_nodes {
            writer.array_element(node);
        }
    }

    fn from_archive(&mut self, reader: &mut dyn ArchiveReader) {
        self.reset();

        let mut nodes = Vec::new();
        reader.enumerate_array_elements(&mut |_, element| {
            let mut node = NodeId::NULL;
            node.from_archive(element);
            if !node.is_null() {
                nodes.push(node);
            }
        });

        nodes.sort_unstable();
        nodes.dedup();
        self.insert_batches(&[&nodes]);
    }

    fn on_end_system_frame(&mut self) {}

    fn on_end_update_frame(&mut self) {}

    fn create_instances(&mut self, nodes: &[&Node]) {
        let mut ids: Vec<NodeId> = nodes.iter().map(|n| n.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        self.insert_batches(&[&ids]);
    }

    fn remove_instances(&mut self, nodes: &[NodeId]) {
        let mut ids = nodes.to_vec();
        ids.sort_unstable();
        erase_ord(&mut self.instance_nodes, &ids);
    }

    fn has_instance(&self, node: NodeId) -> bool {
        self.instance_nodes.binary_search(&node).is_ok()
    }

    fn num_instance_nodes(&self) -> usize {
        self.instance_nodes.len()
    }

    fn get_instance_nodes(&self, start: usize, out: &mut [NodeId]) -> usize {
        copy_page(&self.instance_nodes, start, out)
    }

    fn get_event_channel(&mut self, _name: &str) -> Option<&mut EventChannel> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<C: Component> TypedComponentContainer for EmptyComponentContainer<C> {
    type Component = C;
}

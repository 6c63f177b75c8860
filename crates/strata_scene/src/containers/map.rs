//! Map-backed component storage
//!
//! For components whose instances need random access to each other's data,
//! e.g. walking a chain of related nodes.

use std::any::Any;
use std::collections::BTreeMap;

use strata_core::{ArchiveReader, ArchiveWriter, FromArchive, NodeId, ToArchive, TypeInfo};
use strata_event::EventChannel;
use strata_structures::{erase_ord, is_ordered, merge_ord_sets};

use crate::component::{Component, ComponentContainer, TypedComponentContainer};
use crate::node::{copy_page, Node};

/// Component payloads in an ordered map keyed by node
///
/// Archived as an array of `{ "node": index, "data": ... }` in node order.
pub struct MapComponentContainer<C> {
    type_info: TypeInfo,
    instance_nodes: Vec<NodeId>,
    instance_data: BTreeMap<NodeId, C>,
}

impl<C> MapComponentContainer<C>
where
    C: Component + ToArchive + FromArchive + Default,
{
    pub fn new() -> Self {
        Self {
            type_info: C::type_info(),
            instance_nodes: Vec::new(),
            instance_data: BTreeMap::new(),
        }
    }

    pub fn get(&self, node: NodeId) -> Option<&C> {
        self.instance_data.get(&node)
    }

    pub fn get_mut(&mut self, node: NodeId) -> Option<&mut C> {
        self.instance_data.get_mut(&node)
    }

    /// Every instance, for lookups across nodes
    pub fn data(&self) -> &BTreeMap<NodeId, C> {
        &self.instance_data
    }

    pub fn data_mut(&mut self) -> &mut BTreeMap<NodeId, C> {
        &mut self.instance_data
    }
}

impl<C> Default for MapComponentContainer<C>
where
    C: Component + ToArchive + FromArchive + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C> ComponentContainer for MapComponentContainer<C>
where
    C: Component + ToArchive + FromArchive + Default,
{
    fn component_type(&self) -> &TypeInfo {
        &self.type_info
    }

    fn reset(&mut self) {
        self.instance_nodes.clear();
        self.instance_data.clear();
    }

    fn to_archive(&self, writer: &mut dyn ArchiveWriter) {
        writer.as_array();
        for (node, data) in &self.instance_data {
            writer.push_array_element();
            writer.object_member("node", node);
            writer.object_member("data", data);
            writer.pop();
        }
    }

    fn from_archive(&mut self, reader: &mut dyn ArchiveReader) {
        self.reset();

        reader.enumerate_array_elements(&mut |_, element| {
            let mut node = NodeId::NULL;
            element.read_object_member("node", &mut node);
            if node.is_null() {
                log::warn!("Skipping {} instance without a node", C::NAME);
                return;
            }

            let mut data = C::default();
            element.read_object_member("data", &mut data);
            self.instance_nodes.push(node);
            self.instance_data.insert(node, data);
        });

        if !is_ordered(&self.instance_nodes) {
            log::warn!("{} instances are not in node order, discarding them", C::NAME);
            self.reset();
        }
    }

    fn on_end_system_frame(&mut self) {}

    fn on_end_update_frame(&mut self) {}

    fn create_instances(&mut self, nodes: &[&Node]) {
        let mut ids: Vec<NodeId> = nodes.iter().map(|n| n.id()).collect();
        ids.sort_unstable();
        ids.dedup();

        merge_ord_sets(&mut self.instance_nodes, &[&ids]);
        for id in ids {
            self.instance_data.entry(id).or_default();
        }
    }

    fn remove_instances(&mut self, nodes: &[NodeId]) {
        let mut ids = nodes.to_vec();
        ids.sort_unstable();

        erase_ord(&mut self.instance_nodes, &ids);
        for id in &ids {
            self.instance_data.remove(id);
        }
    }

    fn has_instance(&self, node: NodeId) -> bool {
        self.instance_data.contains_key(&node)
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

impl<C> TypedComponentContainer for MapComponentContainer<C>
where
    C: Component + ToArchive + FromArchive + Default,
{
    type Component = C;
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::json_archive::{JsonArchiveReader, JsonArchiveWriter};

    #[derive(Debug, Default, PartialEq)]
    struct Link {
        target: NodeId,
    }

    impl Component for Link {
        const NAME: &'static str = "link";
    }

    impl ToArchive for Link {
        fn to_archive(&self, writer: &mut dyn ArchiveWriter) {
            writer.object_member("target", &self.target);
        }
    }

    impl FromArchive for Link {
        fn from_archive(&mut self, reader: &mut dyn ArchiveReader) {
            reader.read_object_member("target", &mut self.target);
        }
    }

    #[test]
    fn test_sibling_lookup_and_remove() {
        let mut container = MapComponentContainer::<Link>::new();
        let nodes: Vec<Node> = [5, 2, 9].iter().map(|i| Node::new(NodeId::restored(*i))).collect();
        let refs: Vec<&Node> = nodes.iter().collect();
        container.create_instances(&refs);
        container.create_instances(&refs[..1]);

        assert_eq!(container.num_instance_nodes(), 3);
        container.get_mut(NodeId::restored(2)).unwrap().target = NodeId::restored(9);

        let next = container.get(NodeId::restored(2)).unwrap().target;
        assert!(container.data().contains_key(&next));

        container.remove_instances(&[NodeId::restored(9), NodeId::restored(5)]);
        assert_eq!(container.instance_nodes, vec![NodeId::restored(2)]);
        assert!(!container.has_instance(NodeId::restored(9)));
    }

    #[test]
    fn test_archive_round_trip() {
        let mut container = MapComponentContainer::<Link>::new();
        let nodes: Vec<Node> = [3, 11].iter().map(|i| Node::new(NodeId::restored(*i))).collect();
        container.create_instances(&[&nodes[0], &nodes[1]]);
        container.get_mut(NodeId::restored(3)).unwrap().target = NodeId::restored(11);

        let mut writer = JsonArchiveWriter::new();
        container.to_archive(&mut writer);
        let value = writer.into_value();

        let mut restored = MapComponentContainer::<Link>::new();
        restored.from_archive(&mut JsonArchiveReader::new(&value));
        assert_eq!(restored.instance_nodes, container.instance_nodes);
        assert_eq!(restored.get(NodeId::restored(3)), container.get(NodeId::restored(3)));
    }

    #[test]
    fn test_archive_skips_missing_node() {
        let value = serde_json::json!([{ "data": { "target": 1 } }, { "node": 4 }]);
        let mut restored = MapComponentContainer::<Link>::new();
        restored.from_archive(&mut JsonArchiveReader::new(&value));
        assert_eq!(restored.instance_nodes, vec![NodeId::restored(4)]);
    }
}

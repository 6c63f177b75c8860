//! Component container contract
//!
//! The scene manages component storage generically through
//! [`ComponentContainer`] trait objects, keyed by the component's `TypeId`.
//! Concrete containers live in [`crate::containers`].

use std::any::{Any, TypeId};

use strata_core::{ArchiveReader, ArchiveWriter, NodeId, TypeInfo};
use strata_event::EventChannel;

use crate::events::EModifiedComponent;
use crate::node::Node;

/// A component payload type
pub trait Component: 'static {
    /// Stable name, used as the archive key for the component's container
    const NAME: &'static str;

    /// Type information for registration with a scene
    fn type_info() -> TypeInfo
    where
        Self: Sized,
    {
        TypeInfo::named::<Self>(Self::NAME)
    }
}

/// Per-component-type storage managed by the scene
pub trait ComponentContainer: Any {
    /// The component type stored in this container
    fn component_type(&self) -> &TypeInfo;

    /// Drop every instance and clear all channels
    fn reset(&mut self);

    fn to_archive(&self, writer: &mut dyn ArchiveWriter);

    fn from_archive(&mut self, reader: &mut dyn ArchiveReader);

    /// Called after the scene applied a system frame's staged changes
    fn on_end_system_frame(&mut self);

    /// Called once the whole pipeline ran for the update frame
    fn on_end_update_frame(&mut self);

    /// Create an instance for each node that doesn't already have one
    fn create_instances(&mut self, nodes: &[&Node]);

    /// Remove the instances of the given nodes, where present
    fn remove_instances(&mut self, nodes: &[NodeId]);

    fn has_instance(&self, node: NodeId) -> bool;

    fn num_instance_nodes(&self) -> usize;

    /// Copy the ordered instance node ids starting at `start` into `out`.
    /// Returns the number copied.
    fn get_instance_nodes(&self, start: usize, out: &mut [NodeId]) -> usize;

    /// Look up a container channel by name
    fn get_event_channel(&mut self, name: &str) -> Option<&mut EventChannel>;

    /// Grow every container channel to hold at least `capacity` events
    fn reserve_channels(&mut self, _capacity: usize) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn ComponentContainer {
    /// Downcast to a concrete container type
    pub fn downcast_ref<T: ComponentContainer>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    /// Downcast to a concrete container type
    pub fn downcast_mut<T: ComponentContainer>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }

    /// Ordered ids of every node with an instance
    pub fn instance_nodes(&self) -> Vec<NodeId> {
        let mut out = vec![NodeId::NULL; self.num_instance_nodes()];
        let count = self.get_instance_nodes(0, &mut out);
        out.truncate(count);
        out
    }
}

/// A container that stores exactly one Rust component type
pub trait TypedComponentContainer: ComponentContainer {
    type Component: Component;

    fn component_type_id() -> TypeId
    where
        Self: Sized,
    {
        TypeId::of::<Self::Component>()
    }
}

// ============================================================================
// Shared data
// ============================================================================

/// State shared by every instance of a component type.
///
/// Hooks run alongside the owning container's own frame hooks.
pub trait SharedData: Default + 'static {
    fn reset(&mut self) {}

    fn on_end_system_frame(&mut self) {}

    fn on_end_update_frame(&mut self) {}

    fn get_event_channel(&mut self, _name: &str) -> Option<&mut EventChannel> {
        None
    }

    fn reserve_channels(&mut self, _capacity: usize) {}
}

impl SharedData for () {}

/// Shared data publishing per-property modification events on `"prop_mod"`
pub struct PropertyModData {
    modified: Vec<EModifiedComponent>,
    channel: EventChannel,
}

impl PropertyModData {
    pub const CHANNEL: &'static str = "prop_mod";

    pub fn with_channel_capacity(capacity: usize) -> Self {
        Self {
            modified: Vec::new(),
            channel: EventChannel::new::<EModifiedComponent>(capacity),
        }
    }

    /// Stage a modification event, published at the end of the system frame
    pub fn set_modified(&mut self, node: NodeId, property: &str) {
        self.modified.push(EModifiedComponent {
            node,
            property: property.into(),
        });
    }

    /// Modifications staged during the current system frame
    pub fn pending(&self) -> &[EModifiedComponent] {
        &self.modified
    }
}

impl Default for PropertyModData {
    fn default() -> Self {
        Self::with_channel_capacity(8)
    }
}

impl SharedData for PropertyModData {
    fn reset(&mut self) {
        self.modified.clear();
        self.channel.clear();
    }

    fn on_end_system_frame(&mut self) {
        self.channel.append(&self.modified);
        self.modified.clear();
    }

    fn on_end_update_frame(&mut self) {
        self.channel.clear();
    }

    fn get_event_channel(&mut self, name: &str) -> Option<&mut EventChannel> {
        (name == Self::CHANNEL).then_some(&mut self.channel)
    }

    fn reserve_channels(&mut self, capacity: usize) {
        self.channel.reserve(capacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_mod_publishes_at_system_frame_end() {
        let mut shared = PropertyModData::default();
        let reader = shared.get_event_channel("prop_mod").unwrap().subscribe();
        assert!(shared.get_event_channel("new").is_none());

        shared.set_modified(NodeId::restored(4), "radius");
        assert_eq!(shared.pending().len(), 1);

        let channel = shared.get_event_channel("prop_mod").unwrap();
        assert_eq!(channel.unconsumed(reader), 0);

        shared.on_end_system_frame();
        let channel = shared.get_event_channel("prop_mod").unwrap();
        let mut out = [EModifiedComponent {
            node: NodeId::NULL,
            property: Default::default(),
        }; 2];
        assert_eq!(channel.consume(reader, &mut out), 1);
        assert_eq!(out[0].node, NodeId::restored(4));
        assert_eq!(out[0].property, "radius");
    }
}

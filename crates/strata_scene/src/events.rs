//! Events published by the scene and its component containers
//!
//! Every event is plain old data so it can travel through an
//! [`EventChannel`](strata_event::EventChannel) without allocation.

use bytemuck::{Pod, Zeroable};
use strata_core::{FixedString, NodeId};
use strata_math::Vec3;

/// A node was created
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct ENewNode {
    pub node: NodeId,
}

/// A node, or one of its ancestors, was destroyed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct EDestroyedNode {
    pub node: NodeId,
}

/// A node's local or world transform changed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct ENodeTransformChanged {
    pub node: NodeId,
}

/// A node was attached to a new parent. `root` is null for "no parent".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct ENodeRootChanged {
    pub node: NodeId,
    pub root: NodeId,
}

/// Request to draw a debug line for one frame
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct EDebugDrawLine {
    pub start: Vec3,
    pub end: Vec3,
    /// RGBA
    pub color: [u8; 4],
}

/// A component instance was created
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct ENewComponent {
    pub node: NodeId,
}

/// A component instance was removed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct EDestroyedComponent {
    pub node: NodeId,
}

/// A property of a component instance was modified
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct EModifiedComponent {
    pub node: NodeId,
    pub property: FixedString<24>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_layouts_have_no_padding() {
        assert_eq!(core::mem::size_of::<ENodeRootChanged>(), 16);
        assert_eq!(core::mem::size_of::<EDebugDrawLine>(), 28);
        assert_eq!(core::mem::size_of::<EModifiedComponent>(), 32);
    }

    #[test]
    fn test_modified_property_name() {
        let event = EModifiedComponent {
            node: NodeId::restored(3),
            property: FixedString::from("intensity"),
        };
        assert_eq!(event.property.as_str(), "intensity");
    }
}

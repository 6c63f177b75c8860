//! Scene graph nodes
//!
//! A [`Node`] is one entry of the transform hierarchy. Nodes never change
//! in place while a system runs: mutators on [`SceneData`] stage the change,
//! and the scene applies every staged change at the end of the system frame.

use std::ops::{BitOr, BitOrAssign};

use strata_core::NodeId;
use strata_math::{Mat4, Quat, Vec3};

use crate::scene_data::SceneData;

/// Modification state of a node within the current update frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ModState(u32);

impl ModState {
    /// Not modified
    pub const NONE: Self = Self(0);

    /// Root changed, not yet applied
    pub const ROOT_PENDING: Self = Self(1 << 0);

    /// Root changed and applied this update frame
    pub const ROOT_APPLIED: Self = Self(1 << 1);

    /// Local transform changed, not yet applied
    pub const TRANSFORM_PENDING: Self = Self(1 << 2);

    /// Local transform changed and applied this update frame
    pub const TRANSFORM_APPLIED: Self = Self(1 << 3);

    /// Created this update frame
    pub const NEW: Self = Self(1 << 4);

    /// Marked for destruction during this system frame
    pub const DESTROYED_PENDING: Self = Self(1 << 5);

    /// Destruction applied to the node and its whole subtree
    pub const DESTROYED_APPLIED: Self = Self(1 << 6);

    /// Either destruction state
    pub const DESTROYED: Self = Self(Self::DESTROYED_PENDING.0 | Self::DESTROYED_APPLIED.0);

    /// Flags cleared at the end of every update frame
    pub const FRAME_APPLIED: Self = Self(Self::ROOT_APPLIED.0 | Self::TRANSFORM_APPLIED.0 | Self::NEW.0);

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Check if all specified flags are set
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check if any of the specified flags are set
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for ModState {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ModState {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// One entry of the transform hierarchy
#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) root: NodeId,
    pub(crate) children: Vec<NodeId>,
    pub(crate) hierarchy_depth: u32,
    pub(crate) mod_state: ModState,
    pub(crate) root_mod_index: Option<u32>,
    pub(crate) transform_mod_index: Option<u32>,
    pub(crate) local_position: Vec3,
    pub(crate) local_scale: Vec3,
    pub(crate) local_rotation: Quat,
    pub(crate) world_matrix: Mat4,
    pub(crate) name: String,
}

impl Node {
    pub(crate) fn new(id: NodeId) -> Self {
        Self {
            id,
            root: NodeId::NULL,
            children: Vec::new(),
            hierarchy_depth: 0,
            mod_state: ModState::NONE,
            root_mod_index: None,
            transform_mod_index: None,
            local_position: Vec3::ZERO,
            local_scale: Vec3::ONE,
            local_rotation: Quat::IDENTITY,
            world_matrix: Mat4::IDENTITY,
            name: String::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current parent, or null for a root node
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Ordered ids of the current children
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    /// Copy children starting at `start` into `out`. Returns the number copied.
    pub fn copy_children(&self, start: usize, out: &mut [NodeId]) -> usize {
        copy_page(&self.children, start, out)
    }

    /// Distance from the hierarchy root. Root nodes have depth 0.
    pub fn hierarchy_depth(&self) -> u32 {
        self.hierarchy_depth
    }

    pub fn mod_state(&self) -> ModState {
        self.mod_state
    }

    /// Whether destruction is pending or applied
    pub fn is_destroyed(&self) -> bool {
        self.mod_state.intersects(ModState::DESTROYED)
    }

    pub fn local_position(&self) -> Vec3 {
        self.local_position
    }

    pub fn local_scale(&self) -> Vec3 {
        self.local_scale
    }

    pub fn local_rotation(&self) -> Quat {
        self.local_rotation
    }

    /// Local-to-world matrix as of the last applied system frame
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world_matrix
    }

    /// The staged root if there is one, otherwise the current root
    pub fn pending_root(&self, data: &SceneData) -> NodeId {
        self.root_mod_index
            .and_then(|i| data.root_mods.get(i as usize))
            .map_or(self.root, |m| m.root)
    }

    /// The staged local position if there is one, otherwise the current one
    pub fn pending_local_position(&self, data: &SceneData) -> Vec3 {
        self.transform_mod_index
            .and_then(|i| data.transform_mods.get(i as usize))
            .map_or(self.local_position, |m| m.position)
    }

    /// The staged local scale if there is one, otherwise the current one
    pub fn pending_local_scale(&self, data: &SceneData) -> Vec3 {
        self.transform_mod_index
            .and_then(|i| data.transform_mods.get(i as usize))
            .map_or(self.local_scale, |m| m.scale)
    }

    /// The staged local rotation if there is one, otherwise the current one
    pub fn pending_local_rotation(&self, data: &SceneData) -> Quat {
        self.transform_mod_index
            .and_then(|i| data.transform_mods.get(i as usize))
            .map_or(self.local_rotation, |m| m.rotation)
    }

    /// Local TRS matrix from the current local transform
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.local_scale, self.local_rotation, self.local_position)
    }
}

/// Copy `source[start..]` into `out`, as much as fits
pub(crate) fn copy_page(source: &[NodeId], start: usize, out: &mut [NodeId]) -> usize {
    let Some(remaining) = source.get(start..) else {
        return 0;
    };

    let count = remaining.len().min(out.len());
    out[..count].copy_from_slice(&remaining[..count]);
    count
}

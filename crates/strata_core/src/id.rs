//! Generational node identifiers

use core::fmt;

use bytemuck::{Pod, Zeroable};

use crate::archive::{ArchiveReader, ArchiveWriter, FromArchive, ToArchive};

/// Generation given to a slot the first time it is filled.
///
/// Generation 0 never belongs to a live slot, which is what makes the
/// all-zero id null.
pub const FIRST_GENERATION: u32 = 1;

/// Handle to a scene node.
///
/// Ids compare by index first, so ordered id vectors are sorted by slot.
/// A stale id (whose slot was freed and reused) carries an older generation
/// and no longer resolves.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// The null id
    pub const NULL: Self = Self::new(0, 0);

    /// Create a new id from index and generation
    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Id for a node restored from an archive, where only the index is stored
    #[inline]
    pub const fn restored(index: u32) -> Self {
        Self::new(index, FIRST_GENERATION)
    }

    #[inline]
    pub const fn is_null(&self) -> bool {
        self.generation == 0
    }

    #[inline]
    pub const fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "NodeId(null)")
        } else {
            write!(f, "NodeId({}v{})", self.index, self.generation)
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "{}v{}", self.index, self.generation)
        }
    }
}

/// Archived as the bare slot index, or null.
impl ToArchive for NodeId {
    fn to_archive(&self, writer: &mut dyn ArchiveWriter) {
        if self.is_null() {
            writer.null();
        } else {
            writer.uint(u64::from(self.index));
        }
    }
}

impl FromArchive for NodeId {
    fn from_archive(&mut self, reader: &mut dyn ArchiveReader) {
        if reader.is_null() {
            *self = Self::NULL;
            return;
        }

        if let Some(index) = reader.uint().and_then(|v| u32::try_from(v).ok()) {
            *self = Self::restored(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_archive::{from_json_str, to_json_value};

    #[test]
    fn test_node_id_null() {
        assert!(NodeId::NULL.is_null());
        assert!(NodeId::default().is_null());
        assert!(!NodeId::new(0, 1).is_null());
        assert_eq!(format!("{}", NodeId::new(4, 2)), "4v2");
    }

    #[test]
    fn test_node_id_order_by_index() {
        let mut ids = vec![NodeId::new(5, 1), NodeId::new(2, 7), NodeId::new(3, 1)];
        ids.sort();
        let indices: Vec<u32> = ids.iter().map(NodeId::index).collect();
        assert_eq!(indices, vec![2, 3, 5]);
    }

    #[test]
    fn test_node_id_archive() {
        assert_eq!(to_json_value(&NodeId::new(9, 3)), serde_json::json!(9));
        assert_eq!(to_json_value(&NodeId::NULL), serde_json::Value::Null);

        let mut id = NodeId::NULL;
        from_json_str("12", &mut id).unwrap();
        assert_eq!(id, NodeId::restored(12));
    }
}

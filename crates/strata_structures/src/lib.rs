//! # strata_structures - Data Structures
//!
//! Cache-friendly storage used by the scene runtime:
//! - SlotMap: Generational index-based storage
//! - Ordered sets: Strictly increasing id vectors with bulk merge and erase

pub mod ord_set;
pub mod slot_map;

pub use ord_set::{compact_ord, erase_ord, insert_ord, is_ordered, merge_ord_sets, remove_ord};
pub use slot_map::{Key, SlotKey, SlotMap};

pub mod prelude {
    pub use crate::ord_set::{compact_ord, erase_ord, insert_ord, is_ordered, merge_ord_sets, remove_ord};
    pub use crate::slot_map::{Key, SlotKey, SlotMap};
}

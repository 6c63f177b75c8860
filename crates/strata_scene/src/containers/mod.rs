//! Concrete component containers
//!
//! - [`BasicComponentContainer`]: pooled payloads with lifecycle channels
//! - [`MapComponentContainer`]: payloads in an ordered map, for cross-instance lookups
//! - [`EmptyComponentContainer`]: presence only

mod basic;
mod empty;
mod map;

pub use basic::BasicComponentContainer;
pub use empty::EmptyComponentContainer;
pub use map::MapComponentContainer;

//! # strata_core - Strata Core
//!
//! Foundational pieces shared by every other Strata crate:
//! - **Errors**: the single error type for the fallible edges of the runtime
//! - **NodeId**: generational node handles shared by every layer
//! - **Type registry**: runtime type information for component storage
//! - **Archives**: an object-safe reader/writer contract plus a JSON backend
//! - **FixedString**: inline strings that can travel inside POD events

pub mod archive;
pub mod error;
pub mod fixed_string;
pub mod id;
pub mod json_archive;
pub mod type_registry;

pub use archive::*;
pub use error::*;
pub use fixed_string::*;
pub use id::*;
pub use json_archive::*;
pub use type_registry::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::archive::{ArchiveReader, ArchiveWriter, FromArchive, ToArchive};
    pub use crate::error::{Error, Result};
    pub use crate::fixed_string::FixedString;
    pub use crate::id::NodeId;
    pub use crate::json_archive::{JsonArchiveReader, JsonArchiveWriter};
    pub use crate::type_registry::{TypeInfo, TypeRegistry};
}

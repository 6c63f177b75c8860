//! Runtime type information for component storage
//!
//! Component containers are managed as trait objects, so the scene needs a
//! way to go from an archived type name back to the container that owns it.
//! The registry is built once at startup as component types are registered.

use std::any::TypeId;
use std::collections::BTreeMap;
use std::fmt;

/// Information about a registered type
#[derive(Clone, PartialEq, Eq)]
pub struct TypeInfo {
    /// The Rust TypeId
    pub type_id: TypeId,
    /// Stable name, used as the archive key
    pub name: String,
    /// Size in bytes
    pub size: usize,
    /// Alignment requirement
    pub align: usize,
}

impl TypeInfo {
    /// Create type info named after the Rust type path
    pub fn of<T: 'static>() -> Self {
        Self::named::<T>(std::any::type_name::<T>())
    }

    /// Create type info with an explicit stable name
    pub fn named<T: 'static>(name: impl Into<String>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: name.into(),
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
        }
    }

    /// Whether values of this type carry no data
    pub fn is_zero_sized(&self) -> bool {
        self.size == 0
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("align", &self.align)
            .finish()
    }
}

/// Registry mapping type ids and names to [`TypeInfo`]
#[derive(Default)]
pub struct TypeRegistry {
    by_id: BTreeMap<TypeId, TypeInfo>,
    by_name: BTreeMap<String, TypeId>,
}

impl TypeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type.
    ///
    /// Returns `false` and keeps the existing entry if either the id or the
    /// name is already taken.
    pub fn register(&mut self, info: TypeInfo) -> bool {
        if self.by_id.contains_key(&info.type_id) || self.by_name.contains_key(&info.name) {
            log::warn!("Type '{}' is already registered", info.name);
            return false;
        }

        self.by_name.insert(info.name.clone(), info.type_id);
        self.by_id.insert(info.type_id, info);
        true
    }

    /// Get type info by TypeId
    pub fn get(&self, type_id: TypeId) -> Option<&TypeInfo> {
        self.by_id.get(&type_id)
    }

    /// Get type info by name
    pub fn get_by_name(&self, name: &str) -> Option<&TypeInfo> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    /// Check if a type is registered
    pub fn contains(&self, type_id: TypeId) -> bool {
        self.by_id.contains_key(&type_id)
    }

    /// Remove every registration
    pub fn clear(&mut self) {
        self.by_id.clear();
        self.by_name.clear();
    }

    /// Iterate over all registered types, ordered by name
    pub fn iter(&self) -> impl Iterator<Item = &TypeInfo> {
        self.by_name.values().filter_map(|id| self.by_id.get(id))
    }

    /// Get the number of registered types
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.by_id.len())
            .finish()
    }
}

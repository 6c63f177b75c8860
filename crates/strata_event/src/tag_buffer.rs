//! Compact, immutable per-frame records of emitted tags
//!
//! A [`TagBuffer`] answers "which nodes emitted this tag on this component
//! type, how many times, with what payload". Four layouts exist so that no
//! count array or value buffer is allocated when it is statically known to
//! be unnecessary:
//!
//! | constructor           | counts  | values  |
//! |-----------------------|---------|---------|
//! | `create`              | present | present |
//! | `create_single`       | absent  | present |
//! | `create_empty`        | present | absent  |
//! | `create_single_empty` | absent  | absent  |
//!
//! Consumers check [`TagBuffer::tags_single`] and [`TagBuffer::tags_empty`]
//! to interpret the layout.

use core::any::TypeId;
use core::ops::Range;

use bytemuck::Pod;
use strata_core::NodeId;

/// Number of tags one node emitted
pub type TagCount = u32;

/// Immutable record of the tags of one type emitted during a frame
#[derive(Clone, Debug)]
pub struct TagBuffer {
    component_type: TypeId,
    tag_type: TypeId,
    entities: Vec<NodeId>,
    counts: Vec<TagCount>,
    values: Option<Box<[u8]>>,
}

impl TagBuffer {
    /// Several tags per node, with payload.
    ///
    /// `counts[i]` tags belong to `entities[i]`, and `tags` holds every
    /// payload in entity order.
    pub fn create<T: Pod>(
        component_type: TypeId,
        entities: &[NodeId],
        counts: &[TagCount],
        tags: &[T],
    ) -> Self {
        debug_assert_eq!(entities.len(), counts.len());
        debug_assert_eq!(counts.iter().map(|c| *c as usize).sum::<usize>(), tags.len());
        Self::new::<T>(component_type, entities, counts.to_vec(), Some(bytemuck::cast_slice(tags)))
    }

    /// Exactly one tag per node, with payload
    pub fn create_single<T: Pod>(component_type: TypeId, entities: &[NodeId], tags: &[T]) -> Self {
        debug_assert_eq!(entities.len(), tags.len());
        Self::new::<T>(component_type, entities, Vec::new(), Some(bytemuck::cast_slice(tags)))
    }

    /// Several tags per node, zero-sized payload
    pub fn create_empty<T: 'static>(component_type: TypeId, entities: &[NodeId], counts: &[TagCount]) -> Self {
        debug_assert_eq!(entities.len(), counts.len());
        Self::new::<T>(component_type, entities, counts.to_vec(), None)
    }

    /// Exactly one tag per node, zero-sized payload
    pub fn create_single_empty<T: 'static>(component_type: TypeId, entities: &[NodeId]) -> Self {
        Self::new::<T>(component_type, entities, Vec::new(), None)
    }

    fn new<T: 'static>(
        component_type: TypeId,
        entities: &[NodeId],
        counts: Vec<TagCount>,
        values: Option<&[u8]>,
    ) -> Self {
        debug_assert!(
            strata_structures::is_ordered(entities),
            "tag entities must be strictly increasing"
        );

        Self {
            component_type,
            tag_type: TypeId::of::<T>(),
            entities: entities.to_vec(),
            counts,
            values: values.map(Box::from),
        }
    }

    /// The component type the tags were emitted on
    pub fn component_type(&self) -> TypeId {
        self.component_type
    }

    pub fn tag_type(&self) -> TypeId {
        self.tag_type
    }

    /// Ordered, duplicate-free nodes that emitted at least one tag
    pub fn entities(&self) -> &[NodeId] {
        &self.entities
    }

    /// Per-entity tag counts; empty when [`tags_single`](Self::tags_single)
    pub fn counts(&self) -> &[TagCount] {
        &self.counts
    }

    /// Every entity emitted exactly one tag; there is no count array
    pub fn tags_single(&self) -> bool {
        self.counts.is_empty()
    }

    /// The tag type has no payload; there is no value buffer
    pub fn tags_empty(&self) -> bool {
        self.values.is_none()
    }

    /// Total number of tags across all entities
    pub fn num_tags(&self) -> usize {
        if self.tags_single() {
            self.entities.len()
        } else {
            self.counts.iter().map(|c| *c as usize).sum()
        }
    }

    /// Number of tags the `i`-th entity emitted
    pub fn count(&self, i: usize) -> TagCount {
        if self.tags_single() {
            1
        } else {
            self.counts[i]
        }
    }

    /// Positions of the `i`-th entity's tags within [`tags`](Self::tags)
    pub fn tag_range(&self, i: usize) -> Range<usize> {
        if self.tags_single() {
            return i..i + 1;
        }

        let start = self.counts[..i].iter().map(|c| *c as usize).sum();
        start..start + self.counts[i] as usize
    }

    /// Every payload, in entity order. Empty for zero-payload tags.
    pub fn tags<T: Pod>(&self) -> Vec<T> {
        debug_assert_eq!(TypeId::of::<T>(), self.tag_type, "wrong tag type");
        match &self.values {
            Some(bytes) => decode(bytes),
            None => Vec::new(),
        }
    }

    /// Payloads emitted by the `i`-th entity
    pub fn entity_tags<T: Pod>(&self, i: usize) -> Vec<T> {
        debug_assert_eq!(TypeId::of::<T>(), self.tag_type, "wrong tag type");
        let Some(bytes) = &self.values else {
            return Vec::new();
        };

        let size = core::mem::size_of::<T>();
        let range = self.tag_range(i);
        decode(&bytes[range.start * size..range.end * size])
    }
}

/// Copy packed payloads out of a possibly unaligned byte buffer
fn decode<T: Pod>(bytes: &[u8]) -> Vec<T> {
    let size = core::mem::size_of::<T>();
    if size == 0 {
        return Vec::new();
    }
    bytes.chunks_exact(size).map(bytemuck::pod_read_unaligned).collect()
}

/// Accumulates tags of one type emitted on one component type, then packs
/// them into a [`TagBuffer`].
///
/// Entities must be added in ascending order.
#[derive(Clone, Debug)]
pub struct TagStorage<T: Pod> {
    entities: Vec<NodeId>,
    counts: Vec<TagCount>,
    tags: Vec<T>,
    multi: bool,
}

impl<T: Pod> TagStorage<T> {
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            counts: Vec::new(),
            tags: Vec::new(),
            multi: false,
        }
    }

    /// Add a tag. Consecutive tags for the same entity are counted together.
    pub fn add_tag(&mut self, entity: NodeId, value: T) {
        self.multi = true;
        match (self.entities.last(), self.counts.last_mut()) {
            (Some(last), Some(count)) if *last == entity => *count += 1,
            _ => {
                self.entities.push(entity);
                self.counts.push(1);
            }
        }

        if core::mem::size_of::<T>() != 0 {
            self.tags.push(value);
        }
    }

    /// Add a tag, ignoring repeats for the same entity
    pub fn add_single_tag(&mut self, entity: NodeId, value: T) {
        if self.entities.last() == Some(&entity) {
            return;
        }

        self.entities.push(entity);
        self.counts.push(1);

        if core::mem::size_of::<T>() != 0 {
            self.tags.push(value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.counts.clear();
        self.tags.clear();
        self.multi = false;
    }

    /// Pack the accumulated tags, or `None` if nothing was added
    pub fn create_buffer(&self, component_type: TypeId) -> Option<TagBuffer> {
        if self.entities.is_empty() {
            return None;
        }

        let buffer = if core::mem::size_of::<T>() == 0 {
            if self.multi {
                TagBuffer::create_empty::<T>(component_type, &self.entities, &self.counts)
            } else {
                TagBuffer::create_single_empty::<T>(component_type, &self.entities)
            }
        } else if self.multi {
            TagBuffer::create(component_type, &self.entities, &self.counts, &self.tags)
        } else {
            TagBuffer::create_single(component_type, &self.entities, &self.tags)
        };

        Some(buffer)
    }
}

impl<T: Pod> Default for TagStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;

    struct Mesh;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Touched;

    // SAFETY: zero-sized, no bytes to validate
    unsafe impl Zeroable for Touched {}
    unsafe impl Pod for Touched {}

    #[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, Zeroable)]
    #[repr(C)]
    struct Hit {
        point: [f32; 3],
        damage: u32,
    }

    fn hit(damage: u32) -> Hit {
        Hit {
            point: [damage as f32, 0.5, -1.0],
            damage,
        }
    }

    fn ids(indices: &[u32]) -> Vec<NodeId> {
        indices.iter().map(|i| NodeId::restored(*i)).collect()
    }

    #[test]
    fn test_create_layouts() {
        let mesh = TypeId::of::<Mesh>();
        let nodes = ids(&[1, 4, 6]);

        let full = TagBuffer::create(mesh, &nodes, &[2, 1, 3], &[10u32, 11, 20, 30, 31, 32]);
        assert!(!full.tags_single());
        assert!(!full.tags_empty());
        assert_eq!(full.num_tags(), 6);
        assert_eq!(full.tag_range(2), 3..6);
        assert_eq!(full.entity_tags::<u32>(0), vec![10, 11]);
        assert_eq!(full.entity_tags::<u32>(2), vec![30, 31, 32]);

        let single = TagBuffer::create_single(mesh, &nodes, &[7u16, 8, 9]);
        assert!(single.tags_single());
        assert!(single.counts().is_empty());
        assert_eq!(single.count(1), 1);
        assert_eq!(single.entity_tags::<u16>(1), vec![8]);

        let empty = TagBuffer::create_empty::<Touched>(mesh, &nodes, &[1, 1, 2]);
        assert!(empty.tags_empty());
        assert_eq!(empty.num_tags(), 4);

        let single_empty = TagBuffer::create_single_empty::<Touched>(mesh, &nodes);
        assert!(single_empty.tags_single() && single_empty.tags_empty());
        assert_eq!(single_empty.component_type(), mesh);
        assert_eq!(single_empty.tag_type(), TypeId::of::<Touched>());
    }

    #[test]
    fn test_storage_picks_layout() {
        let mesh = TypeId::of::<Mesh>();

        let mut single = TagStorage::<u32>::new();
        single.add_single_tag(NodeId::restored(1), 5);
        single.add_single_tag(NodeId::restored(1), 6);
        single.add_single_tag(NodeId::restored(2), 7);
        let buffer = single.create_buffer(mesh).unwrap();
        assert!(buffer.tags_single());
        assert_eq!(buffer.tags::<u32>(), vec![5, 7]);

        let mut empty = TagStorage::<Touched>::new();
        empty.add_tag(NodeId::restored(3), Touched);
        empty.add_tag(NodeId::restored(3), Touched);
        let buffer = empty.create_buffer(mesh).unwrap();
        assert!(buffer.tags_empty());
        assert!(!buffer.tags_single());
        assert_eq!(buffer.counts(), &[2]);

        assert!(TagStorage::<u32>::new().create_buffer(mesh).is_none());
    }

    #[test]
    fn test_entity_tags_decode_wide_payloads() {
        let mesh = TypeId::of::<Mesh>();
        let nodes = ids(&[2, 3, 9]);
        let hits = [hit(1), hit(2), hit(3), hit(4)];

        let buffer = TagBuffer::create(mesh, &nodes, &[1, 0, 3], &hits);
        assert_eq!(buffer.tags::<Hit>(), hits.to_vec());
        assert_eq!(buffer.entity_tags::<Hit>(0), vec![hit(1)]);
        assert!(buffer.entity_tags::<Hit>(1).is_empty());
        assert_eq!(buffer.entity_tags::<Hit>(2), vec![hit(2), hit(3), hit(4)]);

        let empty = TagBuffer::create_empty::<Touched>(mesh, &nodes, &[1, 1, 1]);
        assert!(empty.entity_tags::<Touched>(1).is_empty());
    }
}

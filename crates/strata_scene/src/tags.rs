//! Tags emitted during a system frame, waiting to be packed and dispatched

use std::any::{Any, TypeId};
use std::collections::BTreeMap;

use bytemuck::Pod;
use strata_core::NodeId;
use strata_event::{TagBuffer, TagStorage};

trait PendingTags {
    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn len(&self) -> usize;

    fn build(&mut self, component_type: TypeId) -> Option<TagBuffer>;
}

struct TagQueue<T: Pod> {
    /// `(node, value, single)` in emission order
    tags: Vec<(NodeId, T, bool)>,
}

impl<T: Pod> PendingTags for TagQueue<T> {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn len(&self) -> usize {
        self.tags.len()
    }

    fn build(&mut self, component_type: TypeId) -> Option<TagBuffer> {
        // Stable, so each node's tags keep their emission order
        self.tags.sort_by_key(|(node, _, _)| *node);

        let mut storage = TagStorage::<T>::new();
        for (node, value, single) in self.tags.drain(..) {
            if single {
                storage.add_single_tag(node, value);
            } else {
                storage.add_tag(node, value);
            }
        }
        storage.create_buffer(component_type)
    }
}

/// Tags keyed by `(tag type, component type)`
#[derive(Default)]
pub(crate) struct EmittedTags {
    queues: BTreeMap<(TypeId, TypeId), Box<dyn PendingTags>>,
}

impl EmittedTags {
    pub(crate) fn push<C: 'static, T: Pod>(&mut self, node: NodeId, value: T, single: bool) {
        let queue = self
            .queues
            .entry((TypeId::of::<T>(), TypeId::of::<C>()))
            .or_insert_with(|| Box::new(TagQueue::<T> { tags: Vec::new() }));

        if let Some(queue) = queue.as_any_mut().downcast_mut::<TagQueue<T>>() {
            queue.tags.push((node, value, single));
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queues.values().all(|q| q.len() == 0)
    }

    pub(crate) fn num_tags(&self) -> usize {
        self.queues.values().map(|q| q.len()).sum()
    }

    /// Pack every queue into a buffer, leaving this empty
    pub(crate) fn into_buffers(self) -> Vec<TagBuffer> {
        self.queues
            .into_iter()
            .filter_map(|((_, component_type), mut queue)| queue.build(component_type))
            .collect()
    }
}

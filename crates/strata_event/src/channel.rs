//! Multi-subscriber ring buffer of plain-old-data events
//!
//! Producers append copies of `Pod` events into one growable byte ring.
//! Each subscriber owns an independent read cursor, so consumers run at
//! their own pace without affecting each other. Nothing is allocated per
//! event; the buffer only grows when the slowest subscriber falls behind
//! by more than its capacity.
//!
//! # Indices
//!
//! `end_index` and the subscriber cursors are monotonic event counts. The
//! physical position in the ring is `index % capacity`. The unconsumed span
//! is `[min cursor, end_index)`, and that is the only data kept across a
//! growth.

use core::any::TypeId;
use core::fmt;

use bytemuck::Pod;

/// Hard limit on concurrent subscribers per channel
pub const MAX_SUBSCRIBERS: usize = 12;

/// Handle for a subscriber's read cursor
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u8);

impl SubscriberId {
    /// Returned when a channel has no free subscriber slots
    pub const INVALID: Self = Self(255);

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        (self.0 as usize) < MAX_SUBSCRIBERS
    }
}

impl fmt::Debug for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "SubscriberId({})", self.0)
        } else {
            write!(f, "SubscriberId(invalid)")
        }
    }
}

/// Growable, type-erased ring buffer of `Pod` events
pub struct EventChannel {
    event_type: TypeId,
    event_type_name: &'static str,
    event_size: usize,
    buffer: Vec<u8>,
    /// Capacity in events
    capacity: usize,
    end_index: usize,
    cursors: [Option<usize>; MAX_SUBSCRIBERS],
}

impl EventChannel {
    /// Create a channel for events of type `E` with room for `capacity`
    /// events before the first growth
    pub fn new<E: Pod>(capacity: usize) -> Self {
        let event_size = core::mem::size_of::<E>();
        debug_assert!(event_size > 0, "zero-sized events cannot be buffered");

        let capacity = capacity.max(1);
        Self {
            event_type: TypeId::of::<E>(),
            event_type_name: core::any::type_name::<E>(),
            event_size,
            buffer: vec![0; capacity * event_size],
            capacity,
            end_index: 0,
            cursors: [None; MAX_SUBSCRIBERS],
        }
    }

    /// Register a new subscriber.
    ///
    /// The cursor starts at the current write position, so events appended
    /// before this call are never visible to it.
    pub fn subscribe(&mut self) -> SubscriberId {
        match self.cursors.iter().position(Option::is_none) {
            Some(slot) => {
                self.cursors[slot] = Some(self.end_index);
                SubscriberId(slot as u8)
            }
            None => {
                log::error!(
                    "EventChannel<{}> is out of subscriber slots ({} max)",
                    self.event_type_name,
                    MAX_SUBSCRIBERS
                );
                debug_assert!(false, "too many subscribers on one event channel");
                SubscriberId::INVALID
            }
        }
    }

    /// Release a subscriber slot
    pub fn unsubscribe(&mut self, subscriber: SubscriberId) {
        if let Some(cursor) = self.cursor_slot(subscriber) {
            *cursor = None;
        }
    }

    /// Append events for every current subscriber.
    ///
    /// With no subscribers this is a no-op: nobody could ever read the data.
    pub fn append<E: Pod>(&mut self, events: &[E]) {
        self.check_type::<E>();
        if events.is_empty() {
            return;
        }

        let Some(start_index) = self.cursors.iter().flatten().min().copied() else {
            return;
        };

        let count = events.len();
        let size = self.end_index - start_index;
        if size + count > self.capacity {
            self.grow(start_index, (self.capacity * 2).max(size + count));
        }

        let es = self.event_size;
        let bytes: &[u8] = bytemuck::cast_slice(events);
        let mod_end = self.end_index % self.capacity;

        let first = (self.capacity - mod_end).min(count);
        let second = count - first;
        self.buffer[mod_end * es..(mod_end + first) * es].copy_from_slice(&bytes[..first * es]);
        self.buffer[..second * es].copy_from_slice(&bytes[first * es..]);

        self.end_index += count;
    }

    /// Append a single event
    pub fn append_one<E: Pod>(&mut self, event: E) {
        self.append(core::slice::from_ref(&event));
    }

    /// Copy up to `out.len()` unread events for `subscriber` into `out`,
    /// oldest first, and advance that subscriber's cursor. Returns the
    /// number of events copied.
    pub fn consume<E: Pod>(&mut self, subscriber: SubscriberId, out: &mut [E]) -> usize {
        self.check_type::<E>();
        let Some(index) = self.cursor(subscriber) else {
            return 0;
        };

        let es = self.event_size;
        let size = self.end_index - index;
        let mod_index = index % self.capacity;

        let first = (self.capacity - mod_index).min(size).min(out.len());
        let second = (out.len() - first).min(size - first);

        let out_bytes: &mut [u8] = bytemuck::cast_slice_mut(out);
        out_bytes[..first * es].copy_from_slice(&self.buffer[mod_index * es..(mod_index + first) * es]);
        out_bytes[first * es..(first + second) * es].copy_from_slice(&self.buffer[..second * es]);

        let copied = first + second;
        if let Some(cursor) = self.cursor_slot(subscriber) {
            *cursor = Some(index + copied);
        }
        copied
    }

    /// Skip every unread event for `subscriber` without copying
    pub fn acknowledge_unconsumed(&mut self, subscriber: SubscriberId) {
        let end_index = self.end_index;
        if let Some(cursor) = self.cursor_slot(subscriber) {
            if cursor.is_some() {
                *cursor = Some(end_index);
            }
        }
    }

    /// Grow to hold at least `capacity` events before the next reallocation.
    /// Unread events are kept.
    pub fn reserve(&mut self, capacity: usize) {
        if capacity <= self.capacity {
            return;
        }
        let start_index = self.cursors.iter().flatten().min().copied().unwrap_or(self.end_index);
        self.grow(start_index, capacity);
    }

    /// Reset the write cursor and every active subscriber cursor to zero,
    /// discarding all buffered events
    pub fn clear(&mut self) {
        self.end_index = 0;
        for cursor in self.cursors.iter_mut().flatten() {
            *cursor = 0;
        }
    }

    /// Number of events `subscriber` has not read yet
    pub fn unconsumed(&self, subscriber: SubscriberId) -> usize {
        self.cursor(subscriber).map_or(0, |index| self.end_index - index)
    }

    /// Number of events kept alive for the slowest subscriber
    pub fn retained(&self) -> usize {
        self.cursors
            .iter()
            .flatten()
            .min()
            .map_or(0, |start| self.end_index - start)
    }

    /// Capacity in events
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn num_subscribers(&self) -> usize {
        self.cursors.iter().flatten().count()
    }

    pub fn event_type(&self) -> TypeId {
        self.event_type
    }

    pub fn event_type_name(&self) -> &'static str {
        self.event_type_name
    }

    fn cursor(&self, subscriber: SubscriberId) -> Option<usize> {
        debug_assert!(subscriber.is_valid(), "subscriber id out of range");
        self.cursors.get(subscriber.index()).copied().flatten()
    }

    fn cursor_slot(&mut self, subscriber: SubscriberId) -> Option<&mut Option<usize>> {
        debug_assert!(subscriber.is_valid(), "subscriber id out of range");
        self.cursors.get_mut(subscriber.index())
    }

    #[inline]
    fn check_type<E: Pod>(&self) {
        debug_assert_eq!(
            TypeId::of::<E>(),
            self.event_type,
            "wrong event type for EventChannel<{}>",
            self.event_type_name
        );
    }

    /// Reallocate to `new_capacity` events, keeping only the unconsumed span
    /// and rebasing every cursor onto it
    fn grow(&mut self, start_index: usize, new_capacity: usize) {
        let es = self.event_size;
        let old_capacity = self.capacity;
        let mut new_buffer = vec![0u8; new_capacity * es];

        let size = self.end_index - start_index;
        let mod_start = start_index % old_capacity;
        let first = (old_capacity - mod_start).min(size);
        let second = size - first;
        new_buffer[..first * es].copy_from_slice(&self.buffer[mod_start * es..(mod_start + first) * es]);
        new_buffer[first * es..size * es].copy_from_slice(&self.buffer[..second * es]);

        for cursor in self.cursors.iter_mut().flatten() {
            *cursor -= start_index;
        }

        self.buffer = new_buffer;
        self.capacity = new_capacity;
        self.end_index = size;

        log::debug!(
            "EventChannel<{}> grew {} -> {} events ({} retained)",
            self.event_type_name,
            old_capacity,
            new_capacity,
            size
        );
    }
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("event_type", &self.event_type_name)
            .field("capacity", &self.capacity)
            .field("end_index", &self.end_index)
            .field("subscribers", &self.num_subscribers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_late_subscriber_sees_no_history() {
        let mut channel = EventChannel::new::<u32>(4);
        let early = channel.subscribe();
        channel.append(&[1u32, 2]);

        let late = channel.subscribe();
        channel.append(&[3u32]);

        let mut out = [0u32; 8];
        assert_eq!(channel.consume(early, &mut out), 3);
        assert_eq!(&out[..3], &[1, 2, 3]);
        assert_eq!(channel.consume(late, &mut out), 1);
        assert_eq!(out[0], 3);
    }

    #[test]
    fn test_append_without_subscribers_is_dropped() {
        let mut channel = EventChannel::new::<u32>(2);
        channel.append(&[1u32, 2, 3, 4, 5]);
        assert_eq!(channel.capacity(), 2);

        let sub = channel.subscribe();
        assert_eq!(channel.unconsumed(sub), 0);
    }

    #[test]
    fn test_grow_keeps_only_unconsumed_span() {
        let mut channel = EventChannel::new::<u32>(4);
        let fast = channel.subscribe();
        let slow = channel.subscribe();
        let mut out = [0u32; 16];

        channel.append(&[1u32, 2, 3]);
        assert_eq!(channel.consume(slow, &mut out[..2]), 2);
        assert_eq!(channel.consume(fast, &mut out), 3);

        // Wraps the ring: slow still needs [3], then 4..=9 overflow capacity 4
        channel.append(&[4u32, 5, 6, 7, 8, 9]);
        assert_eq!(channel.capacity(), 8);
        assert_eq!(channel.retained(), 7);

        assert_eq!(channel.consume(slow, &mut out), 7);
        assert_eq!(&out[..7], &[3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(channel.consume(fast, &mut out), 6);
        assert_eq!(&out[..6], &[4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_reserve_keeps_unread_events() {
        let mut channel = EventChannel::new::<u32>(4);
        let sub = channel.subscribe();
        let mut out = [0u32; 8];

        channel.append(&[1u32, 2, 3]);
        assert_eq!(channel.consume(sub, &mut out[..1]), 1);

        channel.reserve(2);
        assert_eq!(channel.capacity(), 4);

        channel.reserve(32);
        assert_eq!(channel.capacity(), 32);
        assert_eq!(channel.unconsumed(sub), 2);
        assert_eq!(channel.consume(sub, &mut out), 2);
        assert_eq!(&out[..2], &[2, 3]);

        let mut idle = EventChannel::new::<u32>(1);
        idle.reserve(16);
        assert_eq!(idle.capacity(), 16);
    }

    #[test]
    fn test_consume_wraps_in_two_pieces() {
        let mut channel = EventChannel::new::<u64>(4);
        let sub = channel.subscribe();
        let mut out = [0u64; 4];

        channel.append(&[1u64, 2, 3]);
        assert_eq!(channel.consume(sub, &mut out), 3);
        channel.append(&[4u64, 5, 6]);
        assert_eq!(channel.capacity(), 4);

        assert_eq!(channel.consume(sub, &mut out[..2]), 2);
        assert_eq!(&out[..2], &[4, 5]);
        assert_eq!(channel.consume(sub, &mut out), 1);
        assert_eq!(out[0], 6);
        assert_eq!(channel.consume(sub, &mut out), 0);
    }

    #[test]
    fn test_acknowledge_and_clear() {
        let mut channel = EventChannel::new::<u32>(4);
        let a = channel.subscribe();
        let b = channel.subscribe();
        channel.append(&[1u32, 2]);

        channel.acknowledge_unconsumed(a);
        assert_eq!(channel.unconsumed(a), 0);
        assert_eq!(channel.unconsumed(b), 2);

        channel.clear();
        assert_eq!(channel.unconsumed(b), 0);
        channel.append(&[7u32]);

        let mut out = [0u32; 2];
        assert_eq!(channel.consume(a, &mut out), 1);
        assert_eq!(out[0], 7);
    }

    #[test]
    fn test_unsubscribe_frees_slot_and_span() {
        let mut channel = EventChannel::new::<u32>(4);
        let a = channel.subscribe();
        let b = channel.subscribe();
        channel.append(&[1u32, 2, 3]);
        let mut out = [0u32; 4];
        channel.consume(a, &mut out);

        channel.unsubscribe(b);
        assert_eq!(channel.num_subscribers(), 1);
        assert_eq!(channel.retained(), 0);
        assert_eq!(channel.unconsumed(b), 0);

        // The freed slot is handed out again
        assert_eq!(channel.subscribe(), b);
    }

    #[test]
    fn test_subscriber_ceiling() {
        let mut channel = EventChannel::new::<u32>(1);
        let ids: Vec<_> = (0..MAX_SUBSCRIBERS).map(|_| channel.subscribe()).collect();
        assert!(ids.iter().all(|id| id.is_valid()));
        assert_eq!(channel.num_subscribers(), MAX_SUBSCRIBERS);
    }
}

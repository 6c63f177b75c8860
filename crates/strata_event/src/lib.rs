//! # strata_event - Event Channels and Tag Buffers
//!
//! Frame-scoped messaging for the scene runtime:
//! - [`EventChannel`]: type-erased ring of POD events with up to
//!   [`MAX_SUBSCRIBERS`] independent read cursors
//! - [`TagBuffer`]: immutable, node-ordered record of tags emitted during a
//!   frame, packed from a [`TagStorage`]

pub mod channel;
pub mod tag_buffer;

pub use channel::{EventChannel, SubscriberId, MAX_SUBSCRIBERS};
pub use tag_buffer::{TagBuffer, TagCount, TagStorage};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::channel::{EventChannel, SubscriberId};
    pub use crate::tag_buffer::{TagBuffer, TagStorage};
}

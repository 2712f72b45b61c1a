//! Events a conversation publishes to its UI.

use crate::PermissionRequest;
use kcore::StreamChunk;

/// One UI event.
#[derive(Debug)]
pub enum Event {
    /// A stream chunk or tool lifecycle event, in receipt order.
    Chunk(StreamChunk),
    /// The permission request now at the head of the queue.
    Permission(PermissionRequest),
}

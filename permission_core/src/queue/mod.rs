//! The serialization queue.
//!
//! Producers push [`PermissionRequest`](crate::request::PermissionRequest)s
//! through a [`QueueHandle`] from any thread. A single draining loop
//! ([`SerializationQueue::run`]) takes them in arrival order and keeps at most
//! one platform prompt outstanding at a time.

pub mod events;
mod handle;
mod processor;
pub mod types;

pub use events::{DropReason, QueueEvent, QueueEventKind};
pub use handle::{Admission, QueueHandle, QueueState};
pub use processor::SerializationQueue;
pub use types::*;

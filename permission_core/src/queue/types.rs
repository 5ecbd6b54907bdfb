use super::events::QueueEvent;
use crate::request::PermissionRequest;
use tokio::sync::{broadcast, mpsc};

/// Producer side of the request buffer
pub type RequestSender = mpsc::Sender<PermissionRequest>;

/// Consumer side of the request buffer, owned by the draining loop
pub type RequestReceiver = mpsc::Receiver<PermissionRequest>;

/// A sender for broadcasting queue events
pub type EventSender = broadcast::Sender<QueueEvent>;

/// A receiver for queue events
pub type EventReceiver = broadcast::Receiver<QueueEvent>;

/// Number of queue events retained for slow subscribers
pub const EVENT_BUFFER: usize = 256;

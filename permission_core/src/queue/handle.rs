use super::events::{emit, QueueEventKind};
use super::types::{EventReceiver, EventSender, RequestSender};
use crate::request::PermissionRequest;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Result of a non-blocking enqueue attempt
#[derive(Debug)]
pub enum Admission {
    Queued,
    /// The buffer is full; the request is handed back untouched
    Full(PermissionRequest),
    /// The draining loop has stopped; the request is handed back untouched
    Closed(PermissionRequest),
}

/// Whether the draining loop is working through requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Draining,
}

/// Cloneable producer handle. Safe to use from any thread; never blocks.
#[derive(Debug, Clone)]
pub struct QueueHandle {
    tx: RequestSender,
    events: EventSender,
    draining: Arc<AtomicBool>,
}

impl QueueHandle {
    pub(crate) fn new(tx: RequestSender, events: EventSender, draining: Arc<AtomicBool>) -> Self {
        Self {
            tx,
            events,
            draining,
        }
    }

    /// Try to place a request in the buffer without waiting
    pub fn try_enqueue(&self, request: PermissionRequest) -> Admission {
        let request_id = request.id;
        match self.tx.try_send(request) {
            Ok(()) => {
                debug!(request_id = %request_id, pending = self.pending(), "Request queued");
                emit(&self.events, request_id, QueueEventKind::Queued);
                Admission::Queued
            }
            Err(TrySendError::Full(request)) => {
                warn!(
                    request_id = %request_id,
                    capacity = self.capacity(),
                    "Permission queue full, rejecting newest request"
                );
                Admission::Full(request)
            }
            Err(TrySendError::Closed(request)) => {
                warn!(request_id = %request_id, "Permission queue closed");
                Admission::Closed(request)
            }
        }
    }

    /// Number of requests waiting in the buffer
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    pub fn state(&self) -> QueueState {
        if self.draining.load(Ordering::Acquire) {
            QueueState::Draining
        } else {
            QueueState::Idle
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Get a receiver for queue events
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    pub(crate) fn events(&self) -> &EventSender {
        &self.events
    }
}

use super::types::EventSender;
use crate::outcome::AuthorizationOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a request left the queue without reaching the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The buffer was full when the request arrived
    Overflow,
    /// The draining loop is gone
    QueueClosed,
    /// The owner was destroyed or detached before the request started
    OwnerGone,
    /// The owner had not reached the started state
    OwnerInactive,
    /// The owner exposed no grant context at submission
    NoContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEventKind {
    /// Accepted into the buffer
    Queued,
    /// Already granted; the callback was dispatched without queueing
    GrantedImmediately,
    Dropped { reason: DropReason },
    /// The platform prompt was launched
    Launched,
    Completed { outcome: AuthorizationOutcome },
    /// The owner was destroyed while the prompt was showing
    Cancelled,
    /// The platform released the request without answering
    Abandoned,
}

/// Something that happened to one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEvent {
    pub request_id: Uuid,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: QueueEventKind,
}

impl QueueEvent {
    pub fn new(request_id: Uuid, kind: QueueEventKind) -> Self {
        Self {
            request_id,
            at: Utc::now(),
            kind,
        }
    }

    /// True once nothing more will happen to the request
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self.kind,
            QueueEventKind::Queued | QueueEventKind::Launched
        )
    }
}

/// Publish an event; having no subscribers is fine
pub(crate) fn emit(events: &EventSender, request_id: Uuid, kind: QueueEventKind) {
    let _ = events.send(QueueEvent::new(request_id, kind));
}

use crate::outcome::{AuthorizationOutcome, PermissionsCallback};
use crate::owner::OwnerAdapter;
use crate::types::PermissionSet;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// One pending ask: who asks, for what, and who to tell
pub struct PermissionRequest {
    pub id: Uuid,
    pub owner: Arc<dyn OwnerAdapter>,
    pub identifiers: PermissionSet,
    pub submitted_at: DateTime<Utc>,
    callback: Box<dyn PermissionsCallback>,
}

impl PermissionRequest {
    pub fn new(
        owner: Arc<dyn OwnerAdapter>,
        identifiers: PermissionSet,
        callback: Box<dyn PermissionsCallback>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            identifiers,
            submitted_at: Utc::now(),
            callback,
        }
    }

    /// Deliver an outcome, consuming the request
    pub fn complete(self, outcome: AuthorizationOutcome) {
        outcome.deliver(self.callback)
    }

    /// Report every requested identifier as denied
    pub fn deny_all(self) {
        let denied = self.identifiers.clone();
        self.complete(AuthorizationOutcome::Denied(denied))
    }
}

impl fmt::Debug for PermissionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionRequest")
            .field("id", &self.id)
            .field("owner", &self.owner.kind())
            .field("identifiers", &self.identifiers)
            .field("submitted_at", &self.submitted_at)
            .finish_non_exhaustive()
    }
}

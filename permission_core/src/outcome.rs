//! Authorization outcomes and the completion callback contract.
//!
//! A callback fires **at most once**. It never fires when the request is
//! dropped: owner destroyed or detached, owner not yet started, owner
//! destroyed while the platform prompt was showing, queue overflow, or an
//! embedded owner without a context. Callers must not assume it always fires.

use crate::types::{AuthorizationResponse, PermissionSet};
use serde::{Deserialize, Serialize};

/// Result of a completed authorization request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "denied", rename_all = "snake_case")]
pub enum AuthorizationOutcome {
    Granted,
    Denied(PermissionSet),
}

impl AuthorizationOutcome {
    /// Granted iff every identifier in the response is granted
    pub fn from_response(response: &AuthorizationResponse) -> Self {
        let denied: PermissionSet = response
            .iter()
            .filter(|(_, granted)| !**granted)
            .map(|(identifier, _)| identifier.clone())
            .collect();

        if denied.is_empty() {
            AuthorizationOutcome::Granted
        } else {
            AuthorizationOutcome::Denied(denied)
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, AuthorizationOutcome::Granted)
    }

    /// Hand this outcome to a callback, consuming both
    pub fn deliver(self, callback: Box<dyn PermissionsCallback>) {
        match self {
            AuthorizationOutcome::Granted => callback.on_granted(),
            AuthorizationOutcome::Denied(denied) => callback.on_denied(denied),
        }
    }
}

/// Receives the outcome of one permission request.
///
/// Both methods consume the callback, so at most one of them can run.
pub trait PermissionsCallback: Send {
    fn on_granted(self: Box<Self>);
    fn on_denied(self: Box<Self>, denied: PermissionSet);
}

/// Adapts a pair of closures to [`PermissionsCallback`]
pub struct FnCallback<G, D> {
    on_granted: G,
    on_denied: D,
}

impl<G, D> FnCallback<G, D>
where
    G: FnOnce() + Send + 'static,
    D: FnOnce(PermissionSet) + Send + 'static,
{
    pub fn new(on_granted: G, on_denied: D) -> Self {
        Self {
            on_granted,
            on_denied,
        }
    }

    pub fn boxed(on_granted: G, on_denied: D) -> Box<dyn PermissionsCallback> {
        Box::new(Self::new(on_granted, on_denied))
    }
}

impl<G, D> PermissionsCallback for FnCallback<G, D>
where
    G: FnOnce() + Send + 'static,
    D: FnOnce(PermissionSet) + Send + 'static,
{
    fn on_granted(self: Box<Self>) {
        (self.on_granted)()
    }

    fn on_denied(self: Box<Self>, denied: PermissionSet) {
        (self.on_denied)(denied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::permission_set;
    use std::sync::mpsc;

    #[test]
    fn test_all_true_is_granted() {
        let response: AuthorizationResponse =
            [("a".to_string(), true), ("b".to_string(), true)].into_iter().collect();
        assert_eq!(
            AuthorizationOutcome::from_response(&response),
            AuthorizationOutcome::Granted
        );
    }

    #[test]
    fn test_empty_response_is_granted() {
        let outcome = AuthorizationOutcome::from_response(&AuthorizationResponse::new());
        assert!(outcome.is_granted());
    }

    #[test]
    fn test_partial_denial_collects_denied_subset() {
        let response: AuthorizationResponse = [
            ("a".to_string(), true),
            ("b".to_string(), false),
            ("c".to_string(), false),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            AuthorizationOutcome::from_response(&response),
            AuthorizationOutcome::Denied(permission_set(["b", "c"]))
        );
    }

    #[test]
    fn test_deliver_routes_to_matching_closure() {
        let (tx, rx) = mpsc::channel();
        let granted_tx = tx.clone();
        let callback = FnCallback::boxed(
            move || granted_tx.send(None).unwrap(),
            move |denied| tx.send(Some(denied)).unwrap(),
        );

        AuthorizationOutcome::Denied(permission_set(["x"])).deliver(callback);
        assert_eq!(rx.recv().unwrap(), Some(permission_set(["x"])));
    }

    #[test]
    fn test_outcome_serialization() {
        let denied = AuthorizationOutcome::Denied(permission_set(["x"]));
        let json = serde_json::to_value(&denied).unwrap();
        assert_eq!(json, serde_json::json!({"status": "denied", "denied": ["x"]}));

        let granted = serde_json::to_value(AuthorizationOutcome::Granted).unwrap();
        assert_eq!(granted, serde_json::json!({"status": "granted"}));
    }
}

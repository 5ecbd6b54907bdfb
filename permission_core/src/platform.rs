//! Interfaces of the platform collaborators the queue drives.
//!
//! None of these are implemented here; [`crate::sim`] provides in-memory
//! versions for the CLI and for tests.

use crate::types::{AuthorizationResponse, PermissionSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Synchronous, side-effect free grant query
pub trait GrantChecker: Send + Sync {
    fn is_granted(&self, identifier: &str) -> bool;
}

/// Lifecycle states of an owning context, in ascending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Destroyed,
    Initialized,
    Created,
    Started,
    Resumed,
}

impl LifecycleState {
    pub fn is_at_least(self, other: LifecycleState) -> bool {
        self >= other
    }
}

/// Handle returned when registering a lifecycle observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverToken(pub u64);

/// Runs once when the lifecycle reaches [`LifecycleState::Destroyed`]
pub type DestroyObserver = Box<dyn FnOnce() + Send>;

pub trait Lifecycle: Send + Sync {
    fn current_state(&self) -> LifecycleState;

    fn add_destroy_observer(&self, observer: DestroyObserver) -> ObserverToken;

    /// Removing an unknown or already-fired token is a no-op
    fn remove_observer(&self, token: ObserverToken);
}

/// Receives the platform's answer for one launched request
pub type ResultHandler = Box<dyn FnOnce(AuthorizationResponse) + Send>;

/// Source of authorization launchers, one registration per request
pub trait AuthorizationRegistry: Send + Sync {
    fn register(&self, key: Uuid, on_result: ResultHandler) -> Box<dyn AuthorizationLauncher>;
}

/// One registered authorization prompt.
pub trait AuthorizationLauncher: Send {
    /// Show the platform prompt for the given identifiers
    fn launch(&mut self, identifiers: &PermissionSet);

    /// Release the registration. Idempotent, and valid before the result
    /// arrives; after it the result handler is never called.
    fn unregister(&mut self);
}

/// A top-level screen: owns its lifecycle and its launcher registry
pub trait Screen: Send + Sync {
    fn is_destroyed(&self) -> bool;
    fn lifecycle(&self) -> Arc<dyn Lifecycle>;
    fn registry(&self) -> Arc<dyn AuthorizationRegistry>;
    fn grants(&self) -> Arc<dyn GrantChecker>;
}

/// A sub-screen embedded in a host [`Screen`]
pub trait EmbeddedScreen: Send + Sync {
    fn is_detached(&self) -> bool;

    /// The hosting screen, if still attached to one
    fn host(&self) -> Option<Arc<dyn Screen>>;

    /// Lifecycle of the visible content, which can end before the
    /// embedded screen itself.
    ///
    /// Must reach [`LifecycleState::Destroyed`] no later than the host is
    /// destroyed: requests from embedded owners are cancelled through this
    /// lifecycle only.
    fn view_lifecycle(&self) -> Option<Arc<dyn Lifecycle>>;

    /// Grant context, only available while attached
    fn grants(&self) -> Option<Arc<dyn GrantChecker>>;
}

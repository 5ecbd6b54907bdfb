use super::events::{emit, DropReason, QueueEventKind};
use super::handle::QueueHandle;
use super::types::{EventSender, RequestReceiver, EVENT_BUFFER};
use crate::config::{InactiveOwnerPolicy, QueueConfig};
use crate::outcome::AuthorizationOutcome;
use crate::platform::{AuthorizationLauncher, Lifecycle, LifecycleState, ObserverToken};
use crate::request::PermissionRequest;
use crate::types::AuthorizationResponse;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

/// How an in-flight request ended
#[derive(Debug)]
enum Resolution {
    Responded(AuthorizationResponse),
    OwnerDestroyed,
}

/// Single-resolution slot shared by the result handler and the destroy
/// observer. The first caller wins; later calls are no-ops.
#[derive(Clone)]
struct Resolver {
    slot: Arc<Mutex<Option<oneshot::Sender<Resolution>>>>,
}

impl Resolver {
    fn new() -> (Self, oneshot::Receiver<Resolution>) {
        let (tx, rx) = oneshot::channel();
        let resolver = Self {
            slot: Arc::new(Mutex::new(Some(tx))),
        };
        (resolver, rx)
    }

    fn resolve(&self, resolution: Resolution) -> bool {
        match self.slot.lock().take() {
            Some(tx) => tx.send(resolution).is_ok(),
            None => false,
        }
    }
}

/// Removes the destroy observer when dropped
struct ObserverGuard {
    lifecycle: Arc<dyn Lifecycle>,
    token: ObserverToken,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        self.lifecycle.remove_observer(self.token);
    }
}

/// Unregisters the launcher when dropped
struct LauncherGuard(Box<dyn AuthorizationLauncher>);

impl Drop for LauncherGuard {
    fn drop(&mut self) {
        self.0.unregister();
    }
}

/// Bounded request buffer plus the loop that drains it one request at a time
pub struct SerializationQueue {
    rx: RequestReceiver,
    handle: QueueHandle,
    events: EventSender,
    draining: Arc<AtomicBool>,
    inactive_owner: InactiveOwnerPolicy,
}

impl SerializationQueue {
    /// Create a queue. Nothing is processed until [`run`](Self::run) is awaited.
    pub fn new(config: QueueConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let draining = Arc::new(AtomicBool::new(false));
        debug!(capacity = config.capacity, "Creating permission queue");

        Self {
            rx,
            handle: QueueHandle::new(tx, events.clone(), draining.clone()),
            events,
            draining,
            inactive_owner: config.inactive_owner,
        }
    }

    /// Get a producer handle for this queue
    pub fn handle(&self) -> QueueHandle {
        self.handle.clone()
    }

    /// Drain requests until every producer handle is dropped
    pub async fn run(self) {
        let Self {
            mut rx,
            handle,
            events,
            draining,
            inactive_owner,
        } = self;
        // Our own handle must not keep the channel open.
        drop(handle);

        info!("Permission queue draining loop started");

        while let Some(request) = rx.recv().await {
            draining.store(true, Ordering::Release);
            process(request, &events, inactive_owner).await;
            draining.store(!rx.is_empty(), Ordering::Release);
        }

        draining.store(false, Ordering::Release);
        info!("Permission queue shutting down");
    }
}

/// Take one request through the liveness checks, the platform prompt, and
/// the callback.
async fn process(request: PermissionRequest, events: &EventSender, policy: InactiveOwnerPolicy) {
    let request_id = request.id;
    let owner = request.owner.clone();

    if !owner.is_live() {
        debug!(request_id = %request_id, owner = ?owner.kind(), "Owner gone, dropping request");
        emit(events, request_id, dropped(DropReason::OwnerGone));
        return;
    }

    let (Some(lifecycle), Some(registry)) = (owner.lifecycle(), owner.registry()) else {
        debug!(request_id = %request_id, owner = ?owner.kind(), "Owner has no lifecycle or registry");
        emit(events, request_id, dropped(DropReason::OwnerGone));
        return;
    };

    let state = lifecycle.current_state();
    if state == LifecycleState::Destroyed {
        debug!(request_id = %request_id, owner = ?owner.kind(), "Owner lifecycle destroyed, dropping request");
        emit(events, request_id, dropped(DropReason::OwnerGone));
        return;
    }
    if !state.is_at_least(LifecycleState::Started) {
        debug!(request_id = %request_id, state = ?state, "Owner not started");
        emit(events, request_id, dropped(DropReason::OwnerInactive));
        if policy == InactiveOwnerPolicy::Deny {
            request.deny_all();
        }
        return;
    }

    let (resolver, resolution) = Resolver::new();

    // Observe destruction before the prompt can be shown.
    let observer = ObserverGuard {
        token: lifecycle.add_destroy_observer({
            let resolver = resolver.clone();
            Box::new(move || {
                resolver.resolve(Resolution::OwnerDestroyed);
            })
        }),
        lifecycle: lifecycle.clone(),
    };

    let launcher = if lifecycle.current_state() == LifecycleState::Destroyed {
        resolver.resolve(Resolution::OwnerDestroyed);
        None
    } else {
        let mut launcher = LauncherGuard(registry.register(request_id, {
            let resolver = resolver.clone();
            Box::new(move |response: AuthorizationResponse| {
                resolver.resolve(Resolution::Responded(response));
            })
        }));
        launcher.0.launch(&request.identifiers);
        debug!(request_id = %request_id, identifiers = ?request.identifiers, "Authorization launched");
        emit(events, request_id, QueueEventKind::Launched);
        Some(launcher)
    };
    drop(resolver);

    let resolution = resolution.await;

    drop(launcher);
    drop(observer);

    match resolution {
        Ok(Resolution::Responded(response)) => {
            let outcome = AuthorizationOutcome::from_response(&response);
            info!(request_id = %request_id, granted = outcome.is_granted(), "Authorization completed");
            emit(
                events,
                request_id,
                QueueEventKind::Completed {
                    outcome: outcome.clone(),
                },
            );
            request.complete(outcome);
        }
        Ok(Resolution::OwnerDestroyed) => {
            info!(request_id = %request_id, "Owner destroyed during authorization, result discarded");
            emit(events, request_id, QueueEventKind::Cancelled);
        }
        Err(_) => {
            warn!(request_id = %request_id, "Authorization released without a result");
            emit(events, request_id, QueueEventKind::Abandoned);
        }
    }
}

fn dropped(reason: DropReason) -> QueueEventKind {
    QueueEventKind::Dropped { reason }
}

//! In-memory platform simulator.
//!
//! Implements every collaborator interface from [`crate::platform`] with
//! controllable state: lifecycles that can be moved and destroyed, a registry
//! that answers automatically, manually, or never, and grant stores that
//! remember what the user allowed. Used by the CLI and by tests.

use crate::coordinator::Coordinator;
use crate::outcome::{AuthorizationOutcome, FnCallback, PermissionsCallback};
use crate::platform::{
    AuthorizationLauncher, AuthorizationRegistry, DestroyObserver, EmbeddedScreen, GrantChecker,
    Lifecycle, LifecycleState, ObserverToken, ResultHandler, Screen,
};
use crate::types::{AuthorizationResponse, PermissionSet};
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// Wait on `condvar` until `done` holds or `timeout` elapses
fn wait_until<T>(
    lock: &Mutex<T>,
    condvar: &Condvar,
    timeout: Duration,
    mut done: impl FnMut(&T) -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    let mut guard = lock.lock();
    while !done(&*guard) {
        if condvar.wait_until(&mut guard, deadline).timed_out() {
            return done(&*guard);
        }
    }
    true
}

// Grants

#[derive(Debug, Default)]
pub struct SimGrants {
    granted: Mutex<HashSet<String>>,
}

impl SimGrants {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn grant(&self, identifier: impl Into<String>) {
        self.granted.lock().insert(identifier.into());
    }

    pub fn revoke(&self, identifier: &str) {
        self.granted.lock().remove(identifier);
    }
}

impl GrantChecker for SimGrants {
    fn is_granted(&self, identifier: &str) -> bool {
        self.granted.lock().contains(identifier)
    }
}

// Lifecycles

struct LifecycleInner {
    state: LifecycleState,
    observers: BTreeMap<ObserverToken, DestroyObserver>,
}

pub struct SimLifecycle {
    inner: Mutex<LifecycleInner>,
    next_token: AtomicU64,
}

impl SimLifecycle {
    pub fn new(state: LifecycleState) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(LifecycleInner {
                state,
                observers: BTreeMap::new(),
            }),
            next_token: AtomicU64::new(1),
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    /// Move to `state`; moving to `Destroyed` notifies observers
    pub fn set_state(&self, state: LifecycleState) {
        if state == LifecycleState::Destroyed {
            self.destroy();
        } else {
            self.inner.lock().state = state;
        }
    }

    pub fn destroy(&self) {
        let observers = {
            let mut inner = self.inner.lock();
            inner.state = LifecycleState::Destroyed;
            mem::take(&mut inner.observers)
        };
        debug!(observers = observers.len(), "Simulated lifecycle destroyed");
        for (_, observer) in observers {
            observer();
        }
    }

    pub fn observer_count(&self) -> usize {
        self.inner.lock().observers.len()
    }
}

impl Lifecycle for SimLifecycle {
    fn current_state(&self) -> LifecycleState {
        self.state()
    }

    fn add_destroy_observer(&self, observer: DestroyObserver) -> ObserverToken {
        let token = ObserverToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.inner.lock().observers.insert(token, observer);
        token
    }

    fn remove_observer(&self, token: ObserverToken) {
        self.inner.lock().observers.remove(&token);
    }
}

// Registry

type Answer = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Clone)]
enum AnswerMode {
    /// Launches wait until the test answers them
    Manual,
    /// Launches are answered immediately
    Auto(Answer),
    /// Launches drop their result handler without answering
    Abandon,
}

/// One launch seen by the simulated registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRecord {
    pub key: Uuid,
    pub identifiers: PermissionSet,
}

struct RegistryInner {
    mode: AnswerMode,
    handlers: HashMap<Uuid, ResultHandler>,
    registered: HashSet<Uuid>,
    pending: VecDeque<LaunchRecord>,
    launches: Vec<LaunchRecord>,
}

struct RegistryShared {
    inner: Mutex<RegistryInner>,
    changed: Condvar,
    grants: Arc<SimGrants>,
}

impl RegistryShared {
    /// Answer a registered launch. Granted identifiers are remembered.
    fn respond(&self, key: Uuid, response: AuthorizationResponse) -> bool {
        let handler = {
            let mut inner = self.inner.lock();
            inner.pending.retain(|launch| launch.key != key);
            inner.handlers.remove(&key)
        };
        self.changed.notify_all();

        let Some(handler) = handler else {
            return false;
        };
        for (identifier, granted) in &response {
            if *granted {
                self.grants.grant(identifier.clone());
            }
        }
        handler(response);
        true
    }
}

/// Simulated launcher registry
pub struct SimRegistry {
    shared: Arc<RegistryShared>,
}

impl SimRegistry {
    /// A registry in manual mode that records grants into `grants`
    pub fn new(grants: Arc<SimGrants>) -> Arc<Self> {
        Arc::new(Self {
            shared: Arc::new(RegistryShared {
                inner: Mutex::new(RegistryInner {
                    mode: AnswerMode::Manual,
                    handlers: HashMap::new(),
                    registered: HashSet::new(),
                    pending: VecDeque::new(),
                    launches: Vec::new(),
                }),
                changed: Condvar::new(),
                grants,
            }),
        })
    }

    /// Answer every future launch immediately using `answer` per identifier
    pub fn answer_with<F>(&self, answer: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.shared.inner.lock().mode = AnswerMode::Auto(Arc::new(answer));
    }

    /// Leave future launches waiting for [`respond_next`](Self::respond_next)
    pub fn answer_manually(&self) {
        self.shared.inner.lock().mode = AnswerMode::Manual;
    }

    /// Drop the result handler of every future launch
    pub fn abandon_launches(&self) {
        self.shared.inner.lock().mode = AnswerMode::Abandon;
    }

    /// Answer the oldest launch still waiting
    pub fn respond_next<F>(&self, answer: F) -> Option<LaunchRecord>
    where
        F: Fn(&str) -> bool,
    {
        let launch = self.shared.inner.lock().pending.front().cloned()?;
        let response = build_response(&launch.identifiers, &answer);
        self.shared
            .respond(launch.key, response)
            .then_some(launch)
    }

    /// Block until a launch is waiting for an answer
    pub fn wait_for_pending(&self, timeout: Duration) -> Option<LaunchRecord> {
        let shared = &self.shared;
        if wait_until(&shared.inner, &shared.changed, timeout, |inner| {
            !inner.pending.is_empty()
        }) {
            shared.inner.lock().pending.front().cloned()
        } else {
            None
        }
    }

    /// Block until at least `count` launches happened in total
    pub fn wait_for_launches(&self, count: usize, timeout: Duration) -> bool {
        let shared = &self.shared;
        wait_until(&shared.inner, &shared.changed, timeout, |inner| {
            inner.launches.len() >= count
        })
    }

    /// Block until no launcher is registered
    pub fn wait_until_unregistered(&self, timeout: Duration) -> bool {
        let shared = &self.shared;
        wait_until(&shared.inner, &shared.changed, timeout, |inner| {
            inner.registered.is_empty()
        })
    }

    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.shared.inner.lock().launches.clone()
    }

    pub fn launch_count(&self) -> usize {
        self.shared.inner.lock().launches.len()
    }

    /// Launchers registered and not yet unregistered
    pub fn active_registrations(&self) -> usize {
        self.shared.inner.lock().registered.len()
    }
}

impl AuthorizationRegistry for SimRegistry {
    fn register(&self, key: Uuid, on_result: ResultHandler) -> Box<dyn AuthorizationLauncher> {
        {
            let mut inner = self.shared.inner.lock();
            inner.handlers.insert(key, on_result);
            inner.registered.insert(key);
        }
        self.shared.changed.notify_all();
        Box::new(SimLauncher {
            key,
            shared: self.shared.clone(),
        })
    }
}

fn build_response(identifiers: &PermissionSet, answer: impl Fn(&str) -> bool) -> AuthorizationResponse {
    identifiers
        .iter()
        .map(|identifier| (identifier.clone(), answer(identifier)))
        .collect()
}

struct SimLauncher {
    key: Uuid,
    shared: Arc<RegistryShared>,
}

impl AuthorizationLauncher for SimLauncher {
    fn launch(&mut self, identifiers: &PermissionSet) {
        let record = LaunchRecord {
            key: self.key,
            identifiers: identifiers.clone(),
        };
        let mode = {
            let mut inner = self.shared.inner.lock();
            inner.launches.push(record.clone());
            inner.mode.clone()
        };
        debug!(key = %self.key, "Simulated authorization launched");

        match mode {
            AnswerMode::Manual => {
                self.shared.inner.lock().pending.push_back(record);
            }
            AnswerMode::Auto(answer) => {
                let response = build_response(identifiers, |id| answer(id));
                self.shared.respond(self.key, response);
            }
            AnswerMode::Abandon => {
                let handler = self.shared.inner.lock().handlers.remove(&self.key);
                drop(handler);
            }
        }
        self.shared.changed.notify_all();
    }

    fn unregister(&mut self) {
        let handler = {
            let mut inner = self.shared.inner.lock();
            inner.registered.remove(&self.key);
            inner.pending.retain(|launch| launch.key != self.key);
            inner.handlers.remove(&self.key)
        };
        drop(handler);
        self.shared.changed.notify_all();
    }
}

// Screens

/// A simulated top-level screen
pub struct SimScreen {
    destroyed: AtomicBool,
    lifecycle: Arc<SimLifecycle>,
    registry: Arc<SimRegistry>,
    grants: Arc<SimGrants>,
    /// View lifecycles of embedded screens attached to this one
    views: Mutex<Vec<Weak<SimLifecycle>>>,
}

impl SimScreen {
    pub fn with_state(state: LifecycleState) -> Arc<Self> {
        let grants = SimGrants::new();
        Arc::new(Self {
            destroyed: AtomicBool::new(state == LifecycleState::Destroyed),
            lifecycle: SimLifecycle::new(state),
            registry: SimRegistry::new(grants.clone()),
            grants,
            views: Mutex::new(Vec::new()),
        })
    }

    pub fn resumed() -> Arc<Self> {
        Self::with_state(LifecycleState::Resumed)
    }

    /// Destroy the screen together with the views of its embedded screens
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
        let views = mem::take(&mut *self.views.lock());
        for view in views.iter().filter_map(Weak::upgrade) {
            view.destroy();
        }
        self.lifecycle.destroy();
    }

    pub fn lifecycle_handle(&self) -> &Arc<SimLifecycle> {
        &self.lifecycle
    }

    pub fn registry_handle(&self) -> &Arc<SimRegistry> {
        &self.registry
    }

    pub fn grants_handle(&self) -> &Arc<SimGrants> {
        &self.grants
    }
}

impl Screen for SimScreen {
    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn lifecycle(&self) -> Arc<dyn Lifecycle> {
        self.lifecycle.clone()
    }

    fn registry(&self) -> Arc<dyn AuthorizationRegistry> {
        self.registry.clone()
    }

    fn grants(&self) -> Arc<dyn GrantChecker> {
        self.grants.clone()
    }
}

/// A simulated sub-screen hosted by a [`SimScreen`]
pub struct SimEmbeddedScreen {
    host: Mutex<Option<Arc<SimScreen>>>,
    view_lifecycle: Arc<SimLifecycle>,
}

impl SimEmbeddedScreen {
    pub fn attached(host: &Arc<SimScreen>) -> Arc<Self> {
        let view_lifecycle = SimLifecycle::new(LifecycleState::Resumed);
        host.views.lock().push(Arc::downgrade(&view_lifecycle));
        Arc::new(Self {
            host: Mutex::new(Some(host.clone())),
            view_lifecycle,
        })
    }

    /// Detach from the host; the view is destroyed with it
    pub fn detach(&self) {
        self.host.lock().take();
        self.view_lifecycle.destroy();
    }

    pub fn view_lifecycle_handle(&self) -> &Arc<SimLifecycle> {
        &self.view_lifecycle
    }
}

impl EmbeddedScreen for SimEmbeddedScreen {
    fn is_detached(&self) -> bool {
        self.host.lock().is_none()
    }

    fn host(&self) -> Option<Arc<dyn Screen>> {
        self.host
            .lock()
            .clone()
            .map(|host| host as Arc<dyn Screen>)
    }

    fn view_lifecycle(&self) -> Option<Arc<dyn Lifecycle>> {
        Some(self.view_lifecycle.clone())
    }

    fn grants(&self) -> Option<Arc<dyn GrantChecker>> {
        self.host
            .lock()
            .as_ref()
            .map(|host| host.grants.clone() as Arc<dyn GrantChecker>)
    }
}

// Callback recording

/// One delivered callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRecord {
    pub label: String,
    pub outcome: AuthorizationOutcome,
    /// Whether the callback ran on the coordination thread
    pub on_coordinator: bool,
}

/// Collects callback deliveries in the order they happen
#[derive(Clone, Default)]
pub struct CallbackLog {
    shared: Arc<(Mutex<Vec<CallbackRecord>>, Condvar)>,
}

impl CallbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback that records its delivery under `label`
    pub fn callback(&self, label: impl Into<String>) -> Box<dyn PermissionsCallback> {
        let label = label.into();
        let granted_log = self.clone();
        let granted_label = label.clone();
        let denied_log = self.clone();
        FnCallback::boxed(
            move || granted_log.record(granted_label, AuthorizationOutcome::Granted),
            move |denied| denied_log.record(label, AuthorizationOutcome::Denied(denied)),
        )
    }

    fn record(&self, label: String, outcome: AuthorizationOutcome) {
        let (records, changed) = &*self.shared;
        records.lock().push(CallbackRecord {
            label,
            outcome,
            on_coordinator: Coordinator::is_current_thread(),
        });
        changed.notify_all();
    }

    pub fn records(&self) -> Vec<CallbackRecord> {
        self.shared.0.lock().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.records().into_iter().map(|record| record.label).collect()
    }

    /// Block until at least `count` callbacks were delivered
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let (records, changed) = &*self.shared;
        wait_until(records, changed, timeout, |records| records.len() >= count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::permission_set;

    #[test]
    fn test_lifecycle_destroy_notifies_observers_once() {
        let lifecycle = SimLifecycle::new(LifecycleState::Resumed);
        let fired = Arc::new(AtomicU64::new(0));
        let counter = fired.clone();
        lifecycle.add_destroy_observer(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(lifecycle.observer_count(), 1);

        lifecycle.destroy();
        lifecycle.destroy();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(lifecycle.observer_count(), 0);
        assert_eq!(lifecycle.state(), LifecycleState::Destroyed);
    }

    #[test]
    fn test_removed_observer_never_fires() {
        let lifecycle = SimLifecycle::new(LifecycleState::Started);
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let token = lifecycle.add_destroy_observer(Box::new(move || flag.store(true, Ordering::SeqCst)));

        lifecycle.remove_observer(token);
        lifecycle.remove_observer(token);
        lifecycle.set_state(LifecycleState::Destroyed);
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_manual_registry_round_trip() {
        let grants = SimGrants::new();
        let registry = SimRegistry::new(grants.clone());
        let (tx, rx) = std::sync::mpsc::channel();

        let mut launcher = registry.register(
            Uuid::new_v4(),
            Box::new(move |response| tx.send(response).unwrap()),
        );
        launcher.launch(&permission_set(["a", "b"]));
        assert!(registry.wait_for_pending(Duration::from_millis(100)).is_some());

        registry.respond_next(|id| id == "a").unwrap();
        let response = rx.recv().unwrap();
        assert_eq!(response.get("a"), Some(&true));
        assert_eq!(response.get("b"), Some(&false));
        assert!(grants.is_granted("a"));
        assert!(!grants.is_granted("b"));

        assert_eq!(registry.active_registrations(), 1);
        launcher.unregister();
        launcher.unregister();
        assert_eq!(registry.active_registrations(), 0);
    }

    #[test]
    fn test_unregistered_launch_is_never_answered() {
        let registry = SimRegistry::new(SimGrants::new());
        let mut launcher = registry.register(Uuid::new_v4(), Box::new(|_| panic!("answered")));
        launcher.launch(&permission_set(["a"]));
        launcher.unregister();

        assert!(registry.respond_next(|_| true).is_none());
        assert_eq!(registry.launch_count(), 1);
    }

    #[test]
    fn test_host_destroy_ends_embedded_views() {
        let host = SimScreen::resumed();
        let embedded = SimEmbeddedScreen::attached(&host);
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        embedded
            .view_lifecycle_handle()
            .add_destroy_observer(Box::new(move || flag.store(true, Ordering::SeqCst)));

        host.destroy();
        assert!(fired.load(Ordering::SeqCst));
        assert_eq!(embedded.view_lifecycle_handle().state(), LifecycleState::Destroyed);
        assert_eq!(host.lifecycle_handle().state(), LifecycleState::Destroyed);
    }

    #[test]
    fn test_embedded_grants_follow_host() {
        let host = SimScreen::resumed();
        host.grants_handle().grant("a");
        let embedded = SimEmbeddedScreen::attached(&host);

        assert!(embedded.grants().unwrap().is_granted("a"));
        embedded.detach();
        assert!(embedded.grants().is_none());
        assert_eq!(embedded.view_lifecycle_handle().state(), LifecycleState::Destroyed);
    }
}

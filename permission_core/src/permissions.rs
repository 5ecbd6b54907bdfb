//! The permission facade.
//!
//! [`Permissions`] is the entry point callers use. It answers grant queries
//! synchronously and turns every `request` into exactly one of:
//!
//! - an immediate `on_granted`, dispatched to the coordination thread when
//!   everything is already granted,
//! - a queued [`PermissionRequest`] that the serialization queue will prompt
//!   for in turn,
//! - a silent drop (no grant context, or the queue is full under the default
//!   overflow policy).
//!
//! Requests never block the caller.

use crate::capability::CapabilitySet;
use crate::config::{OverflowPolicy, PermissionConfig, Platform};
use crate::coordinator::Coordinator;
use crate::error::{PermissionError, Result};
use crate::outcome::{AuthorizationOutcome, FnCallback, PermissionsCallback};
use crate::owner::{EmbeddedOwner, OwnerAdapter, ScreenOwner};
use crate::platform::{EmbeddedScreen, GrantChecker, Screen};
use crate::queue::events::emit;
use crate::queue::{Admission, DropReason, EventReceiver, QueueEventKind, QueueHandle};
use crate::request::PermissionRequest;
use crate::types::{permission_set, PermissionSet};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

static GLOBAL: OnceLock<Permissions> = OnceLock::new();

pub struct Permissions {
    coordinator: Coordinator,
    platform: Platform,
    overflow: OverflowPolicy,
}

impl Permissions {
    /// Validate the configuration and start the coordination thread
    pub fn new(config: PermissionConfig) -> Result<Self> {
        config.validate()?;
        let overflow = config.queue.overflow;
        let platform = Platform::new(config.platform)?;
        let coordinator = Coordinator::start(config.queue)?;
        info!(
            level = platform.level(),
            capacity = coordinator.queue().capacity(),
            "Permission facade ready"
        );

        Ok(Self {
            coordinator,
            platform,
            overflow,
        })
    }

    /// Initialize the process-wide facade. Fails if one is already installed.
    pub fn install(config: PermissionConfig) -> Result<&'static Permissions> {
        if GLOBAL.get().is_some() {
            return Err(PermissionError::AlreadyInstalled);
        }
        let permissions = Self::new(config)?;
        match GLOBAL.set(permissions) {
            Ok(()) => GLOBAL.get().ok_or(PermissionError::NotInstalled),
            Err(lost) => {
                lost.shutdown();
                Err(PermissionError::AlreadyInstalled)
            }
        }
    }

    /// The process-wide facade installed by [`install`](Self::install)
    pub fn global() -> Result<&'static Permissions> {
        GLOBAL.get().ok_or(PermissionError::NotInstalled)
    }

    /// Wrap a top-level screen as a request owner
    pub fn screen<S: Screen + 'static>(screen: &Arc<S>) -> Arc<dyn OwnerAdapter> {
        Arc::new(ScreenOwner::new(screen))
    }

    /// Wrap an embedded sub-screen as a request owner
    pub fn embedded<E: EmbeddedScreen + 'static>(embedded: &Arc<E>) -> Arc<dyn OwnerAdapter> {
        Arc::new(EmbeddedOwner::new(embedded))
    }

    pub fn check_granted(context: &dyn GrantChecker, identifier: &str) -> bool {
        context.is_granted(identifier)
    }

    /// True iff every identifier is granted. Stops at the first one that is not.
    pub fn check_all_granted(context: &dyn GrantChecker, identifiers: &PermissionSet) -> bool {
        identifiers
            .iter()
            .all(|identifier| context.is_granted(identifier))
    }

    /// Ask for `identifiers` on behalf of `owner`.
    ///
    /// Returns the id under which the request shows up in queue events.
    pub fn request(
        &self,
        owner: Arc<dyn OwnerAdapter>,
        identifiers: PermissionSet,
        callback: Box<dyn PermissionsCallback>,
    ) -> Uuid {
        let Some(context) = owner.grant_context() else {
            let request_id = Uuid::new_v4();
            debug!(request_id = %request_id, owner = ?owner.kind(), "No grant context, dropping request");
            emit(self.events(), request_id, dropped(DropReason::NoContext));
            return request_id;
        };

        let already_granted = Self::check_all_granted(context.as_ref(), &identifiers);
        let request = PermissionRequest::new(owner, identifiers, callback);
        let request_id = request.id;

        if already_granted {
            self.grant_immediately(request);
        } else {
            self.enqueue(request);
        }
        request_id
    }

    /// Ask to read the media categories in `capabilities`
    pub fn request_read_media(
        &self,
        owner: Arc<dyn OwnerAdapter>,
        capabilities: CapabilitySet,
        callback: Box<dyn PermissionsCallback>,
    ) -> Uuid {
        let identifiers = capabilities.resolve(&self.platform);
        debug!(capabilities = %capabilities, identifiers = ?identifiers, "Resolved media request");
        self.request(owner, identifiers, callback)
    }

    /// Ask to write shared media. Scoped-storage platforms need no runtime
    /// permission for that.
    pub fn request_write_media(
        &self,
        owner: Arc<dyn OwnerAdapter>,
        callback: Box<dyn PermissionsCallback>,
    ) -> Uuid {
        if self.platform.has_scoped_storage() {
            return self.grant_without_prompt(owner, callback);
        }
        let identifier = self.platform.identifiers().legacy_write.clone();
        self.request(owner, permission_set([identifier]), callback)
    }

    /// Ask to post notifications. Older platforms grant them implicitly.
    pub fn request_notifications(
        &self,
        owner: Arc<dyn OwnerAdapter>,
        callback: Box<dyn PermissionsCallback>,
    ) -> Uuid {
        if !self.platform.has_runtime_notifications() {
            return self.grant_without_prompt(owner, callback);
        }
        let identifier = self.platform.identifiers().notifications.clone();
        self.request(owner, permission_set([identifier]), callback)
    }

    pub fn with_permission<G, D>(
        &self,
        owner: Arc<dyn OwnerAdapter>,
        identifier: impl Into<String>,
        on_granted: G,
        on_denied: D,
    ) -> Uuid
    where
        G: FnOnce() + Send + 'static,
        D: FnOnce(PermissionSet) + Send + 'static,
    {
        self.with_permissions(owner, [identifier.into()], on_granted, on_denied)
    }

    pub fn with_permissions<I, S, G, D>(
        &self,
        owner: Arc<dyn OwnerAdapter>,
        identifiers: I,
        on_granted: G,
        on_denied: D,
    ) -> Uuid
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        G: FnOnce() + Send + 'static,
        D: FnOnce(PermissionSet) + Send + 'static,
    {
        self.request(
            owner,
            permission_set(identifiers),
            FnCallback::boxed(on_granted, on_denied),
        )
    }

    /// Subscribe to the lifecycle events of every request
    pub fn subscribe(&self) -> EventReceiver {
        self.coordinator.queue().subscribe()
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn queue(&self) -> &QueueHandle {
        self.coordinator.queue()
    }

    /// Stop the coordination thread once all queued work has drained
    pub fn shutdown(self) {
        self.coordinator.shutdown();
    }

    fn events(&self) -> &crate::queue::EventSender {
        self.coordinator.queue().events()
    }

    fn grant_without_prompt(
        &self,
        owner: Arc<dyn OwnerAdapter>,
        callback: Box<dyn PermissionsCallback>,
    ) -> Uuid {
        let request = PermissionRequest::new(owner, PermissionSet::new(), callback);
        let request_id = request.id;
        self.grant_immediately(request);
        request_id
    }

    fn grant_immediately(&self, request: PermissionRequest) {
        let request_id = request.id;
        debug!(request_id = %request_id, "Already granted, completing without queueing");
        emit(self.events(), request_id, QueueEventKind::GrantedImmediately);

        let delivered = self
            .coordinator
            .dispatcher()
            .dispatch(move || request.complete(AuthorizationOutcome::Granted));
        if !delivered {
            warn!(request_id = %request_id, "Coordinator stopped, grant not delivered");
        }
    }

    fn enqueue(&self, request: PermissionRequest) {
        match self.coordinator.queue().try_enqueue(request) {
            Admission::Queued => {}
            Admission::Full(request) => {
                let request_id = request.id;
                emit(self.events(), request_id, dropped(DropReason::Overflow));
                if self.overflow == OverflowPolicy::DenyNewest {
                    let delivered = self.coordinator.dispatcher().dispatch(move || request.deny_all());
                    if !delivered {
                        warn!(request_id = %request_id, "Coordinator stopped, denial not delivered");
                    }
                }
            }
            Admission::Closed(request) => {
                emit(self.events(), request.id, dropped(DropReason::QueueClosed));
            }
        }
    }
}

fn dropped(reason: DropReason) -> QueueEventKind {
    QueueEventKind::Dropped { reason }
}

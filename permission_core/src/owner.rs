//! Owner adapters.
//!
//! The queue never sees concrete screens. It talks to an [`OwnerAdapter`],
//! which answers three questions: is the owner still usable, which lifecycle
//! scopes the request, and which registry launches the prompt.
//!
//! | Adapter | Live when | Lifecycle | Registry |
//! |---------|-----------|-----------|----------|
//! | [`ScreenOwner`] | screen exists and is not destroyed | the screen's | the screen's |
//! | [`EmbeddedOwner`] | attached, and the host is live | the view's | the host's |
//!
//! Adapters hold only weak references, so a queued request never keeps its
//! owner alive.

use crate::platform::{AuthorizationRegistry, EmbeddedScreen, GrantChecker, Lifecycle, Screen};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    Screen,
    Embedded,
}

pub trait OwnerAdapter: Send + Sync {
    fn kind(&self) -> OwnerKind;

    fn is_live(&self) -> bool;

    fn lifecycle(&self) -> Option<Arc<dyn Lifecycle>>;

    fn registry(&self) -> Option<Arc<dyn AuthorizationRegistry>>;

    fn grant_context(&self) -> Option<Arc<dyn GrantChecker>>;
}

pub struct ScreenOwner {
    screen: Weak<dyn Screen>,
}

impl ScreenOwner {
    pub fn new<S: Screen + 'static>(screen: &Arc<S>) -> Self {
        let screen: Weak<S> = Arc::downgrade(screen);
        Self { screen }
    }

    pub fn from_dyn(screen: &Arc<dyn Screen>) -> Self {
        Self {
            screen: Arc::downgrade(screen),
        }
    }

    fn live_screen(&self) -> Option<Arc<dyn Screen>> {
        self.screen.upgrade().filter(|screen| !screen.is_destroyed())
    }
}

impl OwnerAdapter for ScreenOwner {
    fn kind(&self) -> OwnerKind {
        OwnerKind::Screen
    }

    fn is_live(&self) -> bool {
        self.live_screen().is_some()
    }

    fn lifecycle(&self) -> Option<Arc<dyn Lifecycle>> {
        self.screen.upgrade().map(|screen| screen.lifecycle())
    }

    fn registry(&self) -> Option<Arc<dyn AuthorizationRegistry>> {
        self.screen.upgrade().map(|screen| screen.registry())
    }

    fn grant_context(&self) -> Option<Arc<dyn GrantChecker>> {
        self.screen.upgrade().map(|screen| screen.grants())
    }
}

impl fmt::Debug for ScreenOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenOwner")
            .field("live", &self.is_live())
            .finish()
    }
}

pub struct EmbeddedOwner {
    embedded: Weak<dyn EmbeddedScreen>,
}

impl EmbeddedOwner {
    pub fn new<E: EmbeddedScreen + 'static>(embedded: &Arc<E>) -> Self {
        let embedded: Weak<E> = Arc::downgrade(embedded);
        Self { embedded }
    }

    pub fn from_dyn(embedded: &Arc<dyn EmbeddedScreen>) -> Self {
        Self {
            embedded: Arc::downgrade(embedded),
        }
    }

    fn host(&self) -> Option<Arc<dyn Screen>> {
        self.embedded.upgrade().and_then(|embedded| embedded.host())
    }
}

impl OwnerAdapter for EmbeddedOwner {
    fn kind(&self) -> OwnerKind {
        OwnerKind::Embedded
    }

    fn is_live(&self) -> bool {
        let Some(embedded) = self.embedded.upgrade() else {
            return false;
        };
        if embedded.is_detached() {
            return false;
        }
        embedded.host().is_some_and(|host| !host.is_destroyed())
    }

    fn lifecycle(&self) -> Option<Arc<dyn Lifecycle>> {
        self.embedded
            .upgrade()
            .and_then(|embedded| embedded.view_lifecycle())
    }

    fn registry(&self) -> Option<Arc<dyn AuthorizationRegistry>> {
        self.host().map(|host| host.registry())
    }

    fn grant_context(&self) -> Option<Arc<dyn GrantChecker>> {
        self.embedded.upgrade().and_then(|embedded| embedded.grants())
    }
}

impl fmt::Debug for EmbeddedOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedOwner")
            .field("live", &self.is_live())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::LifecycleState;
    use crate::sim::{SimEmbeddedScreen, SimScreen};

    #[test]
    fn test_screen_owner_liveness() {
        let screen = SimScreen::resumed();
        let owner = ScreenOwner::new(&screen);
        assert_eq!(owner.kind(), OwnerKind::Screen);
        assert!(owner.is_live());

        screen.destroy();
        assert!(!owner.is_live());
    }

    #[test]
    fn test_screen_owner_does_not_keep_screen_alive() {
        let screen = SimScreen::resumed();
        let owner = ScreenOwner::new(&screen);
        drop(screen);

        assert!(!owner.is_live());
        assert!(owner.lifecycle().is_none());
        assert!(owner.registry().is_none());
        assert!(owner.grant_context().is_none());
    }

    #[test]
    fn test_embedded_owner_requires_live_host() {
        let host = SimScreen::resumed();
        let embedded = SimEmbeddedScreen::attached(&host);
        let owner = EmbeddedOwner::new(&embedded);
        assert_eq!(owner.kind(), OwnerKind::Embedded);
        assert!(owner.is_live());

        host.destroy();
        assert!(!owner.is_live());
    }

    #[test]
    fn test_embedded_owner_detached_is_not_live() {
        let host = SimScreen::resumed();
        let embedded = SimEmbeddedScreen::attached(&host);
        let owner = EmbeddedOwner::new(&embedded);

        embedded.detach();
        assert!(!owner.is_live());
        assert!(owner.grant_context().is_none());
        assert!(owner.registry().is_none());
    }

    #[test]
    fn test_embedded_owner_uses_view_lifecycle_and_host_registry() {
        let host = SimScreen::resumed();
        let embedded = SimEmbeddedScreen::attached(&host);
        let owner = EmbeddedOwner::new(&embedded);

        embedded.view_lifecycle_handle().set_state(LifecycleState::Created);
        let lifecycle = owner.lifecycle().unwrap();
        assert_eq!(lifecycle.current_state(), LifecycleState::Created);
        assert_eq!(host.lifecycle_handle().state(), LifecycleState::Resumed);

        assert!(owner.registry().is_some());
    }
}

pub mod capability;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod outcome;
pub mod owner;
pub mod permissions;
pub mod platform;
pub mod queue;
pub mod request;
pub mod sim;
pub mod types;

pub use capability::CapabilitySet;
pub use config::{InactiveOwnerPolicy, OverflowPolicy, PermissionConfig, Platform, QueueConfig};
pub use coordinator::Coordinator;
pub use error::{ConfigError, PermissionError, Result};
pub use outcome::{AuthorizationOutcome, FnCallback, PermissionsCallback};
pub use owner::{EmbeddedOwner, OwnerAdapter, OwnerKind, ScreenOwner};
pub use permissions::Permissions;
pub use queue::{DropReason, QueueEvent, QueueEventKind};
pub use request::PermissionRequest;
pub use types::{permission_set, AuthorizationResponse, PermissionSet};

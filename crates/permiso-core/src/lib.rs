//! Permiso Core Library
//!
//! Coordinates runtime permission requests against a host authority:
//! - Result sets tracking one outcome per requested permission
//! - Lifecycle tokens correlating host requests with host results
//! - Linking overlapping requests onto one in-flight host request
//! - Rationale gating before the host is asked
//! - Configuration resolution and tracing setup

pub mod callback;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod host;
pub mod link;
pub mod pending;
pub mod permission;
pub mod result_set;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod token;
pub mod tracing_init;

pub use callback::{PermissionCallback, RationaleContinuation, SharedCallback, shared};
pub use config::CoordinatorConfig;
pub use coordinator::{PermissionCoordinator, RequestOutcome};
pub use error::{Error, Result};
pub use host::HostBridge;
pub use pending::RequestPhase;
pub use permission::Permission;
pub use result_set::{Outcome, ResultSet};
pub use token::RequestToken;

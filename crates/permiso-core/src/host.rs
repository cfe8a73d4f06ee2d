//! Host bridge contract and the execution-context slot.
//!
//! The host is the authority that actually grants permissions. The
//! coordinator only ever talks to it through [`HostBridge`], and only while a
//! live execution context is registered in the [`ContextSlot`].

use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::permission::Permission;
use crate::token::RequestToken;

/// The authority-side primitives the coordinator depends on.
///
/// `check_granted` and `needs_rationale` must be side-effect free.
/// `issue_request` is fire-and-forget: the host reports the outcome later
/// through [`PermissionCoordinator::resolve_from_host`] with the same token,
/// never synchronously from inside the call.
///
/// [`PermissionCoordinator::resolve_from_host`]: crate::PermissionCoordinator::resolve_from_host
pub trait HostBridge: Send + Sync {
    /// Handle to whatever the host needs to service calls (a window, an
    /// activity, a session). The coordinator never owns it.
    type Context: Send + Sync;

    /// Whether `permission` is currently granted.
    fn check_granted(&self, context: &Self::Context, permission: &Permission) -> bool;

    /// Whether the host recommends explaining why `permission` is needed,
    /// typically after an earlier denial.
    fn needs_rationale(&self, context: &Self::Context, permission: &Permission) -> bool;

    /// Ask the authority to grant `permissions`.
    fn issue_request(&self, context: &Self::Context, token: RequestToken, permissions: &[Permission]);
}

/// Non-owning slot for the currently active execution context.
///
/// Holds a [`Weak`] so the coordinator never extends the context's lifetime.
/// Cleared explicitly with [`ContextSlot::clear`].
#[derive(Debug)]
pub struct ContextSlot<C> {
    current: Mutex<Option<Weak<C>>>,
}

impl<C> ContextSlot<C> {
    pub const fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// Register `context` as the active one, replacing any previous context.
    pub fn set(&self, context: &Arc<C>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::downgrade(context));
    }

    /// Forget the active context.
    pub fn clear(&self) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// The active context, if one is set and still alive.
    pub fn get(&self) -> Option<Arc<C>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }
}

impl<C> Default for ContextSlot<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slot_has_no_context() {
        let slot: ContextSlot<u8> = ContextSlot::new();
        assert!(slot.get().is_none());
    }

    #[test]
    fn slot_does_not_keep_context_alive() {
        let slot = ContextSlot::new();
        let context = Arc::new(7_u8);
        slot.set(&context);
        assert_eq!(slot.get().as_deref(), Some(&7));

        drop(context);
        assert!(slot.get().is_none());
    }

    #[test]
    fn clear_forgets_live_context() {
        let slot = ContextSlot::new();
        let context = Arc::new("window");
        slot.set(&context);
        slot.clear();
        assert!(slot.get().is_none());
    }
}

//! Test doubles for hosts and callbacks.
//!
//! Available to this crate's own tests and, behind the `test-utils` feature,
//! to downstream crates.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::callback::{PermissionCallback, RationaleContinuation, SharedCallback, shared};
use crate::host::HostBridge;
use crate::permission::Permission;
use crate::result_set::ResultSet;
use crate::token::RequestToken;

/// Execution context handed to [`FakeHost`].
#[derive(Debug, Default)]
pub struct FakeContext;

/// In-memory host with fixed grant and rationale sets.
///
/// Every `issue_request` is recorded; nothing resolves on its own.
#[derive(Debug, Default)]
pub struct FakeHost {
    granted: HashSet<Permission>,
    rationale: HashSet<Permission>,
    issued: Mutex<Vec<(RequestToken, Vec<Permission>)>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Permissions reported as already granted.
    #[must_use]
    pub fn with_granted<I, P>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        self.granted.extend(permissions.into_iter().map(Into::into));
        self
    }

    /// Permissions for which the host recommends a rationale.
    #[must_use]
    pub fn with_rationale<I, P>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        self.rationale.extend(permissions.into_iter().map(Into::into));
        self
    }

    /// Host requests issued so far, in order.
    pub fn issued(&self) -> Vec<(RequestToken, Vec<Permission>)> {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl HostBridge for FakeHost {
    type Context = FakeContext;

    fn check_granted(&self, _context: &FakeContext, permission: &Permission) -> bool {
        self.granted.contains(permission)
    }

    fn needs_rationale(&self, _context: &FakeContext, permission: &Permission) -> bool {
        self.rationale.contains(permission)
    }

    fn issue_request(&self, _context: &FakeContext, token: RequestToken, permissions: &[Permission]) {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((token, permissions.to_vec()));
    }
}

#[derive(Default)]
struct Recorded {
    calls: Vec<(String, ResultSet)>,
    continuations: Vec<(RationaleContinuation, Vec<Permission>)>,
}

/// Shared log of callback invocations across any number of labelled
/// callbacks. Clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingCallback {
    log: Arc<Mutex<Recorded>>,
    defer_rationale: bool,
}

impl RecordingCallback {
    /// Callbacks that accept every rationale request immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Callbacks that hold rationale continuations until
    /// [`take_continuations`](Self::take_continuations).
    pub fn deferring_rationale() -> Self {
        Self {
            defer_rationale: true,
            ..Self::default()
        }
    }

    /// A new callback that records into this log under `label`.
    pub fn callback(&self, label: &str) -> SharedCallback {
        shared(Labelled {
            label: label.to_string(),
            recorder: self.clone(),
        })
    }

    /// Every result delivered so far, in delivery order.
    pub fn calls(&self) -> Vec<(String, ResultSet)> {
        self.lock().calls.clone()
    }

    /// Remove and return held rationale continuations.
    pub fn take_continuations(&self) -> Vec<(RationaleContinuation, Vec<Permission>)> {
        std::mem::take(&mut self.lock().continuations)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Labelled {
    label: String,
    recorder: RecordingCallback,
}

impl PermissionCallback for Labelled {
    fn on_result(&mut self, results: &ResultSet) {
        self.recorder
            .lock()
            .calls
            .push((self.label.clone(), results.clone()));
    }

    fn on_rationale_requested(
        &mut self,
        continuation: RationaleContinuation,
        permissions: &[Permission],
    ) {
        if self.recorder.defer_rationale {
            self.recorder
                .lock()
                .continuations
                .push((continuation, permissions.to_vec()));
        } else {
            let token = continuation.token();
            if let Err(e) = continuation.provide() {
                warn!(%token, error = %e, "Recorded callback could not resume request");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Weak;

    use super::*;
    use crate::callback::RationaleTarget;
    use crate::error::Result;

    struct Gone;

    impl RationaleTarget for Gone {
        fn provide_rationale(&self, _token: RequestToken) -> Result<()> {
            Ok(())
        }
    }

    fn dropped_target() -> Weak<dyn RationaleTarget> {
        let target: Arc<dyn RationaleTarget> = Arc::new(Gone);
        Arc::downgrade(&target)
    }

    #[test]
    fn immediate_callback_survives_a_dropped_coordinator() {
        let log = RecordingCallback::new();
        let callback = log.callback("a");
        let continuation = RationaleContinuation::new(RequestToken::new(2), dropped_target());

        callback
            .lock()
            .unwrap()
            .on_rationale_requested(continuation, &[Permission::new("CAMERA")]);

        assert!(log.calls().is_empty());
        assert!(log.take_continuations().is_empty());
    }

    #[test]
    fn deferring_callback_holds_the_continuation() {
        let log = RecordingCallback::deferring_rationale();
        let callback = log.callback("a");
        let continuation = RationaleContinuation::new(RequestToken::new(2), dropped_target());

        callback
            .lock()
            .unwrap()
            .on_rationale_requested(continuation, &[Permission::new("CAMERA")]);

        let mut held = log.take_continuations();
        assert_eq!(held.len(), 1);
        let (continuation, permissions) = held.remove(0);
        assert_eq!(permissions, vec![Permission::new("CAMERA")]);
        assert!(matches!(
            continuation.provide(),
            Err(crate::error::Error::CoordinatorDropped)
        ));
    }
}

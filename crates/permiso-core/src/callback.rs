//! Caller callbacks and the rationale continuation.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::warn;

use crate::error::{Error, Result};
use crate::permission::Permission;
use crate::result_set::ResultSet;
use crate::token::RequestToken;

/// Receives the outcome of a permission request.
///
/// Any `FnMut(&ResultSet) + Send` closure is a callback that accepts the
/// default rationale behaviour (proceed without explaining anything).
pub trait PermissionCallback: Send {
    /// Called exactly once with the request's final result set.
    fn on_result(&mut self, results: &ResultSet);

    /// Called when the host recommends explaining why `permissions` are
    /// needed. The host request is not issued until `continuation` is
    /// provided, which may happen here or at any later point.
    fn on_rationale_requested(
        &mut self,
        continuation: RationaleContinuation,
        permissions: &[Permission],
    ) {
        let token = continuation.token();
        if let Err(e) = continuation.provide() {
            warn!(%token, ?permissions, error = %e, "Failed to resume after rationale");
        }
    }
}

impl<F> PermissionCallback for F
where
    F: FnMut(&ResultSet) + Send,
{
    fn on_result(&mut self, results: &ResultSet) {
        self(results);
    }
}

/// A callback shared between the outstanding table and any chain that
/// references it.
pub type SharedCallback = Arc<Mutex<dyn PermissionCallback>>;

/// Wrap a callback for storage in the coordinator.
pub fn shared<C: PermissionCallback + 'static>(callback: C) -> SharedCallback {
    Arc::new(Mutex::new(callback))
}

/// Deliver `results` to `callback`. A poisoned callback lock is recovered so
/// the result is still delivered exactly once.
pub(crate) fn notify_result(callback: &SharedCallback, results: &ResultSet) {
    callback
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .on_result(results);
}

pub(crate) fn notify_rationale(
    callback: &SharedCallback,
    continuation: RationaleContinuation,
    permissions: &[Permission],
) {
    callback
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .on_rationale_requested(continuation, permissions);
}

/// Whatever can resume a request suspended on a rationale.
pub(crate) trait RationaleTarget: Send + Sync {
    fn provide_rationale(&self, token: RequestToken) -> Result<()>;
}

/// Resumes a request that is waiting for the caller to show a rationale.
///
/// Provide it once the explanation flow has finished; the host request is
/// issued from inside [`provide`](Self::provide).
#[must_use = "the host request is not issued until the rationale is provided"]
pub struct RationaleContinuation {
    token: RequestToken,
    target: Weak<dyn RationaleTarget>,
}

impl RationaleContinuation {
    pub(crate) fn new(token: RequestToken, target: Weak<dyn RationaleTarget>) -> Self {
        Self { token, target }
    }

    /// Token of the suspended request.
    pub const fn token(&self) -> RequestToken {
        self.token
    }

    /// Signal that the rationale has been shown and issue the host request.
    pub fn provide(self) -> Result<()> {
        let target = self.target.upgrade().ok_or(Error::CoordinatorDropped)?;
        target.provide_rationale(self.token)
    }
}

impl fmt::Debug for RationaleContinuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RationaleContinuation")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        provided: Mutex<Vec<RequestToken>>,
    }

    impl RationaleTarget for Recorder {
        fn provide_rationale(&self, token: RequestToken) -> Result<()> {
            self.provided
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(token);
            Ok(())
        }
    }

    #[test]
    fn closures_are_callbacks() {
        let seen = Arc::new(Mutex::new(0_usize));
        let counter = Arc::clone(&seen);
        let callback = shared(move |results: &ResultSet| {
            *counter.lock().unwrap_or_else(PoisonError::into_inner) += results.len();
        });

        notify_result(&callback, &ResultSet::new(["CAMERA", "CONTACTS"]));
        assert_eq!(*seen.lock().unwrap_or_else(PoisonError::into_inner), 2);
    }

    #[test]
    fn default_rationale_handler_provides_immediately() {
        let recorder = Arc::new(Recorder {
            provided: Mutex::new(Vec::new()),
        });
        let target: Arc<dyn RationaleTarget> = recorder.clone();
        let continuation = RationaleContinuation::new(RequestToken::new(4), Arc::downgrade(&target));

        let callback = shared(|_: &ResultSet| {});
        notify_rationale(&callback, continuation, &[Permission::new("CAMERA")]);

        let provided = recorder.provided.lock().unwrap_or_else(PoisonError::into_inner);
        assert_eq!(*provided, vec![RequestToken::new(4)]);
    }

    #[test]
    fn continuation_fails_once_coordinator_is_gone() {
        let target: Arc<dyn RationaleTarget> = Arc::new(Recorder {
            provided: Mutex::new(Vec::new()),
        });
        let continuation = RationaleContinuation::new(RequestToken::new(1), Arc::downgrade(&target));
        drop(target);

        assert!(matches!(continuation.provide(), Err(Error::CoordinatorDropped)));
    }
}

//! Permission request coordinator.
//!
//! Drives each request through the decision sequence:
//!
//! 1. Ask the host which permissions are already granted. If all of them
//!    are, the callback fires before [`PermissionCoordinator::request`]
//!    returns.
//! 2. Try to link the request onto an outstanding one that already covers
//!    every ungranted permission.
//! 3. Otherwise allocate a token, record the request as outstanding, and
//!    either solicit a rationale from the caller or ask the host right away.
//!
//! Host results come back through [`PermissionCoordinator::resolve_from_host`]
//! keyed by token.
//!
//! The outstanding table and the token counter sit behind one mutex, held
//! across every lookup-and-mutate pair. Callbacks and host requests run after
//! the lock is released so callbacks may call back into the coordinator.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::callback::{
    PermissionCallback, RationaleContinuation, RationaleTarget, SharedCallback, notify_rationale,
    notify_result, shared,
};
use crate::config::CoordinatorConfig;
use crate::error::{Error, Result};
use crate::host::{ContextSlot, HostBridge};
use crate::link::{CallbackChain, JoinedRequest, link_to_existing};
use crate::pending::{PendingRequest, PendingTable, RequestPhase};
use crate::permission::Permission;
use crate::result_set::ResultSet;
use crate::token::{RequestToken, TokenAllocator};

/// What happened to a request when it was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Everything was already granted; the callback has already fired.
    Granted,
    /// Attached to the outstanding request `host`; resolves with it.
    Linked { host: RequestToken },
    /// The caller was asked for a rationale. The host request is issued once
    /// the continuation is provided.
    RationaleRequested { token: RequestToken },
    /// The host was asked for the ungranted permissions.
    Dispatched { token: RequestToken },
}

impl RequestOutcome {
    /// Token this request will be resolved under, if any.
    pub const fn token(self) -> Option<RequestToken> {
        match self {
            Self::Granted => None,
            Self::Linked { host } => Some(host),
            Self::RationaleRequested { token } | Self::Dispatched { token } => Some(token),
        }
    }
}

struct State {
    pending: PendingTable,
    tokens: TokenAllocator,
}

struct Inner<H: HostBridge> {
    host: H,
    context: ContextSlot<H::Context>,
    state: Mutex<State>,
    config: CoordinatorConfig,
}

impl<H: HostBridge> Inner<H> {
    fn lock_state(&self) -> Result<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| Error::LockPoisoned {
            context: "outstanding requests".to_string(),
        })
    }

    fn read_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<H: HostBridge> RationaleTarget for Inner<H> {
    fn provide_rationale(&self, token: RequestToken) -> Result<()> {
        let context = self.context.get().ok_or(Error::NoActiveContext)?;

        let permissions = {
            let mut state = self.lock_state()?;
            let request = state.pending.get_mut(token).ok_or_else(|| {
                warn!(%token, "Rationale provided for unknown request");
                Error::UnknownToken { token }
            })?;
            if request.phase == RequestPhase::Dispatched {
                warn!(%token, "Rationale already provided; ignoring");
                return Ok(());
            }
            request.phase = RequestPhase::Dispatched;
            request.result_set.ungranted()
        };

        info!(%token, ?permissions, "Rationale provided; requesting permissions from host");
        self.host.issue_request(&context, token, &permissions);
        Ok(())
    }
}

/// Coordinates permission requests against a single host.
///
/// Cheap to clone; clones share the same outstanding table.
pub struct PermissionCoordinator<H: HostBridge + 'static> {
    inner: Arc<Inner<H>>,
}

impl<H: HostBridge + 'static> PermissionCoordinator<H> {
    /// Create a coordinator for `host`.
    pub fn new(host: H, config: CoordinatorConfig) -> Self {
        let tokens = TokenAllocator::new(config.first_token, config.max_token);
        Self {
            inner: Arc::new(Inner {
                host,
                context: ContextSlot::new(),
                state: Mutex::new(State {
                    pending: PendingTable::new(),
                    tokens,
                }),
                config,
            }),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults(host: H) -> Self {
        Self::new(host, CoordinatorConfig::default())
    }

    /// Register the active execution context. Only a weak reference is kept.
    pub fn set_context(&self, context: &Arc<H::Context>) {
        self.inner.context.set(context);
        debug!("Execution context set");
    }

    /// Forget the active execution context.
    pub fn clear_context(&self) {
        self.inner.context.clear();
        debug!("Execution context cleared");
    }

    /// Whether a live execution context is registered.
    pub fn has_context(&self) -> bool {
        self.inner.context.get().is_some()
    }

    /// Request `permissions`, reporting the outcome to `callback`.
    ///
    /// Fails with [`Error::NoActiveContext`] before touching any state if no
    /// live context is registered. An empty permission list is trivially
    /// granted.
    pub fn request<I, P, C>(&self, permissions: I, callback: C) -> Result<RequestOutcome>
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
        C: PermissionCallback + 'static,
    {
        self.request_shared(permissions, shared(callback))
    }

    /// Like [`request`](Self::request) for a callback that is already shared.
    pub fn request_shared<I, P>(&self, permissions: I, callback: SharedCallback) -> Result<RequestOutcome>
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        let context = self.inner.context.get().ok_or(Error::NoActiveContext)?;
        let host = &self.inner.host;

        let mut result_set = ResultSet::new(permissions);
        let already_granted: Vec<Permission> = result_set
            .permissions()
            .filter(|p| host.check_granted(&context, p))
            .cloned()
            .collect();
        result_set.mark_granted(&already_granted);

        if result_set.all_granted() {
            debug!(permissions = result_set.len(), "All permissions already granted");
            notify_result(&callback, &result_set);
            return Ok(RequestOutcome::Granted);
        }

        let rationale = result_set.permissions_needing_rationale(host, &context);

        let next = {
            let mut guard = self.inner.lock_state()?;
            let state = &mut *guard;

            let newcomer = match link_to_existing(
                state.pending.as_mut_slice(),
                JoinedRequest::new(result_set, callback),
            ) {
                Ok(host_token) => return Ok(RequestOutcome::Linked { host: host_token }),
                Err(newcomer) => newcomer,
            };

            let pending = &state.pending;
            let token = state
                .tokens
                .allocate(|t| pending.contains(t))
                .ok_or(Error::TokensExhausted)?;

            let mut request = PendingRequest::new(
                token,
                newcomer.result_set,
                CallbackChain::single(Arc::clone(&newcomer.callback)),
            );

            let next = if rationale.is_empty() {
                request.phase = RequestPhase::Dispatched;
                Next::Dispatch {
                    token,
                    permissions: request.result_set.ungranted(),
                }
            } else {
                Next::Rationale {
                    token,
                    callback: newcomer.callback,
                    permissions: rationale,
                }
            };
            state.pending.insert(request);
            next
        };

        match next {
            Next::Dispatch { token, permissions } => {
                info!(%token, ?permissions, "Requesting permissions from host");
                host.issue_request(&context, token, &permissions);
                Ok(RequestOutcome::Dispatched { token })
            }
            Next::Rationale {
                token,
                callback,
                permissions,
            } => {
                info!(%token, ?permissions, "Rationale requested before asking host");
                let target: Arc<dyn RationaleTarget> = Arc::clone(&self.inner) as Arc<dyn RationaleTarget>;
                let continuation = RationaleContinuation::new(token, Arc::downgrade(&target));
                notify_rationale(&callback, continuation, &permissions);
                Ok(RequestOutcome::RationaleRequested { token })
            }
        }
    }

    /// Resume a request that was waiting on a rationale and issue its host
    /// request. Providing twice is ignored.
    pub fn provide_rationale(&self, token: RequestToken) -> Result<()> {
        self.inner.provide_rationale(token)
    }

    /// Deliver the host's answer for `token`.
    ///
    /// `permissions[i]` corresponds to `grants[i]`; unequal lengths are a
    /// hard [`Error::MalformedResolution`] and leave the request outstanding.
    /// An unknown token is reported as [`Error::UnknownToken`] and no callback
    /// fires.
    pub fn resolve_from_host(
        &self,
        token: RequestToken,
        permissions: &[Permission],
        grants: &[bool],
    ) -> Result<()> {
        if permissions.len() != grants.len() {
            return Err(Error::MalformedResolution {
                permissions: permissions.len(),
                grants: grants.len(),
            });
        }

        let request = self.inner.lock_state()?.pending.take(token);
        let Some(request) = request else {
            warn!(%token, "Host result for an unrecognized request token");
            return Err(Error::UnknownToken { token });
        };

        let PendingRequest {
            mut result_set,
            callback,
            phase,
            ..
        } = request;
        if phase == RequestPhase::AwaitingRationale {
            debug!(%token, "Host answered before the rationale was provided");
        }

        result_set.apply_host_result(permissions.iter().zip(grants.iter().copied()));
        info!(
            %token,
            all_granted = result_set.all_granted(),
            linked = callback.joined_len(),
            "Permission request resolved"
        );
        callback.deliver(&result_set);
        Ok(())
    }

    /// Expire requests older than the configured timeout, delivering each
    /// callback once with whatever outcomes are known. A no-op when no
    /// timeout is configured.
    pub fn expire_overdue(&self) -> Result<Vec<RequestToken>> {
        self.expire_overdue_at(Instant::now())
    }

    /// [`expire_overdue`](Self::expire_overdue) with an explicit clock reading.
    pub fn expire_overdue_at(&self, now: Instant) -> Result<Vec<RequestToken>> {
        let Some(timeout) = self.inner.config.request_timeout() else {
            return Ok(Vec::new());
        };

        let expired = self.inner.lock_state()?.pending.take_expired(timeout, now);
        let tokens = expired.iter().map(PendingRequest::token).collect();
        for request in expired {
            request.callback.deliver(&request.result_set);
        }
        Ok(tokens)
    }

    /// Number of outstanding requests.
    pub fn outstanding_count(&self) -> usize {
        self.inner.read_state().pending.len()
    }

    /// Tokens of outstanding requests, oldest first.
    pub fn outstanding_tokens(&self) -> Vec<RequestToken> {
        self.inner.read_state().pending.tokens()
    }

    pub fn is_outstanding(&self, token: RequestToken) -> bool {
        self.inner.read_state().pending.contains(token)
    }

    /// Lifecycle phase of an outstanding request.
    pub fn phase_of(&self, token: RequestToken) -> Option<RequestPhase> {
        self.inner.read_state().pending.get(token).map(PendingRequest::phase)
    }

    /// Number of requests linked onto the outstanding request `token`.
    pub fn linked_count(&self, token: RequestToken) -> Option<usize> {
        self.inner
            .read_state()
            .pending
            .get(token)
            .map(|r| r.callback().joined_len())
    }

    pub fn host(&self) -> &H {
        &self.inner.host
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }
}

enum Next {
    Dispatch {
        token: RequestToken,
        permissions: Vec<Permission>,
    },
    Rationale {
        token: RequestToken,
        callback: SharedCallback,
        permissions: Vec<Permission>,
    },
}

impl<H: HostBridge + 'static> Clone for PermissionCoordinator<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: HostBridge + 'static> fmt::Debug for PermissionCoordinator<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionCoordinator")
            .field("outstanding", &self.outstanding_tokens())
            .field("has_context", &self.has_context())
            .finish_non_exhaustive()
    }
}

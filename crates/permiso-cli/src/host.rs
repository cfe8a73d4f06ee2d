//! Simulated permission authority and its event loop.
//!
//! Issued requests are queued on a channel and answered on a later turn of
//! the event loop, never from inside `issue_request`.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use permiso_core::{HostBridge, Permission, PermissionCoordinator, RequestPhase, RequestToken};

/// How often the event loop checks for expired requests.
const EXPIRY_TICK: Duration = Duration::from_millis(250);

/// Execution context for the simulated host: one terminal session.
#[derive(Debug)]
pub struct Session {
    name: String,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A host request waiting for the user's decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPrompt {
    pub token: RequestToken,
    pub permissions: Vec<Permission>,
}

/// In-process authority that remembers what the user decided.
///
/// Permissions denied earlier in the session make the host recommend a
/// rationale, as a mobile OS does after a first refusal.
pub struct SimulatedHost {
    granted: Mutex<HashSet<Permission>>,
    denied: Mutex<HashSet<Permission>>,
    rationale: HashSet<Permission>,
    prompts: mpsc::UnboundedSender<HostPrompt>,
}

impl SimulatedHost {
    /// Create a host and the receiving end of its prompt queue.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostPrompt>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let host = Self {
            granted: Mutex::new(HashSet::new()),
            denied: Mutex::new(HashSet::new()),
            rationale: HashSet::new(),
            prompts: tx,
        };
        (host, rx)
    }

    /// Permissions already granted when the session starts.
    #[must_use]
    pub fn with_granted<I, P>(self, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        self.granted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    /// Permissions that always get a rationale before the host is asked.
    #[must_use]
    pub fn with_rationale<I, P>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        self.rationale
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    /// Remember the user's answers so later checks reflect them.
    pub fn record(&self, permissions: &[Permission], grants: &[bool]) {
        let mut granted = self.granted.lock().unwrap_or_else(PoisonError::into_inner);
        let mut denied = self.denied.lock().unwrap_or_else(PoisonError::into_inner);
        for (permission, &allow) in permissions.iter().zip(grants) {
            if allow {
                denied.remove(permission);
                granted.insert(permission.clone());
            } else {
                granted.remove(permission);
                denied.insert(permission.clone());
            }
        }
    }
}

impl HostBridge for SimulatedHost {
    type Context = Session;

    fn check_granted(&self, _context: &Session, permission: &Permission) -> bool {
        self.granted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(permission)
    }

    fn needs_rationale(&self, _context: &Session, permission: &Permission) -> bool {
        self.rationale.contains(permission)
            || self
                .denied
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(permission)
    }

    fn issue_request(&self, context: &Session, token: RequestToken, permissions: &[Permission]) {
        debug!(session = context.name(), %token, ?permissions, "Queueing host prompt");
        let prompt = HostPrompt {
            token,
            permissions: permissions.to_vec(),
        };
        if self.prompts.send(prompt).is_err() {
            warn!(%token, "Host prompt queue closed; request will never resolve");
        }
    }
}

/// Answer queued host prompts until nothing is outstanding.
///
/// `decide` returns one grant per permission in the prompt. Requests past the
/// configured timeout are expired on a fixed tick. The loop also stops when
/// every outstanding request is still waiting for a rationale and no timeout
/// could ever release it. Returns the number of prompts answered.
pub async fn run_event_loop<D>(
    coordinator: &PermissionCoordinator<SimulatedHost>,
    prompts: &mut mpsc::UnboundedReceiver<HostPrompt>,
    mut decide: D,
) -> anyhow::Result<usize>
where
    D: FnMut(&HostPrompt) -> anyhow::Result<Vec<bool>>,
{
    let mut tick = tokio::time::interval(EXPIRY_TICK);
    let mut answered = 0;

    while coordinator.outstanding_count() > 0 {
        if is_stalled(coordinator) && prompts.is_empty() {
            warn!(
                outstanding = ?coordinator.outstanding_tokens(),
                "Requests are waiting for a rationale that was never provided"
            );
            break;
        }

        tokio::select! {
            Some(prompt) = prompts.recv() => {
                let grants = decide(&prompt)?;
                coordinator.host().record(&prompt.permissions, &grants);
                match coordinator.resolve_from_host(prompt.token, &prompt.permissions, &grants) {
                    Ok(()) => answered += 1,
                    Err(e) if e.is_recoverable() => {
                        warn!(token = %prompt.token, error = %e, "Dropping host answer");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            _ = tick.tick() => {
                let expired = coordinator.expire_overdue()?;
                if !expired.is_empty() {
                    info!(?expired, "Expired overdue permission requests");
                }
            }
        }
    }

    Ok(answered)
}

fn is_stalled(coordinator: &PermissionCoordinator<SimulatedHost>) -> bool {
    coordinator.config().request_timeout().is_none()
        && coordinator
            .outstanding_tokens()
            .into_iter()
            .all(|t| coordinator.phase_of(t) == Some(RequestPhase::AwaitingRationale))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use permiso_core::{CoordinatorConfig, ResultSet};

    use super::*;

    fn p(name: &str) -> Permission {
        Permission::new(name)
    }

    fn coordinator(
        host: SimulatedHost,
    ) -> (PermissionCoordinator<SimulatedHost>, Arc<Session>) {
        let coordinator = PermissionCoordinator::new(host, CoordinatorConfig::default());
        let session = Arc::new(Session::new("test"));
        coordinator.set_context(&session);
        (coordinator, session)
    }

    #[test]
    fn issue_request_only_queues() {
        let (host, mut rx) = SimulatedHost::new();
        let (coordinator, _session) = coordinator(host);

        coordinator.request(["CAMERA"], |_: &ResultSet| {}).unwrap();

        let prompt = rx.try_recv().unwrap();
        assert_eq!(prompt.token, RequestToken::new(1));
        assert_eq!(prompt.permissions, vec![p("CAMERA")]);
        assert!(coordinator.is_outstanding(RequestToken::new(1)));
    }

    #[test]
    fn denial_makes_host_recommend_rationale() {
        let (host, _rx) = SimulatedHost::new();
        let session = Session::new("test");
        assert!(!host.needs_rationale(&session, &p("CAMERA")));

        host.record(&[p("CAMERA")], &[false]);
        assert!(host.needs_rationale(&session, &p("CAMERA")));
        assert!(!host.check_granted(&session, &p("CAMERA")));

        host.record(&[p("CAMERA")], &[true]);
        assert!(!host.needs_rationale(&session, &p("CAMERA")));
        assert!(host.check_granted(&session, &p("CAMERA")));
    }

    #[tokio::test]
    async fn event_loop_resolves_on_a_later_turn() {
        let (host, mut rx) = SimulatedHost::new();
        let (coordinator, _session) = coordinator(host);
        let seen = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..2 {
            let seen = Arc::clone(&seen);
            coordinator
                .request(["CAMERA"], move |r: &ResultSet| {
                    seen.lock().unwrap().push(r.all_granted());
                })
                .unwrap();
        }
        assert!(seen.lock().unwrap().is_empty());

        let answered = run_event_loop(&coordinator, &mut rx, |prompt| {
            Ok(vec![true; prompt.permissions.len()])
        })
        .await
        .unwrap();

        assert_eq!(answered, 1);
        assert_eq!(*seen.lock().unwrap(), vec![true, true]);
        assert_eq!(coordinator.outstanding_count(), 0);
    }

    #[tokio::test]
    async fn event_loop_stops_when_only_rationale_waits_remain() {
        struct Ignore;
        impl permiso_core::PermissionCallback for Ignore {
            fn on_result(&mut self, _: &ResultSet) {}
            fn on_rationale_requested(
                &mut self,
                _continuation: permiso_core::RationaleContinuation,
                _permissions: &[Permission],
            ) {
            }
        }

        let (host, mut rx) = SimulatedHost::new();
        let (coordinator, _session) = coordinator(host.with_rationale(["CAMERA"]));
        coordinator.request(["CAMERA"], Ignore).unwrap();

        let answered = run_event_loop(&coordinator, &mut rx, |_| Ok(Vec::new()))
            .await
            .unwrap();

        assert_eq!(answered, 0);
        assert_eq!(coordinator.outstanding_count(), 1);
    }
}

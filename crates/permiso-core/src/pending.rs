//! Outstanding permission requests.
//!
//! Tracks requests that have been given a token and are waiting either for
//! the caller's rationale or for the host's answer. Insertion order is kept
//! because linking prefers the oldest request that can satisfy a newcomer.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::link::CallbackChain;
use crate::result_set::ResultSet;
use crate::token::RequestToken;

/// Where a dispatched request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    /// Waiting for the caller to provide a rationale before asking the host.
    AwaitingRationale,
    /// The host has been asked; waiting for its result.
    Dispatched,
}

/// A request that owns a token and sits in the outstanding table.
pub struct PendingRequest {
    pub(crate) token: RequestToken,
    pub(crate) result_set: ResultSet,
    pub(crate) callback: CallbackChain,
    pub(crate) phase: RequestPhase,
    pub(crate) created_at: Instant,
}

impl PendingRequest {
    pub fn new(token: RequestToken, result_set: ResultSet, callback: CallbackChain) -> Self {
        Self {
            token,
            result_set,
            callback,
            phase: RequestPhase::AwaitingRationale,
            created_at: Instant::now(),
        }
    }

    pub const fn token(&self) -> RequestToken {
        self.token
    }

    pub const fn result_set(&self) -> &ResultSet {
        &self.result_set
    }

    pub const fn phase(&self) -> RequestPhase {
        self.phase
    }

    pub const fn callback(&self) -> &CallbackChain {
        &self.callback
    }

    /// Check if the request has been outstanding longer than `timeout`.
    pub fn is_expired(&self, timeout: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > timeout
    }
}

/// Outstanding requests keyed by token, in insertion order.
#[derive(Default)]
pub struct PendingTable {
    requests: Vec<PendingRequest>,
}

impl PendingTable {
    pub const fn new() -> Self {
        Self {
            requests: Vec::new(),
        }
    }

    /// Add an outstanding request.
    pub fn insert(&mut self, request: PendingRequest) {
        debug!(token = %request.token, "Added outstanding permission request");
        self.requests.push(request);
    }

    pub fn get(&self, token: RequestToken) -> Option<&PendingRequest> {
        self.requests.iter().find(|r| r.token == token)
    }

    pub fn get_mut(&mut self, token: RequestToken) -> Option<&mut PendingRequest> {
        self.requests.iter_mut().find(|r| r.token == token)
    }

    /// Remove and return an outstanding request.
    pub fn take(&mut self, token: RequestToken) -> Option<PendingRequest> {
        let index = self.requests.iter().position(|r| r.token == token)?;
        let request = self.requests.remove(index);
        debug!(%token, "Removed outstanding permission request");
        Some(request)
    }

    pub fn contains(&self, token: RequestToken) -> bool {
        self.requests.iter().any(|r| r.token == token)
    }

    /// Remove every request older than `timeout`, oldest first.
    pub fn take_expired(&mut self, timeout: Duration, now: Instant) -> Vec<PendingRequest> {
        let (expired, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.requests)
            .into_iter()
            .partition(|r| r.is_expired(timeout, now));
        self.requests = live;

        for request in &expired {
            warn!(token = %request.token, "Permission request expired");
        }
        expired
    }

    /// Tokens of all outstanding requests, in insertion order.
    pub fn tokens(&self) -> Vec<RequestToken> {
        self.requests.iter().map(|r| r.token).collect()
    }

    pub fn as_mut_slice(&mut self) -> &mut [PendingRequest] {
        &mut self.requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingCallback;

    fn request(token: u32, log: &RecordingCallback) -> PendingRequest {
        PendingRequest::new(
            RequestToken::new(token),
            ResultSet::new(["CAMERA"]),
            CallbackChain::single(log.callback("r")),
        )
    }

    #[test]
    fn new_request_awaits_rationale_decision() {
        let log = RecordingCallback::new();
        let req = request(1, &log);
        assert_eq!(req.phase(), RequestPhase::AwaitingRationale);
        assert_eq!(req.token(), RequestToken::new(1));
    }

    #[test]
    fn take_removes_request() {
        let log = RecordingCallback::new();
        let mut table = PendingTable::new();
        table.insert(request(1, &log));

        assert!(table.contains(RequestToken::new(1)));
        assert!(table.take(RequestToken::new(1)).is_some());
        assert!(!table.contains(RequestToken::new(1)));
        assert!(table.take(RequestToken::new(1)).is_none());
    }

    #[test]
    fn keeps_insertion_order() {
        let log = RecordingCallback::new();
        let mut table = PendingTable::new();
        for token in [5, 2, 9] {
            table.insert(request(token, &log));
        }
        table.take(RequestToken::new(2));

        assert_eq!(table.tokens(), vec![RequestToken::new(5), RequestToken::new(9)]);
    }

    #[test]
    fn expired_request_cleanup() {
        let log = RecordingCallback::new();
        let mut table = PendingTable::new();
        table.insert(request(1, &log));
        table.insert(request(2, &log));

        let later = Instant::now() + Duration::from_secs(120);
        let expired = table.take_expired(Duration::from_secs(60), later);

        assert_eq!(expired.len(), 2);
        assert_eq!(expired[0].token(), RequestToken::new(1));
        assert!(table.is_empty());
    }

    #[test]
    fn fresh_requests_survive_cleanup() {
        let log = RecordingCallback::new();
        let mut table = PendingTable::new();
        table.insert(request(1, &log));

        let expired = table.take_expired(Duration::from_secs(60), Instant::now());
        assert!(expired.is_empty());
        assert_eq!(table.len(), 1);
    }
}

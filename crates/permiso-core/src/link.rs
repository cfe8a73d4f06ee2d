//! Request linking.
//!
//! When a new request can be answered by one that is already in flight, the
//! newcomer is attached to that request's callback chain instead of producing
//! a second host request. Chains resolve in join order: the outstanding
//! request's own callback first, then every linked request in the order it
//! joined.

use std::sync::Arc;

use tracing::debug;

use crate::callback::{SharedCallback, notify_result};
use crate::pending::PendingRequest;
use crate::result_set::ResultSet;
use crate::token::RequestToken;

/// A request that has not been given a token: its result set and callback.
pub struct JoinedRequest {
    pub result_set: ResultSet,
    pub callback: SharedCallback,
}

impl JoinedRequest {
    pub const fn new(result_set: ResultSet, callback: SharedCallback) -> Self {
        Self {
            result_set,
            callback,
        }
    }
}

/// The callback attached to an outstanding request.
///
/// `Single` is the original caller's callback. `Linked` wraps an earlier
/// chain and adds one joined request after it.
pub enum CallbackChain {
    Single(SharedCallback),
    Linked {
        previous: Box<CallbackChain>,
        joined: Box<JoinedRequest>,
    },
}

impl CallbackChain {
    pub const fn single(callback: SharedCallback) -> Self {
        Self::Single(callback)
    }

    /// The original caller's callback. Rationale requests for the whole chain
    /// are routed here so only one rationale flow runs.
    pub fn root(&self) -> &SharedCallback {
        let mut node = self;
        loop {
            match node {
                Self::Single(callback) => return callback,
                Self::Linked { previous, .. } => node = previous.as_ref(),
            }
        }
    }

    /// Number of requests linked onto the original one.
    pub fn joined_len(&self) -> usize {
        let mut count = 0;
        let mut node = self;
        while let Self::Linked { previous, .. } = node {
            count += 1;
            node = previous.as_ref();
        }
        count
    }

    pub const fn is_linked(&self) -> bool {
        matches!(self, Self::Linked { .. })
    }

    /// Append `joined` so it is notified after everything already in the chain.
    pub fn push(&mut self, joined: JoinedRequest) {
        let placeholder = Self::Single(Arc::clone(self.root()));
        let previous = std::mem::replace(self, placeholder);
        *self = Self::Linked {
            previous: Box::new(previous),
            joined: Box::new(joined),
        };
    }

    /// Notify every callback in join order.
    ///
    /// The root receives `resolved` as-is. Each joined request first copies
    /// the outcomes for its ungranted permissions out of `resolved`, then
    /// receives its own result set.
    pub fn deliver(self, resolved: &ResultSet) {
        let mut joined = Vec::new();
        let mut node = self;
        let root = loop {
            match node {
                Self::Single(callback) => break callback,
                Self::Linked {
                    previous,
                    joined: request,
                } => {
                    joined.push(*request);
                    node = *previous;
                }
            }
        };

        notify_result(&root, resolved);
        for mut request in joined.into_iter().rev() {
            request.result_set.copy_ungranted_from(resolved);
            notify_result(&request.callback, &request.result_set);
        }
    }
}

/// Attach `newcomer` to the first outstanding request that tracks every one
/// of its ungranted permissions.
///
/// Scans in insertion order and takes the first match, not the best one.
/// Returns the host request's token, or gives `newcomer` back when nothing
/// can satisfy it.
pub fn link_to_existing(
    outstanding: &mut [PendingRequest],
    newcomer: JoinedRequest,
) -> std::result::Result<RequestToken, JoinedRequest> {
    let Some(host) = outstanding
        .iter_mut()
        .find(|active| active.result_set.superset_of_ungranted(&newcomer.result_set))
    else {
        return Err(newcomer);
    };

    host.callback.push(newcomer);
    debug!(
        token = %host.token,
        chain_len = host.callback.joined_len(),
        "Linked request to outstanding request"
    );
    Ok(host.token)
}

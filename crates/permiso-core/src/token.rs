//! Lifecycle tokens correlating dispatched requests with host results.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle passed to the host with each dispatched request and echoed
/// back with its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestToken(u32);

impl RequestToken {
    /// Value hosts commonly reserve for "no request". Never allocated.
    pub const NONE: Self = Self(0);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for RequestToken {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Sequential token allocator over `[first, last]`.
///
/// Wraps back to `first` after `last`, skipping any token the caller reports
/// as still in use.
#[derive(Debug, Clone)]
pub struct TokenAllocator {
    first: u32,
    last: u32,
    next: u32,
}

impl TokenAllocator {
    /// Create an allocator. `first` is clamped above the reserved zero token
    /// and `last` is raised to at least `first`.
    pub fn new(first: u32, last: u32) -> Self {
        let first = first.max(1);
        let last = last.max(first);
        Self {
            first,
            last,
            next: first,
        }
    }

    /// Allocate the next token for which `in_use` returns false.
    ///
    /// Returns `None` when every token in range is in use.
    pub fn allocate(&mut self, in_use: impl Fn(RequestToken) -> bool) -> Option<RequestToken> {
        let span = u64::from(self.last - self.first) + 1;
        for _ in 0..span {
            let candidate = RequestToken(self.next);
            self.advance();
            if !in_use(candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// The token the next call to [`allocate`](Self::allocate) will try first.
    pub const fn peek(&self) -> RequestToken {
        RequestToken(self.next)
    }

    const fn advance(&mut self) {
        self.next = if self.next >= self.last {
            self.first
        } else {
            self.next + 1
        };
    }
}

impl Default for TokenAllocator {
    fn default() -> Self {
        Self::new(1, u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_sequentially_from_one() {
        let mut tokens = TokenAllocator::default();
        assert_eq!(tokens.allocate(|_| false), Some(RequestToken::new(1)));
        assert_eq!(tokens.allocate(|_| false), Some(RequestToken::new(2)));
        assert_eq!(tokens.peek(), RequestToken::new(3));
    }

    #[test]
    fn never_hands_out_zero() {
        let mut tokens = TokenAllocator::new(0, 3);
        assert_eq!(tokens.allocate(|_| false), Some(RequestToken::new(1)));
    }

    #[test]
    fn wraps_and_skips_tokens_in_use() {
        let mut tokens = TokenAllocator::new(1, 3);
        for _ in 0..3 {
            tokens.allocate(|_| false);
        }
        // Token 1 is still outstanding, so the wrap lands on 2.
        let next = tokens.allocate(|t| t == RequestToken::new(1));
        assert_eq!(next, Some(RequestToken::new(2)));
    }

    #[test]
    fn exhausted_range_returns_none() {
        let mut tokens = TokenAllocator::new(5, 6);
        assert_eq!(tokens.allocate(|_| true), None);
    }

    #[test]
    fn full_u32_range_does_not_overflow() {
        let mut tokens = TokenAllocator::new(u32::MAX - 1, u32::MAX);
        assert_eq!(tokens.allocate(|_| false), Some(RequestToken::new(u32::MAX - 1)));
        assert_eq!(tokens.allocate(|_| false), Some(RequestToken::new(u32::MAX)));
        assert_eq!(tokens.allocate(|_| false), Some(RequestToken::new(u32::MAX - 1)));
    }
}

//! Cancellation support for stream consumers
//!
//! Allows stopping a consumer between connection attempts and between items.

use tokio_util::sync::CancellationToken;

/// Owner side of a consumer's cancellation signal
///
/// The consumer itself only ever sees the [`CancellationToken`]; once
/// cancelled, a token stays cancelled.
#[derive(Clone)]
pub struct ConsumeCancellation {
    token: CancellationToken,
}

impl ConsumeCancellation {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Cancel every consumer holding this token
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token to hand to a consumer
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Default for ConsumeCancellation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_reaches_handed_out_tokens() {
        let cancellation = ConsumeCancellation::default();
        let token = cancellation.token();
        let shared = cancellation.clone();
        assert!(!token.is_cancelled());

        cancellation.cancel();
        assert!(shared.is_cancelled());
        assert!(token.is_cancelled());
    }
}

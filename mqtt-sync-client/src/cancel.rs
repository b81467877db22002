use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable handle that aborts the outstanding and following operations of a session.
///
/// The token may be cancelled from any thread;
/// the session notices it between two polls of the transport.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token which is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst)
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears a previous cancellation so the session can be used again.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_cancel_from_another_thread() {
        let token = CancelToken::new();
        let handle = token.clone();

        assert!(!token.is_cancelled());

        thread::spawn(move || handle.cancel()).join().unwrap();

        assert!(token.is_cancelled());

        token.reset();
        assert!(!token.is_cancelled());
    }
}

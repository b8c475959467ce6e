//! Cancellation of long running reader operations

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender, unbounded};

/// Receiving side of a cancellation, handed to the operation
#[derive(Debug)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    // keeps the channel connected while only the token is alive
    _sender: Sender<()>,
    receiver: Receiver<()>,
}

/// Triggering side of a cancellation
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
    sender: Sender<()>,
}

impl CancellationToken {
    /// Create a token and the handle that cancels it
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Self, CancelHandle) {
        let cancelled = Arc::new(AtomicBool::new(false));
        let (sender, receiver) = unbounded();
        let handle = CancelHandle {
            cancelled: Arc::clone(&cancelled),
            sender: sender.clone(),
        };
        let token = Self {
            cancelled,
            _sender: sender,
            receiver,
        };
        (token, handle)
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Channel that becomes ready once cancellation is requested
    pub(crate) const fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }
}

impl CancelHandle {
    /// Request cancellation, later calls have no effect
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            // the token owns a sender, so the channel is never disconnected here
            let _ = self.sender.send(());
        }
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel() {
        let (token, handle) = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.receiver().try_recv().is_err());

        handle.cancel();
        handle.clone().cancel();
        assert!(token.is_cancelled());
        assert!(handle.is_cancelled());
        assert!(token.receiver().try_recv().is_ok());
        // a second cancel does not queue another wake-up
        assert!(token.receiver().try_recv().is_err());
    }

    #[test]
    fn test_dropped_handle_does_not_cancel() {
        let (token, handle) = CancellationToken::new();
        drop(handle);
        assert!(!token.is_cancelled());
        assert!(token.receiver().try_recv().is_err());
    }
}

//! Cancellation token for the stress loop
//!
//! The loop has no natural end. The token lets tests (or a future shutdown
//! path) stop it at the next step or in the middle of a pause.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;

pub struct CancelToken<M: RawMutex> {
    cancelled: AtomicBool,
    wake: Signal<M, ()>,
}

impl<M: RawMutex> CancelToken<M> {
    pub const fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            wake: Signal::new(),
        }
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.wake.signal(());
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            self.wake.wait().await;
        }
    }
}

impl<M: RawMutex> Default for CancelToken<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embassy_futures::select::{select, Either};
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[test]
    fn starts_uncancelled() {
        let token = CancelToken::<NoopRawMutex>::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancelled_resolves_after_cancel() {
        let token = CancelToken::<NoopRawMutex>::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
        block_on(token.cancelled());
    }

    #[test]
    fn cancelled_stays_pending_until_cancel() {
        let token = CancelToken::<NoopRawMutex>::new();
        let outcome = block_on(select(token.cancelled(), core::future::ready(())));
        assert!(matches!(outcome, Either::Second(())));
    }
}

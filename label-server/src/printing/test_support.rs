//! In-memory print sink for unit tests

use label_printer::{DeliveryError, DeliveryResult, PrintSink};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub(crate) struct MockSink {
    calls: AtomicUsize,
    failing: AtomicBool,
    fail_from_call: Option<usize>,
    hang: bool,
    delay: Option<Duration>,
    sent: Mutex<Vec<Vec<u8>>>,
}

impl MockSink {
    pub(crate) fn ok() -> Self {
        Self::default()
    }

    /// Accept the first `n` deliveries, refuse the rest
    pub(crate) fn failing_from(n: usize) -> Self {
        Self {
            fail_from_call: Some(n),
            ..Default::default()
        }
    }

    /// Never resolve a delivery
    pub(crate) fn hanging() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    /// Accept every delivery after `delay`
    pub(crate) fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }
}

impl PrintSink for MockSink {
    async fn deliver(&self, data: &[u8]) -> DeliveryResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) || self.fail_from_call.is_some_and(|n| call >= n) {
            return Err(DeliveryError::Offline("mock printer".into()));
        }
        self.sent.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn is_online(&self) -> bool {
        !self.failing.load(Ordering::SeqCst)
    }
}

//! Release points for held mock calls.

use std::sync::Arc;
use tokio::sync::Notify;

/// Holds one mock call until the test releases it.
///
/// A release before the call arrives is remembered, so the order of
/// `release` and the held call does not matter.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    notify: Arc<Notify>,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Let the held call complete.
    pub fn release(&self) {
        self.notify.notify_one();
    }

    pub(crate) async fn passed(&self) {
        self.notify.notified().await;
    }
}

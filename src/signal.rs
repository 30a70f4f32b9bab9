use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Notify;

/// Monotonic change counter shared by the orchestrator, the monitoring tasks and the draw loop.
///
/// Writers bump the version after every state change. The draw loop remembers
/// the last version it rendered, so any number of bumps between two frames
/// collapse into a single repaint and a bump can never be lost.
#[derive(Debug, Default)]
pub struct ChangeSignal {
    version: AtomicU64,
    notify: Notify,
}

impl ChangeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_dirty(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
        self.notify.notify_waiters();
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Resolves once the version differs from `seen`.
    pub async fn changed(&self, seen: u64) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a bump between the check and the await is not missed.
            notified.as_mut().enable();
            if self.version() != seen {
                return;
            }
            notified.await;
        }
    }
}

/// Tracks the version the last frame was drawn from.
#[derive(Debug, Default)]
pub struct RedrawTracker {
    rendered: Option<u64>,
}

impl RedrawTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Version the last frame was drawn from, or `None` before the first frame.
    pub fn rendered(&self) -> Option<u64> {
        self.rendered
    }

    pub fn is_dirty(&self, signal: &ChangeSignal) -> bool {
        self.rendered != Some(signal.version())
    }

    /// Records that a frame was drawn from a snapshot taken at `version`.
    pub fn mark_rendered(&mut self, version: u64) {
        self.rendered = Some(version);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn many_changes_need_one_redraw() {
        let signal = ChangeSignal::new();
        let mut tracker = RedrawTracker::new();
        assert!(tracker.is_dirty(&signal));
        tracker.mark_rendered(signal.version());
        assert!(!tracker.is_dirty(&signal));

        for _ in 0..5 {
            signal.mark_dirty();
        }
        assert!(tracker.is_dirty(&signal));
        tracker.mark_rendered(signal.version());
        assert!(!tracker.is_dirty(&signal));
    }

    #[tokio::test]
    async fn changed_returns_immediately_when_already_behind() {
        let signal = ChangeSignal::new();
        signal.mark_dirty();
        tokio::time::timeout(Duration::from_millis(50), signal.changed(0))
            .await
            .expect("should not wait");
    }

    #[tokio::test]
    async fn changed_wakes_on_bump() {
        let signal = Arc::new(ChangeSignal::new());
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.changed(0).await })
        };
        tokio::task::yield_now().await;
        signal.mark_dirty();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("woken")
            .expect("joined");
    }
}

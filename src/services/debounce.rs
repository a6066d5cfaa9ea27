//! Trailing-edge debounce for typed input.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);

/// Commits a raw value once no newer value has arrived for the quiet period.
///
/// Every new value restarts the timer; there is no upper bound on how long a value can be
/// held back while input keeps arriving. Dropping the debouncer discards a pending value.
pub struct Debouncer {
    raw: mpsc::UnboundedSender<String>,
    quiet: Duration,
    task: JoinHandle<()>,
}

impl Debouncer {
    /// Starts the debounce task. Committed values arrive on the returned receiver.
    #[must_use]
    pub fn new(quiet: Duration) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (committed_tx, committed_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run(raw_rx, committed_tx, quiet));

        (
            Self {
                raw: raw_tx,
                quiet,
                task,
            },
            committed_rx,
        )
    }

    /// Feeds a raw value. Returns false once the debouncer has shut down.
    pub fn push(&self, value: impl Into<String>) -> bool {
        self.raw.send(value.into()).is_ok()
    }

    #[must_use]
    pub const fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Stops the debounce task. A pending value is discarded and later pushes fail.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    mut raw: mpsc::UnboundedReceiver<String>,
    committed: mpsc::UnboundedSender<String>,
    quiet: Duration,
) {
    while let Some(mut pending) = raw.recv().await {
        loop {
            tokio::select! {
                next = raw.recv() => match next {
                    Some(value) => {
                        trace!("Debounce restarted");
                        pending = value;
                    }
                    None => return,
                },
                () = tokio::time::sleep(quiet) => {
                    if committed.send(pending).is_err() {
                        return;
                    }
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_input_commits_only_last_value() {
        let (debouncer, mut committed) = Debouncer::new(DEFAULT_QUIET_PERIOD);

        for value in ["b", "ba", "bat"] {
            assert!(debouncer.push(value));
            advance(100).await;
        }

        assert_eq!(committed.try_recv(), Err(TryRecvError::Empty));

        advance(500).await;
        assert_eq!(committed.recv().await.as_deref(), Some("bat"));
        assert_eq!(committed.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_value_waits_for_quiet_period() {
        let (debouncer, mut committed) = Debouncer::new(Duration::from_millis(300));

        debouncer.push("dune");
        advance(299).await;
        assert_eq!(committed.try_recv(), Err(TryRecvError::Empty));

        advance(2).await;
        assert_eq!(committed.try_recv().as_deref(), Ok("dune"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_maximum_wait() {
        let (debouncer, mut committed) = Debouncer::new(Duration::from_millis(200));

        // Twenty values, each inside the quiet period of the previous one.
        for i in 0..20 {
            debouncer.push(format!("q{i}"));
            advance(150).await;
            assert_eq!(committed.try_recv(), Err(TryRecvError::Empty));
        }

        advance(100).await;
        assert_eq!(committed.recv().await.as_deref(), Some("q19"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_pauses_commit_each_value() {
        let (debouncer, mut committed) = Debouncer::new(DEFAULT_QUIET_PERIOD);

        debouncer.push("alien");
        advance(600).await;
        debouncer.push("aliens");
        advance(600).await;

        assert_eq!(committed.recv().await.as_deref(), Some("alien"));
        assert_eq!(committed.recv().await.as_deref(), Some("aliens"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_discards_pending_value() {
        let (debouncer, mut committed) = Debouncer::new(DEFAULT_QUIET_PERIOD);

        debouncer.push("heat");
        advance(100).await;
        drop(debouncer);

        advance(1000).await;
        assert_eq!(committed.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_fails_after_shutdown() {
        let (debouncer, mut committed) = Debouncer::new(DEFAULT_QUIET_PERIOD);

        debouncer.push("heat");
        debouncer.shutdown();
        advance(1).await;

        assert!(!debouncer.push("heat 1995"));
        assert_eq!(committed.recv().await, None);
    }
}

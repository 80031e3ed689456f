use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::errors::{AppError, AppResult};

pub const DEFAULT_VERIFY_DEADLINE: Duration = Duration::from_secs(2);

/// Set when the caller stops waiting. Cancellation is a request, not a
/// guarantee: the wrapped extractor may not be interruptible, so workers
/// are expected to poll this between steps where they can.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Runs slow extraction-and-match work on a dedicated worker thread with a
/// hard wall-clock deadline. The result channel is single-use and owned by
/// the caller: once the deadline fires the receiver is dropped, so a late
/// worker result has nowhere to land and can never be reported against a
/// later call.
#[derive(Debug, Clone)]
pub struct BoundedExecutor {
    deadline: Duration,
}

impl BoundedExecutor {
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn run<T, F>(&self, label: &str, op: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&CancelToken) -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel::<T>(1);
        let token = CancelToken::default();
        let worker_token = token.clone();
        let worker_label = label.to_string();

        let spawned = thread::Builder::new()
            .name(format!("attendx-{label}"))
            .spawn(move || {
                let result = op(&worker_token);
                if tx.send(result).is_err() {
                    // Caller gave up; the result is discarded here.
                    warn!(
                        target: "executor",
                        label = %worker_label,
                        "worker finished after deadline; result discarded"
                    );
                }
            });

        if let Err(err) = spawned {
            return Err(AppError::Internal(format!(
                "failed to spawn {label} worker: {err}"
            )));
        }

        match rx.recv_timeout(self.deadline) {
            Ok(value) => Ok(value),
            Err(RecvTimeoutError::Timeout) => {
                token.cancel();
                warn!(
                    target: "executor",
                    label,
                    deadline_ms = self.deadline.as_millis() as u64,
                    "deadline elapsed; requested cancellation (best effort)"
                );
                Err(AppError::FaceTimeout {
                    deadline: self.deadline,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(AppError::Internal(format!("{label} worker died unexpectedly")))
            }
        }
    }
}

impl Default for BoundedExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_VERIFY_DEADLINE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn completes_before_deadline() {
        let executor = BoundedExecutor::new(Duration::from_millis(500));
        let value = executor.run("fast", |_| 7usize).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn timeout_is_reported_within_bounded_overshoot() {
        let executor = BoundedExecutor::new(Duration::from_millis(50));
        let started = Instant::now();
        let err = executor
            .run("slow", |_| {
                thread::sleep(Duration::from_millis(400));
                1usize
            })
            .unwrap_err();
        let elapsed = started.elapsed();
        assert!(matches!(err, AppError::FaceTimeout { .. }));
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(350), "caller blocked too long: {elapsed:?}");
    }

    #[test]
    fn cancellation_is_signalled_to_the_worker() {
        let executor = BoundedExecutor::new(Duration::from_millis(50));
        let (seen_tx, seen_rx) = mpsc::channel();
        let _ = executor.run("observing", move |token| {
            // Outlive the deadline, then report what the token says.
            thread::sleep(Duration::from_millis(200));
            let _ = seen_tx.send(token.is_cancelled());
        });
        let cancelled = seen_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("worker should report");
        assert!(cancelled);
    }

    #[test]
    fn late_result_does_not_leak_into_next_run() {
        let executor = BoundedExecutor::new(Duration::from_millis(40));
        let err = executor
            .run("abandoned", |_| {
                thread::sleep(Duration::from_millis(120));
                111usize
            })
            .unwrap_err();
        assert!(matches!(err, AppError::FaceTimeout { .. }));

        // A subsequent call owns a fresh channel; the abandoned worker's
        // value must never surface here.
        let value = executor.run("fresh", |_| 222usize).unwrap();
        assert_eq!(value, 222);

        thread::sleep(Duration::from_millis(150));
    }

    #[test]
    fn worker_panic_surfaces_as_internal_error() {
        let executor = BoundedExecutor::new(Duration::from_millis(500));
        let err = executor
            .run::<usize, _>("panicking", |_| panic!("boom"))
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}

//! Serialized cluster task context
//!
//! Cluster-management work runs one task at a time, off the async worker
//! threads, so a slow task never stalls the caller's runtime. Callers may
//! block on completion with a bounded wait. Tasks must not call back into the
//! joiner, or a barrier could wait on itself.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, warn};

use crate::error::{JoinError, JoinResult};

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Envelope {
    task: Task,
    /// Span of the submitter; the task's events are recorded inside it
    span: Span,
    done: Option<oneshot::Sender<JoinResult<()>>>,
}

/// Handle to the cluster task worker
#[derive(Clone)]
pub struct ClusterTaskQueue {
    sender: flume::Sender<Envelope>,
    shutdown_token: CancellationToken,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ClusterTaskQueue {
    /// Spawn the worker on the current Tokio runtime
    ///
    /// Each task runs on the blocking pool; the next one starts only after
    /// the previous one returned.
    pub fn spawn() -> Self {
        let (sender, receiver) = flume::unbounded::<Envelope>();
        let shutdown_token = CancellationToken::new();

        let token = shutdown_token.clone();
        let worker = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    envelope = receiver.recv_async() => {
                        let Ok(envelope) = envelope else { break };
                        let running = tokio::task::spawn_blocking(move || run_task(envelope));
                        if let Err(e) = running.await {
                            warn!("Cluster task did not complete: {}", e);
                        }
                    }
                }
            }
            debug!("Cluster task worker stopped");
        });

        Self {
            sender,
            shutdown_token,
            worker: Arc::new(Mutex::new(Some(worker))),
        }
    }

    /// Submit a task without waiting for it
    pub fn enqueue<F>(&self, task: F) -> JoinResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Box::new(task), None)
    }

    /// Submit a task and wait until it has run, at most `timeout`
    ///
    /// A task that panics yields `JoinError::Internal`.
    pub async fn enqueue_and_wait<F>(&self, task: F, timeout: Duration) -> JoinResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        self.submit(Box::new(task), Some(done_tx))?;

        match tokio::time::timeout(timeout, done_rx).await {
            Ok(Ok(result)) => result,
            // Worker dropped the envelope without running it
            Ok(Err(_)) => Err(JoinError::QueueClosed),
            Err(_) => Err(JoinError::Timeout(timeout)),
        }
    }

    /// Stop the worker; queued tasks are dropped
    ///
    /// A task already running is allowed to finish.
    pub async fn shutdown(&self) {
        self.shutdown_token.cancel();

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!("Cluster task worker failed: {}", e);
            }
        }
    }

    /// Whether [`shutdown`](ClusterTaskQueue::shutdown) has been called
    pub fn is_closed(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    fn submit(
        &self,
        task: Task,
        done: Option<oneshot::Sender<JoinResult<()>>>,
    ) -> JoinResult<()> {
        if self.is_closed() {
            return Err(JoinError::QueueClosed);
        }

        let envelope = Envelope {
            task,
            span: Span::current(),
            done,
        };

        self.sender
            .send(envelope)
            .map_err(|_| JoinError::QueueClosed)
    }
}

fn run_task(envelope: Envelope) {
    let Envelope { task, span, done } = envelope;
    let _entered = span.enter();

    let result = panic::catch_unwind(AssertUnwindSafe(task)).map_err(|panic| {
        let message = panic_message(panic.as_ref()).to_string();
        warn!("Cluster task panicked: {}", message);
        JoinError::Internal(format!("cluster task panicked: {message}"))
    });

    if let Some(done) = done {
        let _ = done.send(result);
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_enqueue_and_wait_runs_task() {
        let queue = ClusterTaskQueue::spawn();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = counter.clone();
        queue
            .enqueue_and_wait(
                move || {
                    c.fetch_add(1, Ordering::SeqCst);
                },
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_tasks_run_in_submission_order() {
        let queue = ClusterTaskQueue::spawn();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let order = order.clone();
            queue.enqueue(move || order.lock().push(i)).unwrap();
        }
        queue
            .enqueue_and_wait(|| {}, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_barrier_times_out_while_a_task_blocks() {
        let queue = ClusterTaskQueue::spawn();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        queue
            .enqueue(move || {
                let _ = release_rx.recv();
            })
            .unwrap();

        let started = std::time::Instant::now();
        let result = queue
            .enqueue_and_wait(|| {}, Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(JoinError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(1));

        release_tx.send(()).unwrap();
        queue
            .enqueue_and_wait(|| {}, Duration::from_secs(5))
            .await
            .unwrap();
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let queue = ClusterTaskQueue::spawn();
        queue.shutdown().await;

        assert!(queue.is_closed());
        assert!(matches!(queue.enqueue(|| {}), Err(JoinError::QueueClosed)));
        assert!(matches!(
            queue.enqueue_and_wait(|| {}, Duration::from_secs(1)).await,
            Err(JoinError::QueueClosed)
        ));
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_stop_worker() {
        let queue = ClusterTaskQueue::spawn();

        let result = queue
            .enqueue_and_wait(|| panic!("boom"), Duration::from_secs(5))
            .await;
        match result {
            Err(JoinError::Internal(message)) => assert!(message.contains("boom")),
            other => panic!("unexpected result: {other:?}"),
        }

        queue
            .enqueue_and_wait(|| {}, Duration::from_secs(5))
            .await
            .unwrap();
        queue.shutdown().await;
    }
}

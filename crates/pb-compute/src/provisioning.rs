//! Per-datacenter serialization of mutating remote calls.
//!
//! The backend rejects concurrent writes to one datacenter, so every mutation
//! runs as a [`ProvisioningJob`] on that datacenter's worker. Each worker
//! drains an unbounded FIFO queue one job at a time; workers for different
//! datacenters run in parallel.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Mutex;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{Error, Result};

type Task = Pin<Box<dyn Future<Output = ()> + Send>>;

/// One remote mutation, keyed by the datacenter it touches.
pub struct ProvisioningJob<T> {
    datacenter_id: String,
    work: Box<dyn FnOnce() -> BoxFuture<'static, Result<T>> + Send>,
}

impl<T: Send + 'static> ProvisioningJob<T> {
    pub fn new<F, Fut>(datacenter_id: impl Into<String>, work: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            datacenter_id: datacenter_id.into(),
            work: Box::new(move || work().boxed()),
        }
    }

    pub fn datacenter_id(&self) -> &str {
        &self.datacenter_id
    }
}

#[derive(Default)]
struct Registry {
    closed: bool,
    queues: HashMap<String, mpsc::UnboundedSender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

/// Registry of per-datacenter job queues, created lazily on first use.
#[derive(Default)]
pub struct ProvisioningManager {
    registry: Mutex<Registry>,
}

impl ProvisioningManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` on its datacenter's queue and wait for its result.
    ///
    /// Jobs for one datacenter run one at a time in submission order. The
    /// job's own error is returned unchanged.
    pub async fn provision<T: Send + 'static>(&self, job: ProvisioningJob<T>) -> Result<T> {
        let ProvisioningJob { datacenter_id, work } = job;
        let (tx, rx) = oneshot::channel();

        let dc = datacenter_id.clone();
        let task: Task = Box::pin(async move {
            match AssertUnwindSafe(work()).catch_unwind().await {
                Ok(result) => {
                    // Caller may have gone away; the work still ran.
                    let _ = tx.send(result);
                }
                Err(_) => error!(datacenter_id = %dc, "provisioning job panicked"),
            }
        });

        self.enqueue(&datacenter_id, task)?;

        rx.await.map_err(|_| Error::JobAborted { datacenter_id })?
    }

    fn enqueue(&self, datacenter_id: &str, task: Task) -> Result<()> {
        let mut guard = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        let Registry { closed, queues, workers } = &mut *guard;
        if *closed {
            return Err(Error::ManagerClosed);
        }

        let sender = queues.entry(datacenter_id.to_string()).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            workers.push(tokio::spawn(run_worker(datacenter_id.to_string(), rx)));
            tx
        });

        // Sent under the lock so queue order matches submission order.
        sender.send(task).map_err(|_| Error::ManagerClosed)
    }

    /// Number of datacenters that have a live queue.
    pub fn queue_count(&self) -> usize {
        self.registry.lock().unwrap_or_else(|e| e.into_inner()).queues.len()
    }

    pub fn is_closed(&self) -> bool {
        self.registry.lock().unwrap_or_else(|e| e.into_inner()).closed
    }

    /// Stop accepting jobs and wait for queued jobs to drain. Idempotent.
    pub async fn close(&self) {
        let workers = {
            let mut reg = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            if reg.closed {
                return;
            }
            reg.closed = true;
            // Dropping the senders lets each worker exit once its queue is empty.
            reg.queues.clear();
            std::mem::take(&mut reg.workers)
        };

        let count = workers.len();
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "provisioning worker ended abnormally");
            }
        }
        info!(workers = count, "provisioning manager closed");
    }
}

async fn run_worker(datacenter_id: String, mut rx: mpsc::UnboundedReceiver<Task>) {
    debug!(datacenter_id = %datacenter_id, "provisioning worker started");
    while let Some(task) = rx.recv().await {
        task.await;
    }
    debug!(datacenter_id = %datacenter_id, "provisioning worker stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::Barrier;

    use super::*;

    #[tokio::test]
    async fn test_returns_job_result() {
        let manager = ProvisioningManager::new();
        let out = manager
            .provision(ProvisioningJob::new("dc-1", || async { Ok(41 + 1) }))
            .await
            .unwrap();
        assert_eq!(out, 42);
        assert_eq!(manager.queue_count(), 1);
    }

    #[tokio::test]
    async fn test_propagates_job_error_unchanged() {
        let manager = ProvisioningManager::new();
        let err = manager
            .provision(ProvisioningJob::<()>::new("dc-1", || async {
                Err(Error::Backend("quota exceeded".into()))
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Backend(msg) if msg == "quota exceeded"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_datacenter_runs_in_submission_order() {
        let manager = Arc::new(ProvisioningManager::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let running = Arc::new(AtomicUsize::new(0));
        let mut pending = Vec::new();

        for i in 0..20usize {
            let log = log.clone();
            let running = running.clone();
            let job = ProvisioningJob::new("dc-1", move || async move {
                assert_eq!(running.fetch_add(1, Ordering::SeqCst), 0, "jobs overlapped");
                tokio::time::sleep(Duration::from_millis(2)).await;
                log.lock().unwrap().push(i);
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            });
            let mut caller = Box::pin(manager.provision(job));
            // The first poll enqueues; the callers then wait concurrently.
            if futures_util::poll!(&mut caller).is_pending() {
                pending.push(caller);
            }
        }
        for result in futures_util::future::join_all(pending).await {
            result.unwrap();
        }

        let log = log.lock().unwrap().clone();
        assert_eq!(log, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_distinct_datacenters_run_concurrently() {
        let manager = Arc::new(ProvisioningManager::new());
        let barrier = Arc::new(Barrier::new(2));

        let job = |dc: &'static str| {
            let barrier = barrier.clone();
            ProvisioningJob::new(dc, move || async move {
                // Both jobs must be in flight at once to get past the barrier.
                barrier.wait().await;
                Ok(dc)
            })
        };

        let (a, b) = tokio::time::timeout(
            Duration::from_secs(5),
            futures_util::future::join(manager.provision(job("dc-a")), manager.provision(job("dc-b"))),
        )
        .await
        .expect("jobs on different datacenters should not block each other");

        assert_eq!(a.unwrap(), "dc-a");
        assert_eq!(b.unwrap(), "dc-b");
        assert_eq!(manager.queue_count(), 2);
    }

    #[tokio::test]
    async fn test_close_drains_and_rejects_new_jobs() {
        let manager = Arc::new(ProvisioningManager::new());
        let done = Arc::new(AtomicUsize::new(0));

        let in_flight = {
            let manager = manager.clone();
            let done = done.clone();
            tokio::spawn(async move {
                manager
                    .provision(ProvisioningJob::new("dc-1", move || async move {
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        done.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;

        manager.close().await;
        assert_eq!(done.load(Ordering::SeqCst), 1, "close waits for queued work");
        in_flight.await.unwrap().unwrap();

        let err = manager
            .provision(ProvisioningJob::new("dc-1", || async { Ok(()) }))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ManagerClosed));
        assert!(manager.is_closed());

        // Second close is a no-op.
        manager.close().await;
    }

    #[tokio::test]
    async fn test_panicking_job_aborts_only_itself() {
        let manager = ProvisioningManager::new();
        let explode = true;

        let err = manager
            .provision(ProvisioningJob::<()>::new("dc-1", move || async move {
                if explode {
                    panic!("boom");
                }
                Ok(())
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::JobAborted { ref datacenter_id } if datacenter_id == "dc-1"));

        let ok = manager
            .provision(ProvisioningJob::new("dc-1", || async { Ok("still serving") }))
            .await
            .unwrap();
        assert_eq!(ok, "still serving");
    }
}

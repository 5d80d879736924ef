//! Single-worker FIFO executor owning the `CrudEngine`.
//!
//! # Invariants
//! - Jobs run one at a time, in the order `submit` enqueued them.
//! - A dequeued job always runs to completion; there is no cancellation.
//! - A panic inside a job or its delivery callback is contained; the worker
//!   moves on to the next job.
//! - Every submitted job delivers exactly once, including after shutdown.

use super::{CrudEngine, CrudError, CrudResult};
use crate::logging::sanitize_message;
use log::{error, info};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SendError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

const DEFAULT_THREAD_NAME: &str = "concurrentdb-executor";
const MAX_PANIC_MESSAGE_CHARS: usize = 160;
const SHUT_DOWN_MESSAGE: &str = "executor is shut down";

/// `None` means the job is being abandoned and must deliver a failure.
type Job = Box<dyn FnOnce(Option<&CrudEngine>) + Send + 'static>;

/// Worker thread settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub thread_name: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

/// Serial work queue in front of the store.
pub struct Executor {
    sender: Mutex<Option<Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    pending: Arc<AtomicUsize>,
}

impl Executor {
    /// Moves `engine` onto a new worker thread.
    pub fn spawn(engine: CrudEngine, config: ExecutorConfig) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let thread_name = config.thread_name.clone();
        let worker = thread::Builder::new()
            .name(config.thread_name)
            .spawn(move || worker_loop(engine, receiver))?;

        info!("event=executor_start module=engine status=ok thread={thread_name}");
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker_id: worker.thread().id(),
            worker: Mutex::new(Some(worker)),
            pending: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Enqueues `op` and returns immediately.
    ///
    /// `deliver` is called exactly once with the outcome, on the worker
    /// thread; after shutdown it is called on the caller's thread with
    /// `CrudError::Unexpected`.
    pub fn submit<R, Op, Deliver>(&self, op: Op, deliver: Deliver)
    where
        R: Send + 'static,
        Op: FnOnce(&CrudEngine) -> CrudResult<R> + Send + 'static,
        Deliver: FnOnce(CrudResult<R>) + Send + 'static,
    {
        let pending = Arc::clone(&self.pending);
        let job: Job = Box::new(move |engine: Option<&CrudEngine>| {
            let outcome = match engine {
                Some(engine) => {
                    pending.fetch_sub(1, Ordering::AcqRel);
                    run_contained(op, engine)
                }
                None => Err(CrudError::Unexpected(SHUT_DOWN_MESSAGE.to_string())),
            };
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || deliver(outcome))) {
                error!(
                    "event=executor_deliver module=engine status=error error_code=delivery_panicked payload={}",
                    panic_message(payload.as_ref())
                );
            }
        });

        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(sender) = sender else {
            job(None);
            return;
        };

        self.pending.fetch_add(1, Ordering::AcqRel);
        if let Err(SendError(job)) = sender.send(job) {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            job(None);
        }
    }

    /// Jobs submitted but not yet started.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Stops intake, lets queued jobs finish, and joins the worker.
    ///
    /// Called from the worker itself (for example by a delivery callback
    /// dropping the last service handle) it stops intake without joining.
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if thread::current().id() == self.worker_id {
            return;
        }
        if let Some(worker) = worker {
            if worker.join().is_err() {
                error!("event=executor_stop module=engine status=error error_code=worker_panicked");
            }
        }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(engine: CrudEngine, receiver: Receiver<Job>) {
    let mut processed: u64 = 0;
    while let Ok(job) = receiver.recv() {
        job(Some(&engine));
        processed += 1;
    }
    info!("event=executor_stop module=engine status=ok processed={processed}");
}

fn run_contained<R, Op>(op: Op, engine: &CrudEngine) -> CrudResult<R>
where
    Op: FnOnce(&CrudEngine) -> CrudResult<R>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| op(engine))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(
                "event=executor_job module=engine status=error error_code=job_panicked payload={message}"
            );
            Err(CrudError::Unexpected(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    };

    sanitize_message(&message, MAX_PANIC_MESSAGE_CHARS)
}

#[cfg(test)]
mod tests {
    use super::{panic_message, Executor, ExecutorConfig};
    use crate::db::StoreConfig;
    use crate::engine::{CrudEngine, CrudError};
    use std::sync::mpsc;
    use std::time::Duration;

    fn executor() -> Executor {
        let engine = CrudEngine::open(StoreConfig::ephemeral()).expect("engine should open");
        Executor::spawn(engine, ExecutorConfig::default()).expect("worker should spawn")
    }

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&"line\nbreak".to_string()), "line break");
        assert_eq!(panic_message(&42_u8), "non-string panic payload");
    }

    #[test]
    fn jobs_run_in_submission_order() {
        let executor = executor();
        let (tx, rx) = mpsc::channel();

        for index in 0..50 {
            let tx = tx.clone();
            executor.submit(move |_| Ok(index), move |outcome| {
                tx.send(outcome.expect("job should succeed")).unwrap();
            });
        }
        drop(tx);

        let order: Vec<i32> = rx.iter().collect();
        assert_eq!(order, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn panicking_job_becomes_unexpected_and_queue_continues() {
        let executor = executor();
        let (tx, rx) = mpsc::channel();

        let first = tx.clone();
        executor.submit(
            |_| -> Result<(), CrudError> { panic!("job exploded") },
            move |outcome| first.send(outcome.map(|_| 0)).unwrap(),
        );
        executor.submit(move |_| Ok(7), move |outcome| tx.send(outcome).unwrap());

        let failed = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(
            matches!(failed, Err(CrudError::Unexpected(message)) if message.contains("job exploded"))
        );
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap(), 7);
    }

    #[test]
    fn panicking_delivery_does_not_stop_worker() {
        let executor = executor();
        let (tx, rx) = mpsc::channel();

        executor.submit(|_| Ok(()), |_| panic!("callback exploded"));
        executor.submit(|_| Ok(1), move |outcome| tx.send(outcome).unwrap());

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap(), 1);
    }

    #[test]
    fn submit_after_shutdown_delivers_unexpected_synchronously() {
        let executor = executor();
        executor.shutdown();
        assert!(!executor.is_running());

        let (tx, rx) = mpsc::channel();
        executor.submit(|_| Ok(()), move |outcome| tx.send(outcome).unwrap());

        let outcome = rx.try_recv().expect("delivery should be synchronous");
        assert!(
            matches!(outcome, Err(CrudError::Unexpected(message)) if message.contains("shut down"))
        );
    }

    #[test]
    fn shutdown_drains_queued_jobs() {
        let executor = executor();
        let (tx, rx) = mpsc::channel();

        for index in 0..10 {
            let tx = tx.clone();
            executor.submit(
                move |_| {
                    std::thread::sleep(Duration::from_millis(2));
                    Ok(index)
                },
                move |outcome| tx.send(outcome.unwrap()).unwrap(),
            );
        }
        drop(tx);
        executor.shutdown();

        assert_eq!(rx.iter().count(), 10);
        assert_eq!(executor.pending(), 0);
    }
}

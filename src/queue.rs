//! Single-worker FIFO queue of scrape tasks
//!
//! The coordinator owns the queue and its worker. Tasks run one at a time,
//! in submission order, each to completion before the next starts. The task
//! being processed stays at the head of the queue until it finishes, so a
//! duplicate of a running task is rejected just like a duplicate of a
//! waiting one.
//!
//! # Lifecycle
//!
//! - [`QueueCoordinator::start`] spawns the worker on the current runtime.
//! - [`QueueCoordinator::submit`] enqueues and returns a [`TaskHandle`].
//! - [`QueueCoordinator::close`] stops accepting work; queued tasks still run.
//! - [`QueueCoordinator::join`] closes and waits for the worker to drain.
//!
//! There is no cancellation. Dropping the coordinator closes it, but the
//! worker keeps going until everything already accepted has been processed.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{Notify, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::notifier::Notifier;
use crate::task::{Task, TaskReport};
use crate::utils::errors::ScrapeError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Task {0} is already in the download queue")]
    Duplicate(Task),

    #[error("Queue is closed; task {0} was not accepted")]
    Closed(Task),

    #[error("Queue worker stopped before the task finished")]
    WorkerGone,
}

/// Work performed for each dequeued task
#[async_trait]
pub trait TaskProcessor: Send + Sync + 'static {
    async fn process(&self, task: &Task) -> Result<TaskReport, ScrapeError>;
}

type Completion = oneshot::Sender<Result<TaskReport, ScrapeError>>;

struct Pending {
    task: Task,
    done: Option<Completion>,
}

#[derive(Default)]
struct State {
    pending: VecDeque<Pending>,
    closed: bool,
}

struct Shared {
    state: Mutex<State>,
    wake: Notify,
    len: watch::Sender<usize>,
    notifier: Notifier,
}

impl Shared {
    fn publish_len(&self, len: usize) {
        self.len.send_replace(len);
    }
}

/// Awaitable completion signal for one accepted task
pub struct TaskHandle {
    task: Task,
    position: usize,
    done: oneshot::Receiver<Result<TaskReport, ScrapeError>>,
}

impl TaskHandle {
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Zero-based queue position at submission time (0 = next to run)
    pub fn position(&self) -> usize {
        self.position
    }

    /// Resolve once the worker has finished this task, successfully or not
    pub async fn finished(self) -> Result<TaskReport, ScrapeError> {
        match self.done.await {
            Ok(outcome) => outcome,
            Err(_) => Err(QueueError::WorkerGone.into()),
        }
    }
}

pub struct QueueCoordinator {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl QueueCoordinator {
    /// Spawn the worker. Must be called from within a tokio runtime.
    pub fn start(processor: Arc<dyn TaskProcessor>, notifier: Notifier) -> Self {
        let (len, _) = watch::channel(0);
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            wake: Notify::new(),
            len,
            notifier,
        });

        let worker = tokio::spawn(run_worker(shared.clone(), processor));
        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// Enqueue a task unless an equal one is already queued or running
    pub fn submit(&self, task: Task) -> Result<TaskHandle, QueueError> {
        let (tx, rx) = oneshot::channel();
        let position = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Err(QueueError::Closed(task));
            }
            let key = task.key();
            if state.pending.iter().any(|p| p.task.key() == key) {
                drop(state);
                self.shared
                    .notifier
                    .log(format!("{task} is already in the download queue"));
                return Err(QueueError::Duplicate(task));
            }
            state.pending.push_back(Pending {
                task: task.clone(),
                done: Some(tx),
            });
            let len = state.pending.len();
            self.shared.publish_len(len);
            len - 1
        };

        debug!("Queued {} at position {}", task, position);
        self.shared.wake.notify_one();

        Ok(TaskHandle {
            task,
            position,
            done: rx,
        })
    }

    /// Tasks queued or running
    pub fn len(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve when no task is queued or running
    pub async fn wait_idle(&self) {
        let mut rx = self.shared.len.subscribe();
        // The sender lives in `shared`, which we hold, so this cannot fail.
        let _ = rx.wait_for(|len| *len == 0).await;
    }

    /// Stop accepting new tasks. Already accepted tasks still run.
    pub fn close(&self) {
        self.shared.state.lock().closed = true;
        self.shared.wake.notify_one();
    }

    /// Close the queue and wait until the worker has drained it
    pub async fn join(mut self) {
        self.close();
        if let Some(worker) = self.worker.take()
            && let Err(e) = worker.await
        {
            error!("Queue worker terminated abnormally: {}", e);
        }
    }
}

impl Drop for QueueCoordinator {
    fn drop(&mut self) {
        // Closing lets the detached worker exit once the backlog is done.
        self.close();
    }
}

async fn run_worker(shared: Arc<Shared>, processor: Arc<dyn TaskProcessor>) {
    loop {
        let next = {
            let state = shared.state.lock();
            match state.pending.front() {
                Some(head) => Some(head.task.clone()),
                None if state.closed => break,
                None => None,
            }
        };

        let Some(task) = next else {
            shared.wake.notified().await;
            continue;
        };

        info!("Processing {}", task);
        let outcome = run_isolated(processor.clone(), task.clone()).await;
        if let Err(e) = &outcome {
            shared.notifier.log(format!("Download error for {task}: {e}"));
        }

        let done = {
            let mut state = shared.state.lock();
            let finished = state.pending.pop_front();
            let len = state.pending.len();
            shared.publish_len(len);
            finished.and_then(|mut p| p.done.take())
        };
        if let Some(done) = done {
            // The submitter may have dropped its handle; nothing to report to.
            let _ = done.send(outcome);
        }
    }
    debug!("Queue worker exiting");
}

/// Run one task on its own tokio task so a panic is contained to it
async fn run_isolated(
    processor: Arc<dyn TaskProcessor>,
    task: Task,
) -> Result<TaskReport, ScrapeError> {
    let handle = tokio::spawn(async move { processor.process(&task).await });
    match handle.await {
        Ok(outcome) => outcome,
        Err(e) => Err(ScrapeError::Panicked(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use chrono::Utc;

    /// Records start/finish events and holds each task until released
    struct Recorder {
        events: Mutex<Vec<String>>,
        running: AtomicUsize,
        max_running: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl Recorder {
        fn new(gate: Option<Arc<Notify>>) -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
                running: AtomicUsize::new(0),
                max_running: AtomicUsize::new(0),
                gate,
            })
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    #[async_trait]
    impl TaskProcessor for Recorder {
        async fn process(&self, task: &Task) -> Result<TaskReport, ScrapeError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            self.events.lock().push(format!("start {}", task.id()));

            if let Some(gate) = &self.gate {
                gate.notified().await;
            } else {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }

            self.events.lock().push(format!("end {}", task.id()));
            self.running.fetch_sub(1, Ordering::SeqCst);

            match task.id() {
                "fail" => Err(ScrapeError::Panicked("simulated failure".into())),
                "panic" => panic!("processor blew up"),
                _ => Ok(TaskReport::new(task.clone(), "out".into(), Utc::now())),
            }
        }
    }

    #[tokio::test]
    async fn processes_in_submission_order_one_at_a_time() {
        let recorder = Recorder::new(None);
        let queue = QueueCoordinator::start(recorder.clone(), Notifier::new());

        let handles: Vec<_> = ["1", "2", "3"]
            .into_iter()
            .map(|id| queue.submit(Task::danawa(id, None)).unwrap())
            .collect();
        for handle in handles {
            handle.finished().await.unwrap();
        }

        assert_eq!(
            recorder.events(),
            vec!["start 1", "end 1", "start 2", "end 2", "start 3", "end 3"]
        );
        assert_eq!(recorder.max_running.load(Ordering::SeqCst), 1);
        queue.join().await;
    }

    #[tokio::test]
    async fn rejects_duplicates_while_queued_or_running() {
        let gate = Arc::new(Notify::new());
        let recorder = Recorder::new(Some(gate.clone()));
        let notifier = Notifier::new();
        let mut log = notifier.subscribe();
        let queue = QueueCoordinator::start(recorder.clone(), notifier);

        let running = queue.submit(Task::danawa("100", None)).unwrap();
        let waiting = queue.submit(Task::danawa("200", None)).unwrap();
        assert_eq!(running.position(), 0);
        assert_eq!(waiting.position(), 1);

        // Wait until the first task is actually in flight.
        while recorder.events().is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let dup_running = queue.submit(Task::danawa(
            "100",
            Some("https://prod.danawa.com/info/?pcode=100".into()),
        ));
        assert!(matches!(dup_running, Err(QueueError::Duplicate(_))));
        let dup_waiting = queue.submit(Task::danawa("200", None));
        assert!(matches!(dup_waiting, Err(QueueError::Duplicate(_))));
        assert!(log.recv().await.unwrap().contains("already in the download queue"));

        // Same identifier on a different site is a different task.
        let other_site = queue.submit(Task::danawa_image("100")).unwrap();

        assert_eq!(queue.len(), 3);
        gate.notify_one();
        running.finished().await.unwrap();
        gate.notify_one();
        waiting.finished().await.unwrap();
        gate.notify_one();
        other_site.finished().await.unwrap();

        // Once finished, the same product may be queued again.
        let again = queue.submit(Task::danawa("100", None)).unwrap();
        gate.notify_one();
        again.finished().await.unwrap();
        queue.join().await;
    }

    #[tokio::test]
    async fn failures_and_panics_do_not_stop_the_queue() {
        let recorder = Recorder::new(None);
        let notifier = Notifier::new();
        let mut log = notifier.subscribe();
        let queue = QueueCoordinator::start(recorder.clone(), notifier);

        let failing = queue.submit(Task::danawa("fail", None)).unwrap();
        let panicking = queue.submit(Task::danawa("panic", None)).unwrap();
        let fine = queue.submit(Task::danawa("ok", None)).unwrap();

        assert!(matches!(failing.finished().await, Err(ScrapeError::Panicked(_))));
        assert!(matches!(panicking.finished().await, Err(ScrapeError::Panicked(_))));
        assert!(fine.finished().await.is_ok());

        assert!(log.recv().await.unwrap().starts_with("Download error for danawa:fail"));
        queue.join().await;
    }

    #[tokio::test]
    async fn close_drains_backlog_and_refuses_new_work() {
        let recorder = Recorder::new(None);
        let queue = QueueCoordinator::start(recorder.clone(), Notifier::new());

        for id in ["1", "2"] {
            queue.submit(Task::danawa(id, None)).unwrap();
        }
        queue.close();
        assert!(matches!(
            queue.submit(Task::danawa("3", None)),
            Err(QueueError::Closed(_))
        ));

        queue.join().await;
        assert_eq!(recorder.events().len(), 4);
    }

    #[tokio::test]
    async fn wait_idle_resolves_after_backlog() {
        let recorder = Recorder::new(None);
        let queue = QueueCoordinator::start(recorder.clone(), Notifier::new());
        queue.wait_idle().await;

        for id in ["a", "b", "c"] {
            queue.submit(Task::danawa(id, None)).unwrap();
        }
        queue.wait_idle().await;

        assert!(queue.is_empty());
        assert_eq!(recorder.events().len(), 6);
    }
}

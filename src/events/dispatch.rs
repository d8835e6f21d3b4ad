//! Delivery of notifications to subscribers.
//!
//! [`Dispatcher::Direct`] calls every handler on the thread that drained the
//! slot. [`Dispatcher::Context`] hands the call to a [`SynchronizingContext`]
//! whenever the context reports that the current thread is not its own;
//! posting is fire-and-forget.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::subscribers::Handler;

/// Unit of work posted to a [`SynchronizingContext`].
pub type DispatchJob = Box<dyn FnOnce() + Send>;

/// A thread or loop that notifications must be marshaled onto.
pub trait SynchronizingContext: Send + Sync + fmt::Debug {
    /// Returns `true` if the calling thread is not the context's own.
    fn invoke_required(&self) -> bool;

    /// Queues `job` to run on the context. Must not block.
    fn post(&self, job: DispatchJob);
}

/// How drained notifications reach their handlers.
#[derive(Debug, Clone, Default)]
pub enum Dispatcher {
    /// Invoke handlers on the draining thread.
    #[default]
    Direct,
    /// Post onto a synchronizing context when required.
    Context(Arc<dyn SynchronizingContext>),
}

impl Dispatcher {
    /// Delivers `notification` to `handlers`, in order.
    pub fn dispatch<N>(&self, handlers: Vec<Handler<N>>, notification: N)
    where
        N: Send + 'static,
    {
        match self {
            Self::Context(context) if context.invoke_required() => {
                context.post(Box::new(move || invoke_all(&handlers, &notification)));
            }
            Self::Direct | Self::Context(_) => invoke_all(&handlers, &notification),
        }
    }
}

fn invoke_all<N>(handlers: &[Handler<N>], notification: &N) {
    for handler in handlers {
        handler(notification);
    }
}

/// A [`SynchronizingContext`] backed by an unbounded channel, drained by a
/// [`TaskQueueWorker`].
#[derive(Debug)]
pub struct TaskQueue {
    sender: mpsc::UnboundedSender<DispatchJob>,
    owner: Arc<Mutex<Option<ThreadId>>>,
}

impl TaskQueue {
    /// Creates the queue and the worker that runs its jobs.
    #[must_use]
    pub fn new() -> (Arc<Self>, TaskQueueWorker) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let owner = Arc::new(Mutex::new(None));
        let queue = Arc::new(Self {
            sender,
            owner: Arc::clone(&owner),
        });
        (queue, TaskQueueWorker { receiver, owner })
    }
}

impl SynchronizingContext for TaskQueue {
    fn invoke_required(&self) -> bool {
        *self.owner.lock() != Some(thread::current().id())
    }

    fn post(&self, job: DispatchJob) {
        if self.sender.send(job).is_err() {
            tracing::warn!("task queue worker has stopped, notification dropped");
        }
    }
}

/// Runs the jobs posted to a [`TaskQueue`].
#[derive(Debug)]
pub struct TaskQueueWorker {
    receiver: mpsc::UnboundedReceiver<DispatchJob>,
    owner: Arc<Mutex<Option<ThreadId>>>,
}

impl TaskQueueWorker {
    fn execute(&self, job: DispatchJob) {
        *self.owner.lock() = Some(thread::current().id());
        job();
        *self.owner.lock() = None;
    }

    /// Runs jobs as they arrive until every [`TaskQueue`] handle is gone.
    pub async fn run(mut self) {
        while let Some(job) = self.receiver.recv().await {
            self.execute(job);
        }
        tracing::debug!("task queue closed");
    }

    /// Runs every job already queued and returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.receiver.try_recv() {
            self.execute(job);
            ran += 1;
        }
        ran
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::events::subscribers::handler;

    fn counting() -> (Arc<AtomicUsize>, Handler<usize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let h = handler(move |n: &usize| {
            counter.fetch_add(*n, Ordering::SeqCst);
        });
        (hits, h)
    }

    #[test]
    fn direct_dispatch_is_synchronous() {
        let (hits, h) = counting();
        Dispatcher::Direct.dispatch(vec![Arc::clone(&h), h], 2);
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn context_dispatch_is_posted() {
        let (queue, mut worker) = TaskQueue::new();
        let dispatcher = Dispatcher::Context(queue);
        let (hits, h) = counting();

        dispatcher.dispatch(vec![h], 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(worker.run_pending(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispatch_on_the_context_thread_runs_inline() {
        let (queue, mut worker) = TaskQueue::new();
        let dispatcher = Dispatcher::Context(Arc::clone(&queue) as Arc<dyn SynchronizingContext>);
        let (hits, h) = counting();

        let inner = dispatcher.clone();
        queue.post(Box::new(move || inner.dispatch(vec![h], 3)));
        assert_eq!(worker.run_pending(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(worker.run_pending(), 0);
    }

    #[tokio::test]
    async fn worker_stops_when_queue_is_dropped() {
        let (queue, worker) = TaskQueue::new();
        let (hits, h) = counting();
        Dispatcher::Context(queue).dispatch(vec![h], 1);
        worker.run().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}

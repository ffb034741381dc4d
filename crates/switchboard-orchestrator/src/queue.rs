//! Bounded FIFO task queue.
//!
//! Producers never block: a full queue is reported immediately. Consumers
//! share one receiver and wait on it without polling.

use crate::error::{OrchestrationError, Result};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use switchboard_abstraction::Task;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

/// Bounded multi-consumer task queue.
pub struct TaskQueue {
    sender: Mutex<Option<mpsc::Sender<Task>>>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<Task>>,
    capacity: usize,
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("capacity", &self.capacity)
            .field("depth", &self.depth())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl TaskQueue {
    /// Creates a queue holding at most `capacity` tasks.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver: tokio::sync::Mutex::new(receiver),
            capacity,
        }
    }

    /// Enqueues a task without waiting.
    ///
    /// Fails with `QueueFull` when saturated and `ShuttingDown` once closed.
    pub fn enqueue(&self, task: Task) -> Result<()> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = sender.as_ref() else {
            return Err(OrchestrationError::ShuttingDown);
        };

        match sender.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(task)) => {
                debug!(task_id = %task.id, capacity = self.capacity, "Task queue full");
                Err(OrchestrationError::QueueFull(self.capacity))
            }
            Err(TrySendError::Closed(_)) => Err(OrchestrationError::ShuttingDown),
        }
    }

    /// Waits for the next task. Returns `None` once closed and drained.
    pub async fn dequeue(&self) -> Option<Task> {
        self.receiver.lock().await.recv().await
    }

    /// Stops accepting new tasks.
    pub fn close(&self) {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Whether the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }

    /// Number of queued tasks.
    pub fn depth(&self) -> usize {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, |s| s.max_capacity() - s.capacity())
    }

    /// Maximum number of queued tasks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::time::{Duration, Instant};
    use switchboard_abstraction::TaskCategory;

    fn task(id: &str) -> Task {
        Task::new(TaskCategory::DataCleaning, Value::Null).with_id(id)
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = TaskQueue::new(4);
        queue.enqueue(task("1")).unwrap();
        queue.enqueue(task("2")).unwrap();
        assert_eq!(queue.depth(), 2);

        assert_eq!(queue.dequeue().await.unwrap().id, "1");
        assert_eq!(queue.dequeue().await.unwrap().id, "2");
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test]
    async fn test_full_queue_fails_fast() {
        let queue = TaskQueue::new(2);
        queue.enqueue(task("1")).unwrap();
        queue.enqueue(task("2")).unwrap();

        let started = Instant::now();
        let err = queue.enqueue(task("3")).unwrap_err();
        assert!(started.elapsed() < Duration::from_millis(10));
        assert!(matches!(err, OrchestrationError::QueueFull(2)));
    }

    #[tokio::test]
    async fn test_closed_queue_rejects_and_drains() {
        let queue = TaskQueue::new(2);
        queue.enqueue(task("1")).unwrap();
        queue.close();

        assert!(queue.is_closed());
        assert!(matches!(queue.enqueue(task("2")), Err(OrchestrationError::ShuttingDown)));
        assert_eq!(queue.dequeue().await.unwrap().id, "1");
        assert!(queue.dequeue().await.is_none());
    }
}

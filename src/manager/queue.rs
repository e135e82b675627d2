// src/manager/queue.rs

//! Per-resource bounded queues.

use tokio::sync::mpsc;

use crate::task::TaskRef;

/// Bounded FIFO of tasks for one sync key.
///
/// The receiver is parked here until a worker claims it; every queue gets
/// exactly one worker over its lifetime.
#[derive(Debug)]
pub(crate) struct ResourceQueue {
    tx: mpsc::Sender<TaskRef>,
    rx: Option<mpsc::Receiver<TaskRef>>,
}

impl ResourceQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self { tx, rx: Some(rx) }
    }

    /// Sender side for enqueueing outside the queue-map lock.
    pub fn handle(&self) -> QueueHandle {
        QueueHandle {
            tx: self.tx.clone(),
        }
    }

    /// Hand the receiver to a worker. `None` once claimed.
    pub fn claim_receiver(&mut self) -> Option<mpsc::Receiver<TaskRef>> {
        self.rx.take()
    }

    /// Tasks sitting in the buffer. Senders still waiting for room are not
    /// counted.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Close a queue no worker ever claimed and hand back what it held.
    ///
    /// Senders blocked on a full queue get their task back as an error.
    pub fn drain_unclaimed(&mut self) -> Vec<TaskRef> {
        let Some(mut rx) = self.rx.take() else {
            return Vec::new();
        };
        rx.close();
        let mut dropped = Vec::new();
        while let Ok(task) = rx.try_recv() {
            dropped.push(task);
        }
        dropped
    }
}

#[derive(Debug, Clone)]
pub(crate) struct QueueHandle {
    tx: mpsc::Sender<TaskRef>,
}

impl QueueHandle {
    /// Enqueue, waiting while the queue is full.
    ///
    /// Returns the task back if the queue has been closed.
    pub async fn enqueue(&self, task: TaskRef) -> Result<(), TaskRef> {
        self.tx
            .send(task)
            .await
            .map_err(|mpsc::error::SendError(task)| task)
    }
}

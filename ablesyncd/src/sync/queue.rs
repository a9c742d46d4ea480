use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::error::SyncError;
use crate::model::ProjectTask;

/// Bounded FIFO of tasks waiting for the executor. Safe to share between
/// the analyzer and the drain loop.
#[derive(Debug)]
pub struct TaskQueue {
    capacity: usize,
    inner: Mutex<VecDeque<ProjectTask>>,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Result<Self, SyncError> {
        if capacity == 0 {
            return Err(SyncError::Configuration(
                "task queue capacity must be at least 1".into(),
            ));
        }
        Ok(Self {
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
        })
    }

    pub fn enqueue(&self, task: ProjectTask) -> Result<(), SyncError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.len() >= self.capacity {
            return Err(SyncError::QueueFull {
                capacity: self.capacity,
            });
        }
        inner.push_back(task);
        Ok(())
    }

    pub fn dequeue(&self) -> Option<ProjectTask> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    pub fn count(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

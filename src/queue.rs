//! The single-producer-multi-consumer FIFO shared by both tiers
//! (spec.md §5): HTTP handlers enqueue, the tier's own loop dequeues.

use std::collections::VecDeque;

use tokio::sync::Mutex;

use crate::task::TaskEvent;

#[derive(Default)]
pub struct EventQueue {
    inner: Mutex<VecDeque<TaskEvent>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn push(&self, event: TaskEvent) {
        self.inner.lock().await.push_back(event);
    }

    pub async fn pop(&self) -> Option<TaskEvent> {
        self.inner.lock().await.pop_front()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{State, Task};

    #[tokio::test]
    async fn fifo_order_is_preserved() {
        let queue = EventQueue::new();
        let tasks: Vec<_> = (0..3).map(|_| Task::new("t", "nginx")).collect();
        for t in &tasks {
            queue.push(TaskEvent::new(State::Scheduled, t.clone())).await;
        }
        for t in &tasks {
            assert_eq!(queue.pop().await.unwrap().task.id, t.id);
        }
    }
}

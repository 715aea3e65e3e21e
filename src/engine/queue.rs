//! FIFO of pending work with drain tracking.
//!
//! `join()` waits until every task put into the queue has been acknowledged
//! with `task_done()`, logging the outstanding count on every heartbeat.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Item handed to a worker.
#[derive(Debug)]
pub enum Job<T> {
    Task(T),
    /// Asks the worker that pops it to exit.
    Shutdown,
}

#[derive(Debug)]
struct State<T> {
    items: VecDeque<Job<T>>,
    unfinished: usize,
}

/// Thread-safe request queue.
#[derive(Debug)]
pub struct RequestQueue<T> {
    state: Mutex<State<T>>,
    available: Notify,
    drained: Notify,
}

impl<T> RequestQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                unfinished: 0,
            }),
            available: Notify::new(),
            drained: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // Nothing panics while holding the lock; recover the data regardless.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a job. Tasks count as outstanding until `task_done()`,
    /// shutdown sentinels do not.
    pub fn put(&self, job: Job<T>) {
        {
            let mut state = self.lock();
            if matches!(job, Job::Task(_)) {
                state.unfinished += 1;
            }
            state.items.push_back(job);
        }
        self.available.notify_one();
    }

    /// Enqueue a task.
    pub fn push(&self, task: T) {
        self.put(Job::Task(task));
    }

    /// Wait for the next job.
    pub async fn get(&self) -> Job<T> {
        loop {
            {
                let mut state = self.lock();
                if let Some(job) = state.items.pop_front() {
                    // Only one wakeup permit is stored, pass it on while work remains.
                    if !state.items.is_empty() {
                        self.available.notify_one();
                    }
                    return job;
                }
            }
            self.available.notified().await;
        }
    }

    /// Acknowledge one finished task.
    pub fn task_done(&self) {
        let mut state = self.lock();
        if state.unfinished == 0 {
            warn!("task_done() called more times than tasks were queued");
            return;
        }
        state.unfinished -= 1;
        if state.unfinished == 0 {
            self.drained.notify_waiters();
        }
    }

    /// Wait until every queued task is done.
    ///
    /// Never gives up: when `heartbeat` elapses the outstanding count is
    /// logged and the wait goes on.
    pub async fn join(&self, heartbeat: Duration) {
        loop {
            let drained = self.drained.notified();
            tokio::pin!(drained);
            drained.as_mut().enable();

            if self.unfinished() == 0 {
                return;
            }

            if tokio::time::timeout(heartbeat, drained).await.is_err() {
                info!("Queue: {} left", self.unfinished());
            }
        }
    }

    /// Drop every job not yet taken by a worker.
    ///
    /// Dropped tasks are never executed and produce no result; they stop
    /// counting as outstanding so `join()` only waits for work in flight.
    /// Returns the number of tasks dropped.
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let dropped = state
            .items
            .drain(..)
            .filter(|job| matches!(job, Job::Task(_)))
            .count();
        state.unfinished = state.unfinished.saturating_sub(dropped);
        if state.unfinished == 0 {
            self.drained.notify_waiters();
        }
        dropped
    }

    /// Tasks queued or in flight.
    pub fn unfinished(&self) -> usize {
        self.lock().unfinished
    }

    /// Jobs waiting to be taken.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for RequestQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = RequestQueue::new();
        queue.push(1);
        queue.push(2);
        queue.push(3);

        let mut out = Vec::new();
        for _ in 0..3 {
            if let Job::Task(n) = queue.get().await {
                out.push(n);
            }
        }
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_sentinel_not_counted() {
        let queue: RequestQueue<u32> = RequestQueue::new();
        queue.put(Job::Shutdown);
        assert_eq!(queue.unfinished(), 0);
        assert_eq!(queue.len(), 1);
        assert!(matches!(queue.get().await, Job::Shutdown));
    }

    #[tokio::test]
    async fn test_join_waits_for_every_task_done() {
        let queue = Arc::new(RequestQueue::new());
        for i in 0..20 {
            queue.push(i);
        }

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move {
                let mut done = 0;
                while done < 20 {
                    if let Job::Task(_) = queue.get().await {
                        tokio::task::yield_now().await;
                        queue.task_done();
                        done += 1;
                    }
                }
                done
            })
        };

        queue.join(Duration::from_millis(10)).await;
        assert_eq!(queue.unfinished(), 0);
        assert_eq!(consumer.await.unwrap(), 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_join_outlives_heartbeats() {
        let queue = Arc::new(RequestQueue::new());
        queue.push(1);
        let done_at = Arc::new(Mutex::new(None));

        let consumer = {
            let queue = queue.clone();
            let done_at = done_at.clone();
            tokio::spawn(async move {
                if let Job::Task(_) = queue.get().await {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    *done_at.lock().unwrap() = Some(std::time::Instant::now());
                    queue.task_done();
                }
            })
        };

        let start = std::time::Instant::now();
        // Several 10ms heartbeats elapse before the task is done.
        queue.join(Duration::from_millis(10)).await;
        let returned_at = std::time::Instant::now();

        let done_at = done_at.lock().unwrap().expect("join returned before task_done");
        assert!(returned_at >= done_at);
        assert!(returned_at - start >= Duration::from_millis(50));
        assert!(returned_at - done_at < Duration::from_millis(500));
        assert_eq!(queue.unfinished(), 0);
        consumer.await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_releases_join() {
        let queue = RequestQueue::new();
        for i in 0..5 {
            queue.push(i);
        }
        assert_eq!(queue.clear(), 5);
        assert!(queue.is_empty());

        tokio::time::timeout(Duration::from_secs(1), queue.join(Duration::from_millis(10)))
            .await
            .expect("join should return right away after clear");
    }

    #[tokio::test]
    async fn test_clear_keeps_in_flight_outstanding() {
        let queue = RequestQueue::new();
        queue.push(1);
        queue.push(2);
        let _taken = queue.get().await;

        assert_eq!(queue.clear(), 1);
        assert_eq!(queue.unfinished(), 1);
        queue.task_done();
        assert_eq!(queue.unfinished(), 0);
    }

    #[tokio::test]
    async fn test_extra_task_done_is_ignored() {
        let queue: RequestQueue<u32> = RequestQueue::new();
        queue.task_done();
        assert_eq!(queue.unfinished(), 0);
    }
}

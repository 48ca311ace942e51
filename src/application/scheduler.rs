// Keyed delayed-task scheduler for debounced side effects
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Runs a task after a delay, keyed so that re-scheduling under the same key
/// cancels the previously scheduled task. Replaces ad-hoc debounce timer
/// handles for autosave and tab-switch fetches.
#[derive(Debug, Default)]
pub struct TaskScheduler {
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to run after `delay`, cancelling any task previously
    /// scheduled under `key`.
    pub fn schedule<F>(&self, key: &str, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        if let Some(previous) = self.tasks.lock().unwrap().insert(key.to_string(), handle) {
            previous.abort();
        }
    }

    /// Cancel the task scheduled under `key`, if any.
    pub fn cancel(&self, key: &str) {
        if let Some(handle) = self.tasks.lock().unwrap().remove(key) {
            handle.abort();
        }
    }

    /// Cancel everything. Called on session teardown.
    pub fn cancel_all(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_the_pending_task() {
        let scheduler = TaskScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let first = Arc::clone(&fired);
        scheduler.schedule("autosave", Duration::from_millis(100), async move {
            first.fetch_add(1, Ordering::SeqCst);
        });
        let second = Arc::clone(&fired);
        scheduler.schedule("autosave", Duration::from_millis(100), async move {
            second.fetch_add(10, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_the_task_from_running() {
        let scheduler = TaskScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let flag = Arc::clone(&fired);
        scheduler.schedule("tab-load", Duration::from_millis(100), async move {
            flag.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.cancel("tab-load");

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn different_keys_run_independently() {
        let scheduler = TaskScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        for key in ["a", "b"] {
            let flag = Arc::clone(&fired);
            scheduler.schedule(key, Duration::from_millis(50), async move {
                flag.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}

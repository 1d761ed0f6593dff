use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared between a [`TaskHandle`] and its runner so cancellation both
/// marks the task dead and wakes a sleeping runner promptly.
#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

impl CancelState {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        let _guard = lock_ignore_poison(&self.lock);
        self.wake.notify_all();
    }
}

/// Owner's grip on a scheduled task. Cancelling (or dropping) guarantees
/// the callback will not run again; it never blocks on the task runner.
#[derive(Debug)]
pub struct TaskHandle {
    state: Arc<CancelState>,
}

impl TaskHandle {
    fn new(state: Arc<CancelState>) -> Self {
        Self { state }
    }

    pub fn cancel(&self) {
        self.state.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Cooperative timer facility: one-shot and repeating tasks, each owned
/// through a cancellable handle.
pub trait Scheduler: Send + Sync {
    /// Run `callback` every `period` until the handle is cancelled.
    fn interval(&self, period: Duration, callback: Box<dyn FnMut() + Send>) -> TaskHandle;

    /// Run `callback` once after `delay` unless the handle is cancelled
    /// first.
    fn timeout(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>) -> TaskHandle;
}

/// Wall-clock scheduler backed by one thread per task. Threads exit on
/// cancellation without being joined, so cancelling from inside an engine
/// lock cannot deadlock against a callback waiting for that same lock.
#[derive(Copy, Clone, Debug, Default)]
pub struct ThreadScheduler;

impl ThreadScheduler {
    /// Sleep until `deadline` or cancellation, whichever comes first.
    /// Returns false when the task was cancelled.
    fn sleep_until(state: &CancelState, deadline: Instant) -> bool {
        let mut guard = lock_ignore_poison(&state.lock);
        loop {
            if state.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            let (next, _timeout) = state
                .wake
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            guard = next;
        }
    }
}

impl Scheduler for ThreadScheduler {
    fn interval(&self, period: Duration, mut callback: Box<dyn FnMut() + Send>) -> TaskHandle {
        let state = Arc::new(CancelState::default());
        let runner = Arc::clone(&state);
        thread::spawn(move || {
            let mut deadline = Instant::now() + period;
            while Self::sleep_until(&runner, deadline) {
                callback();
                deadline += period;
            }
        });
        TaskHandle::new(state)
    }

    fn timeout(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>) -> TaskHandle {
        let state = Arc::new(CancelState::default());
        let runner = Arc::clone(&state);
        thread::spawn(move || {
            if Self::sleep_until(&runner, Instant::now() + delay) {
                callback();
            }
        });
        TaskHandle::new(state)
    }
}

enum ManualCallback {
    Once(Option<Box<dyn FnOnce() + Send>>),
    Repeating(Box<dyn FnMut() + Send>),
}

struct ManualTask {
    id: u64,
    due: Duration,
    period: Option<Duration>,
    state: Arc<CancelState>,
    callback: ManualCallback,
}

#[derive(Default)]
struct ManualQueue {
    now: Duration,
    next_id: u64,
    tasks: Vec<ManualTask>,
}

impl ManualQueue {
    fn push(&mut self, delay: Duration, period: Option<Duration>, callback: ManualCallback) -> TaskHandle {
        let state = Arc::new(CancelState::default());
        self.tasks.push(ManualTask {
            id: self.next_id,
            due: self.now + delay,
            period,
            state: Arc::clone(&state),
            callback,
        });
        self.next_id += 1;
        TaskHandle::new(state)
    }

    /// Earliest pending task due at or before `until`, ties broken by
    /// scheduling order. Cancelled tasks are dropped on the way.
    fn pop_due(&mut self, until: Duration) -> Option<ManualTask> {
        self.tasks.retain(|task| !task.state.is_cancelled());
        let index = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.due <= until)
            .min_by_key(|(_, task)| (task.due, task.id))
            .map(|(index, _)| index)?;
        Some(self.tasks.swap_remove(index))
    }
}

/// Virtually-clocked [`Scheduler`] for tests: nothing fires until
/// [`advance`](ManualScheduler::advance) moves time forward, which then
/// runs every due task in deadline order on the calling thread.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Arc<Mutex<ManualQueue>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        let mut queue = lock_ignore_poison(&self.queue);
        queue.tasks.retain(|task| !task.state.is_cancelled());
        queue.tasks.len()
    }

    pub fn advance(&self, step: Duration) {
        let target = lock_ignore_poison(&self.queue).now + step;

        loop {
            // take the task out of the lock before running it, callbacks
            // are allowed to schedule and cancel
            let Some(mut task) = ({
                let mut queue = lock_ignore_poison(&self.queue);
                let due = queue.pop_due(target);
                if let Some(task) = &due {
                    queue.now = task.due.max(queue.now);
                }
                due
            }) else {
                break;
            };

            match &mut task.callback {
                ManualCallback::Once(callback) => {
                    if let Some(callback) = callback.take() {
                        callback();
                    }
                }
                ManualCallback::Repeating(callback) => {
                    callback();
                    if !task.state.is_cancelled() {
                        if let Some(period) = task.period {
                            task.due += period;
                            lock_ignore_poison(&self.queue).tasks.push(task);
                        }
                    }
                }
            }
        }

        lock_ignore_poison(&self.queue).now = target;
    }
}

impl Scheduler for ManualScheduler {
    fn interval(&self, period: Duration, callback: Box<dyn FnMut() + Send>) -> TaskHandle {
        lock_ignore_poison(&self.queue).push(
            period,
            Some(period),
            ManualCallback::Repeating(callback),
        )
    }

    fn timeout(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>) -> TaskHandle {
        lock_ignore_poison(&self.queue).push(delay, None, ManualCallback::Once(Some(callback)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn manual_timeout_fires_once_at_its_deadline() {
        let scheduler = ManualScheduler::new();
        let (sender, receiver) = mpsc::channel();

        let _handle = scheduler.timeout(10 * MS, Box::new(move || sender.send(()).unwrap()));

        scheduler.advance(9 * MS);
        assert!(receiver.try_recv().is_err());

        scheduler.advance(MS);
        assert!(receiver.try_recv().is_ok());
        assert_eq!(scheduler.pending(), 0);

        scheduler.advance(100 * MS);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn manual_interval_repeats_until_cancelled() {
        let scheduler = ManualScheduler::new();
        let (sender, receiver) = mpsc::channel();

        let handle = scheduler.interval(10 * MS, Box::new(move || sender.send(()).unwrap()));

        scheduler.advance(35 * MS);
        assert_eq!(receiver.try_iter().count(), 3);

        handle.cancel();
        scheduler.advance(50 * MS);
        assert_eq!(receiver.try_iter().count(), 0);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn dropping_the_handle_cancels_the_task() {
        let scheduler = ManualScheduler::new();
        let (sender, receiver) = mpsc::channel();

        drop(scheduler.timeout(5 * MS, Box::new(move || sender.send(()).unwrap())));

        scheduler.advance(20 * MS);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn due_tasks_run_in_deadline_order() {
        let scheduler = ManualScheduler::new();
        let (sender, receiver) = mpsc::channel();

        let late = sender.clone();
        let _a = scheduler.timeout(20 * MS, Box::new(move || late.send("late").unwrap()));
        let _b = scheduler.timeout(5 * MS, Box::new(move || sender.send("early").unwrap()));

        scheduler.advance(30 * MS);
        assert_eq!(receiver.try_iter().collect::<Vec<_>>(), vec!["early", "late"]);
    }

    #[test]
    fn callbacks_may_schedule_followup_tasks() {
        let scheduler = ManualScheduler::new();
        let (sender, receiver) = mpsc::channel();

        let chain = scheduler.clone();
        let _handle = scheduler.timeout(
            5 * MS,
            Box::new(move || {
                let sender = sender.clone();
                // leak the handle, the follow-up must outlive this callback
                std::mem::forget(
                    chain.timeout(5 * MS, Box::new(move || sender.send(()).unwrap())),
                );
            }),
        );

        scheduler.advance(20 * MS);
        assert!(receiver.try_recv().is_ok());
    }

    #[test]
    fn thread_timeout_fires_and_cancel_suppresses() {
        let scheduler = ThreadScheduler;

        let (sender, receiver) = mpsc::channel();
        let _fires = scheduler.timeout(5 * MS, Box::new(move || sender.send(()).unwrap()));
        assert!(receiver.recv_timeout(Duration::from_secs(2)).is_ok());

        let (sender, receiver) = mpsc::channel();
        let cancelled = scheduler.timeout(50 * MS, Box::new(move || sender.send(()).unwrap()));
        cancelled.cancel();
        assert!(receiver.recv_timeout(100 * MS).is_err());
    }

    #[test]
    fn thread_interval_keeps_ticking() {
        let scheduler = ThreadScheduler;
        let (sender, receiver) = mpsc::channel();

        let _handle = scheduler.interval(5 * MS, Box::new(move || sender.send(()).unwrap()));

        assert!(receiver.recv_timeout(Duration::from_secs(2)).is_ok());
        assert!(receiver.recv_timeout(Duration::from_secs(2)).is_ok());
    }
}

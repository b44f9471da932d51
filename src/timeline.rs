//! Single-threaded timer queue behind every countdown, spawn pulse and wave
//! end. Time is an absolute millisecond count supplied by the caller.

use std::collections::{BTreeMap, HashMap};

/// Cancellation handle for a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

/// Ordering of tasks due at the same instant; lower runs first.
pub type Priority = u8;

type QueueKey = (u64, Priority, u64);

#[derive(Debug)]
struct Task<T> {
    key: QueueKey,
    period: Option<u64>,
    payload: T,
}

#[derive(Debug)]
pub struct Timeline<T> {
    now: u64,
    next_id: u64,
    queue: BTreeMap<QueueKey, TaskHandle>,
    tasks: HashMap<TaskHandle, Task<T>>,
}

impl<T> Default for Timeline<T> {
    fn default() -> Self {
        Self {
            now: 0,
            next_id: 0,
            queue: BTreeMap::new(),
            tasks: HashMap::new(),
        }
    }
}

impl<T: Clone> Timeline<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    /// Moves time forward. Time never moves backwards.
    pub fn advance_to(&mut self, now: u64) {
        self.now = self.now.max(now);
    }

    pub fn schedule_once(&mut self, delay: u64, priority: Priority, payload: T) -> TaskHandle {
        self.insert(self.now + delay, priority, None, payload)
    }

    /// Fires first after `delay`, then every `period` until cancelled.
    pub fn schedule_repeating(
        &mut self,
        delay: u64,
        period: u64,
        priority: Priority,
        payload: T,
    ) -> TaskHandle {
        self.insert(self.now + delay, priority, Some(period.max(1)), payload)
    }

    /// Returns `false` when the task already fired (one-shot) or was cancelled.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        match self.tasks.remove(&handle) {
            Some(task) => {
                self.queue.remove(&task.key);
                true
            }
            None => false,
        }
    }

    /// Drops every live task. Returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.tasks.len();
        self.tasks.clear();
        self.queue.clear();
        cancelled
    }

    pub fn is_live(&self, handle: TaskHandle) -> bool {
        self.tasks.contains_key(&handle)
    }

    pub fn live_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.queue.keys().next().map(|(due, _, _)| *due)
    }

    /// Takes the earliest task due at or before `until`, moving time to its
    /// due instant.
    ///
    /// A repeating task is re-armed before it is returned, so cancelling it
    /// while handling this firing removes every later firing.
    pub fn pop_due(&mut self, until: u64) -> Option<(TaskHandle, T)> {
        let (&key, &handle) = self.queue.iter().next()?;
        if key.0 > until {
            return None;
        }
        self.queue.remove(&key);
        self.now = self.now.max(key.0);
        let task = self.tasks.get_mut(&handle)?;
        let payload = task.payload.clone();
        if let Some(period) = task.period {
            let next = (key.0 + period, key.1, key.2);
            task.key = next;
            self.queue.insert(next, handle);
        } else {
            self.tasks.remove(&handle);
        }
        Some((handle, payload))
    }

    fn insert(&mut self, due: u64, priority: Priority, period: Option<u64>, payload: T) -> TaskHandle {
        self.next_id += 1;
        let handle = TaskHandle(self.next_id);
        let key = (due, priority, self.next_id);
        self.queue.insert(key, handle);
        self.tasks.insert(
            handle,
            Task {
                key,
                period,
                payload,
            },
        );
        handle
    }
}

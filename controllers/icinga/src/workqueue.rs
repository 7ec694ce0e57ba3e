//! # Rate-limited work queue
//!
//! One queue per watched kind. Queues hold `<namespace>/<name>` keys and
//! guarantee:
//!
//! - a key queued twice before being picked up is delivered once;
//! - a key re-added while a worker processes it is parked and re-delivered
//!   exactly once after the worker calls [`WorkQueue::done`], so a given key
//!   is never processed concurrently;
//! - `add_rate_limited` re-delivers a failing key after an exponential,
//!   jittered delay, and `forget` resets that key's attempt count;
//! - after `shut_down`, pending keys drain and `get` then resolves to `None`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::backoff::RetryPolicy;

#[derive(Default)]
struct Inner {
    queue: VecDeque<String>,
    queued: HashSet<String>,
    processing: HashSet<String>,
    dirty: HashSet<String>,
    attempts: HashMap<String, u32>,
}

pub struct WorkQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    shutdown: AtomicBool,
    policy: RetryPolicy,
}

impl WorkQueue {
    pub fn new(policy: RetryPolicy) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            shutdown: AtomicBool::new(false),
            policy,
        })
    }

    /// Enqueue a key. Duplicate keys collapse; a key currently being
    /// processed is parked until `done`.
    pub fn add(&self, key: impl Into<String>) {
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }
        let key = key.into();
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.processing.contains(&key) {
                inner.dirty.insert(key);
                return;
            }
            if !inner.queued.insert(key.clone()) {
                return;
            }
            inner.queue.push_back(key);
        }
        self.notify.notify_one();
    }

    /// Wait for the next key. Returns `None` once the queue is shut down
    /// and drained.
    pub async fn get(&self) -> Option<String> {
        loop {
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock().unwrap();
                if let Some(key) = inner.queue.pop_front() {
                    inner.queued.remove(&key);
                    inner.processing.insert(key.clone());
                    return Some(key);
                }
                if self.shutdown.load(Ordering::SeqCst) {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Mark a key as processed. A key that was re-added in the meantime is
    /// put back on the queue.
    pub fn done(&self, key: &str) {
        let requeued = {
            let mut inner = self.inner.lock().unwrap();
            inner.processing.remove(key);
            if inner.dirty.remove(key) && inner.queued.insert(key.to_string()) {
                inner.queue.push_back(key.to_string());
                true
            } else {
                false
            }
        };
        if requeued {
            self.notify.notify_one();
        }
    }

    /// Re-deliver a failing key after the policy's delay for its attempt
    /// count.
    pub fn add_rate_limited(self: Arc<Self>, key: String) {
        let delay = {
            let mut inner = self.inner.lock().unwrap();
            let attempts = inner.attempts.entry(key.clone()).or_insert(0);
            *attempts += 1;
            self.policy.delay_for_attempt(*attempts)
        };
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            self.add(key);
        });
    }

    /// Reset the retry state for a key after a successful run.
    pub fn forget(&self, key: &str) {
        self.inner.lock().unwrap().attempts.remove(key);
    }

    /// Current attempt count for a key.
    #[allow(dead_code)] // exercised by tests
    pub fn retries(&self, key: &str) -> u32 {
        self.inner
            .lock()
            .unwrap()
            .attempts
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Stop accepting keys and wake waiting workers. Keys already queued
    /// are still delivered.
    pub fn shut_down(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

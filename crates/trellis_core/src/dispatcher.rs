//! UI-thread work queue
//!
//! The element tree is single-threaded. Other threads hand work to it through
//! a [`DispatcherHandle`]; the UI thread runs queued work with
//! [`Dispatcher::drain`], typically once per frame before ticking animations.
//!
//! [`RepeatTimer`] is the one place a thread is spawned: it sleeps for an
//! initial delay, then posts a tick every interval until stopped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::tree::ElementTree;

/// Work posted to the UI thread
pub type DispatchFn = Box<dyn FnOnce(&mut ElementTree) + Send>;

type Queue = Arc<Mutex<VecDeque<DispatchFn>>>;

/// Owned by the UI thread
#[derive(Default)]
pub struct Dispatcher {
    queue: Queue,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cloneable, `Send` handle for posting work
    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle {
            queue: Arc::clone(&self.queue),
        }
    }

    /// Run everything queued so far; returns how many items ran
    ///
    /// Work posted while draining runs on the next drain.
    pub fn drain(&self, tree: &mut ElementTree) -> usize {
        let batch: Vec<DispatchFn> = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let count = batch.len();
        for work in batch {
            work(tree);
        }
        if count > 0 {
            tracing::trace!("dispatcher ran {} item(s)", count);
        }
        count
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Posts work to a [`Dispatcher`] from any thread
#[derive(Clone)]
pub struct DispatcherHandle {
    queue: Queue,
}

impl DispatcherHandle {
    pub fn post<F>(&self, work: F)
    where
        F: FnOnce(&mut ElementTree) + Send + 'static,
    {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).push_back(Box::new(work));
    }
}

// =============================================================================
// REPEAT TIMER
// =============================================================================

/// Posts `tick` to a dispatcher after `initial_delay`, then every `interval`
///
/// Stops on [`stop`](RepeatTimer::stop) or drop.
pub struct RepeatTimer {
    stop_flag: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl RepeatTimer {
    pub fn start<F>(dispatcher: DispatcherHandle, initial_delay: Duration, interval: Duration, tick: F) -> Self
    where
        F: Fn(&mut ElementTree) + Send + Sync + 'static,
    {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop_flag);
        let tick = Arc::new(tick);
        let interval = interval.max(Duration::from_millis(1));

        let thread_handle = thread::spawn(move || {
            let mut deadline = Instant::now() + initial_delay;
            loop {
                // park_timeout may wake early; re-check the deadline
                while Instant::now() < deadline {
                    if thread_stop.load(Ordering::Acquire) {
                        return;
                    }
                    thread::park_timeout(deadline.saturating_duration_since(Instant::now()));
                }
                if thread_stop.load(Ordering::Acquire) {
                    return;
                }
                let tick = Arc::clone(&tick);
                dispatcher.post(move |tree| tick(tree));
                deadline += interval;
            }
        });

        Self {
            stop_flag,
            thread_handle: Some(thread_handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }

    /// Stop the timer thread and wait for it to exit
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

impl Drop for RepeatTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

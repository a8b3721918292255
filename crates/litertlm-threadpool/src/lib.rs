//! A bounded worker pool with opportunistic thread growth (`spec.md`
//! §5), ported from `original_source`'s `runtime/framework/
//! threadpool.{h,cc}`. `absl::Mutex`'s `Await`/`AwaitWithDeadline`
//! become `Condvar::wait_while`/`wait_timeout_while`; everything else —
//! the FIFO task queue, the growth condition, the idle/done wait
//! semantics, the join-all-on-drop shutdown — follows the C++ directly.

#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use litertlm_error::{Error, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct State {
    threads: Vec<JoinHandle<()>>,
    stopped: bool,
    tasks: VecDeque<Job>,
    num_active_tasks: usize,
}

struct Shared {
    name_prefix: String,
    max_num_threads: usize,
    state: Mutex<State>,
    condvar: Condvar,
}

/// A thread pool that creates and can use up to `max_num_threads`
/// threads, spawning them only as tasks arrive rather than up front.
pub struct ThreadPool {
    shared: Arc<Shared>,
}

impl ThreadPool {
    /// `max_num_threads == 0` is treated as `1`, matching the C++
    /// constructor's `max_num_threads == 0 ? 1 : max_num_threads`.
    pub fn new(name_prefix: impl Into<String>, max_num_threads: usize) -> Self {
        let name_prefix = name_prefix.into();
        let max_num_threads = max_num_threads.max(1);
        tracing::info!(pool = %name_prefix, max_num_threads, "thread pool starting");
        ThreadPool {
            shared: Arc::new(Shared {
                name_prefix,
                max_num_threads,
                state: Mutex::new(State { threads: Vec::new(), stopped: false, tasks: VecDeque::new(), num_active_tasks: 0 }),
                condvar: Condvar::new(),
            }),
        }
    }

    pub fn max_num_threads(&self) -> usize {
        self.shared.max_num_threads
    }

    pub fn num_threads(&self) -> usize {
        self.shared.state.lock().unwrap().threads.len()
    }

    /// Marks the pool as stopped: subsequent `schedule` calls fail, and
    /// workers exit once the queue drains. Does not join worker threads
    /// itself; `Drop` always does that regardless of whether `stop` was
    /// called first.
    pub fn stop(&self) {
        self.shared.state.lock().unwrap().stopped = true;
        self.shared.condvar.notify_all();
    }

    /// Adds `job` to the queue of pending callbacks. Does not guarantee
    /// execution order.
    pub fn schedule(&self, job: impl FnOnce() + Send + 'static) -> Result<()> {
        let mut state = self.shared.state.lock().unwrap();
        if state.stopped {
            tracing::warn!(pool = %self.shared.name_prefix, "schedule called on a stopped pool");
            return Err(Error::failed_precondition(format!("thread pool '{}' is stopped", self.shared.name_prefix)));
        }

        let num_threads = state.threads.len();
        if num_threads < self.shared.max_num_threads {
            let num_tasks = state.num_active_tasks + state.tasks.len();
            if num_threads <= num_tasks {
                let shared = Arc::clone(&self.shared);
                let handle = std::thread::Builder::new()
                    .name(format!("{}-{num_threads}", self.shared.name_prefix))
                    .spawn(move || run_worker(&shared))
                    .expect("spawning a worker thread");
                tracing::info!(pool = %self.shared.name_prefix, num_threads, "spawned a worker thread; all existing workers are (supposed to be) busy");
                state.threads.push(handle);
            }
        }

        state.tasks.push_back(Box::new(job));
        self.shared.condvar.notify_all();
        Ok(())
    }

    /// Waits until the task queue is empty, or returns
    /// `Error::DeadlineExceeded` if `timeout` elapses first. Does not
    /// guarantee that every dequeued task has finished executing.
    pub fn wait_until_idle(&self, timeout: Duration) -> Result<()> {
        self.wait_until(timeout, |state| state.tasks.is_empty(), "task queue to become idle")
    }

    /// Waits until the task queue is empty and no task is executing, or
    /// returns `Error::DeadlineExceeded` if `timeout` elapses first.
    pub fn wait_until_done(&self, timeout: Duration) -> Result<()> {
        self.wait_until(timeout, |state| state.tasks.is_empty() && state.num_active_tasks == 0, "all tasks to finish")
    }

    fn wait_until(&self, timeout: Duration, mut done: impl FnMut(&State) -> bool, what: &str) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock().unwrap();
        while !done(&state) {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::deadline_exceeded(format!(
                    "timeout waiting for {what} in pool '{}'; tasks still queued: {}, active: {}",
                    self.shared.name_prefix,
                    state.tasks.len(),
                    state.num_active_tasks
                )));
            }
            let (next_state, timeout_result) = self.shared.condvar.wait_timeout(state, deadline - now).unwrap();
            state = next_state;
            if timeout_result.timed_out() && !done(&state) {
                return Err(Error::deadline_exceeded(format!(
                    "timeout waiting for {what} in pool '{}'; tasks still queued: {}, active: {}",
                    self.shared.name_prefix,
                    state.tasks.len(),
                    state.num_active_tasks
                )));
            }
        }
        Ok(())
    }
}

fn run_worker(shared: &Arc<Shared>) {
    loop {
        let mut state = shared.state.lock().unwrap();
        state = shared.condvar.wait_while(state, |s| s.tasks.is_empty() && !s.stopped).unwrap();

        let Some(task) = state.tasks.pop_front() else {
            debug_assert!(state.stopped);
            tracing::info!(pool = %shared.name_prefix, "worker thread stopping");
            return;
        };
        state.num_active_tasks += 1;
        drop(state);

        task();

        let mut state = shared.state.lock().unwrap();
        state.num_active_tasks -= 1;
        drop(state);
        shared.condvar.notify_all();
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        tracing::info!(pool = %self.shared.name_prefix, "thread pool shutting down");
        let threads = {
            let mut state = self.shared.state.lock().unwrap();
            state.stopped = true;
            std::mem::take(&mut state.threads)
        };
        self.shared.condvar.notify_all();
        for thread in threads {
            let _ = thread.join();
        }
    }
}

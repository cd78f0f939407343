// Copyright @yucwang 2026

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;

type WorkUnit = Box<dyn FnOnce() + Send + 'static>;

struct PoolState {
    work_queue: VecDeque<WorkUnit>,
    num_active_tasks: u32,
    stopping: bool,
}

struct PoolShared {
    state: Mutex<PoolState>,
    available_work: Condvar,
    all_done: Condvar,
}

/// A fixed-size pool of worker threads consuming a FIFO queue of work units.
/// `wait` blocks until the queue is empty and every assigned unit has run.
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    threads: Vec<JoinHandle<()>>,
}

fn lock(state: &Mutex<PoolState>) -> MutexGuard<'_, PoolState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn worker_loop(shared: &PoolShared) {
    loop {
        let work_unit = {
            let mut state = lock(&shared.state);
            loop {
                if let Some(work_unit) = state.work_queue.pop_front() {
                    break work_unit;
                }
                if state.stopping {
                    return;
                }
                state = shared
                    .available_work
                    .wait(state)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }
        };

        work_unit();

        let mut state = lock(&shared.state);
        state.num_active_tasks -= 1;
        if state.num_active_tasks == 0 && state.work_queue.is_empty() {
            shared.all_done.notify_all();
        }
    }
}

impl ThreadPool {
    pub fn new(num_threads: usize) -> Self {
        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                work_queue: VecDeque::new(),
                num_active_tasks: 0,
                stopping: false,
            }),
            available_work: Condvar::new(),
            all_done: Condvar::new(),
        });

        let mut threads = Vec::with_capacity(num_threads);
        for _ in 0..num_threads {
            let shared = Arc::clone(&shared);
            threads.push(std::thread::spawn(move || worker_loop(&shared)));
        }

        Self { shared, threads }
    }

    pub fn assign_work<F: FnOnce() + Send + 'static>(&self, work: F) {
        {
            let mut state = lock(&self.shared.state);
            state.work_queue.push_back(Box::new(work));
            state.num_active_tasks += 1;
        }
        self.shared.available_work.notify_one();
    }

    pub fn wait(&self) {
        let mut state = lock(&self.shared.state);
        while state.num_active_tasks != 0 || !state.work_queue.is_empty() {
            state = self
                .shared
                .all_done
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    pub fn num_threads(&self) -> usize {
        self.threads.len()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        {
            let mut state = lock(&self.shared.state);
            state.stopping = true;
        }
        self.shared.available_work.notify_all();
        for thread in self.threads.drain(..) {
            let _ = thread.join();
        }
    }
}

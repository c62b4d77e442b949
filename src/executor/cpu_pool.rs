use super::job::Job;
use super::latch::CountLatch;
use super::worker::{Shared, Worker, WorkerId};
use crate::config::Config;
use crate::error::{Error, Result};
use crossbeam_deque::Injector;
use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub(crate) struct CpuPool {
    workers: Vec<WorkerHandle>,
    shared: Arc<Shared>,
    num_threads: usize,
}

struct WorkerHandle {
    id: WorkerId,
    thread: Option<JoinHandle<()>>,
    unparker: thread::Thread,
}

impl CpuPool {
    pub fn new(config: &Config) -> Result<Self> {
        let num_threads = config.worker_threads();
        if num_threads == 0 {
            return Err(Error::config("need at least 1 thread"));
        }

        let (workers, stealers) = Worker::spawn_set(num_threads);
        let shared = Arc::new(Shared {
            injector: Injector::new(),
            stealers,
            shutdown: AtomicBool::new(false),
        });

        let mut pool = CpuPool {
            workers: Vec::with_capacity(num_threads),
            shared,
            num_threads,
        };

        for worker in workers {
            let id = worker.id;
            let shared = Arc::clone(&pool.shared);

            let mut builder =
                thread::Builder::new().name(format!("{}-{}", config.thread_name_prefix, id));
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            // dropping `pool` on error stops the workers that did start
            let thread = builder.spawn(move || worker.run(&shared))?;

            pool.workers.push(WorkerHandle {
                id,
                unparker: thread.thread().clone(),
                thread: Some(thread),
            });
        }

        Ok(pool)
    }

    pub fn submit(&self, job: Job) {
        self.shared.injector.push(job);

        if let Some(worker) = self.workers.get(self.num_threads / 2) {
            worker.unparker.unpark();
        }
    }

    /// Split `0..len` into chunks, run `f` on each chunk across the workers
    /// and block until all chunks finished.
    pub fn run_range<F>(&self, len: usize, chunks_per_thread: usize, f: F) -> Result<()>
    where
        F: Fn(Range<usize>) + Send + Sync + 'static,
    {
        if len == 0 {
            return Ok(());
        }

        let target = (self.num_threads * chunks_per_thread.max(1)).clamp(1, len);
        let chunk_len = len.div_ceil(target);
        let chunk_count = len.div_ceil(chunk_len);

        let f = Arc::new(f);
        let latch = Arc::new(CountLatch::new(chunk_count));

        for chunk in 0..chunk_count {
            let start = chunk * chunk_len;
            let end = (start + chunk_len).min(len);
            let f = Arc::clone(&f);
            let latch = Arc::clone(&latch);

            self.submit(Job::new(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(start..end)));
                latch.count_down(outcome.err().map(panic_message));
            }));
        }

        for worker in &self.workers {
            worker.unparker.unpark();
        }

        match latch.wait() {
            Some(message) => Err(Error::KernelPanicked(message)),
            None => Ok(()),
        }
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn shutdown(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);

        // wake everyone up to check shutdown flag
        for worker in &self.workers {
            worker.unparker.unpark();
        }

        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    tracing::warn!(worker = worker.id, "host worker exited by panic");
                }
            }
        }
    }
}

impl Drop for CpuPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for CpuPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuPool")
            .field("num_threads", &self.num_threads)
            .field("queued", &self.shared.injector.len())
            .finish()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// host worker threads
use super::job::Job;
use crossbeam_deque::{Injector, Steal, Stealer, Worker as LocalQueue};
use rand::Rng;
use std::iter;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

pub type WorkerId = usize;

/// State every worker of one pool reads.
#[derive(Debug)]
pub(crate) struct Shared {
    pub injector: Injector<Job>,
    pub stealers: Vec<Stealer<Job>>,
    pub shutdown: AtomicBool,
}

impl Shared {
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

pub(crate) struct Worker {
    pub id: WorkerId,
    local: LocalQueue<Job>,
    executed: u64,
    stolen: u64,
}

impl Worker {
    /// Create `count` workers and the stealers that go into [`Shared`].
    pub fn spawn_set(count: usize) -> (Vec<Worker>, Vec<Stealer<Job>>) {
        (0..count)
            .map(|id| {
                let local = LocalQueue::new_fifo();
                let stealer = local.stealer();
                let worker = Worker {
                    id,
                    local,
                    executed: 0,
                    stolen: 0,
                };
                (worker, stealer)
            })
            .unzip()
    }

    pub fn run(mut self, shared: &Shared) {
        let mut idle = Idle::default();

        while !shared.is_shutting_down() {
            match self.next_job(shared) {
                Some(job) => {
                    idle.reset();
                    self.execute(job);
                }
                None => idle.wait(),
            }
        }

        tracing::debug!(
            worker = self.id,
            executed = self.executed,
            stolen = self.stolen,
            "host worker stopped"
        );
    }

    // own queue first, then a batch from the injector, then a peer
    fn next_job(&mut self, shared: &Shared) -> Option<Job> {
        if let Some(job) = self.local.pop() {
            return Some(job);
        }

        let job = iter::repeat_with(|| shared.injector.steal_batch_and_pop(&self.local))
            .find(|s| !s.is_retry())
            .and_then(Steal::success);
        if job.is_some() {
            return job;
        }

        let job = self.steal_from_peer(&shared.stealers);
        if job.is_some() {
            self.stolen += 1;
        }
        job
    }

    fn steal_from_peer(&self, stealers: &[Stealer<Job>]) -> Option<Job> {
        let peers = stealers.len();
        if peers < 2 {
            return None;
        }

        // start at a random peer so idle workers spread out
        let start = rand::thread_rng().gen_range(0..peers);
        (0..peers)
            .map(|offset| (start + offset) % peers)
            .filter(|&idx| idx != self.id)
            .find_map(|idx| {
                iter::repeat_with(|| stealers[idx].steal_batch_and_pop(&self.local))
                    .find(|s| !s.is_retry())
                    .and_then(Steal::success)
            })
    }

    fn execute(&mut self, job: Job) {
        let id = job.id;

        // chunk jobs catch their own panics; this keeps the thread alive for anything else
        if panic::catch_unwind(AssertUnwindSafe(|| job.execute())).is_err() {
            tracing::error!(job = ?id, worker = self.id, "host job panicked outside a dispatch");
        }

        self.executed += 1;
    }
}

/// Spin, then yield, then park with a timeout while the queues stay empty.
#[derive(Debug, Default)]
struct Idle {
    rounds: u32,
}

impl Idle {
    const SPIN_ROUNDS: u32 = 10;
    const YIELD_ROUNDS: u32 = 20;
    const PARK: Duration = Duration::from_micros(100);

    fn reset(&mut self) {
        self.rounds = 0;
    }

    fn wait(&mut self) {
        self.rounds = self.rounds.saturating_add(1);

        if self.rounds <= Self::SPIN_ROUNDS {
            for _ in 0..(1u32 << self.rounds.min(6)) {
                std::hint::spin_loop();
            }
        } else if self.rounds <= Self::YIELD_ROUNDS {
            thread::yield_now();
        } else {
            thread::park_timeout(Self::PARK);
        }
    }
}

// completion counter for one dispatch
use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
pub(crate) struct CountLatch {
    state: Mutex<LatchState>,
    cond: Condvar,
}

#[derive(Debug)]
struct LatchState {
    remaining: usize,
    panic: Option<String>,
}

impl CountLatch {
    pub fn new(count: usize) -> Self {
        Self {
            state: Mutex::new(LatchState {
                remaining: count,
                panic: None,
            }),
            cond: Condvar::new(),
        }
    }

    /// Mark one job finished, keeping the first panic message seen.
    pub fn count_down(&self, panic: Option<String>) {
        let mut state = self.state.lock();
        if state.panic.is_none() {
            state.panic = panic;
        }
        state.remaining = state.remaining.saturating_sub(1);
        if state.remaining == 0 {
            self.cond.notify_all();
        }
    }

    /// Block until every job has counted down.
    pub fn wait(&self) -> Option<String> {
        let mut state = self.state.lock();
        while state.remaining > 0 {
            self.cond.wait(&mut state);
        }
        state.panic.take()
    }
}

//! Host worker pool.
//!
//! Fixed worker threads with a global injector and per-worker deques
//! (randomized stealing). The host backend runs each dispatch here as a set
//! of index-range chunks and waits for all of them.

pub(crate) mod cpu_pool;
pub(crate) mod job;
pub(crate) mod latch;
pub(crate) mod worker;

pub(crate) use cpu_pool::CpuPool;

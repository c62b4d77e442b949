//! strand - data-parallel primitives on a compute device
//!
//! Filter, sort, prefix sum, reduction and pairwise braid over device-resident
//! buffers, generic over a compute [`Backend`](backend::Backend). Callers
//! supply the per-element kernels (predicates, comparators, combiners); the
//! crate moves the data, sequences the dispatches and implements the
//! composite algorithms.
//!
//! # Quick Start
//!
//! ```
//! use strand::prelude::*;
//!
//! let env = HostEnvironment::create(DeviceKind::Cpu).unwrap();
//! let predicate = HostProgram::new().kernel("greater_than_three", |inv| {
//!     let i = inv.id();
//!     let keep = inv.buffer(0).load_i32(i) > 3;
//!     inv.buffer(1).store_u32(i, keep as u32);
//! });
//! let task = Task::build(&env, &predicate, "greater_than_three").unwrap();
//!
//! let data = DeviceBuffer::from_slice(&env, &[5, 1, 8, 1, 9, 2]).unwrap();
//! let kept = filter(&env, &data, &task).unwrap();
//! assert_eq!(kept.to_vec::<i32>(&env).unwrap(), vec![5, 8, 9]);
//! ```
//!
//! # Backends
//!
//! - **host**: worker pool with work stealing; kernels are Rust closures in a
//!   [`HostProgram`](backend::HostProgram). Always available.
//! - **wgpu** (feature `gpu`): kernels are WGSL compute shaders declared with
//!   `@workgroup_size(64)`, indexing elements by
//!   `gid.x + gid.y * num_workgroups.x * 64u`.
//!
//! # Ordering
//!
//! Each [`Environment`] owns one in-order queue. Uploads and dispatches are
//! queued without blocking, and each stage of a composite algorithm sees the
//! completed output of the stages queued before it. Reads block until the
//! queue drains.

#![warn(missing_debug_implementations)]

pub mod algorithms;
pub mod backend;
pub mod buffer;
pub mod config;
pub mod dispatch;
pub mod environment;
pub mod error;
pub mod kernels;
pub mod prelude;
pub mod task;

mod executor;

pub use algorithms::{
    bitonic_dispatch_count, braid_buffers, compute_presence_array, count_equal, count_matching,
    exclusive_prefix_sum, filter, filter_by_scattered_writes, filtered_buffer_length,
    integer_bitonic_sort, pad_to_power_of_two, release_temporary_filter_buffers, scan_total,
    sort_integers, sum, sum_integer_dataset, FilterStages,
};
pub use backend::{Access, Backend, DeviceInfo, DeviceKind, ElementKind, KernelArg};
pub use buffer::{DeviceBuffer, Element};
pub use config::{Config, ConfigBuilder};
pub use dispatch::{dispatch, map, run};
pub use environment::{Environment, HostEnvironment, HybridEnvironment};
pub use error::{Error, Result};
pub use task::Task;

#[cfg(feature = "gpu")]
pub use environment::WgpuEnvironment;

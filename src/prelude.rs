pub use crate::algorithms::{
    braid_buffers, compute_presence_array, count_equal, count_matching, exclusive_prefix_sum,
    filter, filter_by_scattered_writes, filtered_buffer_length, integer_bitonic_sort,
    pad_to_power_of_two, release_temporary_filter_buffers, sort_integers, sum,
    sum_integer_dataset, FilterStages,
};
pub use crate::backend::{
    Access, Backend, DeviceKind, ElementKind, HostBackend, HostProgram, Invocation, KernelArg,
};
pub use crate::buffer::DeviceBuffer;
pub use crate::config::{Config, ConfigBuilder};
pub use crate::dispatch::{dispatch, map, run};
pub use crate::environment::{Environment, HostEnvironment, HybridEnvironment};
pub use crate::error::{Error, Result};
pub use crate::task::Task;

#[cfg(feature = "gpu")]
pub use crate::backend::WgpuBackend;

#[cfg(feature = "gpu")]
pub use crate::environment::WgpuEnvironment;

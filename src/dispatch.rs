//! Single-kernel dispatch over a 1-D range.
//!
//! Dispatches are queued and return immediately. A later read or
//! [`Environment::flush`] observes their results.

use crate::backend::{Backend, KernelArg, WORKGROUP_SIZE};
use crate::buffer::DeviceBuffer;
use crate::environment::Environment;
use crate::error::Result;
use crate::task::Task;

/// Queue `work_items` invocations of `task` with `args` bound by position.
pub fn dispatch<B: Backend>(
    env: &Environment<B>,
    task: &Task<B>,
    args: &[KernelArg<'_, B>],
    work_items: usize,
) -> Result<()> {
    tracing::trace!(
        task = task.name(),
        args = args.len(),
        work_items,
        workgroups = work_items.div_ceil(WORKGROUP_SIZE as usize),
        "dispatch"
    );
    env.backend().dispatch(task.kernel(), args, work_items)
}

/// One work-item per element of `buffer`, bound as argument 0.
pub fn run<B: Backend>(env: &Environment<B>, buffer: &DeviceBuffer<B>, task: &Task<B>) -> Result<()> {
    dispatch(env, task, &[KernelArg::buffer(buffer)], buffer.len())
}

/// [`run`] that hands the buffer back, for chaining in-place kernels.
pub fn map<B: Backend>(
    env: &Environment<B>,
    buffer: DeviceBuffer<B>,
    task: &Task<B>,
) -> Result<DeviceBuffer<B>> {
    run(env, &buffer, task)?;
    Ok(buffer)
}

use crate::backend::{Access, Backend, KernelArg};
use crate::buffer::DeviceBuffer;
use crate::dispatch::dispatch;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::task::Task;

/// Combine two equal-length buffers element by element.
///
/// `task` gets `fsts`, `snds` and a fresh output buffer (same length and
/// kind as `fsts`) as arguments 0, 1 and 2, and writes element `i` of the
/// output from `fsts[i]` and `snds[i]`.
pub fn braid_buffers<B: Backend>(
    env: &Environment<B>,
    task: &Task<B>,
    fsts: &DeviceBuffer<B>,
    snds: &DeviceBuffer<B>,
) -> Result<DeviceBuffer<B>> {
    Error::check_len(fsts.len(), snds.len())?;

    let output = DeviceBuffer::allocate_elements(env, fsts.len(), fsts.kind(), Access::ReadWrite)?;
    dispatch(
        env,
        task,
        &[
            KernelArg::buffer(fsts),
            KernelArg::buffer(snds),
            KernelArg::buffer(&output),
        ],
        fsts.len(),
    )?;

    tracing::debug!(len = fsts.len(), task = task.name(), "braid");
    Ok(output)
}

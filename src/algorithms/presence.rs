use crate::backend::{Access, Backend, ElementKind, KernelArg};
use crate::buffer::DeviceBuffer;
use crate::dispatch::dispatch;
use crate::environment::Environment;
use crate::error::Result;
use crate::task::Task;

/// Presence array of `buffer` under `predicate`.
///
/// The predicate gets `buffer` as argument 0 and a fresh integer buffer of
/// the same length as argument 1, and writes 1 (kept) or 0 (dropped) per
/// index. The caller owns the returned buffer.
pub fn compute_presence_array<B: Backend>(
    env: &Environment<B>,
    buffer: &DeviceBuffer<B>,
    predicate: &Task<B>,
) -> Result<DeviceBuffer<B>> {
    presence_with(env, buffer, predicate, None)
}

/// As [`compute_presence_array`], with `params` bound as argument 2.
pub(crate) fn presence_with<B: Backend>(
    env: &Environment<B>,
    buffer: &DeviceBuffer<B>,
    predicate: &Task<B>,
    params: Option<[u32; 4]>,
) -> Result<DeviceBuffer<B>> {
    let presence =
        DeviceBuffer::allocate_elements(env, buffer.len(), ElementKind::Integer, Access::ReadWrite)?;

    {
        let mut args = vec![KernelArg::buffer(buffer), KernelArg::buffer(&presence)];
        if let Some(words) = params {
            args.push(KernelArg::params(words));
        }
        dispatch(env, predicate, &args, buffer.len())?;
    }

    tracing::debug!(len = buffer.len(), predicate = predicate.name(), "presence array");
    Ok(presence)
}

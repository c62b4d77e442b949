//! Work-efficient exclusive prefix sum.
//!
//! The source is copied into a scratch buffer padded with zeros to the next
//! power of two `m`. `log2(m)` up-sweep passes build partial sums in place,
//! the last element is cleared, and `log2(m)` down-sweep passes distribute
//! them. The first `n` scratch elements are the result.

use crate::backend::{Access, Backend, ElementKind, KernelArg, ELEMENT_SIZE};
use crate::buffer::DeviceBuffer;
use crate::dispatch::dispatch;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::kernels::Builtin;

/// Exclusive prefix sum of an integer buffer.
///
/// Element `i` of the result is the sum of `source[0..i]`, wrapping on
/// overflow.
pub fn exclusive_prefix_sum<B: Backend>(
    env: &Environment<B>,
    source: &DeviceBuffer<B>,
) -> Result<DeviceBuffer<B>> {
    source.expect_kind(ElementKind::Integer)?;

    let n = source.len();
    let result = DeviceBuffer::allocate_elements(env, n, ElementKind::Integer, Access::ReadWrite)?;
    if n == 0 {
        return Ok(result);
    }

    let m = n.next_power_of_two();
    let size = u32::try_from(m)
        .map_err(|_| Error::invalid(format!("scan of {} elements exceeds 32-bit indexing", n)))?;

    let scratch = DeviceBuffer::allocate_elements(env, m, ElementKind::Integer, Access::ReadWrite)?;
    env.backend()
        .copy(source.raw(), scratch.raw(), n * ELEMENT_SIZE)?;
    if m > n {
        let zeros = vec![0u8; (m - n) * ELEMENT_SIZE];
        env.backend()
            .write(scratch.raw(), n * ELEMENT_SIZE, &zeros)?;
    }

    let up = env.builtin(Builtin::ScanUpSweep)?;
    let down = env.builtin(Builtin::ScanDownSweep)?;
    let levels = m.trailing_zeros();

    for level in 0..levels {
        let stride = 1u32 << level;
        dispatch(
            env,
            &up,
            &[KernelArg::buffer(&scratch), KernelArg::params([stride, size, 0, 0])],
            m >> (level + 1),
        )?;
    }

    scratch.write_element(env, m - 1, 0u32)?;

    for level in (0..levels).rev() {
        let stride = 1u32 << level;
        dispatch(
            env,
            &down,
            &[KernelArg::buffer(&scratch), KernelArg::params([stride, size, 0, 0])],
            m >> (level + 1),
        )?;
    }

    env.backend()
        .copy(scratch.raw(), result.raw(), n * ELEMENT_SIZE)?;
    scratch.release();

    tracing::debug!(len = n, padded = m, dispatches = 2 * levels, "exclusive prefix sum");
    Ok(result)
}

/// `scan[n-1] + source[n-1]`: the inclusive total. Blocks.
pub fn scan_total<B: Backend>(
    env: &Environment<B>,
    source: &DeviceBuffer<B>,
    scan: &DeviceBuffer<B>,
) -> Result<u32> {
    Error::check_len(source.len(), scan.len())?;
    let n = source.len();
    if n == 0 {
        return Ok(0);
    }

    let last_scan: u32 = scan.read_element(env, n - 1)?;
    let last_source: u32 = source.read_element(env, n - 1)?;
    Ok(last_scan.wrapping_add(last_source))
}

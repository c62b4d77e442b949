use crate::backend::{Access, Backend, ElementKind, KernelArg, ELEMENT_SIZE};
use crate::buffer::DeviceBuffer;
use crate::dispatch::dispatch;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::kernels::{Builtin, REDUCE_ENTRY};
use crate::task::Task;

/// Sum an integer buffer with a reduction kernel built from `reduction_source`.
///
/// The source must export [`REDUCE_ENTRY`]. It receives a scratch copy of the
/// data as argument 0 and `[len, upper, 0, 0]` as argument 1, and for each
/// `i < len / 2` adds element `i + upper` into element `i`. Passes repeat
/// with `len = upper` until one element is left. Sums wrap on overflow.
pub fn sum_integer_dataset<B: Backend>(
    env: &Environment<B>,
    buffer: &DeviceBuffer<B>,
    reduction_source: &B::Source,
) -> Result<i32> {
    let task = Task::build(env, reduction_source, REDUCE_ENTRY)?;
    reduce_with(env, buffer, &task)
}

/// [`sum_integer_dataset`] with the built-in reduction kernel.
pub fn sum<B: Backend>(env: &Environment<B>, buffer: &DeviceBuffer<B>) -> Result<i32> {
    let task = env.builtin(Builtin::ReduceSum)?;
    reduce_with(env, buffer, &task)
}

pub(crate) fn reduce_with<B: Backend>(
    env: &Environment<B>,
    buffer: &DeviceBuffer<B>,
    task: &Task<B>,
) -> Result<i32> {
    buffer.expect_kind(ElementKind::Integer)?;

    let n = buffer.len();
    if n == 0 {
        return Ok(0);
    }
    let mut len = u32::try_from(n)
        .map_err(|_| Error::invalid(format!("reduction of {} elements exceeds 32-bit indexing", n)))?;

    let scratch = DeviceBuffer::allocate_elements(env, n, ElementKind::Integer, Access::ReadWrite)?;
    env.backend()
        .copy(buffer.raw(), scratch.raw(), n * ELEMENT_SIZE)?;

    let mut passes = 0;
    while len > 1 {
        let upper = len.div_ceil(2);
        dispatch(
            env,
            task,
            &[KernelArg::buffer(&scratch), KernelArg::params([len, upper, 0, 0])],
            (len / 2) as usize,
        )?;
        len = upper;
        passes += 1;
    }

    let total: i32 = scratch.read_element(env, 0)?;
    scratch.release();

    tracing::debug!(len = n, passes, task = task.name(), "reduction");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::testing;
    use crate::backend::host::reduce_sum_program;

    #[test]
    fn test_sum_from_source() {
        let env = testing::host();
        let buffer = DeviceBuffer::from_slice(&env, &[5, 1, 8, 1, 9, 2, -4]).unwrap();

        let total = sum_integer_dataset(&env, &buffer, &reduce_sum_program()).unwrap();

        assert_eq!(total, 22);
        assert_eq!(buffer.to_vec::<i32>(&env).unwrap(), vec![5, 1, 8, 1, 9, 2, -4]);
    }

    #[test]
    fn test_sum_builtin_various_lengths() {
        let env = testing::host();
        for n in [1usize, 2, 3, 5, 64, 100, 1025] {
            let values: Vec<i32> = (0..n as i32).map(|i| i - 7).collect();
            let buffer = DeviceBuffer::from_slice(&env, &values).unwrap();
            assert_eq!(sum(&env, &buffer).unwrap(), values.iter().sum::<i32>(), "n = {}", n);
        }
    }

    #[test]
    fn test_sum_of_empty_is_zero() {
        let env = testing::host();
        let buffer = DeviceBuffer::from_slice::<i32>(&env, &[]).unwrap();
        assert_eq!(sum(&env, &buffer).unwrap(), 0);
    }

    #[test]
    fn test_source_without_reduce_entry() {
        let env = testing::host();
        let buffer = DeviceBuffer::from_slice(&env, &[1, 2]).unwrap();
        let program = crate::backend::HostProgram::new().kernel("sum", |_inv| {});

        let result = sum_integer_dataset(&env, &buffer, &program);
        assert!(matches!(result, Err(Error::Compile { .. })));
    }
}

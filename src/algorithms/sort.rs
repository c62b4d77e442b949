//! Bitonic sorting network.
//!
//! For `n = 2^p` elements there are `p` stages. Stage `k` has `k + 1`
//! sub-stages with pairing distance `2^j`, `j` from `k` down to 0, each one
//! dispatch of `n` work-items. Work-item `i` compares with `i ^ 2^j` when
//! that partner is above it and orders the pair ascending if bit `k + 1` of
//! `i` is clear, descending otherwise. Sub-stages read the previous one's
//! output, so they must never be reordered or fused.

use crate::backend::{Backend, ElementKind, KernelArg};
use crate::buffer::DeviceBuffer;
use crate::dispatch::dispatch;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::kernels::Builtin;
use crate::task::Task;

/// Dispatches needed to sort `len` elements: `p * (p + 1) / 2` for `len = 2^p`.
pub fn bitonic_dispatch_count(len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let p = len.trailing_zeros() as usize;
    p * (p + 1) / 2
}

/// Sort an integer buffer in place, ascending.
///
/// `comparator` receives the buffer as argument 0 and `[stage, distance, 0, 0]`
/// as argument 1. The length must be a power of two; pad with
/// [`pad_to_power_of_two`] first.
pub fn integer_bitonic_sort<B: Backend>(
    env: &Environment<B>,
    buffer: &DeviceBuffer<B>,
    comparator: &Task<B>,
) -> Result<()> {
    buffer.expect_kind(ElementKind::Integer)?;

    let n = buffer.len();
    if n <= 1 {
        return Ok(());
    }
    if !n.is_power_of_two() {
        return Err(Error::NotPowerOfTwo(n));
    }

    let stages = n.trailing_zeros();
    for stage in 0..stages {
        for sub in (0..=stage).rev() {
            dispatch(
                env,
                comparator,
                &[KernelArg::buffer(buffer), KernelArg::params([stage, 1 << sub, 0, 0])],
                n,
            )?;
        }
    }

    tracing::debug!(
        len = n,
        dispatches = bitonic_dispatch_count(n),
        comparator = comparator.name(),
        "bitonic sort queued"
    );
    Ok(())
}

/// Copy of `values` extended with `sentinel` to the next power of two.
pub fn pad_to_power_of_two<T: Copy>(values: &[T], sentinel: T) -> Vec<T> {
    let mut padded = values.to_vec();
    if !values.is_empty() {
        padded.resize(values.len().next_power_of_two(), sentinel);
    }
    padded
}

/// Sort host integers on the device with the built-in comparator.
pub fn sort_integers<B: Backend>(env: &Environment<B>, values: &[i32]) -> Result<Vec<i32>> {
    let padded = pad_to_power_of_two(values, i32::MAX);
    let buffer = DeviceBuffer::pin(env, &padded, ElementKind::Integer)?;

    let comparator = env.builtin(Builtin::BitonicSortI32)?;
    integer_bitonic_sort(env, &buffer, &comparator)?;

    let mut sorted: Vec<i32> = buffer.to_vec(env)?;
    buffer.release();
    sorted.truncate(values.len());
    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::testing;
    use crate::backend::host::bitonic_sort_i32_program;

    #[test]
    fn test_dispatch_count() {
        assert_eq!(bitonic_dispatch_count(0), 0);
        assert_eq!(bitonic_dispatch_count(1), 0);
        assert_eq!(bitonic_dispatch_count(2), 1);
        assert_eq!(bitonic_dispatch_count(4), 3);
        assert_eq!(bitonic_dispatch_count(1024), 55);
    }

    #[test]
    fn test_sort_four_elements() {
        let env = testing::host();
        let comparator = Task::build(&env, &bitonic_sort_i32_program(), "bitonic_sort_i32").unwrap();
        let buffer = DeviceBuffer::from_slice(&env, &[4, 2, 7, 1]).unwrap();

        integer_bitonic_sort(&env, &buffer, &comparator).unwrap();

        assert_eq!(buffer.to_vec::<i32>(&env).unwrap(), vec![1, 2, 4, 7]);
    }

    #[test]
    fn test_sort_rejects_non_power_of_two() {
        let env = testing::host();
        let comparator = Task::build(&env, &bitonic_sort_i32_program(), "bitonic_sort_i32").unwrap();
        let buffer = DeviceBuffer::from_slice(&env, &[3, 2, 1]).unwrap();

        let result = integer_bitonic_sort(&env, &buffer, &comparator);
        assert!(matches!(result, Err(Error::NotPowerOfTwo(3))));
    }

    #[test]
    fn test_pad_to_power_of_two() {
        assert_eq!(pad_to_power_of_two(&[3, 1, 2], 9), vec![3, 1, 2, 9]);
        assert_eq!(pad_to_power_of_two(&[3, 1], 9), vec![3, 1]);
        assert!(pad_to_power_of_two::<i32>(&[], 9).is_empty());
    }

    #[test]
    fn test_sort_integers_with_duplicates_and_extremes() {
        let env = testing::host();
        let values = vec![5, i32::MIN, -3, 5, i32::MAX, 0, 12];
        let mut expected = values.clone();
        expected.sort();

        assert_eq!(sort_integers(&env, &values).unwrap(), expected);
        assert!(sort_integers(&env, &[]).unwrap().is_empty());
    }
}

//! Stream compaction: presence, exclusive scan, scatter.

use super::presence::{compute_presence_array, presence_with};
use super::scan::{exclusive_prefix_sum, scan_total};
use crate::backend::{Access, Backend, ElementKind, KernelArg};
use crate::buffer::DeviceBuffer;
use crate::dispatch::dispatch;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::kernels::Builtin;
use crate::task::Task;

/// Number of kept elements: `scan[n-1] + presence[n-1]`.
///
/// Blocks until every queued stage that feeds `presence` and `scan` is done.
pub fn filtered_buffer_length<B: Backend>(
    env: &Environment<B>,
    presence: &DeviceBuffer<B>,
    scan: &DeviceBuffer<B>,
) -> Result<usize> {
    let total = scan_total(env, presence, scan)?;
    Ok(total as usize)
}

/// Scatter the kept elements of `dataset` into a new buffer, preserving order.
///
/// `scan` must be the exclusive prefix sum of `presence`, and both must be
/// derived from `dataset`. The output has the dataset's element kind.
pub fn filter_by_scattered_writes<B: Backend>(
    env: &Environment<B>,
    dataset: &DeviceBuffer<B>,
    presence: &DeviceBuffer<B>,
    scan: &DeviceBuffer<B>,
) -> Result<DeviceBuffer<B>> {
    Error::check_len(dataset.len(), presence.len())?;
    Error::check_len(dataset.len(), scan.len())?;

    let kept = filtered_buffer_length(env, presence, scan)?;
    if kept > dataset.len() {
        return Err(Error::invalid(format!(
            "presence array keeps {} of {} elements; it is not a 0/1 array",
            kept,
            dataset.len()
        )));
    }

    let output = DeviceBuffer::allocate_elements(env, kept, dataset.kind(), Access::ReadWrite)?;
    if kept > 0 {
        let scatter = env.builtin(Builtin::Scatter)?;
        dispatch(
            env,
            &scatter,
            &[
                KernelArg::buffer(dataset),
                KernelArg::buffer(presence),
                KernelArg::buffer(scan),
                KernelArg::buffer(&output),
            ],
            dataset.len(),
        )?;
    }

    tracing::debug!(len = dataset.len(), kept, "compacted by scattered writes");
    Ok(output)
}

/// Release the presence and scan buffers of a finished compaction.
///
/// The dataset is owned separately and stays alive.
pub fn release_temporary_filter_buffers<B: Backend>(
    presence: DeviceBuffer<B>,
    scan: DeviceBuffer<B>,
) {
    presence.release();
    scan.release();
}

/// Presence array and its exclusive scan, derived from one dataset.
pub struct FilterStages<B: Backend> {
    presence: DeviceBuffer<B>,
    scan: DeviceBuffer<B>,
}

impl<B: Backend> FilterStages<B> {
    pub fn compute(
        env: &Environment<B>,
        dataset: &DeviceBuffer<B>,
        predicate: &Task<B>,
    ) -> Result<Self> {
        let presence = compute_presence_array(env, dataset, predicate)?;
        Self::from_presence(env, presence)
    }

    fn from_presence(env: &Environment<B>, presence: DeviceBuffer<B>) -> Result<Self> {
        let scan = exclusive_prefix_sum(env, &presence)?;
        Ok(Self { presence, scan })
    }

    pub fn len(&self) -> usize {
        self.presence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presence.is_empty()
    }

    pub fn presence(&self) -> &DeviceBuffer<B> {
        &self.presence
    }

    pub fn scan(&self) -> &DeviceBuffer<B> {
        &self.scan
    }

    pub fn filtered_len(&self, env: &Environment<B>) -> Result<usize> {
        filtered_buffer_length(env, &self.presence, &self.scan)
    }

    /// Compact `dataset`, which must be the buffer these stages came from.
    pub fn compact(&self, env: &Environment<B>, dataset: &DeviceBuffer<B>) -> Result<DeviceBuffer<B>> {
        filter_by_scattered_writes(env, dataset, &self.presence, &self.scan)
    }

    pub fn into_parts(self) -> (DeviceBuffer<B>, DeviceBuffer<B>) {
        (self.presence, self.scan)
    }

    pub fn release(self) {
        release_temporary_filter_buffers(self.presence, self.scan);
    }
}

impl<B: Backend> std::fmt::Debug for FilterStages<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterStages").field("len", &self.len()).finish()
    }
}

/// Keep the elements of `dataset` that satisfy `predicate`, in order.
///
/// Intermediate buffers are released whether or not compaction succeeds.
pub fn filter<B: Backend>(
    env: &Environment<B>,
    dataset: &DeviceBuffer<B>,
    predicate: &Task<B>,
) -> Result<DeviceBuffer<B>> {
    let stages = FilterStages::compute(env, dataset, predicate)?;
    let output = stages.compact(env, dataset);
    stages.release();
    output
}

/// Number of elements of `buffer` that satisfy `predicate`.
pub fn count_matching<B: Backend>(
    env: &Environment<B>,
    buffer: &DeviceBuffer<B>,
    predicate: &Task<B>,
) -> Result<usize> {
    let stages = FilterStages::compute(env, buffer, predicate)?;
    let count = stages.filtered_len(env);
    stages.release();
    count
}

/// Number of elements of an integer buffer equal to `value`.
pub fn count_equal<B: Backend>(
    env: &Environment<B>,
    buffer: &DeviceBuffer<B>,
    value: i32,
) -> Result<usize> {
    buffer.expect_kind(ElementKind::Integer)?;
    let predicate = env.builtin(Builtin::PresenceEqualI32)?;
    let presence = presence_with(env, buffer, &predicate, Some([value as u32, 0, 0, 0]))?;

    let stages = FilterStages::from_presence(env, presence)?;
    let count = stages.filtered_len(env);
    stages.release();
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::testing;

    #[test]
    fn test_filter_pipeline_stage_by_stage() {
        let env = testing::host();
        let task = Task::build(&env, &testing::program(), "greater_than_three").unwrap();
        let dataset = DeviceBuffer::from_slice(&env, &[5, 1, 8, 1, 9, 2]).unwrap();

        let presence = compute_presence_array(&env, &dataset, &task).unwrap();
        let scan = exclusive_prefix_sum(&env, &presence).unwrap();
        assert_eq!(presence.to_vec::<u32>(&env).unwrap(), vec![1, 0, 1, 0, 1, 0]);
        assert_eq!(scan.to_vec::<u32>(&env).unwrap(), vec![0, 1, 1, 2, 2, 3]);
        assert_eq!(filtered_buffer_length(&env, &presence, &scan).unwrap(), 3);

        let output = filter_by_scattered_writes(&env, &dataset, &presence, &scan).unwrap();
        release_temporary_filter_buffers(presence, scan);

        assert_eq!(output.to_vec::<i32>(&env).unwrap(), vec![5, 8, 9]);
        assert_eq!(dataset.to_vec::<i32>(&env).unwrap(), vec![5, 1, 8, 1, 9, 2]);
    }

    #[test]
    fn test_filter_composite() {
        let env = testing::host();
        let task = Task::build(&env, &testing::program(), "greater_than_three").unwrap();
        let dataset = DeviceBuffer::from_slice(&env, &[4, 4, 0, 7]).unwrap();

        let output = filter(&env, &dataset, &task).unwrap();
        assert_eq!(output.to_vec::<i32>(&env).unwrap(), vec![4, 4, 7]);
        assert_eq!(count_matching(&env, &dataset, &task).unwrap(), 3);
    }

    #[test]
    fn test_filter_keeps_nothing_or_everything() {
        let env = testing::host();
        let task = Task::build(&env, &testing::program(), "greater_than_three").unwrap();

        let none = DeviceBuffer::from_slice(&env, &[0, 1, 2]).unwrap();
        assert!(filter(&env, &none, &task).unwrap().is_empty());

        let all = DeviceBuffer::from_slice(&env, &[10, 11]).unwrap();
        assert_eq!(filter(&env, &all, &task).unwrap().to_vec::<i32>(&env).unwrap(), vec![10, 11]);

        let empty = DeviceBuffer::from_slice::<i32>(&env, &[]).unwrap();
        assert!(filter(&env, &empty, &task).unwrap().is_empty());
    }

    #[test]
    fn test_scatter_rejects_mismatched_stages() {
        let env = testing::host();
        let dataset = DeviceBuffer::from_slice(&env, &[1, 2, 3]).unwrap();
        let presence = DeviceBuffer::from_slice(&env, &[1u32, 1]).unwrap();
        let scan = DeviceBuffer::from_slice(&env, &[0u32, 1]).unwrap();

        let result = filter_by_scattered_writes(&env, &dataset, &presence, &scan);
        assert!(matches!(result, Err(Error::LengthMismatch { expected: 3, actual: 2 })));
    }

    #[test]
    fn test_count_equal() {
        let env = testing::host();
        let data = DeviceBuffer::from_slice(&env, &[3, -1, 3, 3, 0]).unwrap();
        assert_eq!(count_equal(&env, &data, 3).unwrap(), 3);
        assert_eq!(count_equal(&env, &data, -1).unwrap(), 1);
        assert_eq!(count_equal(&env, &data, 42).unwrap(), 0);
    }

    #[test]
    fn test_stages_expose_parts() {
        let env = testing::host();
        let task = Task::build(&env, &testing::program(), "greater_than_three").unwrap();
        let dataset = DeviceBuffer::from_slice(&env, &[9, 2]).unwrap();

        let stages = FilterStages::compute(&env, &dataset, &task).unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages.filtered_len(&env).unwrap(), 1);

        let (presence, scan) = stages.into_parts();
        assert_eq!(presence.to_vec::<u32>(&env).unwrap(), vec![1, 0]);
        assert_eq!(scan.to_vec::<u32>(&env).unwrap(), vec![0, 1]);
    }
}

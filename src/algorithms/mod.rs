//! Composite algorithms built from single dispatches.
//!
//! Each stage is queued on the environment's single queue and relies on
//! submission order for its inputs. The only blocking points are scalar
//! reads (filtered length, reduction result) and the caller's final read.

pub mod braid;
pub mod filter;
pub mod presence;
pub mod reduce;
pub mod scan;
pub mod sort;

pub use braid::braid_buffers;
pub use filter::{
    count_equal, count_matching, filter, filter_by_scattered_writes, filtered_buffer_length,
    release_temporary_filter_buffers, FilterStages,
};
pub use presence::compute_presence_array;
pub use reduce::{sum, sum_integer_dataset};
pub use scan::{exclusive_prefix_sum, scan_total};
pub use sort::{bitonic_dispatch_count, integer_bitonic_sort, pad_to_power_of_two, sort_integers};

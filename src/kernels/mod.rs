//! Kernels the composite algorithms are built from.
//!
//! Each backend compiles these from its own source form: the WGSL constants
//! below for wgpu, Rust closures for the host backend. Argument order is the
//! same for both.

/// Kernels the crate ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// `[data, params{stride, size}]`
    ScanUpSweep,
    /// `[data, params{stride, size}]`
    ScanDownSweep,
    /// `[dataset, presence, positions, compacted]`
    Scatter,
    /// `[partials, params{len, upper}]`
    ReduceSum,
    /// `[values, params{stage, distance}]`
    BitonicSortI32,
    /// `[values, presence, params{value}]`
    PresenceEqualI32,
}

impl Builtin {
    pub const ALL: [Builtin; 6] = [
        Builtin::ScanUpSweep,
        Builtin::ScanDownSweep,
        Builtin::Scatter,
        Builtin::ReduceSum,
        Builtin::BitonicSortI32,
        Builtin::PresenceEqualI32,
    ];

    /// Entry point name, identical across backends.
    pub fn entry(self) -> &'static str {
        match self {
            Builtin::ScanUpSweep => "scan_up_sweep",
            Builtin::ScanDownSweep => "scan_down_sweep",
            Builtin::Scatter => "scatter",
            Builtin::ReduceSum => REDUCE_ENTRY,
            Builtin::BitonicSortI32 => "bitonic_sort_i32",
            Builtin::PresenceEqualI32 => "presence_equal_i32",
        }
    }

    pub fn wgsl(self) -> &'static str {
        match self {
            Builtin::ScanUpSweep | Builtin::ScanDownSweep => SCAN_WGSL,
            Builtin::Scatter => SCATTER_WGSL,
            Builtin::ReduceSum => REDUCE_SUM_WGSL,
            Builtin::BitonicSortI32 => BITONIC_SORT_I32_WGSL,
            Builtin::PresenceEqualI32 => PRESENCE_EQUAL_I32_WGSL,
        }
    }
}

/// Entry point every reduction kernel must export.
pub const REDUCE_ENTRY: &str = "reduce";

pub const SCAN_WGSL: &str = include_str!("wgsl/scan.wgsl");

pub const SCATTER_WGSL: &str = include_str!("wgsl/scatter.wgsl");

/// Integer sum reduction; a valid source for `sum_integer_dataset`.
pub const REDUCE_SUM_WGSL: &str = include_str!("wgsl/reduce.wgsl");

/// Ascending `i32` comparator for `integer_bitonic_sort`.
pub const BITONIC_SORT_I32_WGSL: &str = include_str!("wgsl/bitonic.wgsl");

pub const PRESENCE_EQUAL_I32_WGSL: &str = include_str!("wgsl/presence_equal.wgsl");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_builtin_source_exports_its_entry() {
        for builtin in Builtin::ALL {
            let needle = format!("fn {}(", builtin.entry());
            assert!(
                builtin.wgsl().contains(&needle),
                "{:?} source lacks {}",
                builtin,
                needle
            );
            assert!(builtin.wgsl().contains("@workgroup_size(64)"));
            assert!(
                builtin.wgsl().contains("gid.x + gid.y * groups.x * 64u"),
                "{:?} ignores rows of a tiled dispatch",
                builtin
            );
        }
    }
}

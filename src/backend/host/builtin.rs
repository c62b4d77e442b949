// host implementations of the shipped kernels, same argument order as WGSL
use super::program::{HostKernelFn, HostProgram, Invocation};
use crate::kernels::{Builtin, REDUCE_ENTRY};
use std::sync::Arc;

pub(crate) fn builtin_kernel(builtin: Builtin) -> Arc<HostKernelFn> {
    let kernel: fn(&Invocation<'_>) = match builtin {
        Builtin::ScanUpSweep => scan_up_sweep,
        Builtin::ScanDownSweep => scan_down_sweep,
        Builtin::Scatter => scatter,
        Builtin::ReduceSum => reduce_sum,
        Builtin::BitonicSortI32 => bitonic_sort_i32,
        Builtin::PresenceEqualI32 => presence_equal_i32,
    };
    Arc::new(kernel)
}

/// Host counterpart of [`REDUCE_SUM_WGSL`](crate::kernels::REDUCE_SUM_WGSL).
pub fn reduce_sum_program() -> HostProgram {
    HostProgram::new().kernel(REDUCE_ENTRY, reduce_sum)
}

/// Host counterpart of [`BITONIC_SORT_I32_WGSL`](crate::kernels::BITONIC_SORT_I32_WGSL).
pub fn bitonic_sort_i32_program() -> HostProgram {
    HostProgram::new().kernel(Builtin::BitonicSortI32.entry(), bitonic_sort_i32)
}

/// Index of the right element of pair `i` at `stride`, if pair `i` exists.
fn scan_pair(inv: &Invocation<'_>) -> Option<(usize, usize)> {
    let [stride, size, ..] = inv.params(1);
    let span = stride as usize * 2;
    let i = inv.id();
    if i >= size as usize / span {
        return None;
    }
    let right = (i + 1) * span - 1;
    Some((right - stride as usize, right))
}

fn scan_up_sweep(inv: &Invocation<'_>) {
    if let Some((left, right)) = scan_pair(inv) {
        let data = inv.buffer(0);
        data.store_u32(right, data.load_u32(right).wrapping_add(data.load_u32(left)));
    }
}

fn scan_down_sweep(inv: &Invocation<'_>) {
    if let Some((left, right)) = scan_pair(inv) {
        let data = inv.buffer(0);
        let carried = data.load_u32(left);
        data.store_u32(left, data.load_u32(right));
        data.store_u32(right, data.load_u32(right).wrapping_add(carried));
    }
}

fn scatter(inv: &Invocation<'_>) {
    let i = inv.id();
    let presence = inv.buffer(1);
    if i >= presence.len() {
        return;
    }
    if presence.load_u32(i) == 1 {
        let slot = inv.buffer(2).load_u32(i) as usize;
        inv.buffer(3).store_u32(slot, inv.buffer(0).load_u32(i));
    }
}

fn reduce_sum(inv: &Invocation<'_>) {
    let [len, upper, ..] = inv.params(1);
    let i = inv.id();
    if i >= len as usize / 2 {
        return;
    }
    let partials = inv.buffer(0);
    let upper = upper as usize;
    partials.store_i32(i, partials.load_i32(i).wrapping_add(partials.load_i32(i + upper)));
}

fn bitonic_sort_i32(inv: &Invocation<'_>) {
    let values = inv.buffer(0);
    let i = inv.id();
    if i >= values.len() {
        return;
    }
    let [stage, distance, ..] = inv.params(1);
    let partner = i ^ distance as usize;
    if partner <= i {
        return;
    }
    let ascending = i & (2usize << stage) == 0;
    let a = values.load_i32(i);
    let b = values.load_i32(partner);
    if (a > b) == ascending {
        values.store_i32(i, b);
        values.store_i32(partner, a);
    }
}

fn presence_equal_i32(inv: &Invocation<'_>) {
    let values = inv.buffer(0);
    let i = inv.id();
    if i >= values.len() {
        return;
    }
    let target = inv.params(2)[0] as i32;
    inv.buffer(1).store_u32(i, (values.load_i32(i) == target) as u32);
}

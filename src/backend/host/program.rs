//! Kernel source for the host backend.
//!
//! A [`HostProgram`] maps entry-point names to Rust closures. Each closure is
//! called once per work-item with an [`Invocation`] that exposes the global
//! index and the bound arguments.
//!
//! ```
//! use strand::backend::HostProgram;
//!
//! let program = HostProgram::new().kernel("greater_than_three", |inv| {
//!     let i = inv.id();
//!     let keep = inv.buffer(0).load_i32(i) > 3;
//!     inv.buffer(1).store_u32(i, keep as u32);
//! });
//! assert!(program.contains("greater_than_three"));
//! ```

use crate::backend::Access;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub(crate) type HostKernelFn = dyn Fn(&Invocation<'_>) + Send + Sync;

/// Host device memory: 32-bit words shared between workers.
#[derive(Clone)]
pub struct HostBuffer {
    words: Arc<[AtomicU32]>,
    access: Access,
}

impl HostBuffer {
    pub(crate) fn zeroed(len: usize, access: Access) -> Self {
        Self {
            words: (0..len).map(|_| AtomicU32::new(0)).collect(),
            access,
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn load_u32(&self, index: usize) -> u32 {
        self.words[index].load(Ordering::Relaxed)
    }

    /// Store one word from a kernel.
    ///
    /// # Panics
    ///
    /// If the buffer was allocated [`Access::ReadOnly`]. The dispatch then
    /// fails with `Error::KernelPanicked`.
    pub fn store_u32(&self, index: usize, value: u32) {
        assert!(
            self.access != Access::ReadOnly,
            "kernel stored into read-only buffer at index {}",
            index
        );
        self.put(index, value);
    }

    // host-side upload; ignores access
    pub(crate) fn put(&self, index: usize, value: u32) {
        self.words[index].store(value, Ordering::Relaxed);
    }

    pub fn load_i32(&self, index: usize) -> i32 {
        self.load_u32(index) as i32
    }

    pub fn store_i32(&self, index: usize, value: i32) {
        self.store_u32(index, value as u32);
    }

    pub fn load_f32(&self, index: usize) -> f32 {
        f32::from_bits(self.load_u32(index))
    }

    pub fn store_f32(&self, index: usize, value: f32) {
        self.store_u32(index, value.to_bits());
    }
}

impl fmt::Debug for HostBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBuffer")
            .field("len", &self.len())
            .field("access", &self.access)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub(crate) enum HostArg {
    Buffer(HostBuffer),
    Params([u32; 4]),
}

/// One work-item of a host dispatch.
#[derive(Debug)]
pub struct Invocation<'a> {
    index: usize,
    args: &'a [HostArg],
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(index: usize, args: &'a [HostArg]) -> Self {
        Self { index, args }
    }

    /// Global work-item index.
    pub fn id(&self) -> usize {
        self.index
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Buffer bound at `slot`.
    ///
    /// # Panics
    ///
    /// If `slot` is unbound or holds parameters. The dispatch then fails with
    /// `Error::KernelPanicked`.
    pub fn buffer(&self, slot: usize) -> &'a HostBuffer {
        match self.args.get(slot) {
            Some(HostArg::Buffer(buffer)) => buffer,
            Some(HostArg::Params(_)) => panic!("argument {} holds parameters, not a buffer", slot),
            None => panic!("argument {} is not bound ({} bound)", slot, self.args.len()),
        }
    }

    /// Parameter words bound at `slot`.
    ///
    /// # Panics
    ///
    /// If `slot` is unbound or holds a buffer.
    pub fn params(&self, slot: usize) -> [u32; 4] {
        match self.args.get(slot) {
            Some(HostArg::Params(words)) => *words,
            Some(HostArg::Buffer(_)) => panic!("argument {} holds a buffer, not parameters", slot),
            None => panic!("argument {} is not bound ({} bound)", slot, self.args.len()),
        }
    }
}

/// Named set of host kernels; the host backend's kernel source.
#[derive(Clone, Default)]
pub struct HostProgram {
    entries: BTreeMap<String, Arc<HostKernelFn>>,
}

impl HostProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `f` under the entry-point name `entry`.
    pub fn kernel<F>(mut self, entry: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Invocation<'_>) + Send + Sync + 'static,
    {
        self.entries.insert(entry.into(), Arc::new(f));
        self
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.contains_key(entry)
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub(crate) fn get(&self, entry: &str) -> Option<Arc<HostKernelFn>> {
        self.entries.get(entry).cloned()
    }
}

impl fmt::Debug for HostProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostProgram")
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

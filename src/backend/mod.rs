//! Compute backends.
//!
//! A [`Backend`] is the capability the orchestration layer consumes: open a
//! device with one in-order queue, allocate and move memory, compile kernel
//! entry points and dispatch them over a 1-D range. Everything above this
//! module is generic over it.
//!
//! ```text
//! Backend
//! ├── Buffer  (device memory handle)
//! ├── Kernel  (compiled entry point)
//! └── Source  (what a kernel is compiled from: WGSL text, host program)
//! ```
//!
//! Operations are submitted in call order to a single queue per device and
//! execute in that order. Nothing else orders them.

pub mod host;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use host::{HostBackend, HostBuffer, HostProgram, Invocation};

#[cfg(feature = "gpu")]
pub use gpu::WgpuBackend;

use crate::config::Config;
use crate::error::Result;
use crate::kernels::Builtin;
use std::fmt;

/// Work-items per work-group for every dispatch.
///
/// WGSL kernels must declare `@workgroup_size(64)`. Large ranges are
/// dispatched as a 2-D grid of work-groups; the `gpu` module docs give
/// the index every kernel computes.
pub const WORKGROUP_SIZE: u32 = 64;

/// Bytes per buffer element. All element kinds are 32-bit.
pub const ELEMENT_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Cpu,
    Gpu,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Cpu => write!(f, "CPU"),
            DeviceKind::Gpu => write!(f, "GPU"),
        }
    }
}

/// Declared contents of a device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Integer,
    Float,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Integer => write!(f, "integer"),
            ElementKind::Float => write!(f, "float"),
        }
    }
}

/// How kernels may use a buffer.
///
/// Host uploads and copies ignore it. On the host backend a kernel store
/// into a `ReadOnly` buffer panics, failing the dispatch. On wgpu each
/// binding's access is declared by the WGSL source, so the flag is only
/// recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    #[default]
    ReadWrite,
    ReadOnly,
}

/// Description of an opened device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub vendor: String,
    pub kind: DeviceKind,
    pub backend: String,
    pub max_workgroup_size: u32,
}

/// One kernel argument, bound by position.
///
/// Argument `i` is `@group(0) @binding(i)` in WGSL and `Invocation::buffer(i)`
/// or `Invocation::params(i)` in a host kernel.
pub enum KernelArg<'a, B: Backend> {
    Buffer(&'a B::Buffer),
    /// Four 32-bit words, a `var<uniform>` in WGSL.
    Params([u32; 4]),
}

impl<'a, B: Backend> KernelArg<'a, B> {
    pub fn buffer(buffer: &'a crate::buffer::DeviceBuffer<B>) -> Self {
        KernelArg::Buffer(buffer.raw())
    }

    pub fn params(words: [u32; 4]) -> Self {
        KernelArg::Params(words)
    }
}

impl<'a, B: Backend> Clone for KernelArg<'a, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, B: Backend> Copy for KernelArg<'a, B> {}

impl<'a, B: Backend> fmt::Debug for KernelArg<'a, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelArg::Buffer(_) => f.write_str("Buffer"),
            KernelArg::Params(words) => f.debug_tuple("Params").field(words).finish(),
        }
    }
}

/// Compute capability consumed by the orchestration layer.
///
/// Offsets and sizes are in bytes and must be multiples of [`ELEMENT_SIZE`].
pub trait Backend: Sized + Send + Sync + 'static {
    type Buffer: Send + Sync;
    type Kernel: Send + Sync;
    type Source: ?Sized;

    /// Human-readable name of this backend
    fn name() -> &'static str;

    /// Select the first device of `kind` and create its queue.
    fn open(kind: DeviceKind, config: &Config) -> Result<Self>;

    /// Open a CPU device and a GPU device from the same platform.
    fn open_hybrid(config: &Config) -> Result<(Self, Self)> {
        Ok((
            Self::open(DeviceKind::Cpu, config)?,
            Self::open(DeviceKind::Gpu, config)?,
        ))
    }

    fn device_info(&self) -> &DeviceInfo;

    fn allocate(&self, bytes: usize, access: Access) -> Result<Self::Buffer>;

    /// Queue an upload. Non-blocking.
    fn write(&self, buffer: &Self::Buffer, offset: usize, data: &[u8]) -> Result<()>;

    /// Wait for all queued work, then download into `out`.
    fn read(&self, buffer: &Self::Buffer, offset: usize, out: &mut [u8]) -> Result<()>;

    /// Queue a device-side copy of the first `bytes` of `src` into `dst`.
    fn copy(&self, src: &Self::Buffer, dst: &Self::Buffer, bytes: usize) -> Result<()>;

    fn release(buffer: Self::Buffer);

    fn compile(&self, source: &Self::Source, entry: &str) -> Result<Self::Kernel>;

    /// Compile one of the kernels the composite algorithms depend on.
    fn compile_builtin(&self, builtin: Builtin) -> Result<Self::Kernel>;

    /// Queue `work_items` invocations of `kernel`. Non-blocking.
    fn dispatch(
        &self,
        kernel: &Self::Kernel,
        args: &[KernelArg<'_, Self>],
        work_items: usize,
    ) -> Result<()>;

    /// Block until everything queued so far has completed.
    fn flush(&self) -> Result<()>;
}

pub(crate) fn check_aligned(offset: usize, len: usize) -> Result<()> {
    if offset % ELEMENT_SIZE != 0 || len % ELEMENT_SIZE != 0 {
        return Err(crate::error::Error::invalid(format!(
            "offset {} and length {} must be multiples of {} bytes",
            offset, len, ELEMENT_SIZE
        )));
    }
    Ok(())
}

pub(crate) fn check_range(offset: usize, len: usize, size: usize) -> Result<()> {
    check_aligned(offset, len)?;
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(crate::error::Error::invalid(format!(
            "range {}..{} exceeds buffer of {} bytes",
            offset,
            offset.saturating_add(len),
            size
        ))),
    }
}

//! Parallel-CPU backend.
//!
//! Buffers are shared arrays of 32-bit words and kernels are closures from a
//! [`HostProgram`]. A dispatch splits its index range into chunks, runs them
//! on the worker pool and returns once every chunk finished, so the queue is
//! in order by construction.

mod builtin;
mod program;

pub use builtin::{bitonic_sort_i32_program, reduce_sum_program};
pub use program::{HostBuffer, HostProgram, Invocation};

use self::program::{HostArg, HostKernelFn};
use crate::backend::{
    check_aligned, check_range, Access, Backend, DeviceInfo, DeviceKind, KernelArg, ELEMENT_SIZE,
    WORKGROUP_SIZE,
};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::CpuPool;
use crate::kernels::Builtin;
use std::fmt;
use std::sync::Arc;

/// Compiled host entry point.
#[derive(Clone)]
pub struct HostKernel {
    entry: String,
    func: Arc<HostKernelFn>,
}

impl HostKernel {
    pub fn entry(&self) -> &str {
        &self.entry
    }
}

impl fmt::Debug for HostKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostKernel").field("entry", &self.entry).finish()
    }
}

#[derive(Debug)]
pub struct HostBackend {
    pool: Arc<CpuPool>,
    info: DeviceInfo,
    chunks_per_thread: usize,
}

impl HostBackend {
    pub fn worker_threads(&self) -> usize {
        self.pool.num_threads()
    }
}

impl Backend for HostBackend {
    type Buffer = HostBuffer;
    type Kernel = HostKernel;
    type Source = HostProgram;

    fn name() -> &'static str {
        "host"
    }

    fn open(kind: DeviceKind, config: &Config) -> Result<Self> {
        if kind != DeviceKind::Cpu {
            return Err(Error::NoDevice { kind });
        }

        let pool = CpuPool::new(config)?;
        let info = DeviceInfo {
            name: format!("{} host ({} workers)", std::env::consts::ARCH, pool.num_threads()),
            vendor: "strand".to_string(),
            kind: DeviceKind::Cpu,
            backend: Self::name().to_string(),
            max_workgroup_size: WORKGROUP_SIZE,
        };

        if config.report_devices {
            tracing::info!(
                index = 1,
                name = %info.name,
                vendor = %info.vendor,
                backend = %info.backend,
                max_workgroup_size = info.max_workgroup_size,
                "compute device"
            );
            tracing::info!("selecting device 1");
        }

        Ok(Self {
            pool: Arc::new(pool),
            info,
            chunks_per_thread: config.chunks_per_thread,
        })
    }

    fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    fn allocate(&self, bytes: usize, access: Access) -> Result<Self::Buffer> {
        check_aligned(0, bytes)?;
        Ok(HostBuffer::zeroed(bytes / ELEMENT_SIZE, access))
    }

    fn write(&self, buffer: &Self::Buffer, offset: usize, data: &[u8]) -> Result<()> {
        check_range(offset, data.len(), buffer.len() * ELEMENT_SIZE)?;
        let first = offset / ELEMENT_SIZE;
        for (i, word) in data.chunks_exact(ELEMENT_SIZE).enumerate() {
            let value = u32::from_ne_bytes([word[0], word[1], word[2], word[3]]);
            buffer.put(first + i, value);
        }
        Ok(())
    }

    fn read(&self, buffer: &Self::Buffer, offset: usize, out: &mut [u8]) -> Result<()> {
        check_range(offset, out.len(), buffer.len() * ELEMENT_SIZE)?;
        let first = offset / ELEMENT_SIZE;
        for (i, word) in out.chunks_exact_mut(ELEMENT_SIZE).enumerate() {
            word.copy_from_slice(&buffer.load_u32(first + i).to_ne_bytes());
        }
        Ok(())
    }

    fn copy(&self, src: &Self::Buffer, dst: &Self::Buffer, bytes: usize) -> Result<()> {
        check_range(0, bytes, src.len() * ELEMENT_SIZE)?;
        check_range(0, bytes, dst.len() * ELEMENT_SIZE)?;
        for i in 0..bytes / ELEMENT_SIZE {
            dst.put(i, src.load_u32(i));
        }
        Ok(())
    }

    fn release(buffer: Self::Buffer) {
        drop(buffer);
    }

    fn compile(&self, source: &Self::Source, entry: &str) -> Result<Self::Kernel> {
        let func = source.get(entry).ok_or_else(|| {
            let available: Vec<&str> = source.entries().collect();
            Error::compile(
                entry,
                format!("no entry point named `{}` (program exports {:?})", entry, available),
            )
        })?;

        Ok(HostKernel {
            entry: entry.to_string(),
            func,
        })
    }

    fn compile_builtin(&self, builtin: Builtin) -> Result<Self::Kernel> {
        Ok(HostKernel {
            entry: builtin.entry().to_string(),
            func: builtin::builtin_kernel(builtin),
        })
    }

    fn dispatch(
        &self,
        kernel: &Self::Kernel,
        args: &[KernelArg<'_, Self>],
        work_items: usize,
    ) -> Result<()> {
        let bound: Arc<[HostArg]> = args
            .iter()
            .map(|arg| match arg {
                KernelArg::Buffer(buffer) => HostArg::Buffer((*buffer).clone()),
                KernelArg::Params(words) => HostArg::Params(*words),
            })
            .collect();
        let func = Arc::clone(&kernel.func);

        self.pool
            .run_range(work_items, self.chunks_per_thread, move |range| {
                for index in range {
                    func(&Invocation::new(index, &bound));
                }
            })
            .map_err(|err| {
                tracing::warn!(entry = %kernel.entry, error = %err, "host kernel failed");
                err
            })
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

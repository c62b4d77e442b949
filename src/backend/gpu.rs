//! wgpu backend.
//!
//! Kernels are WGSL compute entry points declared with
//! `@workgroup_size(64)`. Ranges too large for one dimension of work-groups
//! are laid out as rows, so kernels compute their element index as
//! `gid.x + gid.y * num_workgroups.x * 64u` and return when it is out of
//! range. Every write, copy and dispatch is submitted to the
//! device's single queue as it is issued; reads and [`Backend::flush`] block
//! until the queue drains.

use crate::backend::{
    check_aligned, check_range, Access, Backend, DeviceInfo, DeviceKind, KernelArg, ELEMENT_SIZE,
    WORKGROUP_SIZE,
};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::kernels::Builtin;
use std::fmt;
use std::sync::mpsc;
use wgpu::util::DeviceExt;

/// Device memory on a wgpu device.
#[derive(Debug)]
pub struct WgpuBuffer {
    buffer: wgpu::Buffer,
    /// Usable size in bytes; the allocation may be larger.
    size: usize,
    access: Access,
}

impl WgpuBuffer {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn access(&self) -> Access {
        self.access
    }
}

/// Compiled WGSL entry point.
pub struct WgpuKernel {
    entry: String,
    pipeline: wgpu::ComputePipeline,
}

impl WgpuKernel {
    pub fn entry(&self) -> &str {
        &self.entry
    }
}

impl fmt::Debug for WgpuKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgpuKernel").field("entry", &self.entry).finish()
    }
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    info: DeviceInfo,
    max_workgroups: u32,
}

impl fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("info", &self.info)
            .field("max_workgroups", &self.max_workgroups)
            .finish()
    }
}

/// Binding for one kernel argument.
enum Bound<'a> {
    Storage(&'a wgpu::Buffer),
    Uniform(wgpu::Buffer),
}

impl Bound<'_> {
    fn buffer(&self) -> &wgpu::Buffer {
        match self {
            Bound::Storage(buffer) => buffer,
            Bound::Uniform(buffer) => buffer,
        }
    }
}

fn matches_kind(device_type: wgpu::DeviceType, kind: DeviceKind) -> bool {
    match kind {
        DeviceKind::Cpu => device_type == wgpu::DeviceType::Cpu,
        DeviceKind::Gpu => matches!(
            device_type,
            wgpu::DeviceType::DiscreteGpu
                | wgpu::DeviceType::IntegratedGpu
                | wgpu::DeviceType::VirtualGpu
        ),
    }
}

/// Work-group grid covering `work_items`.
///
/// One row while the groups fit in a single dimension, otherwise full rows of
/// `max` groups. The last row may overshoot, so kernels bounds-check the
/// linear index `gid.x + gid.y * num_workgroups.x * 64`.
fn workgroup_grid(work_items: usize, max: u32) -> Result<(u32, u32)> {
    let groups = work_items.div_ceil(WORKGROUP_SIZE as usize);
    let max = max.max(1);
    let columns = groups.min(max as usize);
    let rows = groups.div_ceil(max as usize);

    match (u32::try_from(columns), u32::try_from(rows)) {
        (Ok(columns), Ok(rows)) if rows <= max => Ok((columns, rows)),
        _ => Err(Error::invalid(format!(
            "{} work-items need {} work-groups, device allows {} x {}",
            work_items, groups, max, max
        ))),
    }
}

impl WgpuBackend {
    fn instance(config: &Config) -> wgpu::Instance {
        wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: config.gpu_backends,
            ..Default::default()
        })
    }

    fn open_on(instance: &wgpu::Instance, kind: DeviceKind, config: &Config) -> Result<Self> {
        let adapters = instance.enumerate_adapters(config.gpu_backends);

        if config.report_devices {
            tracing::info!(count = adapters.len(), "enumerated compute devices");
            for (index, adapter) in adapters.iter().enumerate() {
                let info = adapter.get_info();
                tracing::info!(
                    index = index + 1,
                    name = %info.name,
                    device_type = ?info.device_type,
                    backend = ?info.backend,
                    max_workgroup_size = adapter.limits().max_compute_workgroup_size_x,
                    "compute device"
                );
            }
        }

        let (index, adapter) = adapters
            .into_iter()
            .enumerate()
            .find(|(_, adapter)| matches_kind(adapter.get_info().device_type, kind))
            .ok_or(Error::NoDevice { kind })?;

        if config.report_devices {
            tracing::info!("selecting device {}", index + 1);
        }

        let adapter_info = adapter.get_info();
        let limits = adapter.limits();
        if limits.max_compute_workgroup_size_x < WORKGROUP_SIZE {
            return Err(Error::backend(
                "open device",
                format!(
                    "{} supports work-groups of {} items, need {}",
                    adapter_info.name, limits.max_compute_workgroup_size_x, WORKGROUP_SIZE
                ),
            ));
        }

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some(config.label.as_str()),
                required_features: wgpu::Features::empty(),
                required_limits: limits.clone(),
            },
            None,
        ))
        .map_err(|e| Error::backend("request device", e.to_string()))?;

        device.on_uncaptured_error(Box::new(|error: wgpu::Error| {
            tracing::error!(%error, "uncaptured wgpu error");
        }));

        let info = DeviceInfo {
            name: adapter_info.name.clone(),
            vendor: format!("{:#06x}", adapter_info.vendor),
            kind,
            backend: format!("{:?}", adapter_info.backend),
            max_workgroup_size: limits.max_compute_workgroup_size_x,
        };
        tracing::debug!(device = %info.name, backend = %info.backend, "opened wgpu device");

        Ok(Self {
            device,
            queue,
            info,
            max_workgroups: limits.max_compute_workgroups_per_dimension,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Run `f` with validation and out-of-memory errors captured.
    fn scoped<T>(&self, step: &'static str, f: impl FnOnce() -> T) -> Result<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());

        match validation.or(oom) {
            Some(error) => Err(Error::backend(step, error.to_string())),
            None => Ok(value),
        }
    }

    fn wait(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }
}

impl Backend for WgpuBackend {
    type Buffer = WgpuBuffer;
    type Kernel = WgpuKernel;
    type Source = str;

    fn name() -> &'static str {
        "wgpu"
    }

    fn open(kind: DeviceKind, config: &Config) -> Result<Self> {
        let instance = Self::instance(config);
        Self::open_on(&instance, kind, config)
    }

    fn open_hybrid(config: &Config) -> Result<(Self, Self)> {
        let instance = Self::instance(config);
        let cpu = Self::open_on(&instance, DeviceKind::Cpu, config)?;
        let gpu = Self::open_on(&instance, DeviceKind::Gpu, config)?;
        Ok((cpu, gpu))
    }

    fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    fn allocate(&self, bytes: usize, access: Access) -> Result<Self::Buffer> {
        check_aligned(0, bytes)?;
        // zero-sized bindings are invalid
        let alloc = bytes.max(ELEMENT_SIZE) as u64;
        let buffer = self.scoped("allocate", || {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("strand-buffer"),
                size: alloc,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })?;

        Ok(WgpuBuffer {
            buffer,
            size: bytes,
            access,
        })
    }

    fn write(&self, buffer: &Self::Buffer, offset: usize, data: &[u8]) -> Result<()> {
        check_range(offset, data.len(), buffer.size)?;
        if data.is_empty() {
            return Ok(());
        }
        self.queue.write_buffer(&buffer.buffer, offset as u64, data);
        self.queue.submit(std::iter::empty());
        Ok(())
    }

    fn read(&self, buffer: &Self::Buffer, offset: usize, out: &mut [u8]) -> Result<()> {
        check_range(offset, out.len(), buffer.size)?;
        if out.is_empty() {
            return Ok(());
        }
        let size = out.len() as u64;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("strand-staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("strand-read"),
            });
        encoder.copy_buffer_to_buffer(&buffer.buffer, offset as u64, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // receiver outlives the poll below
            let _ = tx.send(result);
        });
        self.wait();

        rx.recv()
            .map_err(|e| Error::backend("map read", e.to_string()))?
            .map_err(|e| Error::backend("map read", e.to_string()))?;

        {
            let mapped = slice.get_mapped_range();
            out.copy_from_slice(&mapped);
        }
        staging.unmap();
        staging.destroy();
        Ok(())
    }

    fn copy(&self, src: &Self::Buffer, dst: &Self::Buffer, bytes: usize) -> Result<()> {
        check_range(0, bytes, src.size)?;
        check_range(0, bytes, dst.size)?;
        if bytes == 0 {
            return Ok(());
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("strand-copy"),
            });
        encoder.copy_buffer_to_buffer(&src.buffer, 0, &dst.buffer, 0, bytes as u64);
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn release(buffer: Self::Buffer) {
        buffer.buffer.destroy();
    }

    fn compile(&self, source: &Self::Source, entry: &str) -> Result<Self::Kernel> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(entry),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry),
                layout: None,
                module: &module,
                entry_point: entry,
            });

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(Error::compile(entry, error.to_string()));
        }

        tracing::trace!(entry, "compiled WGSL entry point");
        Ok(WgpuKernel {
            entry: entry.to_string(),
            pipeline,
        })
    }

    fn compile_builtin(&self, builtin: Builtin) -> Result<Self::Kernel> {
        self.compile(builtin.wgsl(), builtin.entry())
    }

    fn dispatch(
        &self,
        kernel: &Self::Kernel,
        args: &[KernelArg<'_, Self>],
        work_items: usize,
    ) -> Result<()> {
        if work_items == 0 {
            return Ok(());
        }

        let (columns, rows) = workgroup_grid(work_items, self.max_workgroups)?;

        self.scoped("dispatch", || {
            let bound: Vec<Bound<'_>> = args
                .iter()
                .map(|arg| match arg {
                    KernelArg::Buffer(buffer) => Bound::Storage(&buffer.buffer),
                    KernelArg::Params(words) => Bound::Uniform(self.device.create_buffer_init(
                        &wgpu::util::BufferInitDescriptor {
                            label: Some("strand-params"),
                            contents: bytemuck::cast_slice(words),
                            usage: wgpu::BufferUsages::UNIFORM,
                        },
                    )),
                })
                .collect();

            let entries: Vec<wgpu::BindGroupEntry<'_>> = bound
                .iter()
                .enumerate()
                .map(|(binding, bound)| wgpu::BindGroupEntry {
                    binding: binding as u32,
                    resource: bound.buffer().as_entire_binding(),
                })
                .collect();

            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(kernel.entry.as_str()),
                layout: &kernel.pipeline.get_bind_group_layout(0),
                entries: &entries,
            });

            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("strand-dispatch"),
                });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(kernel.entry.as_str()),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&kernel.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(columns, rows, 1);
            }
            self.queue.submit(Some(encoder.finish()));
        })
        .map_err(|err| {
            tracing::warn!(entry = %kernel.entry, error = %err, "dispatch rejected");
            err
        })
    }

    fn flush(&self) -> Result<()> {
        self.wait();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpu() -> Option<WgpuBackend> {
        WgpuBackend::open(DeviceKind::Gpu, &Config::default()).ok()
    }

    #[test]
    fn test_device_kind_matching() {
        assert!(matches_kind(wgpu::DeviceType::DiscreteGpu, DeviceKind::Gpu));
        assert!(matches_kind(wgpu::DeviceType::Cpu, DeviceKind::Cpu));
        assert!(!matches_kind(wgpu::DeviceType::Cpu, DeviceKind::Gpu));
        assert!(!matches_kind(wgpu::DeviceType::Other, DeviceKind::Cpu));
    }

    #[test]
    fn test_workgroup_grid_stays_one_row_when_it_fits() {
        assert_eq!(workgroup_grid(1, 65_535).unwrap(), (1, 1));
        assert_eq!(workgroup_grid(64, 65_535).unwrap(), (1, 1));
        assert_eq!(workgroup_grid(65, 65_535).unwrap(), (2, 1));
        assert_eq!(workgroup_grid(4_194_240, 65_535).unwrap(), (65_535, 1));
    }

    #[test]
    fn test_workgroup_grid_tiles_large_ranges() {
        // 5M items need 78125 groups
        let (columns, rows) = workgroup_grid(5_000_000, 65_535).unwrap();
        assert_eq!((columns, rows), (65_535, 2));
        assert!(columns as usize * rows as usize * 64 >= 5_000_000);

        let (columns, rows) = workgroup_grid(1000, 4).unwrap();
        assert_eq!((columns, rows), (4, 4));
        assert!(workgroup_grid(1025, 4).is_err());
    }

    #[test]
    fn test_write_read_round_trip() {
        let Some(gpu) = gpu() else { return };
        let buffer = gpu.allocate(16, Access::ReadWrite).unwrap();
        let data: Vec<u8> = (0u8..16).collect();
        gpu.write(&buffer, 0, &data).unwrap();

        let mut out = vec![0u8; 8];
        gpu.read(&buffer, 4, &mut out).unwrap();
        assert_eq!(out, &data[4..12]);
        WgpuBackend::release(buffer);
    }

    #[test]
    fn test_compile_error_names_entry() {
        let Some(gpu) = gpu() else { return };
        match gpu.compile("this is not wgsl", "broken") {
            Err(Error::Compile { entry, .. }) => assert_eq!(entry, "broken"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_builtin_dispatch_with_params() {
        let Some(gpu) = gpu() else { return };
        let kernel = gpu.compile_builtin(Builtin::PresenceEqualI32).unwrap();
        let values = gpu.allocate(16, Access::ReadOnly).unwrap();
        let presence = gpu.allocate(16, Access::ReadWrite).unwrap();
        gpu.write(&values, 0, bytemuck::cast_slice(&[3i32, 5, 3, 1]))
            .unwrap();

        gpu.dispatch(
            &kernel,
            &[
                KernelArg::Buffer(&values),
                KernelArg::Buffer(&presence),
                KernelArg::Params([3, 0, 0, 0]),
            ],
            4,
        )
        .unwrap();

        let mut out = [0u32; 4];
        gpu.read(&presence, 0, bytemuck::cast_slice_mut(&mut out))
            .unwrap();
        assert_eq!(out, [1, 0, 1, 0]);
    }
}

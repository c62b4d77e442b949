use crate::backend::{Backend, DeviceInfo, DeviceKind, HostBackend};
use crate::config::Config;
use crate::error::Result;
use crate::kernels::Builtin;
use crate::task::Task;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One opened device with its in-order queue.
///
/// Every buffer upload, copy and dispatch issued through an environment goes
/// to the same queue and runs in submission order. That ordering is the only
/// thing sequencing the stages of the composite algorithms, so an
/// environment is meant to be driven from one thread at a time.
pub struct Environment<B: Backend> {
    backend: B,
    config: Config,
    builtins: Mutex<HashMap<Builtin, Arc<Task<B>>>>,
}

impl<B: Backend> Environment<B> {
    pub fn create(kind: DeviceKind) -> Result<Self> {
        Self::with_config(kind, Config::default())
    }

    pub fn with_config(kind: DeviceKind, config: Config) -> Result<Self> {
        config.validate()?;
        let backend = B::open(kind, &config)?;
        Ok(Self::from_backend(backend, config))
    }

    /// Open a CPU and a GPU device from one platform.
    pub fn create_hybrid() -> Result<HybridEnvironment<B>> {
        HybridEnvironment::create()
    }

    fn from_backend(backend: B, config: Config) -> Self {
        let info = backend.device_info();
        tracing::debug!(
            backend = B::name(),
            device = %info.name,
            kind = %info.kind,
            label = %config.label,
            "environment created"
        );

        Self {
            backend,
            config,
            builtins: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn device_info(&self) -> &DeviceInfo {
        self.backend.device_info()
    }

    pub fn kind(&self) -> DeviceKind {
        self.device_info().kind
    }

    /// Block until everything queued so far has completed.
    pub fn flush(&self) -> Result<()> {
        self.backend.flush()
    }

    /// Compiled built-in kernel, compiled on first use.
    pub(crate) fn builtin(&self, builtin: Builtin) -> Result<Arc<Task<B>>> {
        let mut cache = self.builtins.lock();
        if let Some(task) = cache.get(&builtin) {
            return Ok(Arc::clone(task));
        }

        let task = Arc::new(Task::builtin(self, builtin)?);
        cache.insert(builtin, Arc::clone(&task));
        Ok(task)
    }
}

impl<B: Backend> fmt::Debug for Environment<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("backend", &B::name())
            .field("device", self.device_info())
            .field("builtins", &self.builtins.lock().len())
            .finish()
    }
}

/// A CPU device and a GPU device from the same platform, one queue each.
///
/// The two queues are independent; nothing moves work between them.
pub struct HybridEnvironment<B: Backend> {
    pub cpu: Environment<B>,
    pub gpu: Environment<B>,
}

impl<B: Backend> HybridEnvironment<B> {
    pub fn create() -> Result<Self> {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        let (cpu, gpu) = B::open_hybrid(&config)?;
        Ok(Self {
            cpu: Environment::from_backend(cpu, config.clone()),
            gpu: Environment::from_backend(gpu, config),
        })
    }

    pub fn device(&self, kind: DeviceKind) -> &Environment<B> {
        match kind {
            DeviceKind::Cpu => &self.cpu,
            DeviceKind::Gpu => &self.gpu,
        }
    }
}

impl<B: Backend> fmt::Debug for HybridEnvironment<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HybridEnvironment")
            .field("cpu", &self.cpu)
            .field("gpu", &self.gpu)
            .finish()
    }
}

/// Environment on the parallel-CPU backend.
pub type HostEnvironment = Environment<HostBackend>;

/// Environment on a wgpu adapter.
#[cfg(feature = "gpu")]
pub type WgpuEnvironment = Environment<crate::backend::WgpuBackend>;

use crate::error::{Error, Result};

/// Options fixed when an [`Environment`](crate::Environment) is opened.
#[derive(Debug, Clone)]
pub struct Config {
    /// Report every enumerated device and the selection through `tracing`.
    pub report_devices: bool,
    pub host_threads: Option<usize>,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
    /// Work chunks submitted per host worker for one dispatch.
    pub chunks_per_thread: usize,

    #[cfg(feature = "gpu")]
    pub gpu_backends: wgpu::Backends,

    pub label: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            report_devices: false,
            host_threads: None,
            thread_name_prefix: "strand-worker".to_string(),
            stack_size: Some(2 * 1024 * 1024),
            chunks_per_thread: 4,

            #[cfg(feature = "gpu")]
            gpu_backends: wgpu::Backends::all(),

            label: "strand".to_string(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.host_threads {
            if n == 0 {
                return Err(Error::config("host_threads must be > 0"));
            }
            if n > 1024 {
                return Err(Error::config("host_threads too large (max 1024)"));
            }
        }

        if self.chunks_per_thread == 0 {
            return Err(Error::config("chunks_per_thread must be > 0"));
        }

        if self.thread_name_prefix.is_empty() {
            return Err(Error::config("thread_name_prefix must not be empty"));
        }

        #[cfg(feature = "gpu")]
        if self.gpu_backends.is_empty() {
            return Err(Error::config("gpu_backends must name at least one backend"));
        }

        Ok(())
    }

    pub fn worker_threads(&self) -> usize {
        self.host_threads.unwrap_or_else(num_cpus::get)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn report_devices(mut self, report: bool) -> Self {
        self.config.report_devices = report;
        self
    }

    pub fn host_threads(mut self, n: usize) -> Self {
        self.config.host_threads = Some(n);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn chunks_per_thread(mut self, chunks: usize) -> Self {
        self.config.chunks_per_thread = chunks;
        self
    }

    #[cfg(feature = "gpu")]
    pub fn gpu_backends(mut self, backends: wgpu::Backends) -> Self {
        self.config.gpu_backends = backends;
        self
    }

    pub fn label<S: Into<String>>(mut self, label: S) -> Self {
        self.config.label = label.into();
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

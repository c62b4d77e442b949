use crate::backend::Backend;
use crate::environment::Environment;
use crate::error::Result;
use crate::kernels::Builtin;
use std::fmt;

/// A compiled kernel entry point.
///
/// Built once against an [`Environment`] and dispatched any number of times.
/// For wgpu the source is WGSL text; for the host backend it is a
/// [`HostProgram`](crate::backend::HostProgram).
pub struct Task<B: Backend> {
    kernel: B::Kernel,
    name: String,
}

impl<B: Backend> Task<B> {
    /// Compile `source` and extract the entry point `entry`.
    ///
    /// WGSL gives no strict IEEE rounding guarantee, so float kernels must not
    /// depend on a particular rounding mode.
    pub fn build(env: &Environment<B>, source: &B::Source, entry: &str) -> Result<Self> {
        let kernel = env.backend().compile(source, entry)?;
        tracing::debug!(entry, backend = B::name(), "built task");
        Ok(Self {
            kernel,
            name: entry.to_string(),
        })
    }

    pub(crate) fn builtin(env: &Environment<B>, builtin: Builtin) -> Result<Self> {
        let kernel = env.backend().compile_builtin(builtin)?;
        tracing::debug!(entry = builtin.entry(), backend = B::name(), "built builtin task");
        Ok(Self {
            kernel,
            name: builtin.entry().to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn kernel(&self) -> &B::Kernel {
        &self.kernel
    }
}

impl<B: Backend> fmt::Debug for Task<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("backend", &B::name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DeviceKind, HostProgram};
    use crate::config::Config;
    use crate::environment::HostEnvironment;
    use crate::error::Error;

    #[test]
    fn test_build_and_missing_entry() {
        let config = Config::builder().host_threads(1).build().unwrap();
        let env = HostEnvironment::with_config(DeviceKind::Cpu, config).unwrap();
        let program = HostProgram::new().kernel("noop", |_inv| {});

        let task = Task::build(&env, &program, "noop").unwrap();
        assert_eq!(task.name(), "noop");

        let missing = Task::build(&env, &program, "nope");
        assert!(matches!(missing, Err(Error::Compile { .. })));
    }
}

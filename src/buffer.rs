//! Device-resident buffers.
//!
//! A [`DeviceBuffer`] owns its device memory. [`DeviceBuffer::release`]
//! consumes the buffer, so it can be released at most once and never used
//! afterwards. A buffer dropped without `release` still frees its memory,
//! which is how the composite algorithms clean up intermediates when a later
//! stage fails.

use crate::backend::{Access, Backend, ElementKind, ELEMENT_SIZE};
use crate::environment::Environment;
use crate::error::{Error, Result};
use std::fmt;

/// Host element types that can live in a device buffer.
pub trait Element: bytemuck::Pod + Send + Sync + 'static {
    const KIND: ElementKind;
}

impl Element for i32 {
    const KIND: ElementKind = ElementKind::Integer;
}

impl Element for u32 {
    const KIND: ElementKind = ElementKind::Integer;
}

impl Element for f32 {
    const KIND: ElementKind = ElementKind::Float;
}

fn check_kind(expected: ElementKind, actual: ElementKind) -> Result<()> {
    if expected != actual {
        return Err(Error::KindMismatch { expected, actual });
    }
    Ok(())
}

pub struct DeviceBuffer<B: Backend> {
    raw: B::Buffer,
    len: usize,
    kind: ElementKind,
    access: Access,
}

impl<B: Backend> DeviceBuffer<B> {
    /// Allocate `byte_size` bytes of uninitialized-by-contract memory.
    ///
    /// The buffer holds `byte_size / 4` integer elements.
    pub fn allocate(env: &Environment<B>, byte_size: usize, access: Access) -> Result<Self> {
        let raw = env.backend().allocate(byte_size, access)?;
        Ok(Self {
            raw,
            len: byte_size / ELEMENT_SIZE,
            kind: ElementKind::Integer,
            access,
        })
    }

    pub fn allocate_elements(
        env: &Environment<B>,
        len: usize,
        kind: ElementKind,
        access: Access,
    ) -> Result<Self> {
        let bytes = len
            .checked_mul(ELEMENT_SIZE)
            .ok_or_else(|| Error::invalid(format!("{} elements overflow the address space", len)))?;
        let mut buffer = Self::allocate(env, bytes, access)?;
        buffer.kind = kind;
        Ok(buffer)
    }

    /// Allocate for `host.len()` elements of `kind` and queue the upload.
    pub fn pin<T: Element>(env: &Environment<B>, host: &[T], kind: ElementKind) -> Result<Self> {
        check_kind(kind, T::KIND)?;
        let buffer = Self::allocate_elements(env, host.len(), kind, Access::ReadWrite)?;
        env.backend()
            .write(&buffer.raw, 0, bytemuck::cast_slice(host))?;
        Ok(buffer)
    }

    /// [`pin`](Self::pin) with the kind taken from `T`.
    pub fn from_slice<T: Element>(env: &Environment<B>, host: &[T]) -> Result<Self> {
        Self::pin(env, host, T::KIND)
    }

    /// Queue an upload of `host` over the whole buffer.
    pub fn load<T: Element>(&self, env: &Environment<B>, host: &[T]) -> Result<()> {
        Error::check_len(self.len, host.len())?;
        check_kind(self.kind, T::KIND)?;
        env.backend().write(&self.raw, 0, bytemuck::cast_slice(host))
    }

    /// Wait for all queued work, then copy the buffer into `out`.
    pub fn read<T: Element>(&self, env: &Environment<B>, out: &mut [T]) -> Result<()> {
        Error::check_len(self.len, out.len())?;
        check_kind(self.kind, T::KIND)?;
        env.backend()
            .read(&self.raw, 0, bytemuck::cast_slice_mut(out))
    }

    pub fn to_vec<T: Element>(&self, env: &Environment<B>) -> Result<Vec<T>> {
        let mut out = vec![T::zeroed(); self.len];
        self.read(env, &mut out)?;
        Ok(out)
    }

    /// Blocking read of a single element.
    pub fn read_element<T: Element>(&self, env: &Environment<B>, index: usize) -> Result<T> {
        self.check_index(index)?;
        check_kind(self.kind, T::KIND)?;
        let mut value = T::zeroed();
        env.backend().read(
            &self.raw,
            index * ELEMENT_SIZE,
            bytemuck::bytes_of_mut(&mut value),
        )?;
        Ok(value)
    }

    pub fn write_element<T: Element>(&self, env: &Environment<B>, index: usize, value: T) -> Result<()> {
        self.check_index(index)?;
        check_kind(self.kind, T::KIND)?;
        env.backend()
            .write(&self.raw, index * ELEMENT_SIZE, bytemuck::bytes_of(&value))
    }

    /// Free the device memory.
    pub fn release(self) {
        B::release(self.raw);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn byte_size(&self) -> usize {
        self.len * ELEMENT_SIZE
    }

    pub(crate) fn raw(&self) -> &B::Buffer {
        &self.raw
    }

    pub(crate) fn expect_kind(&self, kind: ElementKind) -> Result<()> {
        check_kind(kind, self.kind)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.len {
            return Err(Error::invalid(format!(
                "index {} out of bounds for buffer of {} elements",
                index, self.len
            )));
        }
        Ok(())
    }
}

impl<B: Backend> fmt::Debug for DeviceBuffer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("len", &self.len)
            .field("kind", &self.kind)
            .field("access", &self.access)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DeviceKind, HostBackend};
    use crate::config::Config;
    use crate::environment::HostEnvironment;

    fn host() -> HostEnvironment {
        let config = Config::builder().host_threads(2).build().unwrap();
        HostEnvironment::with_config(DeviceKind::Cpu, config).unwrap()
    }

    #[test]
    fn test_pin_then_read() {
        let env = host();
        let buffer = DeviceBuffer::pin(&env, &[5, -1, 8], ElementKind::Integer).unwrap();
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.byte_size(), 12);
        assert_eq!(buffer.to_vec::<i32>(&env).unwrap(), vec![5, -1, 8]);
        buffer.release();
    }

    #[test]
    fn test_pin_rejects_kind_mismatch() {
        let env = host();
        let result = DeviceBuffer::pin(&env, &[1.0f32], ElementKind::Integer);
        assert!(matches!(
            result,
            Err(Error::KindMismatch {
                expected: ElementKind::Integer,
                actual: ElementKind::Float
            })
        ));
    }

    #[test]
    fn test_load_replaces_contents() {
        let env = host();
        let buffer = DeviceBuffer::from_slice(&env, &[0.5f32, 1.5]).unwrap();
        buffer.load(&env, &[2.0f32, 3.0]).unwrap();
        assert_eq!(buffer.to_vec::<f32>(&env).unwrap(), vec![2.0, 3.0]);

        let err = buffer.load(&env, &[1.0f32]).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn test_element_access() {
        let env = host();
        let buffer = DeviceBuffer::from_slice(&env, &[1u32, 2, 3]).unwrap();
        buffer.write_element(&env, 1, 20u32).unwrap();
        assert_eq!(buffer.read_element::<u32>(&env, 1).unwrap(), 20);
        assert!(buffer.read_element::<u32>(&env, 3).is_err());
    }

    #[test]
    fn test_allocate_is_zeroed_integer() {
        let env = host();
        let buffer = DeviceBuffer::<HostBackend>::allocate(&env, 16, Access::ReadOnly).unwrap();
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.kind(), ElementKind::Integer);
        assert_eq!(buffer.access(), Access::ReadOnly);
        assert_eq!(buffer.to_vec::<i32>(&env).unwrap(), vec![0; 4]);
    }

    #[test]
    fn test_empty_buffer() {
        let env = host();
        let buffer = DeviceBuffer::from_slice::<i32>(&env, &[]).unwrap();
        assert!(buffer.is_empty());
        assert!(buffer.to_vec::<i32>(&env).unwrap().is_empty());
    }
}

use crate::backend::{DeviceKind, ElementKind};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no {kind} device available")]
    NoDevice { kind: DeviceKind },

    #[error("backend error during {step}: {message}")]
    Backend { step: &'static str, message: String },

    #[error("failed to build task `{entry}`: {message}")]
    Compile { entry: String, message: String },

    #[error("length mismatch: expected {expected} elements, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("buffer length {0} is not a power of two")]
    NotPowerOfTwo(usize),

    #[error("element kind mismatch: expected {expected}, got {actual}")]
    KindMismatch {
        expected: ElementKind,
        actual: ElementKind,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("kernel panicked: {0}")]
    KernelPanicked(String),

    #[error("config error: {0}")]
    Config(String),

    /// The OS refused a host worker thread.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn backend<S: Into<String>>(step: &'static str, msg: S) -> Self {
        Error::Backend {
            step,
            message: msg.into(),
        }
    }

    pub fn compile<E: Into<String>, S: Into<String>>(entry: E, msg: S) -> Self {
        Error::Compile {
            entry: entry.into(),
            message: msg.into(),
        }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub(crate) fn check_len(expected: usize, actual: usize) -> Result<()> {
        if expected != actual {
            return Err(Error::LengthMismatch { expected, actual });
        }
        Ok(())
    }
}

//! Host capability: what the plugin side assumes about the runtime it lives in.
//!
//! The host owns a linear memory. The plugin stages variable-length data
//! (strings) into that memory and receives a [`MemoryHandle`]; only the
//! handle's offset crosses a function-call boundary, as a `u64`. The host
//! keeps the length table.
//!
//! Once a handle has been passed to a successful [`Host::call`], the host
//! owns the buffer. Handles must not be reused after that.

pub mod memory;

use thiserror::Error;

pub use memory::{FaultPlan, HostCall, HostOutput, MemoryHost, NotificationRecord};

/// Reference to a buffer in host-addressable memory.
///
/// Offset 0 is reserved as the null handle and never refers to a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryHandle {
    offset: u64,
    length: u64,
}

impl MemoryHandle {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// The value passed across the call boundary.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn is_null(&self) -> bool {
        self.offset == 0
    }
}

/// Resolved host function, obtained from [`Host::lookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(pub u32);

/// Failures reported by the host runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("out of host memory: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: u64, available: u64 },

    #[error("invalid memory handle at offset {0}")]
    InvalidHandle(u64),

    #[error("host function '{0}' is not exported")]
    UnknownFunction(String),

    #[error("host function '{function}' failed: {reason}")]
    CallFailed { function: String, reason: String },

    #[error("input is not valid UTF-8")]
    InvalidUtf8,

    #[error("output has already been written for this invocation")]
    OutputAlreadyWritten,
}

/// The runtime capabilities the plugin side relies on.
///
/// Everything is synchronous: one invocation runs to completion on a single
/// thread, so implementors need no interior locking.
pub trait Host {
    /// The inbound envelope, decoded as UTF-8 text.
    fn read_input(&self) -> Result<String, HostError>;

    /// Write the invocation result to the string output channel.
    fn write_output_string(&mut self, output: &str) -> Result<(), HostError>;

    /// Write the invocation result to the binary output channel.
    fn write_output_bytes(&mut self, output: &[u8]) -> Result<(), HostError>;

    /// Copy `bytes` into host memory.
    fn allocate(&mut self, bytes: &[u8]) -> Result<MemoryHandle, HostError>;

    /// Release a buffer the host has not taken ownership of.
    fn free(&mut self, handle: MemoryHandle) -> Result<(), HostError>;

    /// Resolve an exported host function by name.
    fn lookup(&self, name: &str) -> Result<FunctionId, HostError>;

    /// Invoke a host function with handle offsets as arguments.
    fn call(&mut self, function: FunctionId, args: &[u64]) -> Result<(), HostError>;

    /// Stage a UTF-8 string.
    fn allocate_str(&mut self, s: &str) -> Result<MemoryHandle, HostError> {
        self.allocate(s.as_bytes())
    }
}

impl<H: Host + ?Sized> Host for &mut H {
    fn read_input(&self) -> Result<String, HostError> {
        (**self).read_input()
    }

    fn write_output_string(&mut self, output: &str) -> Result<(), HostError> {
        (**self).write_output_string(output)
    }

    fn write_output_bytes(&mut self, output: &[u8]) -> Result<(), HostError> {
        (**self).write_output_bytes(output)
    }

    fn allocate(&mut self, bytes: &[u8]) -> Result<MemoryHandle, HostError> {
        (**self).allocate(bytes)
    }

    fn free(&mut self, handle: MemoryHandle) -> Result<(), HostError> {
        (**self).free(handle)
    }

    fn lookup(&self, name: &str) -> Result<FunctionId, HostError> {
        (**self).lookup(name)
    }

    fn call(&mut self, function: FunctionId, args: &[u64]) -> Result<(), HostError> {
        (**self).call(function, args)
    }
}

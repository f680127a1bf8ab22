//! In-process host: a bump-allocated linear memory with an allocation table.
//!
//! `MemoryHost` stands in for a real plugin runtime in tests and developer
//! tooling. It exports `add_notification` by default and records every call
//! and every registered notification so callers can inspect them afterwards.
//! Faults can be injected to exercise the failure paths of the encoder.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{FunctionId, Host, HostError, MemoryHandle};
use crate::notify::ADD_NOTIFICATION_FN;

/// Default size of the simulated linear memory (1 MiB).
pub const DEFAULT_MEMORY_LIMIT: u64 = 1 << 20;

/// Deterministic failure injection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// Fail the N-th allocation of the invocation (1-based).
    pub fail_allocation_at: Option<usize>,
    /// Fail every host function call.
    pub fail_calls: bool,
}

/// A notification accepted by `add_notification`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationRecord {
    pub kind: String,
    pub target: String,
    pub body: String,
}

/// One host function invocation as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCall {
    pub function: String,
    pub args: Vec<u64>,
}

/// Whatever the plugin wrote to the output channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOutput {
    Text(String),
    Bytes(Vec<u8>),
}

#[derive(Debug)]
pub struct MemoryHost {
    input: Vec<u8>,
    /// Linear memory; byte 0 is reserved so offset 0 stays the null handle.
    memory: Vec<u8>,
    memory_limit: u64,
    /// offset -> length of every live buffer.
    allocations: BTreeMap<u64, u64>,
    allocation_count: usize,
    functions: Vec<String>,
    faults: FaultPlan,
    calls: Vec<HostCall>,
    notifications: Vec<NotificationRecord>,
    output: Option<HostOutput>,
}

impl MemoryHost {
    pub fn new(input: impl Into<Vec<u8>>) -> Self {
        Self {
            input: input.into(),
            memory: vec![0],
            memory_limit: DEFAULT_MEMORY_LIMIT,
            allocations: BTreeMap::new(),
            allocation_count: 0,
            functions: vec![ADD_NOTIFICATION_FN.to_string()],
            faults: FaultPlan::default(),
            calls: Vec::new(),
            notifications: Vec::new(),
            output: None,
        }
    }

    pub fn with_memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = bytes;
        self
    }

    /// Replace the exported function table.
    pub fn with_functions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.functions = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_faults(mut self, faults: FaultPlan) -> Self {
        self.faults = faults;
        self
    }

    /// Read a live buffer.
    pub fn read(&self, offset: u64) -> Result<&[u8], HostError> {
        let len = *self
            .allocations
            .get(&offset)
            .ok_or(HostError::InvalidHandle(offset))?;
        let start = offset as usize;
        Ok(&self.memory[start..start + len as usize])
    }

    pub fn calls(&self) -> &[HostCall] {
        &self.calls
    }

    pub fn notifications(&self) -> &[NotificationRecord] {
        &self.notifications
    }

    /// Buffers staged by the plugin that nobody has released or consumed.
    pub fn live_allocations(&self) -> usize {
        self.allocations.len()
    }

    /// Bytes of linear memory handed out so far (the arena never shrinks).
    pub fn memory_used(&self) -> u64 {
        self.memory.len() as u64 - 1
    }

    pub fn output(&self) -> Option<&HostOutput> {
        self.output.as_ref()
    }

    fn set_output(&mut self, output: HostOutput) -> Result<(), HostError> {
        if self.output.is_some() {
            return Err(HostError::OutputAlreadyWritten);
        }
        self.output = Some(output);
        Ok(())
    }

    fn read_string(&self, function: &str, offset: u64) -> Result<String, HostError> {
        let bytes = self.read(offset)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| HostError::CallFailed {
            function: function.to_string(),
            reason: format!("argument at offset {offset} is not UTF-8"),
        })
    }

    /// `add_notification(kind, target, body)`: consumes all three buffers.
    fn add_notification(&mut self, args: &[u64]) -> Result<(), HostError> {
        let [kind, target, body] = <[u64; 3]>::try_from(args).map_err(|_| {
            HostError::CallFailed {
                function: ADD_NOTIFICATION_FN.to_string(),
                reason: format!("expected 3 arguments, got {}", args.len()),
            }
        })?;

        let record = NotificationRecord {
            kind: self.read_string(ADD_NOTIFICATION_FN, kind)?,
            target: self.read_string(ADD_NOTIFICATION_FN, target)?,
            body: self.read_string(ADD_NOTIFICATION_FN, body)?,
        };

        for offset in [kind, target, body] {
            self.allocations.remove(&offset);
        }
        self.notifications.push(record);
        Ok(())
    }
}

impl Host for MemoryHost {
    fn read_input(&self) -> Result<String, HostError> {
        String::from_utf8(self.input.clone()).map_err(|_| HostError::InvalidUtf8)
    }

    fn write_output_string(&mut self, output: &str) -> Result<(), HostError> {
        self.set_output(HostOutput::Text(output.to_string()))
    }

    fn write_output_bytes(&mut self, output: &[u8]) -> Result<(), HostError> {
        self.set_output(HostOutput::Bytes(output.to_vec()))
    }

    fn allocate(&mut self, bytes: &[u8]) -> Result<MemoryHandle, HostError> {
        self.allocation_count += 1;

        let requested = bytes.len() as u64;
        let available = self.memory_limit.saturating_sub(self.memory_used());
        // Empty buffers still take one byte so every handle has a distinct offset.
        let footprint = requested.max(1);

        if self.faults.fail_allocation_at == Some(self.allocation_count) || footprint > available {
            return Err(HostError::OutOfMemory {
                requested,
                available,
            });
        }

        let offset = self.memory.len() as u64;
        self.memory.extend_from_slice(bytes);
        if bytes.is_empty() {
            self.memory.push(0);
        }
        self.allocations.insert(offset, requested);
        Ok(MemoryHandle::new(offset, requested))
    }

    fn free(&mut self, handle: MemoryHandle) -> Result<(), HostError> {
        self.allocations
            .remove(&handle.offset())
            .map(|_| ())
            .ok_or(HostError::InvalidHandle(handle.offset()))
    }

    fn lookup(&self, name: &str) -> Result<FunctionId, HostError> {
        self.functions
            .iter()
            .position(|f| f == name)
            .map(|i| FunctionId(i as u32))
            .ok_or_else(|| HostError::UnknownFunction(name.to_string()))
    }

    fn call(&mut self, function: FunctionId, args: &[u64]) -> Result<(), HostError> {
        let name = self
            .functions
            .get(function.0 as usize)
            .cloned()
            .ok_or_else(|| HostError::UnknownFunction(format!("#{}", function.0)))?;

        self.calls.push(HostCall {
            function: name.clone(),
            args: args.to_vec(),
        });

        if self.faults.fail_calls {
            return Err(HostError::CallFailed {
                function: name,
                reason: "injected fault".into(),
            });
        }

        if name == ADD_NOTIFICATION_FN {
            self.add_notification(args)
        } else {
            Ok(())
        }
    }
}

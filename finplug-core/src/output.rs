//! Output encoder: the plugin's single result, written to the host.
//!
//! Bytes go to the binary channel verbatim, text to the string channel
//! verbatim, and any other value is serialized to JSON text first. The host
//! accepts one output per invocation; a second write is rejected.

use serde::Serialize;
use thiserror::Error;

use crate::host::{Host, HostError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Text(String),
    Bytes(Vec<u8>),
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("could not serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Host(#[from] HostError),
}

impl Output {
    /// Compact JSON text of `value`.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, OutputError> {
        Ok(Output::Text(serde_json::to_string(value)?))
    }

    pub fn json_pretty<T: Serialize + ?Sized>(value: &T) -> Result<Self, OutputError> {
        Ok(Output::Text(serde_json::to_string_pretty(value)?))
    }

    pub fn len(&self) -> usize {
        match self {
            Output::Text(s) => s.len(),
            Output::Bytes(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Output {
    fn from(s: String) -> Self {
        Output::Text(s)
    }
}

impl From<&str> for Output {
    fn from(s: &str) -> Self {
        Output::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Output {
    fn from(b: Vec<u8>) -> Self {
        Output::Bytes(b)
    }
}

impl From<&[u8]> for Output {
    fn from(b: &[u8]) -> Self {
        Output::Bytes(b.to_vec())
    }
}

/// Write the invocation result to whichever channel matches its shape.
pub fn write_output<H: Host + ?Sized>(
    host: &mut H,
    output: impl Into<Output>,
) -> Result<(), OutputError> {
    match output.into() {
        Output::Text(s) => host.write_output_string(&s)?,
        Output::Bytes(b) => host.write_output_bytes(&b)?,
    }
    Ok(())
}

/// Serialize `value` to JSON and write it to the string channel.
pub fn write_json<H: Host + ?Sized, T: Serialize + ?Sized>(
    host: &mut H,
    value: &T,
) -> Result<(), OutputError> {
    write_output(host, Output::json(value)?)
}

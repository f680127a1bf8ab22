//! Invocation harness: one plugin call from host input to return code.
//!
//! Steps: read the input, decode the envelope, run the plugin body, write its
//! output. Any error that escapes the plugin body is turned into a numeric
//! return code, and a JSON error payload is written to the string channel if
//! the channel is still free.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use finplug_core::{
    write_json, write_output, EnvelopeError, FunctionArgs, Host, HostError, Output, OutputError,
    PluginError,
};

/// Return code for failures outside the plugin error taxonomy.
pub const GENERIC_ERROR_CODE: i32 = -1;

/// Return code of a successful invocation.
pub const SUCCESS_CODE: i32 = 0;

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("invalid envelope: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error("output: {0}")]
    Output(#[from] OutputError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl InvocationError {
    /// Taxonomy errors keep their wire code; everything else is generic.
    pub fn code(&self) -> i32 {
        match self {
            InvocationError::Plugin(e) => e.code(),
            _ => GENERIC_ERROR_CODE,
        }
    }
}

/// Body written to the string channel when an invocation fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
    pub code: i32,
}

impl From<&InvocationError> for ErrorPayload {
    fn from(err: &InvocationError) -> Self {
        Self {
            error: err.to_string(),
            code: err.code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub code: i32,
    /// BLAKE3 hex digest of the input text; `None` if the input was unreadable.
    pub envelope_digest: Option<String>,
}

impl Invocation {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}

/// Run one invocation of `plugin` against `host`.
pub fn invoke<H, F>(host: &mut H, plugin: F) -> Invocation
where
    H: Host + ?Sized,
    F: FnOnce(&FunctionArgs, &mut H) -> Result<Output, InvocationError>,
{
    let input = host.read_input();
    let envelope_digest = input
        .as_ref()
        .ok()
        .map(|text| blake3::hash(text.as_bytes()).to_hex().to_string());

    let span = info_span!(
        "invocation",
        digest = envelope_digest.as_deref().unwrap_or("-")
    );
    let _enter = span.enter();

    let code = match run(host, input, plugin) {
        Ok(()) => {
            info!("invocation succeeded");
            SUCCESS_CODE
        }
        Err(err) => {
            let payload = ErrorPayload::from(&err);
            warn!(code = payload.code, error = %err, "invocation failed");
            if let Err(e) = write_json(host, &payload) {
                warn!(error = %e, "error payload dropped");
            }
            payload.code
        }
    };

    Invocation {
        code,
        envelope_digest,
    }
}

fn run<H, F>(host: &mut H, input: Result<String, HostError>, plugin: F) -> Result<(), InvocationError>
where
    H: Host + ?Sized,
    F: FnOnce(&FunctionArgs, &mut H) -> Result<Output, InvocationError>,
{
    let text = input.map_err(EnvelopeError::from)?;
    let args = FunctionArgs::from_json_str(&text)?;
    let output = plugin(&args, host)?;
    debug!(bytes = output.len(), "writing output");
    write_output(host, output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use finplug_core::host::HostOutput;
    use finplug_core::MemoryHost;

    fn payload(host: &MemoryHost) -> ErrorPayload {
        match host.output() {
            Some(HostOutput::Text(s)) => serde_json::from_str(s).unwrap(),
            other => panic!("expected text output, got {other:?}"),
        }
    }

    #[test]
    fn success_writes_plugin_output() {
        let mut host = MemoryHost::new("{}");
        let inv = invoke(&mut host, |_, _| Ok(Output::from("ok")));
        assert!(inv.is_success());
        assert_eq!(host.output(), Some(&HostOutput::Text("ok".into())));
    }

    #[test]
    fn digest_is_blake3_of_input() {
        let mut host = MemoryHost::new("{}");
        let inv = invoke(&mut host, |_, _| Ok(Output::from("")));
        let expected = blake3::hash(b"{}").to_hex().to_string();
        assert_eq!(inv.envelope_digest.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn taxonomy_error_keeps_its_code() {
        let mut host = MemoryHost::new("{}");
        let inv = invoke(&mut host, |args, _| {
            args.call_argument("k")?;
            Ok(Output::from("unreachable"))
        });
        assert_eq!(inv.code, 4);
        assert_eq!(
            payload(&host),
            ErrorPayload {
                error: "Call argument k not found".into(),
                code: 4
            }
        );
    }

    #[test]
    fn bad_envelope_is_generic() {
        let mut host = MemoryHost::new("{ nope");
        let mut ran = false;
        let inv = invoke(&mut host, |_, _| {
            ran = true;
            Ok(Output::from(""))
        });
        assert!(!ran);
        assert_eq!(inv.code, GENERIC_ERROR_CODE);
        assert!(payload(&host).error.starts_with("invalid envelope"));
    }

    #[test]
    fn unreadable_input_has_no_digest() {
        let mut host = MemoryHost::new(vec![0xff]);
        let inv = invoke(&mut host, |_, _| Ok(Output::from("")));
        assert_eq!(inv.code, GENERIC_ERROR_CODE);
        assert_eq!(inv.envelope_digest, None);
    }

    #[test]
    fn anyhow_errors_are_generic() {
        let mut host = MemoryHost::new("{}");
        let inv = invoke(&mut host, |_, _| Err(anyhow!("boom").into()));
        assert_eq!(inv.code, GENERIC_ERROR_CODE);
        assert_eq!(payload(&host).error, "boom");
    }

    #[test]
    fn payload_dropped_when_channel_already_used() {
        let mut host = MemoryHost::new("{}");
        let inv = invoke(&mut host, |_, host: &mut MemoryHost| {
            write_output(host, "partial")?;
            Err(PluginError::Webhook("/x".into()).into())
        });
        assert_eq!(inv.code, 6);
        assert_eq!(host.output(), Some(&HostOutput::Text("partial".into())));
    }
}

//! finplug runner: drives plugin invocations against a simulated host.
//!
//! This crate builds on `finplug-core` to provide:
//! - The invocation harness (decode, run, write output, map errors to codes)
//! - TOML harness configuration for the simulated host
//! - Reference plugins (`summary`, `alerts`)

pub mod config;
pub mod harness;
pub mod plugins;

pub use config::{ConfigError, FaultConfig, HarnessConfig, HostConfig, OutputConfig};
pub use harness::{
    invoke, ErrorPayload, Invocation, InvocationError, GENERIC_ERROR_CODE, SUCCESS_CODE,
};
pub use plugins::{alerts, summarize, summary, Plugin};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<HarnessConfig>();
        assert_sync::<HarnessConfig>();
    }

    #[test]
    fn invocation_is_send_sync() {
        assert_send::<Invocation>();
        assert_sync::<Invocation>();
        assert_send::<InvocationError>();
        assert_sync::<InvocationError>();
    }
}

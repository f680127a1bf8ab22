//! finplug core: the plugin side of the host/plugin boundary.
//!
//! This crate contains:
//! - Candle value type and native→decimal precision conversion
//! - Envelope decoding (tickers, piped data, call arguments)
//! - The `FunctionArgs` query facade
//! - The error taxonomy with stable wire codes
//! - The host capability trait and an in-process linear-memory host
//! - Notification encoding (stage three strings, call one host function)
//! - Output encoding for the single result channel

pub mod args;
pub mod candle;
pub mod envelope;
pub mod error;
pub mod host;
pub mod notify;
pub mod output;

pub use args::{FunctionArgs, FunctionArgsBuilder};
pub use candle::{Candle, CandleError, ToDecimal};
pub use envelope::TickersData;
pub use error::{EnvelopeError, ErrorKind, PluginError};
pub use host::{FunctionId, Host, HostError, MemoryHandle, MemoryHost};
pub use notify::{schedule_email, schedule_webhook, Notification, NotificationKind};
pub use output::{write_json, write_output, Output, OutputError};

pub use rust_decimal::Decimal;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: decoded envelope types are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Candle<f64>>();
        require_sync::<Candle<f64>>();
        require_send::<Candle<Decimal>>();
        require_sync::<Candle<Decimal>>();
        require_send::<TickersData>();
        require_sync::<TickersData>();
        require_send::<FunctionArgs>();
        require_sync::<FunctionArgs>();
        require_send::<PluginError>();
        require_sync::<PluginError>();
        require_send::<EnvelopeError>();
        require_sync::<EnvelopeError>();
        require_send::<MemoryHost>();
    }

    /// Architecture contract: decoding never needs mutable host access.
    ///
    /// `FunctionArgs::from_host` takes `&H`, so the only host mutations in an
    /// invocation are staging, calling, and writing output.
    #[test]
    fn decoding_borrows_host_immutably() {
        fn _check<H: Host>(host: &H) -> Result<FunctionArgs, EnvelopeError> {
            FunctionArgs::from_host(host)
        }
        let host = MemoryHost::new("{}");
        assert_eq!(_check(&host).unwrap(), FunctionArgs::empty());
    }
}

//! FunctionArgs: the read-only query surface over a decoded envelope.
//!
//! Built once per invocation (see [`crate::envelope`]) and never mutated.
//! Every lookup failure is a [`PluginError`] scoped to that one query; the
//! envelope stays usable afterwards.
//!
//! Note the two codes for a missing label: [`FunctionArgs::candles`] reports
//! `SymbolNotFound` while [`FunctionArgs::ticker`] and the decimal accessors
//! report `TickerNotFound`. Callers match on these codes, so both are kept.

use std::fmt::Display;
use std::str::FromStr;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::candle::Candle;
use crate::envelope::TickersData;
use crate::error::PluginError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionArgs {
    tickers_data: IndexMap<String, TickersData>,
    piped_data: IndexMap<String, String>,
    call_arguments: IndexMap<String, String>,
}

impl FunctionArgs {
    /// An envelope with no tickers, pipes, or call arguments.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> FunctionArgsBuilder {
        FunctionArgsBuilder::default()
    }

    pub(crate) fn from_parts(
        tickers_data: IndexMap<String, TickersData>,
        piped_data: IndexMap<String, String>,
        call_arguments: IndexMap<String, String>,
    ) -> Self {
        Self {
            tickers_data,
            piped_data,
            call_arguments,
        }
    }

    // ── Tickers ──────────────────────────────────────────────────────

    /// Ticker labels in the order the envelope listed them.
    pub fn labels(&self) -> Vec<&str> {
        self.tickers_data.keys().map(String::as_str).collect()
    }

    /// Total number of candles across all tickers.
    pub fn candle_count(&self) -> usize {
        self.tickers_data.values().map(TickersData::len).sum()
    }

    pub fn candles(&self, label: &str) -> Result<&[Candle<f64>], PluginError> {
        self.tickers_data
            .get(label)
            .map(TickersData::candles)
            .ok_or_else(|| PluginError::SymbolNotFound(label.to_string()))
    }

    /// Lazy form of [`Self::candles`]. A missing label fails here, not on first pull.
    pub fn candles_iter(
        &self,
        label: &str,
    ) -> Result<std::slice::Iter<'_, Candle<f64>>, PluginError> {
        Ok(self.candles(label)?.iter())
    }

    pub fn ticker(&self, label: &str) -> Result<&TickersData, PluginError> {
        self.tickers_data
            .get(label)
            .ok_or_else(|| PluginError::TickerNotFound(label.to_string()))
    }

    /// Candles as decimals, at the ticker's own precision.
    pub fn candles_decimal(&self, label: &str) -> Result<Vec<Candle<Decimal>>, PluginError> {
        Ok(self.ticker(label)?.candles_decimal())
    }

    /// Lazy form of [`Self::candles_decimal`]. A missing label fails here.
    pub fn candles_decimal_iter(
        &self,
        label: &str,
    ) -> Result<impl Iterator<Item = Candle<Decimal>> + '_, PluginError> {
        Ok(self.ticker(label)?.candles_decimal_iter())
    }

    // ── Pipes ────────────────────────────────────────────────────────

    pub fn pipe_sources(&self) -> Vec<&str> {
        self.piped_data.keys().map(String::as_str).collect()
    }

    pub fn data_from_pipe(&self, source: &str) -> Result<&str, PluginError> {
        self.piped_data
            .get(source)
            .map(String::as_str)
            .ok_or_else(|| PluginError::SourceNotFound(source.to_string()))
    }

    // ── Call arguments ───────────────────────────────────────────────

    pub fn call_arguments(&self) -> &IndexMap<String, String> {
        &self.call_arguments
    }

    /// The raw argument text.
    pub fn call_argument(&self, key: &str) -> Result<&str, PluginError> {
        self.call_arguments
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| PluginError::CallArgumentNotFound(key.to_string()))
    }

    /// Run `parser` over the argument text. Any parser failure becomes
    /// `CallArgumentParse`; the parser's own error is only logged.
    pub fn call_argument_with<T, E, F>(&self, key: &str, parser: F) -> Result<T, PluginError>
    where
        F: FnOnce(&str) -> Result<T, E>,
        E: Display,
    {
        let raw = self.call_argument(key)?;
        parser(raw).map_err(|e| {
            debug!(key, error = %e, "call argument parse failed");
            PluginError::CallArgumentParse(key.to_string())
        })
    }

    /// Parse the argument with [`str::parse`].
    pub fn call_argument_parsed<T>(&self, key: &str) -> Result<T, PluginError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.call_argument_with(key, str::parse::<T>)
    }

    /// Deserialize the argument into `T`.
    ///
    /// The text is read as JSON first, so `"42"` yields an integer and
    /// `"[1, 2]"` a vector. Text that is not JSON (or does not fit `T`) is
    /// retried as a plain JSON string, which lets `String` targets receive
    /// any argument verbatim.
    pub fn call_argument_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, PluginError> {
        self.call_argument_with(key, |raw| {
            serde_json::from_str::<T>(raw)
                .or_else(|_| serde_json::from_value::<T>(Value::String(raw.to_string())))
        })
    }
}

/// Assembles a [`FunctionArgs`] without going through JSON.
#[derive(Debug, Default)]
pub struct FunctionArgsBuilder {
    args: FunctionArgs,
}

impl FunctionArgsBuilder {
    pub fn ticker(mut self, label: impl Into<String>, data: TickersData) -> Self {
        self.args.tickers_data.insert(label.into(), data);
        self
    }

    pub fn pipe(mut self, source: impl Into<String>, data: impl Into<String>) -> Self {
        self.args.piped_data.insert(source.into(), data.into());
        self
    }

    pub fn call_argument(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.call_arguments.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> FunctionArgs {
        self.args
    }
}

//! Envelope decoding: host input JSON to [`FunctionArgs`].
//!
//! ```json
//! {
//!   "tickers_data": { "<label>": { "symbol": "..", "exchange": "..", "precision": 2,
//!                                  "candles": [[ts, o, h, l, c, v], ...] } },
//!   "piped_data": { "<source>": "<string>" },
//!   "call_arguments": { "<key>": "<string>" }
//! }
//! ```
//!
//! All three top-level keys are optional (absent or `null` means empty) and
//! unknown keys are ignored. Decoding is all-or-nothing: one malformed candle
//! rejects the whole envelope.
//!
//! Key order is kept as written, so `labels()` and `pipe_sources()` list
//! entries in source order.
//!
//! Piped data and call arguments are coerced to strings: JSON strings are
//! taken verbatim, any other value is kept as its compact JSON text.

use std::str::FromStr;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::args::FunctionArgs;
use crate::candle::Candle;
use crate::error::EnvelopeError;
use crate::host::Host;

/// Everything the host delivered about one labelled ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickersData {
    pub symbol: String,
    pub exchange: String,
    /// In source order.
    pub candles: Vec<Candle<f64>>,
    /// Fractional digits used when converting candles to decimal.
    pub precision: u32,
}

impl TickersData {
    pub fn new(
        symbol: impl Into<String>,
        exchange: impl Into<String>,
        precision: u32,
        candles: Vec<Candle<f64>>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            exchange: exchange.into(),
            candles,
            precision,
        }
    }

    pub fn candles(&self) -> &[Candle<f64>] {
        &self.candles
    }

    pub fn candles_iter(&self) -> std::slice::Iter<'_, Candle<f64>> {
        self.candles.iter()
    }

    /// Candles converted lazily at this ticker's precision.
    pub fn candles_decimal_iter(&self) -> impl Iterator<Item = Candle<Decimal>> + '_ {
        let precision = self.precision;
        self.candles.iter().map(move |c| c.to_decimal(precision))
    }

    pub fn candles_decimal(&self) -> Vec<Candle<Decimal>> {
        self.candles_decimal_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle<f64>> {
        self.candles.last()
    }
}

// ── Wire shape ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default, deserialize_with = "nullable_map")]
    tickers_data: IndexMap<String, TickersData>,
    #[serde(default, deserialize_with = "string_map")]
    piped_data: IndexMap<String, String>,
    #[serde(default, deserialize_with = "string_map")]
    call_arguments: IndexMap<String, String>,
}

fn nullable_map<'de, D, V>(deserializer: D) -> Result<IndexMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    Ok(Option::<IndexMap<String, V>>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_map<'de, D>(deserializer: D) -> Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: IndexMap<String, Value> = nullable_map(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| (k, coerce_to_string(v)))
        .collect())
}

fn coerce_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl From<RawEnvelope> for FunctionArgs {
    fn from(raw: RawEnvelope) -> Self {
        FunctionArgs::from_parts(raw.tickers_data, raw.piped_data, raw.call_arguments)
    }
}

// ── Constructors ─────────────────────────────────────────────────────

impl FunctionArgs {
    /// Decode an already-parsed JSON tree.
    pub fn from_json(value: Value) -> Result<Self, EnvelopeError> {
        let raw: RawEnvelope = serde_json::from_value(value).map_err(EnvelopeError::Shape)?;
        Ok(Self::decoded(raw))
    }

    /// Decode JSON text. Invalid JSON is reported as [`EnvelopeError::Syntax`].
    pub fn from_json_str(input: &str) -> Result<Self, EnvelopeError> {
        let raw: RawEnvelope = serde_json::from_str(input).map_err(EnvelopeError::from_json)?;
        Ok(Self::decoded(raw))
    }

    pub fn from_slice(input: &[u8]) -> Result<Self, EnvelopeError> {
        let raw: RawEnvelope = serde_json::from_slice(input).map_err(EnvelopeError::from_json)?;
        Ok(Self::decoded(raw))
    }

    /// Read the invocation input from the host and decode it.
    pub fn from_host<H: Host + ?Sized>(host: &H) -> Result<Self, EnvelopeError> {
        let input = host.read_input()?;
        Self::from_json_str(&input)
    }

    fn decoded(raw: RawEnvelope) -> Self {
        let args = Self::from(raw);
        debug!(
            tickers = args.labels().len(),
            candles = args.candle_count(),
            pipes = args.pipe_sources().len(),
            call_arguments = args.call_arguments().len(),
            "decoded envelope"
        );
        args
    }
}

impl FromStr for FunctionArgs {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_json_str(s)
    }
}

impl TryFrom<Value> for FunctionArgs {
    type Error = EnvelopeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(value)
    }
}

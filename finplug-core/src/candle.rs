//! Candle: one OHLCV bar, generic over its numeric representation.
//!
//! The wire form is a fixed 6-element array
//! `[timestamp, open, high, low, close, volume]`. A candle is a pure data
//! carrier: OHLC relationships are not validated.
//!
//! Native candles (`Candle<f64>`) convert into `Candle<Decimal>` at a given
//! number of fractional digits. Rounding is half away from zero and the
//! result carries exactly `precision` fractional digits, so `1.5` at
//! precision 2 becomes `1.50`. Values too wide for that many digits keep as
//! many as the 96-bit mantissa holds.
//!
//! On the wire the timestamp may be a JSON integer or an integral float
//! such as `1000.0` or `1.7e12`.

use std::fmt;
use std::marker::PhantomData;

use rust_decimal::prelude::*;
use serde::de::{self, IgnoredAny, SeqAccess, Unexpected, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Number of elements in the wire form of a candle.
pub const CANDLE_FIELDS: usize = 6;

/// Largest scale a `rust_decimal::Decimal` can carry.
pub const MAX_DECIMAL_PRECISION: u32 = 28;

/// One OHLCV bar.
///
/// `timestamp` is passed through untouched; whether it counts seconds or
/// milliseconds is a contract between the host and the plugin author.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle<T> {
    pub timestamp: i64,
    pub open: T,
    pub high: T,
    pub low: T,
    pub close: T,
    pub volume: T,
}

/// Errors building a candle from an untyped sequence.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandleError {
    #[error("candle must have exactly 6 elements, got {0}")]
    Length(usize),

    #[error("candle timestamp must be an integral number, got {0}")]
    Timestamp(f64),
}

impl<T> Candle<T> {
    pub fn new(timestamp: i64, open: T, high: T, low: T, close: T, volume: T) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Apply `f` to each of the five numeric fields, keeping the timestamp.
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> Candle<U> {
        Candle {
            timestamp: self.timestamp,
            open: f(&self.open),
            high: f(&self.high),
            low: f(&self.low),
            close: f(&self.close),
            volume: f(&self.volume),
        }
    }
}

impl<T: ToDecimal> Candle<T> {
    /// Convert every numeric field to a decimal with `precision` fractional digits.
    pub fn to_decimal(&self, precision: u32) -> Candle<Decimal> {
        self.map(|v| v.to_decimal(precision))
    }
}

impl Candle<f64> {
    /// Build a candle from `[timestamp, open, high, low, close, volume]`.
    pub fn from_sequence(seq: &[f64]) -> Result<Self, CandleError> {
        let [ts, open, high, low, close, volume] = <[f64; CANDLE_FIELDS]>::try_from(seq)
            .map_err(|_| CandleError::Length(seq.len()))?;

        let timestamp = timestamp_from_f64(ts)?;
        Ok(Self::new(timestamp, open, high, low, close, volume))
    }

    /// Read the candle back as `[timestamp, open, high, low, close, volume]`.
    pub fn to_array(&self) -> [f64; CANDLE_FIELDS] {
        [
            self.timestamp as f64,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
        ]
    }
}

/// Integral floats inside the `i64` range. `i64::MAX as f64` is 2^63, one
/// past the largest `i64`, so the upper bound is exclusive.
fn timestamp_from_f64(ts: f64) -> Result<i64, CandleError> {
    if ts.is_finite() && ts.fract() == 0.0 && ts >= i64::MIN as f64 && ts < i64::MAX as f64 {
        Ok(ts as i64)
    } else {
        Err(CandleError::Timestamp(ts))
    }
}

// ── Decimal conversion ───────────────────────────────────────────────

/// Numeric representations that can be rounded into a `Decimal`.
pub trait ToDecimal {
    fn to_decimal(&self, precision: u32) -> Decimal;
}

/// Round half away from zero, then pin the scale to exactly `precision`.
fn round_to_precision(value: Decimal, precision: u32) -> Decimal {
    let precision = precision.min(MAX_DECIMAL_PRECISION);
    let mut rounded =
        value.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero);
    // Pads trailing zeros. When value and padding exceed the 96-bit mantissa,
    // rescale settles on the largest scale that fits and the value is kept.
    rounded.rescale(precision);
    rounded
}

impl ToDecimal for f64 {
    fn to_decimal(&self, precision: u32) -> Decimal {
        let value = match Decimal::from_f64(*self) {
            Some(d) => d,
            None if self.is_nan() => Decimal::ZERO,
            None if self.is_sign_negative() => Decimal::MIN,
            None => Decimal::MAX,
        };
        round_to_precision(value, precision)
    }
}

impl ToDecimal for f32 {
    fn to_decimal(&self, precision: u32) -> Decimal {
        f64::from(*self).to_decimal(precision)
    }
}

impl ToDecimal for i64 {
    fn to_decimal(&self, precision: u32) -> Decimal {
        round_to_precision(Decimal::from(*self), precision)
    }
}

impl ToDecimal for Decimal {
    fn to_decimal(&self, precision: u32) -> Decimal {
        round_to_precision(*self, precision)
    }
}

// ── Wire form ────────────────────────────────────────────────────────

impl<T: Serialize> Serialize for Candle<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(CANDLE_FIELDS)?;
        tup.serialize_element(&self.timestamp)?;
        tup.serialize_element(&self.open)?;
        tup.serialize_element(&self.high)?;
        tup.serialize_element(&self.low)?;
        tup.serialize_element(&self.close)?;
        tup.serialize_element(&self.volume)?;
        tup.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Candle<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(CandleVisitor(PhantomData))
    }
}

/// Timestamp element of the wire array: a JSON integer or an integral float.
struct WireTimestamp(i64);

impl<'de> Deserialize<'de> for WireTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TimestampVisitor).map(WireTimestamp)
    }
}

struct TimestampVisitor;

impl<'de> Visitor<'de> for TimestampVisitor {
    type Value = i64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an integral timestamp")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
        Ok(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
        i64::try_from(v).map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
        timestamp_from_f64(v).map_err(|_| E::invalid_value(Unexpected::Float(v), &self))
    }
}

struct CandleVisitor<T>(PhantomData<T>);

impl<T> CandleVisitor<T> {
    fn field<'de, A, V>(&self, seq: &mut A, index: usize) -> Result<V, A::Error>
    where
        T: Deserialize<'de>,
        A: SeqAccess<'de>,
        V: Deserialize<'de>,
    {
        seq.next_element()?
            .ok_or_else(|| de::Error::invalid_length(index, self))
    }
}

impl<'de, T: Deserialize<'de>> Visitor<'de> for CandleVisitor<T> {
    type Value = Candle<T>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array [timestamp, open, high, low, close, volume]")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Candle<T>, A::Error> {
        let WireTimestamp(timestamp) = self.field(&mut seq, 0)?;
        let open = self.field(&mut seq, 1)?;
        let high = self.field(&mut seq, 2)?;
        let low = self.field(&mut seq, 3)?;
        let close = self.field(&mut seq, 4)?;
        let volume = self.field(&mut seq, 5)?;

        let mut len = CANDLE_FIELDS;
        while seq.next_element::<IgnoredAny>()?.is_some() {
            len += 1;
        }
        if len != CANDLE_FIELDS {
            return Err(de::Error::invalid_length(len, &self));
        }

        Ok(Candle::new(timestamp, open, high, low, close, volume))
    }
}

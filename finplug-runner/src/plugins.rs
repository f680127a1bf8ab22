//! Reference plugins written against the public plugin API.
//!
//! - `summary`: what the envelope contains, one entry per label
//! - `alerts`: schedule notifications for labels closing above a threshold

use std::fmt;
use std::str::FromStr;

use anyhow::Context;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use finplug_core::{
    schedule_email, schedule_webhook, FunctionArgs, Host, Output, ToDecimal,
};

use crate::config::OutputConfig;
use crate::harness::InvocationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plugin {
    Summary,
    Alerts,
}

impl Plugin {
    pub const ALL: [Plugin; 2] = [Plugin::Summary, Plugin::Alerts];

    pub fn name(&self) -> &'static str {
        match self {
            Plugin::Summary => "summary",
            Plugin::Alerts => "alerts",
        }
    }

    pub fn run<H: Host + ?Sized>(
        &self,
        args: &FunctionArgs,
        host: &mut H,
        output: &OutputConfig,
    ) -> Result<Output, InvocationError> {
        match self {
            Plugin::Summary => summary(args, output),
            Plugin::Alerts => alerts(args, host, output),
        }
    }
}

impl fmt::Display for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Plugin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Plugin::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| format!("unknown plugin '{s}' (expected summary or alerts)"))
    }
}

fn render<T: Serialize>(value: &T, config: &OutputConfig) -> Result<Output, InvocationError> {
    let output = if config.pretty {
        Output::json_pretty(value)?
    } else {
        Output::json(value)?
    };
    Ok(output)
}

// ── summary ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct TickerSummary<'a> {
    pub symbol: &'a str,
    pub exchange: &'a str,
    pub candles: usize,
    /// Close of the most recent candle at the ticker's precision.
    pub last_close: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EnvelopeSummary<'a> {
    pub tickers: IndexMap<&'a str, TickerSummary<'a>>,
    pub pipe_sources: Vec<&'a str>,
    pub call_arguments: &'a IndexMap<String, String>,
}

pub fn summarize(args: &FunctionArgs) -> Result<EnvelopeSummary<'_>, InvocationError> {
    let mut tickers = IndexMap::new();
    for label in args.labels() {
        let ticker = args.ticker(label)?;
        let last_close = ticker
            .last()
            .map(|c| c.close.to_decimal(ticker.precision).to_string());
        tickers.insert(
            label,
            TickerSummary {
                symbol: &ticker.symbol,
                exchange: &ticker.exchange,
                candles: ticker.len(),
                last_close,
            },
        );
    }
    Ok(EnvelopeSummary {
        tickers,
        pipe_sources: args.pipe_sources(),
        call_arguments: args.call_arguments(),
    })
}

pub fn summary(args: &FunctionArgs, config: &OutputConfig) -> Result<Output, InvocationError> {
    render(&summarize(args)?, config)
}

// ── alerts ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AlertBody<'a> {
    label: &'a str,
    symbol: &'a str,
    exchange: &'a str,
    close: String,
    threshold: f64,
}

#[derive(Debug, Serialize)]
pub struct AlertReport<'a> {
    pub threshold: f64,
    pub alerted: Vec<&'a str>,
}

/// Notify for every label whose last close is strictly above `threshold`.
///
/// Call arguments: `threshold` (required, number), `webhook` and `email`
/// (optional destinations). Labels without candles never alert.
pub fn alerts<H: Host + ?Sized>(
    args: &FunctionArgs,
    host: &mut H,
    config: &OutputConfig,
) -> Result<Output, InvocationError> {
    let threshold: f64 = args.call_argument_as("threshold")?;
    let webhook = args.call_arguments().get("webhook");
    let email = args.call_arguments().get("email");

    let mut alerted = Vec::new();
    for label in args.labels() {
        let ticker = args.ticker(label)?;
        let Some(last) = ticker.last() else {
            continue;
        };
        if last.close <= threshold {
            continue;
        }

        let body = serde_json::to_string(&AlertBody {
            label,
            symbol: &ticker.symbol,
            exchange: &ticker.exchange,
            close: last.close.to_decimal(ticker.precision).to_string(),
            threshold,
        })
        .context("serialize alert body")?;

        if let Some(path) = webhook {
            schedule_webhook(host, path, &body)?;
        }
        if let Some(to) = email {
            schedule_email(host, to, &body)?;
        }
        debug!(label, close = last.close, "alert raised");
        alerted.push(label);
    }

    render(&AlertReport { threshold, alerted }, config)
}

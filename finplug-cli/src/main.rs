//! finplug CLI: inspect envelopes and run plugins against a simulated host.
//!
//! Commands:
//! - `inspect`: decode an envelope and print what it contains
//! - `candles`: dump one label's candles as JSON or CSV, native or decimal
//! - `notify`: register one notification with a configured host
//! - `run`: full harness invocation of a reference plugin
//!
//! Envelope paths accept `-` for stdin. Logs go to stderr; `RUST_LOG`
//! overrides `-v`.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::fmt::Display;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use finplug_core::host::HostOutput;
use finplug_core::{Candle, FunctionArgs, Notification, NotificationKind};
use finplug_runner::{invoke, summarize, HarnessConfig, Plugin};

#[derive(Parser)]
#[command(
    name = "finplug",
    about = "finplug CLI: inspect envelopes and run plugins against a simulated host"
)]
struct Cli {
    /// Raise the log level (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode an envelope and print a per-label summary.
    Inspect {
        /// Envelope JSON file, or `-` for stdin.
        envelope: PathBuf,
    },
    /// Print the candles of one label.
    Candles {
        /// Envelope JSON file, or `-` for stdin.
        envelope: PathBuf,

        /// Ticker label in the envelope.
        #[arg(long)]
        label: String,

        /// Convert to decimal at the ticker's precision.
        #[arg(long, default_value_t = false)]
        decimal: bool,

        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
    /// Register one notification with a simulated host and print what it recorded.
    Notify {
        /// webhook or email.
        #[arg(long, value_parser = parse_kind)]
        kind: NotificationKind,

        /// Webhook path or email address.
        #[arg(long)]
        target: String,

        #[arg(long, default_value = "")]
        body: String,

        /// Harness config TOML. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run a reference plugin through the invocation harness.
    Run {
        /// Envelope JSON file, or `-` for stdin.
        envelope: PathBuf,

        /// summary or alerts.
        #[arg(long, default_value = "summary")]
        plugin: Plugin,

        /// Harness config TOML. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Csv,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Inspect { envelope } => run_inspect(&envelope),
        Commands::Candles {
            envelope,
            label,
            decimal,
            format,
        } => run_candles(&envelope, &label, decimal, format),
        Commands::Notify {
            kind,
            target,
            body,
            config,
        } => run_notify(kind, &target, &body, config.as_deref()),
        Commands::Run {
            envelope,
            plugin,
            config,
        } => run_plugin(&envelope, plugin, config.as_deref()),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}

fn parse_kind(s: &str) -> Result<NotificationKind, String> {
    NotificationKind::parse(s).ok_or_else(|| format!("unknown notification kind '{s}'"))
}

fn read_envelope(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("read envelope from stdin")?;
        return Ok(input);
    }
    std::fs::read_to_string(path).with_context(|| format!("read envelope {}", path.display()))
}

fn decode(path: &Path) -> Result<FunctionArgs> {
    let input = read_envelope(path)?;
    FunctionArgs::from_json_str(&input).with_context(|| format!("decode envelope {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<HarnessConfig> {
    match path {
        Some(p) => Ok(HarnessConfig::from_file(p)?),
        None => Ok(HarnessConfig::default()),
    }
}

fn run_inspect(path: &Path) -> Result<()> {
    let args = decode(path)?;
    let summary = summarize(&args)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_candles(path: &Path, label: &str, decimal: bool, format: Format) -> Result<()> {
    let args = decode(path)?;
    let ticker = args.ticker(label)?;
    debug!(label, candles = ticker.len(), precision = ticker.precision, "dumping candles");

    match (format, decimal) {
        (Format::Json, false) => println!("{}", serde_json::to_string_pretty(ticker.candles())?),
        (Format::Json, true) => {
            println!("{}", serde_json::to_string_pretty(&ticker.candles_decimal())?)
        }
        (Format::Csv, false) => write_csv(ticker.candles_iter().copied())?,
        (Format::Csv, true) => write_csv(ticker.candles_decimal_iter())?,
    }
    Ok(())
}

fn write_csv<T: Display>(candles: impl Iterator<Item = Candle<T>>) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(std::io::stdout().lock());
    wtr.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
    for candle in candles {
        let c = candle.map(|v| v.to_string());
        wtr.write_record([
            &candle.timestamp.to_string(),
            &c.open,
            &c.high,
            &c.low,
            &c.close,
            &c.volume,
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn run_notify(
    kind: NotificationKind,
    target: &str,
    body: &str,
    config: Option<&Path>,
) -> Result<()> {
    let config = load_config(config)?;
    let mut host = config.host.build_host("{}");

    if let Err(err) = Notification::new(kind, target, body).register(&mut host) {
        eprintln!("Error: {err}");
        std::process::exit(err.code());
    }

    println!("{}", serde_json::to_string_pretty(host.notifications())?);
    Ok(())
}

fn run_plugin(path: &Path, plugin: Plugin, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let input = read_envelope(path)?;
    let mut host = config.host.build_host(input);

    let invocation = invoke(&mut host, |args, host| plugin.run(args, host, &config.output));
    info!(
        plugin = %plugin,
        code = invocation.code,
        digest = invocation.envelope_digest.as_deref().unwrap_or("-"),
        "invocation finished"
    );

    match host.output() {
        Some(HostOutput::Text(text)) => println!("{text}"),
        Some(HostOutput::Bytes(bytes)) => std::io::stdout().write_all(bytes)?,
        None => {}
    }
    for n in host.notifications() {
        eprintln!("notification {} -> {}: {}", n.kind, n.target, n.body);
    }

    if !invocation.is_success() {
        std::process::exit(invocation.code);
    }
    Ok(())
}

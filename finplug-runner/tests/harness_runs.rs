//! Full harness runs: config file → simulated host → plugin → return code.

use std::io::Write;

use finplug_core::host::HostOutput;
use finplug_runner::{invoke, ErrorPayload, HarnessConfig, Plugin, GENERIC_ERROR_CODE};
use serde_json::{json, Value};

fn envelope(call_arguments: Value) -> String {
    json!({
        "tickers_data": {
            "BTCUSD": {
                "symbol": "BTCUSD", "exchange": "X", "precision": 2,
                "candles": [[1000, 1, 2, 0.5, 1.5, 100], [2000, 1.5, 3, 1, 2.25, 50]]
            },
            "ETHUSD": {
                "symbol": "ETHUSD", "exchange": "X", "precision": 4,
                "candles": [[1000, 1, 1.1, 0.9, 1.05, 10]]
            }
        },
        "call_arguments": call_arguments
    })
    .to_string()
}

fn write_config(toml: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(toml.as_bytes()).unwrap();
    file
}

fn output_json(output: Option<&HostOutput>) -> Value {
    match output {
        Some(HostOutput::Text(s)) => serde_json::from_str(s).unwrap(),
        other => panic!("expected text output, got {other:?}"),
    }
}

#[test]
fn summary_run_with_default_config() {
    let config = HarnessConfig::default();
    let mut host = config.host.build_host(envelope(json!({})));

    let inv = invoke(&mut host, |args, host| {
        Plugin::Summary.run(args, host, &config.output)
    });

    assert!(inv.is_success());
    let out = output_json(host.output());
    assert_eq!(out["tickers"]["BTCUSD"]["last_close"], "2.25");
    assert_eq!(out["tickers"]["ETHUSD"]["last_close"], "1.0500");
    assert!(host.notifications().is_empty());
}

#[test]
fn alerts_run_schedules_both_channels() {
    let config = HarnessConfig::default();
    let mut host = config.host.build_host(envelope(json!({
        "threshold": 2,
        "webhook": "/hooks/price",
        "email": "ops@example.com"
    })));

    let inv = invoke(&mut host, |args, host| Plugin::Alerts.run(args, host, &config.output));

    assert!(inv.is_success());
    assert_eq!(output_json(host.output())["alerted"], json!(["BTCUSD"]));
    let kinds: Vec<_> = host.notifications().iter().map(|n| n.kind.as_str()).collect();
    assert_eq!(kinds, ["webhook", "email"]);
    assert_eq!(host.live_allocations(), 0);
}

#[test]
fn configured_fault_surfaces_as_email_code() {
    let file = write_config(
        r#"
        [host.faults]
        fail_allocation_at = 2
        "#,
    );
    let config = HarnessConfig::from_file(file.path()).unwrap();
    let mut host = config.host.build_host(envelope(json!({
        "threshold": "2",
        "email": "ops@example.com"
    })));

    let inv = invoke(&mut host, |args, host| Plugin::Alerts.run(args, host, &config.output));

    assert_eq!(inv.code, 7);
    let payload: ErrorPayload = serde_json::from_value(output_json(host.output())).unwrap();
    assert_eq!(payload.code, 7);
    assert_eq!(payload.error, "Failed to schedule email to ops@example.com");
    assert_eq!(host.live_allocations(), 0);
}

#[test]
fn host_without_notification_support_is_webhook_code() {
    let file = write_config("[host]\nfunctions = []\n");
    let config = HarnessConfig::from_file(file.path()).unwrap();
    let mut host = config.host.build_host(envelope(json!({
        "threshold": "0",
        "webhook": "/hooks/price"
    })));

    let inv = invoke(&mut host, |args, host| Plugin::Alerts.run(args, host, &config.output));
    assert_eq!(inv.code, 6);
}

#[test]
fn missing_threshold_is_code_four() {
    let config = HarnessConfig::default();
    let mut host = config.host.build_host(envelope(json!({})));
    let inv = invoke(&mut host, |args, host| Plugin::Alerts.run(args, host, &config.output));
    assert_eq!(inv.code, 4);
}

#[test]
fn malformed_envelope_is_generic_code() {
    let config = HarnessConfig::default();
    let mut host = config.host.build_host(
        json!({ "tickers_data": { "X": {
            "symbol": "X", "exchange": "X", "precision": 2, "candles": [[1, 2, 3]]
        }}})
        .to_string(),
    );
    let inv = invoke(&mut host, |args, host| Plugin::Summary.run(args, host, &config.output));
    assert_eq!(inv.code, GENERIC_ERROR_CODE);
    assert_eq!(output_json(host.output())["code"], -1);
}

#[test]
fn same_input_same_digest() {
    let config = HarnessConfig::default();
    let input = envelope(json!({}));
    let digests: Vec<_> = (0..2)
        .map(|_| {
            let mut host = config.host.build_host(input.clone());
            invoke(&mut host, |args, host| Plugin::Summary.run(args, host, &config.output))
                .envelope_digest
        })
        .collect();
    assert!(digests[0].is_some());
    assert_eq!(digests[0], digests[1]);
}

mod properties {
    use super::*;
    use finplug_core::{ErrorKind, PluginError};
    use proptest::prelude::*;

    fn arb_plugin_error() -> impl Strategy<Value = PluginError> {
        ("[a-z]{1,8}", 0usize..7).prop_map(|(name, i)| match i {
            0 => PluginError::SymbolNotFound(name),
            1 => PluginError::SourceNotFound(name),
            2 => PluginError::TickerNotFound(name),
            3 => PluginError::CallArgumentNotFound(name),
            4 => PluginError::CallArgumentParse(name),
            5 => PluginError::Webhook(name),
            _ => PluginError::Email(name),
        })
    }

    proptest! {
        #[test]
        fn plugin_errors_round_trip_through_the_harness(err in arb_plugin_error()) {
            let mut host = HarnessConfig::default().host.build_host("{}");
            let expected = ErrorPayload { error: err.to_string(), code: err.code() };

            let inv = invoke(&mut host, |_, _| Err(err.into()));

            prop_assert_eq!(inv.code, expected.code);
            prop_assert!(ErrorKind::from_code(inv.code).is_some());
            let payload: ErrorPayload = serde_json::from_value(output_json(host.output())).unwrap();
            prop_assert_eq!(payload, expected);
        }
    }
}

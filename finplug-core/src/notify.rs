//! Notification encoder: ask the host to deliver a webhook or an email.
//!
//! Registering a notification is a three-step protocol against the host:
//!
//! 1. resolve the `add_notification` host function,
//! 2. stage the kind literal, the target, and the body into host memory,
//! 3. call the function with the three handle offsets, in that order.
//!
//! Delivery happens on the host side after the invocation; this layer only
//! produces the request. Any failure along the way surfaces as
//! `PluginError::Webhook` or `PluginError::Email`; the host's own error is
//! logged and dropped.
//!
//! Staged buffers belong to the plugin until the host accepts the call. If
//! the protocol stops early, [`Staging`] releases whatever it staged.

use std::fmt;

use tracing::{debug, warn};

use crate::error::PluginError;
use crate::host::{FunctionId, Host, HostError, MemoryHandle};

/// Name of the single host function this layer calls.
pub const ADD_NOTIFICATION_FN: &str = "add_notification";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Webhook,
    Email,
}

impl NotificationKind {
    /// Wire literal passed as the first host argument.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Webhook => "webhook",
            NotificationKind::Email => "email",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webhook" => Some(NotificationKind::Webhook),
            "email" => Some(NotificationKind::Email),
            _ => None,
        }
    }

    fn error(&self, target: &str) -> PluginError {
        match self {
            NotificationKind::Webhook => PluginError::Webhook(target.to_string()),
            NotificationKind::Email => PluginError::Email(target.to_string()),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One notification request, ready to be registered with a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification<'a> {
    pub kind: NotificationKind,
    pub target: &'a str,
    pub body: &'a str,
}

impl<'a> Notification<'a> {
    pub fn new(kind: NotificationKind, target: &'a str, body: &'a str) -> Self {
        Self { kind, target, body }
    }

    pub fn webhook(path: &'a str, body: &'a str) -> Self {
        Self::new(NotificationKind::Webhook, path, body)
    }

    pub fn email(target: &'a str, body: &'a str) -> Self {
        Self::new(NotificationKind::Email, target, body)
    }

    /// Register this notification. Exactly one host-side registration per `Ok`.
    pub fn register<H: Host + ?Sized>(&self, host: &mut H) -> Result<(), PluginError> {
        self.try_register(host).map_err(|cause| {
            warn!(
                kind = %self.kind,
                destination = self.target,
                error = %cause,
                "notification registration failed"
            );
            self.kind.error(self.target)
        })
    }

    fn try_register<H: Host + ?Sized>(&self, host: &mut H) -> Result<(), HostError> {
        let function = host.lookup(ADD_NOTIFICATION_FN)?;

        let mut staging = Staging::new(host);
        staging.stage(self.kind.as_str())?;
        staging.stage(self.target)?;
        staging.stage(self.body)?;
        staging.invoke(function)
    }
}

/// Strings staged into host memory for a single host call.
///
/// Dropping a `Staging` that has not been handed over frees every buffer it
/// staged, so a failed allocation or a failed call leaks nothing.
pub struct Staging<'h, H: Host + ?Sized> {
    host: &'h mut H,
    handles: Vec<MemoryHandle>,
    handed_over: bool,
}

impl<'h, H: Host + ?Sized> Staging<'h, H> {
    pub fn new(host: &'h mut H) -> Self {
        Self {
            host,
            handles: Vec::with_capacity(3),
            handed_over: false,
        }
    }

    pub fn stage(&mut self, s: &str) -> Result<MemoryHandle, HostError> {
        let handle = self.host.allocate_str(s)?;
        debug!(offset = handle.offset(), len = handle.len(), "staged string");
        self.handles.push(handle);
        Ok(handle)
    }

    pub fn handles(&self) -> &[MemoryHandle] {
        &self.handles
    }

    /// Call `function` with every staged offset, in staging order.
    /// On success the host owns the buffers.
    pub fn invoke(mut self, function: FunctionId) -> Result<(), HostError> {
        let args: Vec<u64> = self.handles.iter().map(MemoryHandle::offset).collect();
        self.host.call(function, &args)?;
        self.handed_over = true;
        Ok(())
    }
}

impl<H: Host + ?Sized> Drop for Staging<'_, H> {
    fn drop(&mut self) {
        if self.handed_over {
            return;
        }
        for handle in self.handles.drain(..) {
            if let Err(e) = self.host.free(handle) {
                warn!(offset = handle.offset(), error = %e, "could not release staged buffer");
            }
        }
    }
}

/// Ask the host to POST `body` to `path` after the invocation.
pub fn schedule_webhook<H: Host + ?Sized>(
    host: &mut H,
    path: &str,
    body: &str,
) -> Result<(), PluginError> {
    Notification::webhook(path, body).register(host)
}

/// Ask the host to email `body` to `target` after the invocation.
pub fn schedule_email<H: Host + ?Sized>(
    host: &mut H,
    target: &str,
    body: &str,
) -> Result<(), PluginError> {
    Notification::email(target, body).register(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{FaultPlan, MemoryHost, NotificationRecord};

    #[test]
    fn webhook_is_registered() {
        let mut host = MemoryHost::new("");
        schedule_webhook(&mut host, "/hooks/price", r#"{"close":1.5}"#).unwrap();

        assert_eq!(
            host.notifications(),
            &[NotificationRecord {
                kind: "webhook".into(),
                target: "/hooks/price".into(),
                body: r#"{"close":1.5}"#.into(),
            }]
        );
        assert_eq!(host.live_allocations(), 0);
    }

    #[test]
    fn handles_are_passed_kind_target_body() {
        let mut host = MemoryHost::new("");
        schedule_email(&mut host, "a@b.com", "hi").unwrap();

        let call = &host.calls()[0];
        assert_eq!(call.function, ADD_NOTIFICATION_FN);
        assert_eq!(call.args.len(), 3);
        assert!(call.args[0] < call.args[1] && call.args[1] < call.args[2]);
    }

    #[test]
    fn second_staging_failure_is_email_error() {
        let mut host = MemoryHost::new("").with_faults(FaultPlan {
            fail_allocation_at: Some(2),
            fail_calls: false,
        });
        let err = schedule_email(&mut host, "a@b.com", "hi").unwrap_err();

        assert_eq!(err, PluginError::Email("a@b.com".into()));
        assert_eq!(err.code(), 7);
        assert_eq!(host.live_allocations(), 0);
        assert!(host.calls().is_empty());
    }

    #[test]
    fn missing_host_function_is_webhook_error() {
        let mut host = MemoryHost::new("").with_functions(Vec::<String>::new());
        let err = schedule_webhook(&mut host, "/x", "{}").unwrap_err();
        assert_eq!(err.code(), 6);
        assert_eq!(host.memory_used(), 0);
    }

    #[test]
    fn failed_call_releases_all_three_buffers() {
        let mut host = MemoryHost::new("").with_faults(FaultPlan {
            fail_allocation_at: None,
            fail_calls: true,
        });
        let err = schedule_webhook(&mut host, "/x", "{}").unwrap_err();
        assert_eq!(err, PluginError::Webhook("/x".into()));
        assert_eq!(host.calls().len(), 1);
        assert_eq!(host.live_allocations(), 0);
        assert!(host.notifications().is_empty());
    }

    #[test]
    fn out_of_memory_is_reported_as_taxonomy_error() {
        let mut host = MemoryHost::new("").with_memory_limit(10);
        let err = schedule_webhook(&mut host, "/hooks", "a body that will not fit").unwrap_err();
        assert_eq!(err.code(), 6);
        assert_eq!(host.live_allocations(), 0);
    }

    #[test]
    fn kind_literals() {
        assert_eq!(NotificationKind::Webhook.as_str(), "webhook");
        assert_eq!(NotificationKind::Email.to_string(), "email");
        assert_eq!(NotificationKind::parse(" EMAIL "), Some(NotificationKind::Email));
        assert_eq!(NotificationKind::parse("sms"), None);
    }
}

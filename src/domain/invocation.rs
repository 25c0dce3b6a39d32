//! Inbound tool invocations and their option set
//!
//! A ToolInvocation is created when a request message arrives, consumed
//! synchronously by the orchestrator, and discarded after the response is
//! emitted. Credentials ride in CollectOptions and are redacted from Debug
//! output so they never reach logs.

use std::fmt;
use std::time::Duration;

use serde_json::Value;

use crate::config::JobsConfig;
use crate::error::{HarvestrError, Result};

/// The inbound request: tool name plus argument mapping
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Request id from the protocol layer, used for cancellation
    pub request_id: u64,
    /// Requested tool name
    pub tool: String,
    /// Raw argument mapping
    pub args: Value,
}

impl ToolInvocation {
    pub fn new(request_id: u64, tool: &str, args: Value) -> Self {
        Self {
            request_id,
            tool: tool.to_string(),
            args,
        }
    }

    /// Extract the required `targets` argument as a single spec string
    ///
    /// Accepts a string or an array of strings (joined with spaces).
    pub fn targets_spec(&self) -> Result<String> {
        match self.args.get("targets") {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Array(items)) => {
                let mut tokens = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => tokens.push(s.clone()),
                        other => {
                            return Err(HarvestrError::Protocol(format!(
                                "targets array holds non-string entry: {}",
                                other
                            )));
                        }
                    }
                }
                Ok(tokens.join(" "))
            }
            Some(other) => Err(HarvestrError::Protocol(format!(
                "targets must be a string or array of strings, got {}",
                other
            ))),
            None => Err(HarvestrError::Protocol("missing 'targets' argument".to_string())),
        }
    }

    /// Parse the credential and tuning options out of the args
    ///
    /// Options sit flat in the args object next to `targets`; unknown keys
    /// are ignored.
    pub fn collect_options(&self, defaults: &JobsConfig) -> Result<CollectOptions> {
        CollectOptions::from_args(Some(&self.args), defaults)
    }
}

/// Options applied to a whole collection invocation
///
/// One credential set covers every target. Password and hashes are redacted
/// in Debug output.
#[derive(Clone)]
pub struct CollectOptions {
    pub username: Option<String>,
    pub password: Option<String>,
    pub domain: Option<String>,
    /// NTLM hash pair usable in place of a password
    pub hashes: Option<String>,
    pub kerberos: bool,
    /// Comma-separated collector subset, passed through to the backend
    pub collectors: Option<String>,
    /// Per-job deadline in seconds
    pub timeout_seconds: u64,
    /// Worker pool size
    pub concurrency: usize,
}

impl CollectOptions {
    /// Options carrying only the configured defaults
    pub fn from_defaults(defaults: &JobsConfig) -> Self {
        Self {
            username: None,
            password: None,
            domain: None,
            hashes: None,
            kerberos: false,
            collectors: None,
            timeout_seconds: defaults.timeout_seconds.max(1),
            concurrency: defaults.concurrency.max(1),
        }
    }

    /// Parse option fields out of an args mapping, on top of configured defaults
    pub fn from_args(args: Option<&Value>, defaults: &JobsConfig) -> Result<Self> {
        let mut opts = Self::from_defaults(defaults);

        let map = match args {
            None | Some(Value::Null) => return Ok(opts),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(HarvestrError::Protocol(format!(
                    "args must be an object, got {}",
                    other
                )));
            }
        };

        opts.username = string_field(map, "username")?;
        opts.password = string_field(map, "password")?;
        opts.domain = string_field(map, "domain")?;
        opts.hashes = string_field(map, "hashes")?;
        opts.collectors = string_field(map, "collectors")?;

        if let Some(value) = map.get("kerberos") {
            opts.kerberos = value.as_bool().ok_or_else(|| {
                HarvestrError::Protocol(format!("kerberos must be a boolean, got {}", value))
            })?;
        }

        if let Some(value) = map.get("timeoutSeconds") {
            let secs = value.as_u64().ok_or_else(|| {
                HarvestrError::Protocol(format!(
                    "timeoutSeconds must be a positive integer, got {}",
                    value
                ))
            })?;
            opts.timeout_seconds = secs.max(1);
        }

        if let Some(value) = map.get("concurrency") {
            let n = value.as_u64().ok_or_else(|| {
                HarvestrError::Protocol(format!(
                    "concurrency must be a positive integer, got {}",
                    value
                ))
            })?;
            opts.concurrency = (n as usize).max(1);
        }

        Ok(opts)
    }

    /// Per-job deadline as a Duration
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn string_field(map: &serde_json::Map<String, Value>, key: &str) -> Result<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(HarvestrError::Protocol(format!(
            "{} must be a string, got {}",
            key, other
        ))),
    }
}

impl fmt::Debug for CollectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectOptions")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("domain", &self.domain)
            .field("hashes", &self.hashes.as_ref().map(|_| "<redacted>"))
            .field("kerberos", &self.kerberos)
            .field("collectors", &self.collectors)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn defaults() -> JobsConfig {
        JobsConfig::default()
    }

    #[test]
    fn test_targets_spec_from_string() {
        let inv = ToolInvocation::new(1, "collect", json!({"targets": "10.0.0.1 10.0.0.2"}));
        assert_eq!(inv.targets_spec().unwrap(), "10.0.0.1 10.0.0.2");
    }

    #[test]
    fn test_targets_spec_from_array() {
        let inv = ToolInvocation::new(1, "collect", json!({"targets": ["10.0.0.1", "dc01"]}));
        assert_eq!(inv.targets_spec().unwrap(), "10.0.0.1 dc01");
    }

    #[test]
    fn test_targets_spec_missing() {
        let inv = ToolInvocation::new(1, "collect", json!({}));
        let err = inv.targets_spec().unwrap_err();
        assert!(err.to_string().contains("missing 'targets'"));
    }

    #[test]
    fn test_targets_spec_rejects_non_string_entry() {
        let inv = ToolInvocation::new(1, "collect", json!({"targets": ["10.0.0.1", 5]}));
        assert!(inv.targets_spec().is_err());
    }

    #[test]
    fn test_targets_spec_rejects_wrong_type() {
        let inv = ToolInvocation::new(1, "collect", json!({"targets": 42}));
        assert!(inv.targets_spec().is_err());
    }

    #[test]
    fn test_options_defaults_when_absent() {
        let inv = ToolInvocation::new(1, "collect", json!({"targets": "h"}));
        let opts = inv.collect_options(&defaults()).unwrap();
        assert_eq!(opts.timeout_seconds, 600);
        assert_eq!(opts.concurrency, 8);
        assert!(opts.username.is_none());
        assert!(!opts.kerberos);
    }

    #[test]
    fn test_options_full_parse() {
        let inv = ToolInvocation::new(
            1,
            "collect",
            json!({
                "targets": "h",
                "username": "admin",
                "password": "hunter2",
                "domain": "corp.local",
                "hashes": "aad3b435:31d6cfe0",
                "kerberos": true,
                "collectors": "Chromium,Firefox",
                "timeoutSeconds": 120,
                "concurrency": 4
            }),
        );
        let opts = inv.collect_options(&defaults()).unwrap();
        assert_eq!(opts.username.as_deref(), Some("admin"));
        assert_eq!(opts.password.as_deref(), Some("hunter2"));
        assert_eq!(opts.domain.as_deref(), Some("corp.local"));
        assert_eq!(opts.hashes.as_deref(), Some("aad3b435:31d6cfe0"));
        assert!(opts.kerberos);
        assert_eq!(opts.collectors.as_deref(), Some("Chromium,Firefox"));
        assert_eq!(opts.timeout_seconds, 120);
        assert_eq!(opts.concurrency, 4);
    }

    #[test]
    fn test_options_clamp_zero_concurrency() {
        let inv = ToolInvocation::new(1, "collect", json!({"targets": "h", "concurrency": 0}));
        let opts = inv.collect_options(&defaults()).unwrap();
        assert_eq!(opts.concurrency, 1);
    }

    #[test]
    fn test_options_reject_bad_timeout_type() {
        let inv = ToolInvocation::new(1, "collect", json!({"targets": "h", "timeoutSeconds": "soon"}));
        assert!(inv.collect_options(&defaults()).is_err());
    }

    #[test]
    fn test_options_reject_non_object_args() {
        let inv = ToolInvocation::new(1, "collect", json!([1, 2]));
        assert!(inv.collect_options(&defaults()).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut opts = CollectOptions::from_defaults(&defaults());
        opts.username = Some("admin".to_string());
        opts.password = Some("hunter2".to_string());
        opts.hashes = Some("aad3b435:31d6cfe0".to_string());
        let printed = format!("{:?}", opts);
        assert!(printed.contains("admin"));
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("aad3b435"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_deadline_duration() {
        let mut opts = CollectOptions::from_defaults(&defaults());
        opts.timeout_seconds = 30;
        assert_eq!(opts.deadline(), Duration::from_secs(30));
    }
}

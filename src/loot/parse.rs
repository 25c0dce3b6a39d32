//! Best-effort parsing of backend output into loot records
//!
//! Two line shapes are recognized:
//! - a JSON object: `type` and `label` are read structurally, every other
//!   field becomes the payload;
//! - a collector-tagged text line like `[+] [Chromium] dc01 - admin:hunter2`,
//!   where the last leading bracket group naming a collector becomes the
//!   label and the remainder the payload value.
//!
//! Anything else (banners, progress output) is skipped.

use serde_json::{Map, Value};

use crate::domain::{ArtifactKind, LootRecord, Target};

/// Parse captured stdout into zero or more loot records
pub fn parse_output(target: &Target, stdout: &str) -> Vec<LootRecord> {
    let mut records = Vec::new();

    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('{') {
            if let Some(record) = parse_json_line(target, line) {
                records.push(record);
            }
            continue;
        }

        if let Some(record) = parse_tagged_line(target, line) {
            records.push(record);
        }
    }

    records
}

fn parse_json_line(target: &Target, line: &str) -> Option<LootRecord> {
    let value: Value = serde_json::from_str(line).ok()?;
    let Value::Object(mut map) = value else {
        return None;
    };

    let kind = match take_string(&mut map, "type") {
        Some(label) => ArtifactKind::from_label(&label),
        None => ArtifactKind::Secret,
    };
    let label = take_string(&mut map, "label").unwrap_or_else(|| kind.as_str().to_string());

    Some(LootRecord::new(
        target.clone(),
        kind,
        &label,
        Value::Object(map),
    ))
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            map.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

fn parse_tagged_line(target: &Target, line: &str) -> Option<LootRecord> {
    let mut rest = line;
    let mut collector: Option<&str> = None;

    // Walk leading [..] groups; the last one naming a collector wins
    while let Some(stripped) = rest.strip_prefix('[') {
        let end = stripped.find(']')?;
        let inner = &stripped[..end];
        if !inner.is_empty()
            && inner
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            collector = Some(inner);
        }
        rest = stripped[end + 1..].trim_start();
    }

    let collector = collector?;
    if rest.is_empty() {
        return None;
    }

    Some(LootRecord::new(
        target.clone(),
        ArtifactKind::Secret,
        collector,
        serde_json::json!({ "value": rest }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target() -> Target {
        Target::parse("10.0.0.5").unwrap()
    }

    #[test]
    fn test_parse_json_line_full() {
        let out = r#"{"type":"credential","label":"Chromium","user":"admin","pass":"x"}"#;
        let records = parse_output(&target(), out);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ArtifactKind::Credential);
        assert_eq!(records[0].label, "Chromium");
        assert_eq!(records[0].payload, json!({"user": "admin", "pass": "x"}));
    }

    #[test]
    fn test_parse_json_line_defaults() {
        let records = parse_output(&target(), r#"{"blob":"0xdeadbeef"}"#);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ArtifactKind::Secret);
        assert_eq!(records[0].label, "secret");
        assert_eq!(records[0].payload, json!({"blob": "0xdeadbeef"}));
    }

    #[test]
    fn test_parse_json_line_unknown_type_is_secret() {
        let records = parse_output(&target(), r#"{"type":"wifi","label":"corp-ssid","psk":"x"}"#);
        assert_eq!(records[0].kind, ArtifactKind::Secret);
        assert_eq!(records[0].label, "corp-ssid");
    }

    #[test]
    fn test_parse_malformed_json_skipped() {
        let records = parse_output(&target(), "{not-json at all");
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_tagged_line() {
        let records = parse_output(&target(), "[Chromium] dc01 - admin:hunter2");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ArtifactKind::Secret);
        assert_eq!(records[0].label, "Chromium");
        assert_eq!(records[0].payload, json!({"value": "dc01 - admin:hunter2"}));
    }

    #[test]
    fn test_parse_tagged_line_skips_status_prefix() {
        let records = parse_output(&target(), "[+] [Firefox] cookie jar recovered");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].label, "Firefox");
        assert_eq!(records[0].payload, json!({"value": "cookie jar recovered"}));
    }

    #[test]
    fn test_parse_status_only_line_skipped() {
        let records = parse_output(&target(), "[+] connecting to 10.0.0.5");
        // "+" is not a collector name and no tagged group follows
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_banner_noise_skipped() {
        let out = "harvest tool v2.1\nstarting run...\ndone.";
        assert!(parse_output(&target(), out).is_empty());
    }

    #[test]
    fn test_parse_tagged_line_without_text_skipped() {
        assert!(parse_output(&target(), "[Chromium]").is_empty());
        assert!(parse_output(&target(), "[Chromium]   ").is_empty());
    }

    #[test]
    fn test_parse_mixed_output() {
        let out = r#"banner line
[+] [SAM] administrator:aad3b435b51404ee
{"type":"certificate","label":"machine-cert","subject":"CN=DC01"}

trailer"#;
        let records = parse_output(&target(), out);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].label, "SAM");
        assert_eq!(records[1].kind, ArtifactKind::Certificate);
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_output(&target(), "").is_empty());
    }

    #[test]
    fn test_parsed_records_carry_job_target() {
        let records = parse_output(&target(), "[SAM] admin:hash");
        assert_eq!(records[0].target.as_str(), "10.0.0.5");
    }
}

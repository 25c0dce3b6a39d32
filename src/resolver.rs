//! Target set resolution
//!
//! Turns a targets argument into a concrete, deduplicated, ordered sequence
//! of Targets. Accepted token forms: IP literal, hostname, CIDR expression,
//! last-octet IPv4 dash range (`10.0.0.5-10`), and `@<path>` host-list files
//! (one or more tokens per line, `#` comments). Duplicates are dropped while
//! preserving first-seen order, so resolution is deterministic for a given
//! input.

use std::collections::HashSet;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};

use ipnetwork::IpNetwork;

use crate::domain::Target;
use crate::error::{HarvestrError, Result};

/// Resolve a targets spec string into an ordered, deduplicated target sequence
///
/// `max_targets` caps the resolved set; exceeding it is an error rather than
/// silent truncation. Fails with `EmptyTargetSet` when nothing resolves.
pub fn resolve(spec: &str, max_targets: usize) -> Result<Vec<Target>> {
    let mut tokens: Vec<String> = Vec::new();

    for token in split_spec(spec) {
        if let Some(path) = token.strip_prefix('@') {
            load_list_file(path, &mut tokens)?;
        } else {
            tokens.push(token.to_string());
        }
    }

    resolve_tokens(tokens.iter().map(String::as_str), max_targets)
}

/// Resolve already-loaded tokens; pure function of its input
pub fn resolve_tokens<'a, I>(tokens: I, max_targets: usize) -> Result<Vec<Target>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out: Vec<Target> = Vec::new();
    let mut seen: HashSet<Target> = HashSet::new();

    for token in tokens {
        expand_token(token, max_targets, &mut out, &mut seen)?;
    }

    if out.is_empty() {
        return Err(HarvestrError::EmptyTargetSet);
    }
    Ok(out)
}

fn split_spec(spec: &str) -> impl Iterator<Item = &str> {
    spec.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
}

fn load_list_file(path: &str, tokens: &mut Vec<String>) -> Result<()> {
    let content = fs::read_to_string(path).map_err(|e| {
        HarvestrError::InvalidTargetSpec(format!("cannot read target list '{}': {}", path, e))
    })?;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        for token in split_spec(line) {
            if token.starts_with('@') {
                return Err(HarvestrError::InvalidTargetSpec(format!(
                    "nested list reference '{}' in '{}'",
                    token, path
                )));
            }
            tokens.push(token.to_string());
        }
    }
    Ok(())
}

fn expand_token(
    token: &str,
    max_targets: usize,
    out: &mut Vec<Target>,
    seen: &mut HashSet<Target>,
) -> Result<()> {
    if token.contains('/') {
        return expand_cidr(token, max_targets, out, seen);
    }

    // An IPv4 literal followed by a dash is a last-octet range
    if let Some((left, right)) = token.split_once('-') {
        if let Ok(start) = left.parse::<Ipv4Addr>() {
            let end: u8 = right.parse().map_err(|_| {
                HarvestrError::InvalidTargetSpec(format!(
                    "bad range '{}': expected a final octet after '-'",
                    token
                ))
            })?;
            return expand_dash_range(token, start, end, max_targets, out, seen);
        }
    }

    push_target(Target::parse(token)?, max_targets, out, seen)
}

fn expand_cidr(
    token: &str,
    max_targets: usize,
    out: &mut Vec<Target>,
    seen: &mut HashSet<Target>,
) -> Result<()> {
    let network: IpNetwork = token.parse().map_err(|e| {
        HarvestrError::InvalidTargetSpec(format!("bad CIDR '{}': {}", token, e))
    })?;

    let host_bits = match &network {
        IpNetwork::V4(net) => 32 - net.prefix(),
        IpNetwork::V6(net) => 128 - net.prefix(),
    };
    // A network wider than the cap can never fit, so refuse before iterating
    if host_bits >= 32 || (1u64 << host_bits) > max_targets as u64 {
        return Err(HarvestrError::InvalidTargetSpec(format!(
            "'{}' expands past the {} target limit",
            token, max_targets
        )));
    }

    match network {
        IpNetwork::V4(net) => {
            for addr in net.iter() {
                push_target(Target::from_ip(IpAddr::V4(addr)), max_targets, out, seen)?;
            }
        }
        IpNetwork::V6(net) => {
            for addr in net.iter() {
                push_target(Target::from_ip(IpAddr::V6(addr)), max_targets, out, seen)?;
            }
        }
    }
    Ok(())
}

fn expand_dash_range(
    token: &str,
    start: Ipv4Addr,
    end: u8,
    max_targets: usize,
    out: &mut Vec<Target>,
    seen: &mut HashSet<Target>,
) -> Result<()> {
    let octets = start.octets();
    if end < octets[3] {
        return Err(HarvestrError::InvalidTargetSpec(format!(
            "bad range '{}': end octet below start",
            token
        )));
    }

    for last in octets[3]..=end {
        let addr = Ipv4Addr::new(octets[0], octets[1], octets[2], last);
        push_target(Target::from_ip(IpAddr::V4(addr)), max_targets, out, seen)?;
    }
    Ok(())
}

fn push_target(
    target: Target,
    max_targets: usize,
    out: &mut Vec<Target>,
    seen: &mut HashSet<Target>,
) -> Result<()> {
    if !seen.insert(target.clone()) {
        return Ok(());
    }
    out.push(target);
    if out.len() > max_targets {
        return Err(HarvestrError::InvalidTargetSpec(format!(
            "target set exceeds the {} target limit",
            max_targets
        )));
    }
    Ok(())
}

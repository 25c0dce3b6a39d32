//! ID generation utilities for harvestr
//!
//! Provides functions for generating unique identifiers for invocations and jobs.

use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Generate a unique invocation ID
///
/// Format: `inv-{timestamp_ms}-{random_hex}`
/// Example: `inv-1738300800123-a1b2`
pub fn generate_invocation_id() -> String {
    let timestamp = now_ms();
    let random: u16 = rand::rng().random();
    format!("inv-{}-{:04x}", timestamp, random)
}

/// Generate a job ID scoped to an invocation
///
/// Format: `job-{invocation_suffix}-{index:03}-{random_hex}`
/// Example: For invocation "inv-1738300800123-a1b2" and index 2: "job-a1b2-002-9f3c"
pub fn generate_job_id(invocation_id: &str, index: usize) -> String {
    let suffix = invocation_id.rsplit('-').next().unwrap_or(invocation_id);
    let random: u16 = rand::rng().random();
    format!("job-{}-{:03}-{:04x}", suffix, index, random)
}

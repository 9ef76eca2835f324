// SPDX-License-Identifier: Apache-2.0

//! Typed readers for `FISCA_*` environment variables. Unset or unparsable
//! values fall back to the supplied default.

use std::env;
use std::time::Duration;

#[must_use]
pub fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

#[must_use]
pub fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

#[must_use]
pub fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

#[must_use]
pub fn env_duration_secs(name: &str, default_secs: u64) -> Duration {
    Duration::from_secs(env_u64(name, default_secs))
}

#[must_use]
pub fn env_string(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Comma separated list; blank items are dropped. Falls back to `default`
/// when the variable is unset or yields no items.
#[must_use]
pub fn env_list(name: &str, default: &[&str]) -> Vec<String> {
    let parsed = env::var(name).map(|raw| split_list(&raw)).unwrap_or_default();
    if parsed.is_empty() {
        default.iter().map(|s| (*s).to_string()).collect()
    } else {
        parsed
    }
}

#[must_use]
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}

//! Stats
//!
//! Projection of a raw per-node summary payload into the fixed record the
//! dashboard displays. Projection never fails: anything missing or
//! non-numeric becomes zero.

use serde_json::Value;

/// Shown in place of every numeric field while a node is unreachable.
pub const FIELD_PLACEHOLDER: &str = "--";
pub const PERCENT_PLACEHOLDER: &str = "--%";
pub const CACHE_PLACEHOLDER: &str = "-- / --";
pub const RATE_PLACEHOLDER: &str = "--/sec";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SummaryRecord {
    pub total: u64,
    pub blocked: u64,
    pub percent_blocked: f64,
    pub clients: u64,
    pub rate: f64,
    pub cached: u64,
    pub forwarded: u64,
    pub unique_domains: u64,
    pub list_domains: u64,
}

fn field(raw: &Value, path: &[&str]) -> f64 {
    let mut cur = raw;
    for key in path {
        match cur.get(key) {
            Some(next) => cur = next,
            None => return 0.0,
        }
    }
    match cur {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        // Numeric strings show up in some appliance firmwares.
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn count(raw: &Value, path: &[&str]) -> u64 {
    field(raw, path).max(0.0) as u64
}

/// Maps one node's raw summary payload into a [`SummaryRecord`].
pub fn project_summary(raw: &Value) -> SummaryRecord {
    SummaryRecord {
        total: count(raw, &["queries", "total"]),
        blocked: count(raw, &["queries", "blocked"]),
        percent_blocked: field(raw, &["queries", "percent_blocked"]),
        clients: count(raw, &["clients", "active"]),
        rate: field(raw, &["queries", "frequency"]),
        cached: count(raw, &["queries", "cached"]),
        forwarded: count(raw, &["queries", "forwarded"]),
        unique_domains: count(raw, &["queries", "unique_domains"]),
        list_domains: count(raw, &["gravity", "domains_being_blocked"]),
    }
}

/// Rate suffix for the node's name line. Slow nodes read better per minute.
pub fn format_rate(rate: f64) -> String {
    if rate < 1.0 {
        format!("{:.1}/min", rate * 60.0)
    } else {
        format!("{:.1}/sec", rate)
    }
}

/// Thousands-grouped count for display.
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

//! Live rate-limit budgets parsed from provider response headers.
//!
//! Two header schemes are understood:
//!
//! - **OpenAI**: `x-ratelimit-{limit,remaining,reset}-{requests,tokens}`
//! - **Anthropic**: `anthropic-ratelimit-{requests,tokens}-{limit,remaining,reset}`
//!
//! Each field is looked up in the provider's own scheme first and then in the
//! other one. Reset values may be RFC 3339 timestamps, relative durations
//! (`1.5s`, `6m0s`, `20ms`) or bare seconds; anything else resolves to "now".

use std::sync::LazyLock;

use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::core::provider::Provider;

static DURATION_PART: LazyLock<Regex> = LazyLock::new(|| {
    // Alternation order matters: `ms` must win over `m`.
    Regex::new(r"(\d+(?:\.\d+)?)(ms|h|m|s)").expect("static duration regex")
});

/// Request/token ceilings reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderBudget {
    pub requests_limit: Option<u32>,
    pub requests_remaining: Option<u32>,
    pub requests_reset: Option<DateTime<Utc>>,
    pub tokens_limit: Option<u64>,
    pub tokens_remaining: Option<u64>,
    pub tokens_reset: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy)]
enum Field {
    Limit,
    Remaining,
    Reset,
}

#[derive(Clone, Copy)]
enum Resource {
    Requests,
    Tokens,
}

fn header_name(scheme: Provider, field: Field, resource: Resource) -> String {
    let field = match field {
        Field::Limit => "limit",
        Field::Remaining => "remaining",
        Field::Reset => "reset",
    };
    let resource = match resource {
        Resource::Requests => "requests",
        Resource::Tokens => "tokens",
    };
    match scheme {
        Provider::OpenAi => format!("x-ratelimit-{field}-{resource}"),
        Provider::Anthropic => format!("anthropic-ratelimit-{resource}-{field}"),
    }
}

const fn other_scheme(provider: Provider) -> Provider {
    match provider {
        Provider::Anthropic => Provider::OpenAi,
        Provider::OpenAi => Provider::Anthropic,
    }
}

fn raw_header<'a>(
    headers: &'a HeaderMap,
    provider: Provider,
    field: Field,
    resource: Resource,
) -> Option<&'a str> {
    [provider, other_scheme(provider)].into_iter().find_map(|scheme| {
        headers
            .get(header_name(scheme, field, resource))
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
    })
}

fn parse_count<T: std::str::FromStr>(raw: Option<&str>) -> Option<T> {
    raw.and_then(|v| v.parse().ok())
}

/// Parse all recognized rate-limit headers into a budget.
///
/// Returns `None` when no recognized header is present.
#[must_use]
pub fn parse_budget(
    provider: Provider,
    headers: &HeaderMap,
    now: DateTime<Utc>,
) -> Option<ProviderBudget> {
    let get = |field, resource| raw_header(headers, provider, field, resource);

    let budget = ProviderBudget {
        requests_limit: parse_count(get(Field::Limit, Resource::Requests)),
        requests_remaining: parse_count(get(Field::Remaining, Resource::Requests)),
        requests_reset: get(Field::Reset, Resource::Requests).map(|v| parse_reset(v, now)),
        tokens_limit: parse_count(get(Field::Limit, Resource::Tokens)),
        tokens_remaining: parse_count(get(Field::Remaining, Resource::Tokens)),
        tokens_reset: get(Field::Reset, Resource::Tokens).map(|v| parse_reset(v, now)),
        updated_at: now,
    };

    let any = budget.requests_limit.is_some()
        || budget.requests_remaining.is_some()
        || budget.requests_reset.is_some()
        || budget.tokens_limit.is_some()
        || budget.tokens_remaining.is_some()
        || budget.tokens_reset.is_some();
    any.then_some(budget)
}

/// Resolve a reset header value to an absolute instant.
#[must_use]
pub fn parse_reset(value: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let value = value.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return ts.with_timezone(&Utc);
    }

    let millis = value
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| secs * 1000.0)
        .or_else(|| parse_relative_millis(value));

    millis
        .and_then(|ms| TimeDelta::try_milliseconds(ms.round() as i64))
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(now)
}

fn parse_relative_millis(value: &str) -> Option<f64> {
    let mut total = 0.0;
    let mut matched = false;
    for caps in DURATION_PART.captures_iter(value) {
        let amount: f64 = caps[1].parse().ok()?;
        total += match &caps[2] {
            "ms" => amount,
            "s" => amount * 1000.0,
            "m" => amount * 60_000.0,
            "h" => amount * 3_600_000.0,
            _ => return None,
        };
        matched = true;
    }
    matched.then_some(total)
}

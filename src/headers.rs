//! Helpers for the HTTP boundary: deriving a client identifier from request
//! headers and mapping a [`RateLimitResult`] onto response headers.

use crate::ratelimit::RateLimitResult;

/// Identifier used when no client address header is present.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Headers consulted for the client address, in order of preference.
pub const CLIENT_ADDRESS_HEADERS: [&str; 4] =
    ["x-forwarded-for", "x-real-ip", "cf-connecting-ip", "x-client-ip"];

pub const LIMIT_HEADER: &str = "X-RateLimit-Limit";
pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining";
pub const RESET_HEADER: &str = "X-RateLimit-Reset";
pub const RETRY_AFTER_HEADER: &str = "Retry-After";

/// Derive the rate limit identifier for a request.
///
/// `lookup` returns a header value by lowercase name. For `x-forwarded-for`
/// only the first (client-most) address is used. Blank values are skipped.
pub fn client_identifier<'a, F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<&'a str>,
{
    CLIENT_ADDRESS_HEADERS
        .iter()
        .filter_map(|name| lookup(name))
        .filter_map(|value| value.split(',').next())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Response headers describing a rate limit decision.
pub fn rate_limit_headers(result: &RateLimitResult, now_ms: u64) -> Vec<(&'static str, String)> {
    vec![
        (LIMIT_HEADER, result.limit.to_string()),
        (REMAINING_HEADER, result.remaining.to_string()),
        (RESET_HEADER, result.reset_epoch_secs().to_string()),
        (RETRY_AFTER_HEADER, result.retry_after_secs(now_ms).to_string()),
    ]
}

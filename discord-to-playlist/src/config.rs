//! Immutable API configuration shared by every client in a run.

use std::collections::BTreeMap;
use std::time::Duration;

/// Discord REST API root used when nothing else is configured.
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v9";

/// YouTube Data API v3 root used when nothing else is configured.
pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Statuses we have a human-readable explanation for.
const STATUS_REASONS: [(u16, &str); 12] = [
    (400, "Bad Request"),
    (401, "Unauthorized"),
    (403, "Forbidden"),
    (404, "Not Found"),
    (405, "Method Not Allowed"),
    (408, "Request Timeout"),
    (429, "Too Many Requests"),
    (500, "Internal Server Error"),
    (501, "Not Implemented"),
    (502, "Bad Gateway"),
    (503, "Service Unavailable"),
    (504, "Gateway Timeout"),
];

/// Knobs for talking to the Discord and YouTube REST APIs.
///
/// A single value is built at startup (usually from the command line) and handed to
/// [`crate::http::ApiClient`], which shares it with every client built on top of it.
/// Nothing mutates it afterwards.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Root of the Discord REST API, without a trailing slash.
    pub discord_api_base: String,
    /// Root of the YouTube Data API, without a trailing slash.
    pub youtube_api_base: String,
    /// Total number of attempts per request, including the first one.
    pub max_attempts: usize,
    /// Base of the exponential backoff, in milliseconds.
    ///
    /// The n-th retry waits roughly `backoff_base_ms^n * backoff_factor_ms` milliseconds
    /// before jitter is applied.
    pub backoff_base_ms: u64,
    /// Multiplier applied to every backoff step.
    pub backoff_factor_ms: u64,
    /// Upper bound for a single backoff delay.
    pub max_backoff: Duration,
    /// Timeout for a single HTTP request.
    pub request_timeout: Duration,
    /// Number of messages requested per Discord history page (Discord caps this at 100).
    pub message_page_size: u32,
    /// Number of playlist items requested per YouTube page (YouTube caps this at 50).
    pub playlist_page_size: u32,
    /// Pause after each successful playlist insertion.
    pub insert_delay: Duration,
    /// Human-readable reasons for well-known HTTP statuses.
    pub status_reasons: BTreeMap<u16, &'static str>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            discord_api_base: DISCORD_API_BASE.to_string(),
            youtube_api_base: YOUTUBE_API_BASE.to_string(),
            max_attempts: 5,
            backoff_base_ms: 2,
            backoff_factor_ms: 250,
            max_backoff: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
            message_page_size: 100,
            playlist_page_size: 50,
            insert_delay: Duration::from_secs(1),
            status_reasons: STATUS_REASONS.into_iter().collect(),
        }
    }
}

impl ApiConfig {
    /// Looks up the human-readable reason for `status`, if it is part of the taxonomy.
    pub fn status_reason(&self, status: u16) -> Option<&'static str> {
        self.status_reasons.get(&status).copied()
    }
}

//! Typed failures for requests against the Discord and YouTube APIs.

use http::{Method, StatusCode};

/// Boxed error used where the underlying failure is an `eyre` report.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything that can go wrong while talking to one of the upstream REST APIs.
///
/// Callers that need to tell failures apart (for example to skip a video that no longer
/// exists) should go through [`RequestError::status`] rather than matching on variants.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The API answered, but not with a success status.
    #[error("{method} {url} failed: {}", describe_status(.status, .reason))]
    Status {
        method: Method,
        url: String,
        status: StatusCode,
        /// Human-readable reason when the status is part of the configured taxonomy.
        reason: Option<&'static str>,
        /// Response body, kept for diagnostics.
        body: String,
    },

    /// The request never produced a response.
    #[error("send {method} request to {url}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with success, but the body did not have the expected shape.
    #[error("parse response from {url}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The channel to scan is not a text or announcement channel.
    #[error(
        "channel {channel_id} has type {kind}; it must be a GUILD_TEXT or GUILD_ANNOUNCEMENT channel"
    )]
    InvalidChannelType { channel_id: u64, kind: u8 },

    /// YouTube refused an insertion with 403, which in practice means the daily quota is spent.
    #[error(
        "YouTube API quota exceeded, try again in a few hours (see https://developers.google.com/youtube/v3/determine_quota_cost)"
    )]
    QuotaExceeded {
        #[source]
        source: Box<RequestError>,
    },

    /// YouTube failed in a way we have no recovery for.
    #[error("unexpected YouTube API error (status: {})", describe_optional_status(.status))]
    UnexpectedApi {
        status: Option<StatusCode>,
        #[source]
        source: Box<RequestError>,
    },

    /// No usable access token could be obtained for the request.
    #[error("obtain a fresh YouTube access token")]
    Auth(#[source] BoxError),
}

impl RequestError {
    /// The HTTP status behind this error, if the API answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::QuotaExceeded { source } | Self::UnexpectedApi { source, .. } => {
                source.status()
            }
            _ => None,
        }
    }
}

impl From<eyre::Report> for RequestError {
    fn from(report: eyre::Report) -> Self {
        Self::Auth(report.into())
    }
}

fn describe_status(status: &StatusCode, reason: &Option<&'static str>) -> String {
    match reason {
        Some(reason) => format!("[{}] {reason}", status.as_u16()),
        None => format!("status code {}", status.as_u16()),
    }
}

fn describe_optional_status(status: &Option<StatusCode>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.as_u16().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn status_error(status: u16, reason: Option<&'static str>) -> RequestError {
        RequestError::Status {
            method: Method::GET,
            url: "https://discord.com/api/v9/channels/1".to_string(),
            status: StatusCode::from_u16(status).unwrap(),
            reason,
            body: String::new(),
        }
    }

    #[test]
    fn known_status_is_described_by_reason() {
        assert_eq!(
            status_error(404, Some("Not Found")).to_string(),
            "GET https://discord.com/api/v9/channels/1 failed: [404] Not Found"
        );
    }

    #[test]
    fn unknown_status_is_described_by_code() {
        assert_eq!(
            status_error(418, None).to_string(),
            "GET https://discord.com/api/v9/channels/1 failed: status code 418"
        );
    }

    #[test]
    fn wrapped_errors_expose_inner_status() {
        let err = RequestError::UnexpectedApi {
            status: Some(StatusCode::BAD_GATEWAY),
            source: Box::new(status_error(502, Some("Bad Gateway"))),
        };
        assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
        assert_eq!(err.to_string(), "unexpected YouTube API error (status: 502)");

        let err = RequestError::InvalidChannelType {
            channel_id: 7,
            kind: 2,
        };
        assert_eq!(err.status(), None);
    }
}

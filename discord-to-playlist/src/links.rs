//! Extraction of YouTube video IDs from chat messages.

use crate::discord::Message;
use crate::error::RequestError;
use indexmap::IndexSet;
use regex::Regex;
use std::sync::LazyLock;
use tokio_stream::{Stream, StreamExt};

/// `youtube.com/watch?v=<id>`, with optional scheme and `www.`.
static WATCH_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:https?://)?(?:www\.)?youtube\.com/watch\?v=(.+)").expect("valid regex")
});

/// `youtu.be/<id>`, with optional scheme.
static SHORT_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:https?://)?youtu\.be/(.+)").expect("valid regex"));

/// Order in which extracted video IDs are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanOrder {
    /// The order messages were fetched in: newest message first.
    #[default]
    NewestFirst,
    /// Chronological order: oldest message first.
    OldestFirst,
}

/// Finds the video ID linked from `content`, if any.
///
/// Full `watch?v=` links take precedence over `youtu.be` short links when a message holds
/// both. Everything after `v=` or after the short-link slash up to the end of that line is
/// taken as the ID, so trailing query parameters stay attached.
pub fn extract_video_id(content: &str) -> Option<&str> {
    [&*WATCH_URL, &*SHORT_URL]
        .into_iter()
        .find_map(|re| re.captures(content))
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

/// Collects the unique video IDs linked from `messages`, in order of first appearance.
pub fn video_ids<'a>(messages: impl IntoIterator<Item = &'a Message>) -> IndexSet<String> {
    messages
        .into_iter()
        .filter_map(|message| extract_video_id(&message.content))
        .map(str::to_string)
        .collect()
}

/// Drains a stream of message batches and returns the unique video IDs linked from them.
///
/// The first error from the stream is returned as is; IDs collected until then are dropped.
pub async fn collect_video_ids<S>(batches: S, order: ScanOrder) -> Result<Vec<String>, RequestError>
where
    S: Stream<Item = Result<Vec<Message>, RequestError>>,
{
    let mut batches = std::pin::pin!(batches);
    let mut messages = Vec::new();
    while let Some(batch) = batches.next().await {
        messages.extend(batch?);
    }
    tracing::debug!(messages = messages.len(), "scanned messages for links");

    if order == ScanOrder::OldestFirst {
        messages.reverse();
    }
    Ok(video_ids(&messages).into_iter().collect())
}

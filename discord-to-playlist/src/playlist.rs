//! Adding scanned videos to a playlist, skipping the ones it already has.

use crate::error::RequestError;
use crate::youtube_api::YouTubeClient;
use http::StatusCode;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tracing::instrument;

/// The playlist operations the updater needs.
pub trait PlaylistService {
    /// IDs of every video currently in `playlist_id`.
    fn playlist_video_ids(
        &self,
        playlist_id: &str,
    ) -> impl Future<Output = Result<HashSet<String>, RequestError>> + Send;

    /// Appends `video_id` to `playlist_id`.
    fn insert_video(
        &self,
        playlist_id: &str,
        video_id: &str,
    ) -> impl Future<Output = Result<(), RequestError>> + Send;
}

impl PlaylistService for YouTubeClient {
    async fn playlist_video_ids(
        &self,
        playlist_id: &str,
    ) -> Result<HashSet<String>, RequestError> {
        YouTubeClient::playlist_video_ids(self, playlist_id).await
    }

    async fn insert_video(&self, playlist_id: &str, video_id: &str) -> Result<(), RequestError> {
        self.insert_playlist_item(playlist_id, video_id).await?;
        Ok(())
    }
}

/// What happened to one video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoOutcome {
    Added,
    AlreadyInPlaylist,
    /// YouTube answered 404, the video is gone or private.
    NotFound,
}

/// Reported once per video, after it was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent<'a> {
    /// Zero-based position of the video in the input.
    pub index: usize,
    pub total: usize,
    pub video_id: &'a str,
    pub playlist_id: &'a str,
    pub outcome: VideoOutcome,
}

impl ProgressEvent<'_> {
    /// Share of the input handled so far, `(index + 1) / total` as a percentage.
    pub fn percent(&self) -> f64 {
        (self.index + 1) as f64 / self.total as f64 * 100.0
    }

    /// [`Self::percent`] with two decimals, e.g. `33.33%`.
    pub fn percent_label(&self) -> String {
        format!("{:.2}%", self.percent())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub added: usize,
    pub already_present: usize,
    pub not_found: usize,
}

impl UpdateSummary {
    fn record(&mut self, outcome: VideoOutcome) {
        match outcome {
            VideoOutcome::Added => self.added += 1,
            VideoOutcome::AlreadyInPlaylist => self.already_present += 1,
            VideoOutcome::NotFound => self.not_found += 1,
        }
    }
}

/// Adds each of `video_ids` to `playlist_id`, in order, unless it is already there.
///
/// The playlist's membership is fetched once up front and kept current locally, so a video
/// repeated in `video_ids` is only inserted once. After every successful insert the updater
/// pauses for `insert_delay`. Videos YouTube does not know are reported and skipped.
///
/// A 403 stops the run with [`RequestError::QuotaExceeded`]; any other failure stops it with
/// [`RequestError::UnexpectedApi`]. Insertions made before the failure stay in place.
#[instrument(skip(service, video_ids, on_progress), fields(videos = video_ids.len()))]
pub async fn update_playlist<S, F>(
    service: &S,
    playlist_id: &str,
    video_ids: &[String],
    insert_delay: Duration,
    mut on_progress: F,
) -> Result<UpdateSummary, RequestError>
where
    S: PlaylistService,
    F: FnMut(&ProgressEvent<'_>),
{
    let mut present = service
        .playlist_video_ids(playlist_id)
        .await
        .map_err(unexpected)?;
    tracing::info!(present = present.len(), "fetched current playlist");

    let mut summary = UpdateSummary::default();
    for (index, video_id) in video_ids.iter().enumerate() {
        let outcome = if present.contains(video_id) {
            VideoOutcome::AlreadyInPlaylist
        } else {
            match service.insert_video(playlist_id, video_id).await {
                Ok(()) => {
                    present.insert(video_id.clone());
                    VideoOutcome::Added
                }
                Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => {
                    tracing::debug!(video_id, "video not found");
                    VideoOutcome::NotFound
                }
                Err(e) if e.status() == Some(StatusCode::FORBIDDEN) => {
                    tracing::error!(video_id, index, "insert forbidden, quota likely exhausted");
                    return Err(RequestError::QuotaExceeded {
                        source: Box::new(e),
                    });
                }
                Err(e) => return Err(unexpected(e)),
            }
        };

        summary.record(outcome);
        on_progress(&ProgressEvent {
            index,
            total: video_ids.len(),
            video_id,
            playlist_id,
            outcome,
        });

        if outcome == VideoOutcome::Added && !insert_delay.is_zero() {
            tokio::time::sleep(insert_delay).await;
        }
    }

    tracing::info!(
        added = summary.added,
        already_present = summary.already_present,
        not_found = summary.not_found,
        "playlist updated"
    );
    Ok(summary)
}

fn unexpected(e: RequestError) -> RequestError {
    match e {
        // already tells the whole story
        RequestError::Auth(_) | RequestError::QuotaExceeded { .. } => e,
        e => RequestError::UnexpectedApi {
            status: e.status(),
            source: Box::new(e),
        },
    }
}

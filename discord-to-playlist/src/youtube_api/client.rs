//! Core YouTube API client functionality and authentication management.

use crate::credentials::CredentialCache;
use crate::error::RequestError;
use crate::http::ApiClient;
use crate::oauth::OAuthManager;
use crate::youtube_api::playlists::{
    Playlist, PlaylistInsertRequest, PlaylistItem, PlaylistItemInsertRequest,
    PlaylistItemListResponse, PlaylistSnippet, PlaylistStatus, PrivacyStatus,
};
use crate::youtube_api::types::paged;
use eyre::Context;
use http::Method;
use jiff::{SignedDuration, Timestamp};
use oauth2::TokenResponse;
use oauth2::basic::BasicTokenResponse;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_stream::{Stream, StreamExt};
use tracing::instrument;

/// Safety margin subtracted from a token's advertised lifetime.
const EXPIRY_BUFFER: SignedDuration = SignedDuration::from_secs(300);

/// Lifetime assumed when the authorization server does not say (one hour minus the buffer).
const DEFAULT_LIFETIME: SignedDuration = SignedDuration::from_secs(3300);

/// An OAuth token together with the moment it stops being usable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeBoundAccessToken {
    token: BasicTokenResponse,
    /// When the access token expires, with the safety buffer already applied.
    expires_at: Timestamp,
}

impl TimeBoundAccessToken {
    /// Wraps a token that was just issued, computing its expiry from `expires_in`.
    pub fn new(token: BasicTokenResponse) -> Self {
        Self {
            expires_at: Self::calculate_token_expiry(&token),
            token,
        }
    }

    /// Wraps a token that must be refreshed before its next use.
    pub fn expired(token: BasicTokenResponse) -> Self {
        Self {
            expires_at: Timestamp::UNIX_EPOCH,
            token,
        }
    }

    pub fn raw_token(&self) -> &BasicTokenResponse {
        &self.token
    }

    pub fn expires_at(&self) -> Timestamp {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Timestamp::now() >= self.expires_at
    }

    /// Swaps in a fresh access token obtained through `oauth_manager`.
    ///
    /// Returns `false`, leaving the token untouched, when the refresh was rejected; the
    /// stored refresh token is no good then. Transport failures are errors.
    pub async fn refresh(&mut self, oauth_manager: &OAuthManager) -> eyre::Result<bool> {
        let Some(mut refreshed) = oauth_manager
            .refresh_token(&self.token)
            .await
            .context("refresh OAuth token")?
        else {
            return Ok(false);
        };

        // Google normally leaves the refresh token out of refresh responses.
        if refreshed.refresh_token().is_none() {
            refreshed.set_refresh_token(self.token.refresh_token().cloned());
        }
        self.expires_at = Self::calculate_token_expiry(&refreshed);
        self.token = refreshed;
        tracing::debug!(expires_at = %self.expires_at, "access token refreshed");
        Ok(true)
    }

    fn calculate_token_expiry(token: &BasicTokenResponse) -> Timestamp {
        let lifetime = token
            .expires_in()
            .and_then(|d| SignedDuration::try_from(d).ok())
            .map_or(DEFAULT_LIFETIME, |d| d - EXPIRY_BUFFER);
        Timestamp::now()
            .checked_add(lifetime)
            .unwrap_or(Timestamp::MAX)
    }
}

/// Client for the parts of the YouTube Data API v3 that manage playlists.
///
/// The client owns the credentials resolved at startup and refreshes the access token
/// transparently when it expires, writing the refreshed token back to the credential cache.
/// Clones share the same token.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    token: Arc<Mutex<TimeBoundAccessToken>>,
    oauth_manager: Arc<OAuthManager>,
    /// Where refreshed tokens are persisted, if anywhere.
    cache: Option<Arc<CredentialCache>>,
    api: ApiClient,
}

impl YouTubeClient {
    pub fn new(
        token: TimeBoundAccessToken,
        oauth_manager: Arc<OAuthManager>,
        api: ApiClient,
    ) -> Self {
        Self {
            token: Arc::new(Mutex::new(token)),
            oauth_manager,
            cache: None,
            api,
        }
    }

    /// Persists every refreshed token to `cache`.
    pub fn with_cache(mut self, cache: Arc<CredentialCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Returns a copy of the current token.
    pub async fn token(&self) -> TimeBoundAccessToken {
        self.token.lock().await.clone()
    }

    /// The current access token, refreshed (and written back to the cache) if it expired.
    #[instrument(skip(self), level = tracing::Level::TRACE)]
    pub(crate) async fn fresh_access_token(&self) -> eyre::Result<String> {
        let mut token = self.token.lock().await;
        if token.is_expired() {
            let refreshed = token.refresh(&self.oauth_manager).await?;
            eyre::ensure!(
                refreshed,
                "access token expired and the refresh token was rejected; delete the credential cache and sign in again"
            );
            if let Some(cache) = &self.cache {
                cache
                    .store(&token)
                    .await
                    .context("persist refreshed credentials")?;
            }
        }
        Ok(token.token.access_token().secret().clone())
    }

    /// Makes an authenticated request against the YouTube Data API.
    ///
    /// `path` is relative to [`ApiConfig::youtube_api_base`](crate::config::ApiConfig).
    async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        query_params: &[(&str, &str)],
        json_body: Option<&B>,
    ) -> Result<T, RequestError>
    where
        T: serde::de::DeserializeOwned,
        B: Serialize,
    {
        let access_token = self.fresh_access_token().await?;
        self.api
            .request(
                method,
                &self.api.config().youtube_api_base,
                path,
                query_params,
                &format!("Bearer {access_token}"),
                json_body,
            )
            .await
    }

    /// Returns a paginated stream of every item in `playlist_id`.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/youtube.readonly`
    /// * `https://www.googleapis.com/auth/youtube`
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/playlistItems/list>
    pub fn list_playlist_items<'a>(
        &'a self,
        playlist_id: &'a str,
    ) -> impl Stream<Item = Result<PlaylistItem, RequestError>> + use<'a> {
        paged(move |page_token| async move {
            let response = self
                .list_playlist_items_internal(playlist_id, page_token)
                .await?;
            Ok((response.items, response.next_page_token))
        })
    }

    /// Collects the IDs of all videos currently in `playlist_id`.
    #[instrument(skip(self))]
    pub async fn playlist_video_ids(
        &self,
        playlist_id: &str,
    ) -> Result<HashSet<String>, RequestError> {
        let mut items = std::pin::pin!(self.list_playlist_items(playlist_id));
        let mut video_ids = HashSet::new();
        while let Some(item) = items.next().await {
            if let Some(video_id) = item?.video_id() {
                video_ids.insert(video_id.to_string());
            }
        }
        tracing::debug!(videos = video_ids.len(), "fetched playlist membership");
        Ok(video_ids)
    }

    /// Appends `video_id` to the end of `playlist_id`.
    ///
    /// Fails with a 404 status when the video does not exist (or is private), and with 403
    /// when the quota is exhausted or the playlist belongs to someone else.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/playlistItems/insert>
    #[instrument(skip(self))]
    pub async fn insert_playlist_item(
        &self,
        playlist_id: &str,
        video_id: &str,
    ) -> Result<PlaylistItem, RequestError> {
        let item: PlaylistItem = self
            .request(
                Method::POST,
                "/playlistItems",
                &[("part", "snippet")],
                Some(&PlaylistItemInsertRequest::append(playlist_id, video_id)),
            )
            .await?;
        tracing::debug!(item_id = item.id, "inserted playlist item");
        Ok(item)
    }

    /// Creates a new playlist owned by the authenticated user.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/playlists/insert>
    #[instrument(skip(self))]
    pub async fn create_playlist(
        &self,
        title: &str,
        description: &str,
        privacy: PrivacyStatus,
    ) -> Result<Playlist, RequestError> {
        let body = PlaylistInsertRequest {
            snippet: PlaylistSnippet {
                title: title.to_string(),
                description: description.to_string(),
            },
            status: PlaylistStatus {
                privacy_status: privacy,
            },
        };
        let playlist: Playlist = self
            .request(
                Method::POST,
                "/playlists",
                &[("part", "snippet,status")],
                Some(&body),
            )
            .await?;
        tracing::info!(playlist_id = playlist.id, "created playlist");
        Ok(playlist)
    }

    async fn list_playlist_items_internal(
        &self,
        playlist_id: &str,
        page_token: Option<String>,
    ) -> Result<PlaylistItemListResponse, RequestError> {
        let max_results = self.api.config().playlist_page_size.to_string();
        let mut query_params = vec![
            ("part", "snippet"),
            ("playlistId", playlist_id),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(ref token) = page_token {
            query_params.push(("pageToken", token.as_str()));
        }

        let response: PlaylistItemListResponse = self
            .request(Method::GET, "/playlistItems", &query_params, None::<&()>)
            .await?;

        tracing::debug!(
            total_results = response.page_info.total_results,
            returned_items = response.items.len(),
            "fetched playlist items"
        );

        Ok(response)
    }
}

//! Collects the YouTube videos linked in a Discord channel and adds them to a playlist.
//!
//! A run scans a window of the channel's history ([`discord::DiscordClient::message_batches`]),
//! extracts the linked video IDs ([`links::collect_video_ids`]), resolves YouTube
//! credentials once ([`credentials::authenticate`]) and inserts every video the playlist
//! does not have yet ([`playlist::update_playlist`]).

use crate::cli::Args;
use crate::config::ApiConfig;
use crate::credentials::CredentialCache;
use crate::discord::DiscordClient;
use crate::http::ApiClient;
use crate::oauth::{ClientSecrets, OAuthManager};
use crate::playlist::UpdateSummary;
use crate::youtube_api::YouTubeClient;
use eyre::WrapErr;
use std::sync::Arc;
use tracing::instrument;

pub mod cli;
pub mod config;
pub mod credentials;
pub mod discord;
pub mod error;
pub mod http;
pub mod links;
pub mod oauth;
pub mod playlist;
pub mod report;
pub mod youtube_api;

#[cfg(test)]
mod test_support;

/// Runs the tool against the real Discord and YouTube APIs.
pub async fn run(args: Args) -> eyre::Result<()> {
    let config = args.to_config();
    run_with_config(&args, config).await.map(|_| ())
}

/// Runs the tool with an explicit API configuration.
///
/// Returns `None` when the scanned range links no videos, in which case YouTube is never
/// contacted.
#[instrument(skip_all, fields(channel_id = args.channel_id, start = args.start_id, end = args.end_id))]
pub async fn run_with_config(args: &Args, config: ApiConfig) -> eyre::Result<Option<UpdateSummary>> {
    args.validate()?;
    let api = ApiClient::new(config)?;

    let discord = DiscordClient::new(api.clone(), args.token_type, &args.token);
    let video_ids = links::collect_video_ids(
        discord.message_batches(args.channel_id, args.start_id, args.end_id),
        args.scan_order(),
    )
    .await
    .wrap_err_with(|| format!("scan Discord channel {}", args.channel_id))?;
    tracing::info!(videos = video_ids.len(), "collected video links");

    if video_ids.is_empty() {
        report::print_no_links();
        return Ok(None);
    }

    let secrets = ClientSecrets::from_file(&args.youtube_credentials).await?;
    let oauth = Arc::new(OAuthManager::new(secrets)?);
    let cache = Arc::new(CredentialCache::new(&args.credentials_cache));
    let token = credentials::authenticate(&cache, &oauth)
        .await
        .wrap_err("authenticate with YouTube")?;
    let youtube = YouTubeClient::new(token, oauth, api.clone()).with_cache(cache);

    let playlist_id = match (&args.playlist_id, &args.create_playlist) {
        (Some(playlist_id), _) => playlist_id.clone(),
        (None, Some(title)) => {
            youtube
                .create_playlist(title, args.playlist_description(), args.playlist_visibility())
                .await
                .wrap_err_with(|| format!("create playlist {title:?}"))?
                .id
        }
        (None, None) => eyre::bail!("either --playlist-id or --create-playlist is required"),
    };

    let summary = playlist::update_playlist(
        &youtube,
        &playlist_id,
        &video_ids,
        api.config().insert_delay,
        report::print_progress,
    )
    .await
    .wrap_err_with(|| format!("update playlist {playlist_id}"))?;

    report::print_summary(&playlist_id, &summary);
    Ok(Some(summary))
}

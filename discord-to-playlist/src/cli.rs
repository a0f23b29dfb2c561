//! Command-line arguments.

use crate::config::ApiConfig;
use crate::discord::TokenType;
use crate::links::ScanOrder;
use crate::youtube_api::PrivacyStatus;
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::time::Duration;

/// Adds every YouTube video linked in a range of a Discord channel's history to a playlist.
///
/// Messages are scanned from `--start-id` back to `--end-id` (both inclusive). Videos already
/// in the playlist are skipped, so running the tool twice over the same range is harmless.
#[derive(Debug, Clone, Parser)]
#[command(name = "discord-to-playlist", version, about, long_about = None)]
#[command(group(ArgGroup::new("playlist").required(true).args(["playlist_id", "create_playlist"])))]
pub struct Args {
    /// Discord token used to read the channel.
    #[arg(short, long, env = "DISCORD_TOKEN", hide_env_values = true)]
    pub token: String,

    /// How the Discord token is sent.
    #[arg(long, value_enum, default_value_t = TokenType::User)]
    pub token_type: TokenType,

    /// ID of the text or announcement channel to scan.
    #[arg(short, long)]
    pub channel_id: u64,

    /// Newest message to scan (inclusive).
    #[arg(short, long)]
    pub start_id: u64,

    /// Oldest message to scan (inclusive).
    #[arg(short, long)]
    pub end_id: u64,

    /// OAuth client secrets downloaded from the Google Cloud console.
    #[arg(long, default_value = "credentials.json")]
    pub youtube_credentials: PathBuf,

    /// Where the YouTube access token is cached between runs.
    #[arg(long, default_value = "credentials.dat")]
    pub credentials_cache: PathBuf,

    /// Playlist to add the videos to.
    #[arg(short, long)]
    pub playlist_id: Option<String>,

    /// Create a new playlist with this title and add the videos to it.
    #[arg(long, value_name = "TITLE")]
    pub create_playlist: Option<String>,

    /// Description of the created playlist.
    #[arg(long, requires = "create_playlist")]
    pub description: Option<String>,

    /// Visibility of the created playlist [default: unlisted].
    #[arg(long, value_enum, requires = "create_playlist")]
    pub visibility: Option<PrivacyStatus>,

    /// Add videos in the order they were posted instead of newest first.
    #[arg(long)]
    pub oldest_first: bool,

    /// Attempts per API request before giving up.
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u16).range(1..))]
    pub max_attempts: u16,

    /// Pause after each video added, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub insert_delay_ms: u64,
}

impl Args {
    /// Checks constraints between arguments that clap cannot express.
    pub fn validate(&self) -> eyre::Result<()> {
        if self.start_id <= self.end_id {
            eyre::bail!(
                "--start-id ({}) must be greater than --end-id ({}); messages are scanned from newest to oldest",
                self.start_id,
                self.end_id
            );
        }
        Ok(())
    }

    pub fn playlist_description(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }

    pub fn playlist_visibility(&self) -> PrivacyStatus {
        self.visibility.unwrap_or_default()
    }

    pub fn scan_order(&self) -> ScanOrder {
        if self.oldest_first {
            ScanOrder::OldestFirst
        } else {
            ScanOrder::NewestFirst
        }
    }

    pub fn to_config(&self) -> ApiConfig {
        ApiConfig {
            max_attempts: usize::from(self.max_attempts),
            insert_delay: Duration::from_millis(self.insert_delay_ms),
            ..ApiConfig::default()
        }
    }
}

//! Client for the playlist endpoints of the YouTube Data API v3.
//!
//! Only the calls needed to keep a playlist in sync are covered: listing the items of a
//! playlist ([`YouTubeClient::list_playlist_items`]), appending a video
//! ([`YouTubeClient::insert_playlist_item`]) and creating a playlist
//! ([`YouTubeClient::create_playlist`]). All of them authenticate with an OAuth access token
//! that the client refreshes on its own once it expires.
//!
//! List endpoints page with `nextPageToken`; [`types::paged`] turns them into item-by-item
//! streams.

pub mod client;
pub mod playlists;
pub mod types;

pub use client::{TimeBoundAccessToken, YouTubeClient};
pub use playlists::{Playlist, PlaylistItem, PrivacyStatus};
pub use types::{PageInfo, paged};

//! Discord REST API client: channel lookup and backward history scans.

pub mod client;
pub mod types;

pub use client::{DiscordClient, TokenType};
pub use types::{Channel, ChannelType, Message, Snowflake};

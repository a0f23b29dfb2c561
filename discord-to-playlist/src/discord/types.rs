//! Discord resource types, limited to the fields the scan needs.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A Discord snowflake ID.
///
/// Snowflakes grow with creation time, so comparing two IDs compares when the underlying
/// objects were created. Discord serializes them as strings to survive JavaScript number
/// precision; both strings and plain integers are accepted here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Snowflake(pub u64);

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            String(String),
            Number(u64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(Self(n)),
            Repr::String(s) => s
                .parse()
                .map(Self)
                .map_err(|_| serde::de::Error::custom(format!("invalid snowflake: {s:?}"))),
        }
    }
}

/// The `type` of a Discord channel.
///
/// See: <https://discord.com/developers/docs/resources/channel#channel-object-channel-types>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelType(pub u8);

impl ChannelType {
    /// A text channel within a server.
    pub const GUILD_TEXT: Self = Self(0);
    /// A channel that users can follow and crosspost into their own server (formerly news).
    pub const GUILD_ANNOUNCEMENT: Self = Self(5);

    /// Whether messages in this channel can be scanned for links.
    pub fn is_text_like(self) -> bool {
        matches!(self, Self::GUILD_TEXT | Self::GUILD_ANNOUNCEMENT)
    }
}

/// A Discord channel.
///
/// See: <https://discord.com/developers/docs/resources/channel#channel-object>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: ChannelType,
}

/// A message sent in a channel.
///
/// See: <https://discord.com/developers/docs/resources/message#message-object>
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    /// Message text. Empty for messages without text, or when the token lacks the
    /// message content intent.
    #[serde(default)]
    pub content: String,
}

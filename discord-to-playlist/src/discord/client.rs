//! Reading channel history from the Discord REST API.

use crate::discord::types::{Channel, Message};
use crate::error::RequestError;
use crate::http::ApiClient;
use http::Method;
use tokio_stream::Stream;
use tracing::instrument;

/// How the token passed on the command line should be presented to Discord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TokenType {
    /// A user account token, sent without a prefix.
    #[default]
    User,
    /// An OAuth2 bearer token.
    Bearer,
    /// A bot token.
    Bot,
}

impl TokenType {
    /// Builds the `Authorization` header value for `token`.
    pub fn authorization(self, token: &str) -> String {
        match self {
            Self::User => token.to_string(),
            Self::Bearer => format!("Bearer {token}"),
            Self::Bot => format!("Bot {token}"),
        }
    }
}

/// Client for the handful of Discord endpoints needed to scan a channel.
#[derive(Clone)]
pub struct DiscordClient {
    api: ApiClient,
    authorization: String,
}

impl std::fmt::Debug for DiscordClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordClient")
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}

impl DiscordClient {
    pub fn new(api: ApiClient, token_type: TokenType, token: &str) -> Self {
        Self {
            api,
            authorization: token_type.authorization(token),
        }
    }

    /// Fetches a channel by ID.
    ///
    /// <https://discord.com/developers/docs/resources/channel#get-channel>
    #[instrument(skip(self))]
    pub async fn channel(&self, channel_id: u64) -> Result<Channel, RequestError> {
        self.api
            .request::<_, ()>(
                Method::GET,
                &self.api.config().discord_api_base,
                &format!("/channels/{channel_id}"),
                &[],
                &self.authorization,
                None,
            )
            .await
    }

    /// Fetches up to `limit` messages sent before `before`, newest first.
    ///
    /// <https://discord.com/developers/docs/resources/message#get-channel-messages>
    #[instrument(skip(self))]
    pub async fn messages_before(
        &self,
        channel_id: u64,
        before: u64,
        limit: u32,
    ) -> Result<Vec<Message>, RequestError> {
        let before = before.to_string();
        let limit = limit.to_string();
        let messages: Vec<Message> = self
            .api
            .request::<_, ()>(
                Method::GET,
                &self.api.config().discord_api_base,
                &format!("/channels/{channel_id}/messages"),
                &[("before", before.as_str()), ("limit", limit.as_str())],
                &self.authorization,
                None,
            )
            .await?;
        tracing::debug!(returned = messages.len(), "fetched message page");
        Ok(messages)
    }

    /// Walks the history of `channel_id` backwards, from `start_message_id` (inclusive) down
    /// to `end_message_id` (inclusive), yielding one batch per page.
    ///
    /// The channel must be a text or announcement channel; that is checked before any
    /// messages are requested. Batches only hold messages at or above the end boundary and
    /// are never empty. Messages within a batch are newest first, as Discord returns them.
    ///
    /// The stream ends after the first page that, once filtered, holds fewer messages than
    /// the page size: either the history is exhausted or the end boundary was crossed.
    pub fn message_batches(
        &self,
        channel_id: u64,
        start_message_id: u64,
        end_message_id: u64,
    ) -> impl Stream<Item = Result<Vec<Message>, RequestError>> + use<'_> {
        async_stream::try_stream! {
            let channel = self.channel(channel_id).await?;
            ensure_scannable(channel_id, &channel)?;

            let page_size = self.api.config().message_page_size;
            let mut before = start_message_id.saturating_add(1);
            loop {
                let page = self.messages_before(channel_id, before, page_size).await?;
                // The cursor follows the unfiltered page so boundary messages are never skipped.
                let oldest = page.iter().map(|m| m.id.0).min();
                let batch: Vec<Message> = page
                    .into_iter()
                    .filter(|m| m.id.0 >= end_message_id)
                    .collect();
                let exhausted = batch.len() < page_size as usize;

                if !batch.is_empty() {
                    yield batch;
                }
                match oldest {
                    Some(oldest) if !exhausted => before = oldest,
                    _ => break,
                }
            }
        }
    }
}

fn ensure_scannable(channel_id: u64, channel: &Channel) -> Result<(), RequestError> {
    if channel.kind.is_text_like() {
        Ok(())
    } else {
        Err(RequestError::InvalidChannelType {
            channel_id,
            kind: channel.kind.0,
        })
    }
}

//! The on-disk cache of YouTube credentials and the once-per-run token resolution.

use crate::oauth::OAuthManager;
use crate::youtube_api::TimeBoundAccessToken;
use eyre::Context;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// A JSON file holding the last token issued to this program.
#[derive(Debug, Clone)]
pub struct CredentialCache {
    path: PathBuf,
}

impl CredentialCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the cached token, or `None` if nothing has been cached yet.
    pub async fn load(&self) -> eyre::Result<Option<TimeBoundAccessToken>> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("read credential cache {}", self.path.display()));
            }
        };
        let token = serde_json::from_str(&json)
            .with_context(|| format!("parse credential cache {}", self.path.display()))?;
        Ok(Some(token))
    }

    /// Overwrites the cache with `token`.
    pub async fn store(&self, token: &TimeBoundAccessToken) -> eyre::Result<()> {
        let json = serde_json::to_string_pretty(token).context("serialize credentials")?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("write credential cache {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), "stored credentials");
        Ok(())
    }
}

/// Produces a usable token for this run.
///
/// A cached, unexpired token is used as is. An expired one is refreshed and written back.
/// When there is no cache, or the refresh is rejected, the user is sent through the
/// browser consent flow and the new token is cached.
#[instrument(skip_all, fields(cache = %cache.path().display()))]
pub async fn authenticate(
    cache: &CredentialCache,
    oauth: &OAuthManager,
) -> eyre::Result<TimeBoundAccessToken> {
    let Some(mut token) = cache.load().await? else {
        tracing::info!("no cached credentials, starting authorization");
        return authorize(cache, oauth).await;
    };

    if !token.is_expired() {
        tracing::debug!(expires_at = %token.expires_at(), "using cached credentials");
        return Ok(token);
    }

    tracing::info!("cached credentials expired, refreshing");
    if token
        .refresh(oauth)
        .await
        .context("refresh cached credentials")?
    {
        cache.store(&token).await?;
        Ok(token)
    } else {
        tracing::warn!("refresh rejected, falling back to full authorization");
        authorize(cache, oauth).await
    }
}

async fn authorize(
    cache: &CredentialCache,
    oauth: &OAuthManager,
) -> eyre::Result<TimeBoundAccessToken> {
    let raw_token = oauth
        .authenticate()
        .await
        .context("authorize user to YouTube")?;
    let token = TimeBoundAccessToken::new(raw_token);
    cache.store(&token).await?;
    Ok(token)
}

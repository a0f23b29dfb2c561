//! OAuth 2.0 flows for YouTube API authentication.
//!
//! Covers the interactive installed-app authorization (loopback redirect + PKCE) and
//! refreshing an existing token. Client credentials come from the JSON file Google hands
//! out for an OAuth client ("Download JSON" in the Cloud console).

use eyre::Context;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use oauth2::basic::{BasicClient, BasicErrorResponseType, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    RedirectUrl, RequestTokenError, Scope, TokenResponse, TokenUrl, reqwest,
};
use serde::Deserialize;
use std::convert::Infallible;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Mutex;
use tokio::net::TcpListener;

/// Scope needed to read and modify the user's playlists.
pub const YOUTUBE_SCOPE: &str = "https://www.googleapis.com/auth/youtube";

const OAUTH_DONE_HTML: &str = "<!DOCTYPE html>
<html>
<head><title>discord-to-playlist</title></head>
<body><p>Authorization complete. You can close this tab and return to the terminal.</p></body>
</html>
";

const OAUTH_FAILED_HTML: &str = "<!DOCTYPE html>
<html>
<head><title>discord-to-playlist</title></head>
<body><p>Authorization failed. Check the terminal for details.</p></body>
</html>
";

/// OAuth client details from a Google client-secrets file.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// The client-secrets file nests the client under the kind of application it was made for.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ClientSecretsFile {
    Installed(ClientSecrets),
    Web(ClientSecrets),
}

impl ClientSecrets {
    pub fn from_json(json: &str) -> eyre::Result<Self> {
        let file: ClientSecretsFile =
            serde_json::from_str(json).context("parse OAuth client secrets")?;
        Ok(match file {
            ClientSecretsFile::Installed(secrets) | ClientSecretsFile::Web(secrets) => secrets,
        })
    }

    pub async fn from_file(path: &Path) -> eyre::Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read OAuth client secrets from {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("load {}", path.display()))
    }
}

/// Runs OAuth 2.0 flows against Google's authorization server.
#[derive(Debug, Clone)]
pub struct OAuthManager {
    secrets: ClientSecrets,
    http_client: reqwest::Client,
}

impl OAuthManager {
    pub fn new(secrets: ClientSecrets) -> eyre::Result<Self> {
        let http_client = reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("build OAuth HTTP client")?;
        Ok(Self {
            secrets,
            http_client,
        })
    }

    fn client_id(&self) -> ClientId {
        ClientId::new(self.secrets.client_id.clone())
    }

    fn client_secret(&self) -> ClientSecret {
        ClientSecret::new(self.secrets.client_secret.clone())
    }

    fn token_url(&self) -> eyre::Result<TokenUrl> {
        TokenUrl::new(self.secrets.token_uri.clone()).context("parse token endpoint URL")
    }

    /// Runs the installed-app authorization-code flow and returns the issued token.
    ///
    /// The consent page is opened in the user's browser (the URL is also printed, for
    /// machines without one). Google redirects back to a listener on a random loopback
    /// port, and the code it carries is exchanged for a token using PKCE.
    pub async fn authenticate(&self) -> eyre::Result<BasicTokenResponse> {
        let listener = RedirectListener::bind().await?;
        let auth_url =
            AuthUrl::new(self.secrets.auth_uri.clone()).context("parse authorization URL")?;
        let client = BasicClient::new(self.client_id())
            .set_client_secret(self.client_secret())
            .set_auth_uri(auth_url)
            .set_token_uri(self.token_url()?)
            .set_redirect_uri(listener.url.clone());

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (consent_url, csrf) = client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(YOUTUBE_SCOPE.to_string()))
            // Without offline access Google hands out no refresh token.
            .add_extra_param("access_type", "offline")
            .set_pkce_challenge(pkce_challenge)
            .url();

        tracing::info!(url = %consent_url, "waiting for user consent");
        eprintln!("Open this URL to authorize access to your YouTube account:\n\n  {consent_url}\n");
        if let Err(e) = webbrowser::open(consent_url.as_str()) {
            tracing::warn!(error = %e, "could not open browser, waiting for manual visit");
        }

        let code = listener
            .authorization_code(&csrf)
            .await
            .context("receive authorization redirect")?;
        client
            .exchange_code(code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http_client)
            .await
            .context("exchange authorization code for a token")
    }

    /// Trades the refresh token in `token` for a new access token.
    ///
    /// Returns `Ok(None)` when `token` has no refresh token or Google no longer accepts it
    /// (`invalid_grant`); only the consent flow can help then.
    pub async fn refresh_token(
        &self,
        token: &BasicTokenResponse,
    ) -> eyre::Result<Option<BasicTokenResponse>> {
        let Some(refresh_token) = token.refresh_token() else {
            tracing::warn!("token carries no refresh token");
            return Ok(None);
        };

        let client = BasicClient::new(self.client_id())
            .set_client_secret(self.client_secret())
            .set_token_uri(self.token_url()?);
        let result = client
            .exchange_refresh_token(refresh_token)
            .request_async(&self.http_client)
            .await;

        match result {
            Ok(refreshed) => {
                tracing::debug!("refreshed access token");
                Ok(Some(refreshed))
            }
            Err(RequestTokenError::ServerResponse(response))
                if matches!(response.error(), BasicErrorResponseType::InvalidGrant) =>
            {
                tracing::warn!(
                    description = response.error_description().map(String::as_str),
                    "refresh token revoked or expired"
                );
                Ok(None)
            }
            Err(e) => Err(e).context("exchange refresh token"),
        }
    }
}

/// Loopback HTTP listener for the redirect that ends the consent flow.
struct RedirectListener {
    listener: TcpListener,
    url: RedirectUrl,
}

impl RedirectListener {
    async fn bind() -> eyre::Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .context("bind redirect listener")?;
        let addr = listener
            .local_addr()
            .context("read redirect listener address")?;
        let url = RedirectUrl::new(format!("http://{addr}")).context("build redirect URL")?;
        Ok(Self { listener, url })
    }

    /// Serves one request per connection until the redirect for `csrf` arrives.
    ///
    /// Requests that are not an OAuth redirect (a browser asking for `/favicon.ico`, say)
    /// get a 404 and are otherwise ignored.
    async fn authorization_code(self, csrf: &CsrfToken) -> eyre::Result<AuthorizationCode> {
        loop {
            let (stream, peer) = self
                .listener
                .accept()
                .await
                .context("accept redirect connection")?;

            let outcome = Mutex::new(None);
            let service = service_fn(|req: Request<Incoming>| {
                let redirect = parse_redirect(req.uri().query(), csrf);
                let (status, page) = match &redirect {
                    Some(Ok(_)) => (StatusCode::OK, OAUTH_DONE_HTML),
                    Some(Err(_)) => (StatusCode::BAD_REQUEST, OAUTH_FAILED_HTML),
                    None => (StatusCode::NOT_FOUND, ""),
                };
                if redirect.is_some() {
                    if let Ok(mut outcome) = outcome.lock() {
                        *outcome = redirect;
                    }
                }
                let mut response = Response::new(Full::new(Bytes::from_static(page.as_bytes())));
                *response.status_mut() = status;
                std::future::ready(Ok::<_, Infallible>(response))
            });
            if let Err(e) = http1::Builder::new()
                .keep_alive(false)
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                tracing::debug!(%peer, error = %e, "redirect connection failed");
            }

            let outcome = outcome.into_inner().ok().flatten();
            if let Some(outcome) = outcome {
                return outcome;
            }
            tracing::debug!(%peer, "ignoring request that is not an OAuth redirect");
        }
    }
}

/// Interprets the query string of a request to the redirect listener.
///
/// `None` means the request is not an OAuth redirect at all.
fn parse_redirect(
    query: Option<&str>,
    csrf: &CsrfToken,
) -> Option<eyre::Result<AuthorizationCode>> {
    let mut state = None;
    let mut code = None;
    let mut error = None;
    for (k, v) in form_urlencoded::parse(query.unwrap_or("").as_bytes()) {
        match &*k {
            "state" => state = Some(v.into_owned()),
            "code" => code = Some(v.into_owned()),
            "error" => error = Some(v.into_owned()),
            _ => {}
        }
    }

    if state.is_none() && code.is_none() && error.is_none() {
        return None;
    }
    Some(if state.as_deref() != Some(csrf.secret().as_str()) {
        Err(eyre::eyre!("redirect carried an unexpected CSRF state"))
    } else if let Some(error) = error {
        Err(eyre::eyre!("authorization was not granted: {error}"))
    } else if let Some(code) = code {
        Ok(AuthorizationCode::new(code))
    } else {
        Err(eyre::eyre!("redirect carried no authorization code"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockResponse, MockServer};
    use pretty_assertions::assert_eq;

    #[test]
    fn installed_client_secrets_parse() {
        let secrets = ClientSecrets::from_json(
            r#"{"installed": {
                "client_id": "123.apps.googleusercontent.com",
                "project_id": "d2p",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "auth_provider_x509_cert_url": "https://www.googleapis.com/oauth2/v1/certs",
                "client_secret": "shh",
                "redirect_uris": ["http://localhost"]
            }}"#,
        )
        .unwrap();
        assert_eq!(secrets.client_id, "123.apps.googleusercontent.com");
        assert_eq!(secrets.client_secret, "shh");
        assert_eq!(secrets.token_uri, "https://oauth2.googleapis.com/token");
    }

    #[test]
    fn web_client_secrets_fall_back_to_default_endpoints() {
        let secrets =
            ClientSecrets::from_json(r#"{"web": {"client_id": "id", "client_secret": "secret"}}"#)
                .unwrap();
        assert_eq!(secrets.auth_uri, default_auth_uri());
        assert_eq!(secrets.token_uri, default_token_uri());
    }

    #[test]
    fn unknown_client_secrets_shape_is_rejected() {
        assert!(ClientSecrets::from_json(r#"{"client_id": "id"}"#).is_err());
        assert!(ClientSecrets::from_json("not json").is_err());
    }

    #[test]
    fn redirect_yields_code_for_matching_state() {
        let csrf = CsrfToken::new("abc".to_string());
        let code = parse_redirect(Some("state=abc&code=4%2F0Ab&scope=x"), &csrf)
            .unwrap()
            .unwrap();
        assert_eq!(code.secret(), "4/0Ab");
    }

    #[test]
    fn redirect_rejects_bad_state_and_denial() {
        let csrf = CsrfToken::new("abc".to_string());
        assert!(parse_redirect(Some("state=other&code=x"), &csrf).unwrap().is_err());
        assert!(parse_redirect(Some("code=x"), &csrf).unwrap().is_err());
        assert!(parse_redirect(Some("state=abc"), &csrf).unwrap().is_err());

        let denied = parse_redirect(Some("state=abc&error=access_denied"), &csrf)
            .unwrap()
            .unwrap_err();
        assert!(denied.to_string().contains("access_denied"), "{denied}");
    }

    #[test]
    fn unrelated_requests_are_not_redirects() {
        let csrf = CsrfToken::new("abc".to_string());
        assert!(parse_redirect(None, &csrf).is_none());
        assert!(parse_redirect(Some("v=1"), &csrf).is_none());
    }

    #[tokio::test]
    async fn listener_waits_for_the_redirect() {
        let listener = RedirectListener::bind().await.unwrap();
        let base = listener.url.url().as_str().trim_end_matches('/').to_string();
        let browser = tokio::spawn(async move {
            let favicon = reqwest::get(format!("{base}/favicon.ico")).await.unwrap();
            let redirect = reqwest::get(format!("{base}/?state=expected&code=4%2F0Ab"))
                .await
                .unwrap();
            (favicon.status().as_u16(), redirect.status().as_u16())
        });

        let csrf = CsrfToken::new("expected".to_string());
        let code = listener.authorization_code(&csrf).await.unwrap();
        assert_eq!(code.secret(), "4/0Ab");
        assert_eq!(browser.await.unwrap(), (404, 200));
    }

    #[tokio::test]
    async fn invalid_grant_means_no_refresh() {
        let server = MockServer::start(|_| {
            MockResponse::json(
                400,
                serde_json::json!({"error": "invalid_grant", "error_description": "Token has been expired or revoked."}),
            )
        })
        .await;
        let manager = OAuthManager::new(ClientSecrets {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            auth_uri: default_auth_uri(),
            token_uri: format!("{}/token", server.url()),
        })
        .unwrap();
        let token: BasicTokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "a",
            "token_type": "Bearer",
            "refresh_token": "revoked"
        }))
        .unwrap();

        assert!(manager.refresh_token(&token).await.unwrap().is_none());
        assert_eq!(server.requests_to("/token").len(), 1);
    }

    #[tokio::test]
    async fn missing_refresh_token_means_no_refresh() {
        let manager = OAuthManager::new(ClientSecrets {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            auth_uri: default_auth_uri(),
            // never contacted
            token_uri: "http://127.0.0.1:9/token".to_string(),
        })
        .unwrap();
        let token: BasicTokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "a",
            "token_type": "Bearer",
            "expires_in": 3600
        }))
        .unwrap();
        assert!(manager.refresh_token(&token).await.unwrap().is_none());
    }
}

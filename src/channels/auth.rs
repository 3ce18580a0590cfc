//! Gmail access-token handling.
//!
//! A static token is used as-is. An authorized-user token is refreshed through
//! its `token_uri` and cached until shortly before it expires.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::channels::gmail_types::{TokenResponse, error_message};
use crate::config::{GmailCredential, OAuthToken};
use crate::error::FetchError;

const PROVIDER: &str = "gmail";

/// Refresh this long before the reported expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

struct CachedToken {
    token: SecretString,
    /// `None` when the expiry is unknown (token supplied in config).
    expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_none_or(|at| at - Duration::seconds(EXPIRY_MARGIN_SECS) > now)
    }
}

/// Hands out bearer tokens for Gmail requests.
pub struct TokenSource {
    http: Client,
    credential: GmailCredential,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(http: Client, credential: GmailCredential) -> Self {
        let seed = match &credential {
            GmailCredential::AccessToken(token) => Some(CachedToken {
                token: token.clone(),
                expires_at: None,
            }),
            GmailCredential::OAuth(oauth) => oauth.token.clone().map(|token| CachedToken {
                token,
                expires_at: None,
            }),
        };
        Self {
            http,
            credential,
            cached: Mutex::new(seed),
        }
    }

    /// Whether a rejected token can be replaced by refreshing.
    pub fn can_refresh(&self) -> bool {
        matches!(self.credential, GmailCredential::OAuth(_))
    }

    /// A bearer token, refreshing first if the cached one is stale.
    pub async fn access_token(&self) -> Result<SecretString, FetchError> {
        let mut guard = self.cached.lock().await;
        if let Some(cached) = guard.as_ref()
            && cached.is_fresh(Utc::now())
        {
            return Ok(cached.token.clone());
        }

        let GmailCredential::OAuth(oauth) = &self.credential else {
            return Err(FetchError::Authentication {
                provider: PROVIDER.into(),
                reason: "access token expired and no refresh token is configured".into(),
            });
        };

        let fresh = refresh(&self.http, oauth).await?;
        let token = fresh.token.clone();
        *guard = Some(fresh);
        Ok(token)
    }

    /// Drop the cached token so the next call refreshes.
    pub async fn invalidate(&self) {
        if self.can_refresh() {
            debug!("Invalidating cached Gmail access token");
            *self.cached.lock().await = None;
        }
    }
}

async fn refresh(http: &Client, oauth: &OAuthToken) -> Result<CachedToken, FetchError> {
    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", oauth.refresh_token.expose_secret()),
        ("client_id", oauth.client_id.as_str()),
        ("client_secret", oauth.client_secret.expose_secret()),
    ];

    let response = http
        .post(&oauth.token_uri)
        .form(&params)
        .send()
        .await
        .map_err(|e| FetchError::Transient {
            provider: PROVIDER.into(),
            reason: format!("token refresh request failed: {e}"),
            retry_after: None,
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let reason = format!("token refresh rejected ({status}): {}", error_message(&body));
        return Err(if status.is_server_error() || status.as_u16() == 429 {
            FetchError::Transient {
                provider: PROVIDER.into(),
                reason,
                retry_after: None,
            }
        } else {
            FetchError::Authentication {
                provider: PROVIDER.into(),
                reason,
            }
        });
    }

    let parsed: TokenResponse = response.json().await.map_err(|e| FetchError::Request {
        provider: PROVIDER.into(),
        reason: format!("invalid token response: {e}"),
    })?;

    info!(expires_in = parsed.expires_in, "Refreshed Gmail access token");
    Ok(CachedToken {
        token: SecretString::from(parsed.access_token),
        expires_at: parsed
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_without_expiry_is_fresh() {
        let cached = CachedToken {
            token: SecretString::from("t"),
            expires_at: None,
        };
        assert!(cached.is_fresh(Utc::now()));
    }

    #[test]
    fn token_inside_margin_is_stale() {
        let now = Utc::now();
        let cached = CachedToken {
            token: SecretString::from("t"),
            expires_at: Some(now + Duration::seconds(30)),
        };
        assert!(!cached.is_fresh(now));

        let cached = CachedToken {
            token: SecretString::from("t"),
            expires_at: Some(now + Duration::seconds(600)),
        };
        assert!(cached.is_fresh(now));
    }

    #[tokio::test]
    async fn static_token_is_returned_and_not_refreshable() {
        let source = TokenSource::new(
            Client::new(),
            GmailCredential::AccessToken(SecretString::from("ya29.static")),
        );
        assert!(!source.can_refresh());
        let token = source.access_token().await.unwrap();
        assert_eq!(token.expose_secret(), "ya29.static");

        // Invalidation is a no-op for static tokens.
        source.invalidate().await;
        assert!(source.access_token().await.is_ok());
    }
}

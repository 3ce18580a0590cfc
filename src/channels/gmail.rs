//! Gmail REST channel.
//!
//! Lists inbox messages inside the fetch window, downloads each one in `raw`
//! format and parses the RFC 822 payload with mail-parser. Fetching is
//! sequential; a single listing page covers the whole window since
//! `max_results` never exceeds the API's page limit.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeZone, Utc};
use mail_parser::MessageParser;
use regex::Regex;
use reqwest::{Client, StatusCode, header};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::channels::auth::TokenSource;
use crate::channels::gmail_types::{ListMessagesResponse, Profile, RawMessage, error_message};
use crate::config::GmailConfig;
use crate::error::FetchError;
use crate::pipeline::types::{FetchWindow, InboundMessage, MailFetcher};

const PROVIDER: &str = "gmail";

/// Messages with less body text than this are not worth classifying.
pub const MIN_BODY_CHARS: usize = 10;

static HTML_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(script|style)\b.*?</(script|style)\s*>").unwrap());
static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());

/// Gmail API client implementing [`MailFetcher`].
pub struct GmailClient {
    http: Client,
    api_base: String,
    user: String,
    tokens: TokenSource,
}

impl GmailClient {
    pub fn new(config: GmailConfig, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Request {
                provider: PROVIDER.into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        let tokens = TokenSource::new(http.clone(), config.credential);
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            user: config.user_email,
            tokens,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/users/{}/{}", self.api_base, self.user, path)
    }

    /// GET a JSON resource, refreshing the token once on a 401.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let mut refreshed = false;
        loop {
            let token = self.tokens.access_token().await?;
            let response = self
                .http
                .get(url)
                .bearer_auth(token.expose_secret())
                .query(query)
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED && !refreshed && self.tokens.can_refresh() {
                debug!("Gmail rejected the access token, refreshing");
                self.tokens.invalidate().await;
                refreshed = true;
                continue;
            }

            if !status.is_success() {
                let retry_after = retry_after(response.headers());
                let body = response.text().await.unwrap_or_default();
                return Err(status_error(status, retry_after, &body));
            }

            return response.json::<T>().await.map_err(|e| FetchError::Request {
                provider: PROVIDER.into(),
                reason: format!("invalid response body: {e}"),
            });
        }
    }
}

#[async_trait]
impl MailFetcher for GmailClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch_recent(&self, window: FetchWindow) -> Result<Vec<InboundMessage>, FetchError> {
        let since = window.since(Utc::now());
        let query = search_query(since);
        debug!(query = %query, max_results = window.max_results(), "Listing Gmail messages");

        let listing: ListMessagesResponse = self
            .get_json(
                &self.url("messages"),
                &[
                    ("q", query),
                    ("maxResults", window.max_results().to_string()),
                ],
            )
            .await?;

        let mut messages = Vec::with_capacity(listing.messages.len());
        for entry in listing.messages {
            let fetched: Result<RawMessage, FetchError> = self
                .get_json(
                    &self.url(&format!("messages/{}", entry.id)),
                    &[("format", "raw".to_string())],
                )
                .await;
            // Credential and rate-limit failures affect every message.
            let raw = match fetched {
                Ok(raw) => raw,
                Err(FetchError::Request { reason, .. }) => {
                    warn!(id = %entry.id, reason = %reason, "Could not fetch Gmail message, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };

            match parse_raw_message(raw) {
                Some(msg) if msg.received_at < since => {
                    debug!(id = %msg.id, "Skipping message older than window");
                }
                Some(msg) if msg.body.chars().count() < MIN_BODY_CHARS => {
                    debug!(id = %msg.id, "Skipping message with too little body text");
                }
                Some(msg) => messages.push(msg),
                None => warn!(id = %entry.id, "Could not parse Gmail message, skipping"),
            }
        }

        messages.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        messages.truncate(window.max_results() as usize);

        info!(
            count = messages.len(),
            days = window.days(),
            "Fetched Gmail messages"
        );
        Ok(messages)
    }

    async fn profile(&self) -> Result<String, FetchError> {
        let profile: Profile = self.get_json(&self.url("profile"), &[]).await?;
        Ok(profile.email_address)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Gmail search expression for inbox mail received since `since`.
pub fn search_query(since: DateTime<Utc>) -> String {
    format!("after:{} in:inbox", since.format("%Y/%m/%d"))
}

/// Decode and parse a `format=raw` message. `None` if the payload is missing
/// or not a parseable message.
pub fn parse_raw_message(raw: RawMessage) -> Option<InboundMessage> {
    let data = raw.raw?;
    let bytes = URL_SAFE_NO_PAD.decode(data.trim().trim_end_matches('=')).ok()?;
    let parsed = MessageParser::default().parse(&bytes)?;

    let from = parsed.from().and_then(|addr| addr.first());
    let sender = from
        .and_then(|a| a.address())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".into());
    let sender_name = from
        .and_then(|a| a.name())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let received_at = raw
        .internal_date
        .as_deref()
        .and_then(|ms| ms.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .or_else(|| {
            parsed
                .date()
                .and_then(|d| Utc.timestamp_opt(d.to_timestamp(), 0).single())
        })?;

    Some(InboundMessage {
        id: raw.id,
        thread_id: raw.thread_id,
        sender,
        sender_name,
        subject: parsed.subject().unwrap_or("(no subject)").trim().to_string(),
        body: extract_text(&parsed).trim().to_string(),
        received_at,
    })
}

/// Plain text body, falling back to the HTML part with tags removed.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    String::new()
}

/// Remove markup, script/style blocks and common entities; collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let without_blocks = HTML_BLOCK_RE.replace_all(html, " ");
    let text = HTML_TAG_RE.replace_all(&without_blocks, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() || e.is_connect() {
        FetchError::Transient {
            provider: PROVIDER.into(),
            reason: e.to_string(),
            retry_after: None,
        }
    } else {
        FetchError::Request {
            provider: PROVIDER.into(),
            reason: e.to_string(),
        }
    }
}

fn retry_after(headers: &header::HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Map a non-success status to the fetch error taxonomy.
fn status_error(status: StatusCode, retry_after: Option<Duration>, body: &str) -> FetchError {
    let reason = format!("{status}: {}", error_message(body));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Authentication {
            provider: PROVIDER.into(),
            reason,
        },
        StatusCode::TOO_MANY_REQUESTS => FetchError::Transient {
            provider: PROVIDER.into(),
            reason,
            retry_after,
        },
        s if s.is_server_error() => FetchError::Transient {
            provider: PROVIDER.into(),
            reason,
            retry_after,
        },
        _ => FetchError::Request {
            provider: PROVIDER.into(),
            reason,
        },
    }
}

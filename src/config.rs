//! Configuration types, built from environment variables.
//!
//! Every external dependency is optional at start-up: a missing credential
//! leaves the matching sub-config as `None`, and the health endpoint reports
//! the gap instead of the process refusing to start.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default model for classification and drafting.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default Gmail REST endpoint.
pub const DEFAULT_GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// Default Notion REST endpoint.
pub const DEFAULT_NOTION_API_BASE: &str = "https://api.notion.com/v1";

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ai: Option<AiConfig>,
    pub gmail: Option<GmailConfig>,
    pub notion: Option<NotionConfig>,
    /// Directory for the rolling log file (stderr only when unset).
    pub log_dir: Option<PathBuf>,
    /// Problems that disable an optional integration. Logged once tracing is up.
    pub warnings: Vec<String>,
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub debug: bool,
    /// Timeout applied to every outbound HTTP call.
    pub http_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10000,
            debug: false,
            http_timeout: Duration::from_secs(30),
        }
    }
}

/// LLM provider settings.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: SecretString,
    pub model: String,
    /// Extra attempts for rate-limited completions.
    pub max_retries: u32,
}

/// How the Gmail client authenticates.
#[derive(Debug, Clone)]
pub enum GmailCredential {
    /// A bearer token used as-is until it expires.
    AccessToken(SecretString),
    /// An authorized-user token that can be refreshed.
    OAuth(OAuthToken),
}

/// Authorized-user token in the JSON shape Google client libraries write.
#[derive(Debug, Clone)]
pub struct OAuthToken {
    pub token: Option<SecretString>,
    pub refresh_token: SecretString,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: SecretString,
}

#[derive(serde::Deserialize)]
struct OAuthTokenJson {
    #[serde(default)]
    token: Option<String>,
    refresh_token: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
    client_id: String,
    client_secret: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl OAuthToken {
    /// Parse the authorized-user JSON document.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let json: OAuthTokenJson = serde_json::from_str(raw)?;
        Ok(Self {
            token: json.token.map(SecretString::from),
            refresh_token: SecretString::from(json.refresh_token),
            token_uri: json.token_uri,
            client_id: json.client_id,
            client_secret: SecretString::from(json.client_secret),
        })
    }
}

/// Gmail API settings.
#[derive(Debug, Clone)]
pub struct GmailConfig {
    pub credential: GmailCredential,
    pub user_email: String,
    pub api_base: String,
}

/// Notion API settings.
#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub token: SecretString,
    pub database_id: String,
    pub api_base: String,
}

impl AppConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let defaults = ServerConfig::default();
        let server = ServerConfig {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_or("PORT", get("PORT"), defaults.port)?,
            debug: get("DEBUG")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
            http_timeout: Duration::from_secs(parse_or(
                "HTTP_TIMEOUT_SECS",
                get("HTTP_TIMEOUT_SECS"),
                defaults.http_timeout.as_secs(),
            )?),
        };

        let ai = match get("OPENAI_API_KEY") {
            Some(key) => Some(AiConfig {
                api_key: SecretString::from(key),
                model: get("AI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                max_retries: parse_or("AI_MAX_RETRIES", get("AI_MAX_RETRIES"), 2)?,
            }),
            None => None,
        };

        let credential = if let Some(raw) = get("GOOGLE_OAUTH_TOKEN") {
            let token = OAuthToken::from_json(&raw).map_err(|e| {
                ConfigError::InvalidValue {
                    key: "GOOGLE_OAUTH_TOKEN".into(),
                    message: e.to_string(),
                }
            })?;
            Some(GmailCredential::OAuth(token))
        } else {
            get("GMAIL_ACCESS_TOKEN").map(|t| GmailCredential::AccessToken(SecretString::from(t)))
        };

        let gmail = credential.map(|credential| GmailConfig {
            credential,
            user_email: get("GMAIL_USER_EMAIL").unwrap_or_else(|| "me".to_string()),
            api_base: get("GMAIL_API_BASE")
                .unwrap_or_else(|| DEFAULT_GMAIL_API_BASE.to_string()),
        });

        let mut warnings = Vec::new();
        let notion = match (get("NOTION_TOKEN"), get("NOTION_DATABASE_ID")) {
            (Some(token), Some(database_id)) => Some(NotionConfig {
                token: SecretString::from(token),
                database_id,
                api_base: get("NOTION_API_BASE")
                    .unwrap_or_else(|| DEFAULT_NOTION_API_BASE.to_string()),
            }),
            (Some(_), None) => {
                warnings.push("NOTION_TOKEN set without NOTION_DATABASE_ID, sync disabled".to_string());
                None
            }
            _ => None,
        };

        Ok(Self {
            server,
            ai,
            gmail,
            notion,
            log_dir: get("MAIL_TRIAGE_LOG_DIR").map(PathBuf::from),
            warnings,
        })
    }

    /// Names of required dependencies that have no credential configured.
    pub fn missing_dependencies(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.gmail.is_none() {
            missing.push("gmail_api");
        }
        if self.ai.is_none() {
            missing.push("openai_api");
        }
        missing
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on the time a single inbound request may take end-to-end.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Origins allowed by the CORS layer (the SPA frontend, usually).
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Name of the environment variable holding the base64 signing key.
    #[serde(default = "default_signing_key_env")]
    pub signing_key_env: String,
    /// Fallback signing key (base64) for deployments that cannot inject env
    /// vars.
    ///
    /// **Hot-reload safe:** NO. The key is read once at startup; rotating it
    /// invalidates every issued bearer token.
    #[serde(default)]
    pub signing_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    /// Prefer `GOOGLE_CLIENT_SECRET`; this field is the fallback.
    #[serde(default)]
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_calendar_api_base")]
    pub calendar_api_base: String,
    /// Per-call timeout for every outbound Google request.
    #[serde(default = "default_google_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub google: GoogleConfig,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl ServerConfig {
    /// Full bind address, e.g. `"0.0.0.0:8080"`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_key_env: default_signing_key_env(),
            signing_key: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

impl GoogleConfig {
    /// Resolve the client secret with `GOOGLE_CLIENT_SECRET` taking priority
    /// over the config file field.
    pub fn resolved_client_secret(&self) -> Option<String> {
        std::env::var("GOOGLE_CLIENT_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.client_secret.clone())
            .filter(|s| !s.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

pub fn default_bind() -> String {
    "127.0.0.1".to_string()
}

pub fn default_port() -> u16 {
    8080
}

pub fn default_request_timeout() -> u64 {
    45
}

pub fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

pub fn default_signing_key_env() -> String {
    "JWT_SECRET".to_string()
}

pub fn default_database_url() -> String {
    "sqlite://worldsync.db?mode=rwc".to_string()
}

pub fn default_scopes() -> Vec<String> {
    vec!["https://www.googleapis.com/auth/calendar.events".to_string()]
}

pub fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

pub fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

pub fn default_calendar_api_base() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

pub fn default_google_timeout() -> u64 {
    10
}

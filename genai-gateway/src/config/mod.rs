use crate::services::providers::gemini::GEMINI_API_BASE;
use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

/// Base64 inflates images by a third; leave room for several per vision request.
const DEFAULT_MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

const DEFAULT_STREAM_PACING_MS: u64 = 10;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub common: core_config::Config,
    pub google: GoogleConfig,
    pub models: ModelConfig,
    pub stream: StreamConfig,
    pub auth: AuthConfig,
    pub http: HttpConfig,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub api_key: Secret<String>,
    pub api_base: String,
}

/// Models used when a request omits `model_name`.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub text_model: String,
    pub chat_model: String,
    pub vision_model: String,
    pub embedding_model: String,
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Delay inserted after each relayed fragment.
    pub pacing_ms: u64,
}

impl StreamConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret_key: Option<Secret<String>>,
    pub algorithm: String,
    /// Exact request paths that require a bearer token. Empty disables enforcement.
    pub protected_routes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub max_body_bytes: usize,
    /// Allowed CORS origins; empty means any origin.
    pub cors_origins: Vec<String>,
}

impl GatewayConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let secret_key = env::var("API_SECRET_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .map(Secret::new);

        Ok(GatewayConfig {
            common: common_config,
            google: GoogleConfig {
                api_key: Secret::new(get_env("GEMINI_API_KEY", None, is_prod)?),
                api_base: get_env("GEMINI_API_BASE", Some(GEMINI_API_BASE), is_prod)?,
            },
            models: ModelConfig {
                text_model: get_env("DEFAULT_TEXT_MODEL", Some("gemini-2.0-flash"), is_prod)?,
                chat_model: get_env("DEFAULT_CHAT_MODEL", Some("gemini-2.0-flash"), is_prod)?,
                vision_model: get_env("DEFAULT_VISION_MODEL", Some("gemini-2.0-flash"), is_prod)?,
                embedding_model: get_env(
                    "DEFAULT_EMBEDDING_MODEL",
                    Some("text-embedding-004"),
                    is_prod,
                )?,
            },
            stream: StreamConfig {
                pacing_ms: parse_env(
                    "GATEWAY_STREAM_PACING_MS",
                    &get_optional_env("GATEWAY_STREAM_PACING_MS")
                        .unwrap_or_else(|| DEFAULT_STREAM_PACING_MS.to_string()),
                )?,
            },
            auth: AuthConfig {
                secret_key,
                algorithm: get_optional_env("API_ALGORITHM").unwrap_or_else(|| "HS256".to_string()),
                protected_routes: parse_list(
                    &get_optional_env("GATEWAY_PROTECTED_ROUTES").unwrap_or_default(),
                ),
            },
            http: HttpConfig {
                max_body_bytes: parse_env(
                    "GATEWAY_MAX_BODY_BYTES",
                    &get_optional_env("GATEWAY_MAX_BODY_BYTES")
                        .unwrap_or_else(|| DEFAULT_MAX_BODY_BYTES.to_string()),
                )?,
                cors_origins: parse_list(
                    &get_optional_env("GATEWAY_CORS_ORIGINS").unwrap_or_default(),
                ),
            },
            otlp_endpoint: get_optional_env("OTLP_ENDPOINT"),
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

/// Settings that are off unless set, in every environment.
fn get_optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, AppError> {
    raw.trim().parse().map_err(|_| {
        AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {:?}", key, raw))
    })
}

/// Split a comma-separated list, dropping blanks.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

use crate::config::AuthConfig;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

/// Never subject to authentication.
pub const HEALTH_PATH: &str = "/health";

/// Bearer token claims accepted by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

struct Verifier {
    key: DecodingKey,
    validation: Validation,
}

/// Which routes need a bearer token, and how to check it.
#[derive(Clone)]
pub struct AuthPolicy {
    protected: Arc<HashSet<String>>,
    verifier: Option<Arc<Verifier>>,
}

impl AuthPolicy {
    /// Nothing protected.
    pub fn disabled() -> Self {
        Self {
            protected: Arc::new(HashSet::new()),
            verifier: None,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, AppError> {
        let mut protected: HashSet<String> = config.protected_routes.iter().cloned().collect();
        if protected.remove(HEALTH_PATH) {
            tracing::warn!("Ignoring {} in protected routes", HEALTH_PATH);
        }

        let verifier = match &config.secret_key {
            Some(secret) => {
                let algorithm = hmac_algorithm(&config.algorithm)?;
                Some(Arc::new(Verifier {
                    key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
                    validation: Validation::new(algorithm),
                }))
            }
            None if !protected.is_empty() => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "GATEWAY_PROTECTED_ROUTES is set but API_SECRET_KEY is not"
                )));
            }
            None => None,
        };

        if !protected.is_empty() {
            tracing::info!(routes = ?protected, "Bearer authentication enforced");
        }

        Ok(Self {
            protected: Arc::new(protected),
            verifier,
        })
    }

    pub fn requires_auth(&self, path: &str) -> bool {
        path != HEALTH_PATH && self.protected.contains(path)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let verifier = self
            .verifier
            .as_ref()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Authentication unavailable")))?;

        decode::<Claims>(token, &verifier.key, &verifier.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected bearer token");
                AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token"))
            })
    }
}

fn hmac_algorithm(name: &str) -> Result<Algorithm, AppError> {
    match Algorithm::from_str(name) {
        Ok(alg @ (Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)) => Ok(alg),
        _ => Err(AppError::ConfigError(anyhow::anyhow!(
            "API_ALGORITHM must be one of HS256, HS384, HS512; got {}",
            name
        ))),
    }
}

/// Require a valid bearer token on protected routes; pass everything else through.
pub async fn auth_middleware(
    State(policy): State<AuthPolicy>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !policy.requires_auth(req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let claims = policy.verify(token)?;
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

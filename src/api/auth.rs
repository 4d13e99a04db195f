use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{ApiError, ApiState};
use crate::error::WardenError;
use crate::store::GameServer;

/// Claims carried by the bearer token a server receives at connect time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerClaims {
    pub server_id: Uuid,
    pub game_id: String,
    pub job_id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies the HS256 bearer tokens used by remote servers.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
            ttl,
        }
    }

    pub fn issue(&self, server: &GameServer) -> Result<String, WardenError> {
        let now = Utc::now();
        let claims = ServerClaims {
            server_id: server.id,
            game_id: server.game_id.clone(),
            job_id: server.job_id.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<ServerClaims, WardenError> {
        let data =
            decode::<ServerClaims>(token, &self.decoding, &Validation::new(Algorithm::HS256))?;
        Ok(data.claims)
    }
}

/// Guard for operator routes keyed by the `X-API-Key` header. Passes every
/// request through while the key requirement is disabled in config.
pub struct ApiKey;

impl FromRequestParts<ApiState> for ApiKey {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ApiState,
    ) -> Result<Self, Self::Rejection> {
        if !state.config.require_api_key {
            return Ok(ApiKey);
        }

        let presented = parts
            .headers
            .get("x-api-key")
            .and_then(|value| value.to_str().ok());

        match presented {
            Some(key) if key == state.config.api_key => Ok(ApiKey),
            _ => Err(ApiError::unauthorized("invalid or missing API key")),
        }
    }
}

/// Extractor giving handlers the verified identity behind a bearer token.
/// A missing header is 401; a token that fails verification is 403.
impl FromRequestParts<ApiState> for ServerClaims {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ApiState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        let Some(token) = token else {
            return Err(ApiError::unauthorized("authentication token required"));
        };

        state
            .tokens
            .verify(token)
            .map_err(|_| ApiError::forbidden("invalid or expired token"))
    }
}

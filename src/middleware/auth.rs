use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;
use crate::models::user::{Account, Role};
use crate::repository::user_repo;
use crate::services::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub token_type: TokenKind,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub role: Role,
}

pub fn issue_token(
    config: &Config,
    user_id: i64,
    role: Role,
    kind: TokenKind,
) -> anyhow::Result<String> {
    let now = Utc::now();
    let ttl = match kind {
        TokenKind::Access => Duration::minutes(config.access_token_ttl_minutes),
        TokenKind::Refresh => Duration::days(config.refresh_token_ttl_days),
    };

    let claims = Claims {
        sub: user_id.to_string(),
        role,
        token_type: kind,
        jti: uuid::Uuid::new_v4().simple().to_string(),
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| anyhow::anyhow!("JWT encoding failed: {}", e))
}

pub fn issue_pair(config: &Config, user_id: i64, role: Role) -> anyhow::Result<TokenPair> {
    Ok(TokenPair {
        access: issue_token(config, user_id, role, TokenKind::Access)?,
        refresh: issue_token(config, user_id, role, TokenKind::Refresh)?,
        role,
    })
}

/// Decodes a token and checks that it is of the expected kind.
pub fn validate_jwt(token: &str, secret: &str, expected: TokenKind) -> Result<Claims, AppError> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let data = decode::<Claims>(token, &key, &Validation::new(Algorithm::HS256))
        .map_err(|_| AppError::Unauthorized)?;

    if data.claims.token_type != expected {
        return Err(AppError::Unauthorized);
    }
    Ok(data.claims)
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authenticated caller; rejects the request with 401 when absent or invalid.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Account);

impl std::ops::Deref for CurrentUser {
    type Target = Account;

    fn deref(&self) -> &Account {
        &self.0
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;
        let claims = validate_jwt(token, &state.config.jwt_secret, TokenKind::Access)?;
        let user_id: i64 = claims.sub.parse().map_err(|_| AppError::Unauthorized)?;

        let mut conn = state.db.acquire().await?;
        let account = user_repo::find_account(&mut conn, user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(CurrentUser(account))
    }
}

impl CurrentUser {
    pub fn require(&self, roles: &[Role]) -> Result<(), AppError> {
        if self.has_role(roles) {
            Ok(())
        } else {
            Err(AppError::forbidden(
                "You do not have permission to perform this action.",
            ))
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        self.require(&[Role::Admin])
    }

    pub fn require_back_office(&self) -> Result<(), AppError> {
        if self.is_back_office() {
            Ok(())
        } else {
            Err(AppError::forbidden(
                "You do not have permission to perform this action.",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_round_trip() {
        let config = Config::for_tests();
        let token = issue_token(&config, 42, Role::Driver, TokenKind::Access).unwrap();
        let claims = validate_jwt(&token, &config.jwt_secret, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.role, Role::Driver);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let config = Config::for_tests();
        let token = issue_token(&config, 1, Role::Admin, TokenKind::Refresh).unwrap();
        assert!(validate_jwt(&token, &config.jwt_secret, TokenKind::Access).is_err());
        assert!(validate_jwt(&token, &config.jwt_secret, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let config = Config::for_tests();
        let token = issue_token(&config, 1, Role::Admin, TokenKind::Access).unwrap();
        assert!(validate_jwt(&token, "another-secret", TokenKind::Access).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(validate_jwt("not.a.token", "secret", TokenKind::Access).is_err());
    }
}

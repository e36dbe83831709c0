use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::config;
use crate::database::models::UserRole;

pub mod password;

pub use password::{hash_password, verify_password, PasswordError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_slug: Option<String>,
    pub role: UserRole,
    pub typ: TokenKind,
    pub jti: Uuid,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(kind: TokenKind, user_id: Uuid, tenant_id: Option<Uuid>, tenant_slug: Option<String>, role: UserRole) -> Self {
        let now = Utc::now();
        let security = &config::config().security;
        let lifetime = match kind {
            TokenKind::Access => Duration::minutes(security.jwt_expiry_minutes),
            TokenKind::Refresh => Duration::days(security.jwt_refresh_expiry_days),
        };

        Self {
            sub: user_id,
            tenant_id,
            tenant_slug,
            role,
            typ: kind,
            jti: Uuid::new_v4(),
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT secret not configured")]
    MissingSecret,

    #[error("JWT encoding error: {0}")]
    Encoding(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Wrong token type")]
    WrongType,
}

fn secret_for(kind: TokenKind) -> Result<&'static str, JwtError> {
    let security = &config::config().security;
    let secret = match kind {
        TokenKind::Access => &security.jwt_secret,
        TokenKind::Refresh => &security.jwt_refresh_secret,
    };
    if secret.is_empty() {
        return Err(JwtError::MissingSecret);
    }
    Ok(secret.as_str())
}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    let secret = secret_for(claims.typ)?;
    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::new(Algorithm::HS256), claims, &encoding_key).map_err(|e| JwtError::Encoding(e.to_string()))
}

/// Decode and verify a token of the expected kind.
pub fn decode_jwt(token: &str, kind: TokenKind) -> Result<Claims, JwtError> {
    let secret = secret_for(kind)?;
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);

    let claims = decode::<Claims>(token, &decoding_key, &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::Invalid(e.to_string()),
        })?
        .claims;

    if claims.typ != kind {
        return Err(JwtError::WrongType);
    }
    Ok(claims)
}

pub fn issue_token_pair(
    user_id: Uuid,
    tenant_id: Option<Uuid>,
    tenant_slug: Option<String>,
    role: UserRole,
) -> Result<TokenPair, JwtError> {
    let access = Claims::new(TokenKind::Access, user_id, tenant_id, tenant_slug.clone(), role);
    let refresh = Claims::new(TokenKind::Refresh, user_id, tenant_id, tenant_slug, role);

    Ok(TokenPair {
        access_token: generate_jwt(&access)?,
        refresh_token: generate_jwt(&refresh)?,
        token_type: "Bearer",
        expires_in: access.exp - access.iat,
    })
}

/// Hex SHA-256 of a token, the form refresh tokens are stored in.
pub fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::db::{User, UserId, UserRepository};
use crate::error::{AppError, AuthError, DatabaseError};
use crate::Result;

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS512;
const REFRESH_TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // User ID
    pub name: String, // Username
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<UserId> {
        self.sub
            .parse()
            .map_err(|_| AuthError::Unauthenticated.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Registration, credential checks and the access/refresh token lifecycle.
///
/// Access tokens are self-contained HS512 JWTs and are never stored. Each
/// user holds exactly one refresh token; login overwrites it and refresh
/// rotates it.
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    jwt_secret: String,
    issuer: String,
    audience: String,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, config: &AuthConfig) -> Self {
        Self {
            users,
            jwt_secret: config.jwt_secret.clone(),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_token_ttl: Duration::minutes(config.access_token_minutes),
            refresh_token_ttl: Duration::days(config.refresh_token_days),
            bcrypt_cost: config.bcrypt_cost,
        }
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<User> {
        if self.users.find_user_by_username(username).await?.is_some() {
            return Err(AuthError::UserAlreadyExists.into());
        }

        let password = password.to_owned();
        let cost = self.bcrypt_cost;
        let password_hash =
            tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;

        // A concurrent registration can still win the unique index.
        let user = self
            .users
            .create_user(&User::new(username.to_string(), password_hash))
            .await
            .map_err(|e| match e {
                AppError::DatabaseError(DatabaseError::Duplicate) => {
                    AppError::AuthError(AuthError::UserAlreadyExists)
                }
                other => other,
            })?;

        info!("Registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair> {
        let user = match self.users.find_user_by_username(username).await? {
            Some(user) => user,
            None => {
                warn!("Login rejected for unknown user {}", username);
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        let password = password.to_owned();
        let hash = user.password_hash.clone();
        let verified =
            tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
        if !verified {
            warn!("Login rejected for user {}: wrong password", username);
            return Err(AuthError::InvalidCredentials.into());
        }

        let now = Utc::now();
        let (tokens, expires_at) = self.issue_tokens(&user, now)?;
        self.users
            .store_refresh_token(user.id, &tokens.refresh_token, expires_at)
            .await?;

        info!("User {} logged in", user.username);
        Ok(tokens)
    }

    /// Exchanges an (expected to be expired) access token plus the stored
    /// refresh token for a new pair. Every failure is reported as
    /// `InvalidToken`.
    pub async fn refresh(&self, access_token: &str, refresh_token: &str) -> Result<TokenPair> {
        let claims = self.decode_ignoring_expiry(access_token)?;

        let user = self
            .users
            .find_user_by_username(&claims.name)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let now = Utc::now();
        if !user.refresh_token_valid(refresh_token, now) {
            warn!("Refresh rejected for user {}: stale or expired refresh token", user.username);
            return Err(AuthError::InvalidToken.into());
        }

        let (tokens, expires_at) = self.issue_tokens(&user, now)?;
        let rotated = self
            .users
            .rotate_refresh_token(user.id, refresh_token, &tokens.refresh_token, expires_at)
            .await?;
        if !rotated {
            warn!("Refresh rejected for user {}: token rotated concurrently", user.username);
            return Err(AuthError::InvalidToken.into());
        }

        info!("Rotated tokens for user {}", user.username);
        Ok(tokens)
    }

    /// Full validation for bearer-authenticated requests.
    pub fn verify_access_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        decode::<Claims>(token, &self.decoding_key(), &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::Unauthenticated.into())
    }

    fn decode_ignoring_expiry(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.validate_exp = false;
        validation.validate_aud = false;

        // Library errors are not surfaced: they could reveal why validation failed.
        decode::<Claims>(token, &self.decoding_key(), &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken.into())
    }

    fn issue_tokens(&self, user: &User, now: DateTime<Utc>) -> Result<(TokenPair, DateTime<Utc>)> {
        let tokens = TokenPair {
            access_token: self.generate_access_token(user, now)?,
            refresh_token: generate_refresh_token(),
        };
        Ok((tokens, now + self.refresh_token_ttl))
    }

    fn generate_access_token(&self, user: &User, issued_at: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            sub: user.id.to_string(),
            name: user.username.clone(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.access_token_ttl).timestamp(),
        };

        encode(
            &Header::new(SIGNING_ALGORITHM),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::InternalError(format!("failed to sign access token: {}", e)))
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.jwt_secret.as_bytes())
    }
}

fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64.encode(bytes)
}

use std::future::Future;
use std::sync::LazyLock;

use axum::{
    extract::{FromRef, FromRequestParts, Json, State},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult, FieldErrors};
use crate::extract::ApiJson;
use crate::AppState;

// Claims for our JWT
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    username: String,
    exp: usize,
}

/// Signing material for admin session tokens (HS256).
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn issue(&self, id: i64, username: &str) -> AppResult<String> {
        let expiration = Utc::now()
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AppError::Auth("token lifetime out of range".into()))?
            .timestamp();
        let claims = Claims {
            sub: id.to_string(),
            username: username.to_string(),
            exp: expiration as usize,
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(|e| {
            tracing::error!("JWT creation failed: {}", e);
            AppError::Auth("Could not create token".into())
        })
    }

    pub fn verify(&self, token: &str) -> AppResult<AuthenticatedAdmin> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            tracing::debug!("Token error: {}", e);
            AppError::Auth("Invalid token".into())
        })?;
        let id = data
            .claims
            .sub
            .parse()
            .map_err(|_| AppError::Auth("Invalid token".into()))?;
        Ok(AuthenticatedAdmin {
            id,
            username: data.claims.username,
        })
    }
}

/// An admin identified by a valid bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedAdmin {
    pub id: i64,
    pub username: String,
}

impl<S> FromRequestParts<S> for AuthenticatedAdmin
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    fn from_request_parts(parts: &mut Parts, state: &S) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let keys = JwtKeys::from_ref(state);
        let token = extract_token(parts);
        async move {
            let token = token.ok_or_else(|| AppError::Auth("No token provided".into()))?;
            keys.verify(&token)
        }
    }
}

fn extract_token(parts: &Parts) -> Option<String> {
    let auth_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    use argon2::{
        password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
        Argon2,
    };

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(password_hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    use argon2::{
        password_hash::{PasswordHash, PasswordVerifier},
        Argon2,
    };

    let parsed_hash = PasswordHash::new(hash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Verified against when the username is unknown. `None` only if hashing
/// itself is broken, in which case real logins fail too.
static DUMMY_PASSWORD_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("msc-receipts-no-such-admin").ok());

#[derive(Deserialize)]
pub struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    token: String,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    valid: bool,
    user: AuthenticatedAdmin,
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let username = payload.username.unwrap_or_default().trim().to_string();
    let password = payload.password.unwrap_or_default();

    let mut missing = FieldErrors::new();
    if username.is_empty() {
        missing.insert("username".into(), "Username is required".into());
    }
    if password.is_empty() {
        missing.insert("password".into(), "Password is required".into());
    }
    if !missing.is_empty() {
        return Err(AppError::Validation(missing));
    }

    let invalid = || AppError::Auth("Invalid credentials".into());
    let admin = state.admins.find_by_username(&username).await?;

    // Unknown usernames still pay for one argon2 verify so timing does not
    // reveal which accounts exist.
    let stored = admin.as_ref().map(|a| a.password_hash.clone());
    let matches = tokio::task::spawn_blocking(move || match stored {
        Some(hash) => verify_password(&password, &hash),
        None => match DUMMY_PASSWORD_HASH.as_deref() {
            Some(dummy) => verify_password(&password, dummy).map(|_| false),
            None => Ok(false),
        },
    })
    .await?
    .map_err(|e| {
        tracing::error!(username = %username, "Stored password hash is unreadable: {}", e);
        invalid()
    })?;

    let Some(admin) = admin else {
        tracing::info!(username = %username, "Login attempt for unknown admin");
        return Err(invalid());
    };
    if !matches {
        tracing::info!(username = %admin.username, "Login rejected");
        return Err(invalid());
    }

    let token = state.jwt.issue(admin.id, &admin.username)?;
    tracing::info!(username = %admin.username, "Admin logged in");
    Ok(Json(LoginResponse { token }))
}

pub async fn verify(admin: AuthenticatedAdmin) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        valid: true,
        user: admin,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify() {
        let keys = JwtKeys::new("test-secret", 24);
        let token = keys.issue(7, "sandy").unwrap();
        let admin = keys.verify(&token).unwrap();
        assert_eq!(admin.id, 7);
        assert_eq!(admin.username, "sandy");
    }

    #[test]
    fn foreign_and_expired_tokens_are_rejected() {
        let keys = JwtKeys::new("test-secret", 24);
        let other = JwtKeys::new("other-secret", 24);
        let token = other.issue(1, "sandy").unwrap();
        assert!(matches!(keys.verify(&token), Err(AppError::Auth(_))));

        let expired = JwtKeys::new("test-secret", -2).issue(1, "sandy").unwrap();
        assert!(matches!(keys.verify(&expired), Err(AppError::Auth(_))));
    }

    #[test]
    fn unknown_admin_check_uses_a_real_hash() {
        let hash = DUMMY_PASSWORD_HASH.as_deref().expect("dummy hash");
        assert!(hash.starts_with("$argon2"));
        assert!(!verify_password("letmein", hash).unwrap());
    }

    #[test]
    fn password_hashes_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }
}

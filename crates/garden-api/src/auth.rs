use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};
use uuid::Uuid;

use garden_db::format_timestamp;
use garden_types::api::{Claims, RegisterLoginRequest, TokenResponse};

use crate::error::ApiError;
use crate::{AppState, run_db};

/// Tokens expire this many days after issuance; there is no revocation.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// Outcome of a successful `register_or_login`.
#[derive(Debug)]
pub struct Session {
    pub token: String,
    /// True when this call created the account.
    pub created: bool,
}

/// POST /api/auth/register-login: creates the account on first use,
/// otherwise logs in. 201 on creation, 200 on login.
pub async fn register_login(
    State(state): State<AppState>,
    payload: Result<Json<RegisterLoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let (username, password) = match (req.username, req.password) {
        (Some(u), Some(p)) if !u.trim().is_empty() && !p.is_empty() => (u, p),
        _ => {
            return Err(ApiError::Validation(
                "Username and password are required".into(),
            ));
        }
    };

    let session = register_or_login(&state, username, password).await?;
    let status = if session.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(TokenResponse { token: session.token })))
}

pub async fn register_or_login(
    state: &AppState,
    username: String,
    password: String,
) -> Result<Session, ApiError> {
    let account = match run_db(state, |db| db.get_account()).await? {
        Some(account) => account,
        None => {
            let password_hash = hash_password(password.clone()).await?;
            let account_id = Uuid::new_v4();

            let name = username.clone();
            let created = run_db(state, move |db| {
                db.create_account(
                    &account_id.to_string(),
                    &name,
                    &password_hash,
                    &format_timestamp(Utc::now()),
                )
            })
            .await?;

            if created {
                info!("Account created for {}", username);
                let token = create_token(&state.jwt_secret, account_id, &username)?;
                return Ok(Session { token, created: true });
            }

            // Another request registered first; treat this one as a login against it.
            warn!("Concurrent registration lost the race, falling back to login");
            run_db(state, |db| db.get_account())
                .await?
                .ok_or_else(|| anyhow::anyhow!("Account missing after unique constraint violation"))?
        }
    };

    // The hash is always checked, even for a wrong username, so both failure
    // causes cost the same and look the same.
    let password_ok = verify_password(password, account.password.clone()).await?;
    if !password_ok || account.username != username {
        warn!("Rejected login attempt");
        return Err(ApiError::InvalidCredentials);
    }

    let account_id: Uuid = account
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("Corrupt account id '{}': {}", account.id, e))?;

    let token = create_token(&state.jwt_secret, account_id, &account.username)?;
    info!("Login for {}", account.username);
    Ok(Session { token, created: false })
}

/// Hash with Argon2id and a fresh random salt, off the async runtime.
async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))?
    .map_err(ApiError::Storage)
}

async fn verify_password(password: String, stored_hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
        let parsed_hash = PasswordHash::new(&stored_hash)
            .map_err(|e| anyhow::anyhow!("Stored password hash is unreadable: {}", e))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))?
    .map_err(ApiError::Storage)
}

pub fn create_token(secret: &str, account_id: Uuid, username: &str) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: account_id,
        username: username.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(anyhow::Error::from)?;

    Ok(token)
}

use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::{Duration, Utc};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::dto::auth_dto::{RegisterRequest, RegisterResponse, UpdatePasswordRequest, UpdateProfileRequest};
use crate::error::{Error, Result};
use crate::middleware::auth::issue_token;
use crate::models::pending_registration::PendingRegistration;
use crate::models::user::User;
use crate::services::email_service::EmailService;
use crate::utils::crypto::{constant_time_eq, hash_password, verify_password};
use crate::utils::token::generate_otp;

pub const GOOGLE_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];
const GOOGLE_KEYS_TTL: StdDuration = StdDuration::from_secs(60 * 60);
/// Unknown key ids trigger a refetch at most this often.
const GOOGLE_KEYS_MIN_REFRESH: StdDuration = StdDuration::from_secs(5 * 60);
const MIN_USERNAME_LEN: usize = 3;

#[derive(Debug, Clone)]
pub struct OtpPolicy {
    pub ttl_minutes: i64,
    pub max_attempts: i32,
    pub resend_cooldown_seconds: i64,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            ttl_minutes: 10,
            max_attempts: 5,
            resend_cooldown_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleClaims {
    pub sub: String,
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    pub name: Option<String>,
}

impl GoogleClaims {
    /// Normalized email, only when Google has verified it.
    pub fn verified_email(&self) -> Result<String> {
        if self.email_verified != Some(true) {
            return Err(Error::Unauthorized("Google email is not verified".into()));
        }
        self.email
            .as_deref()
            .map(normalize_email)
            .ok_or_else(|| Error::Unauthorized("Google credential has no email".into()))
    }
}

fn rejected_credential(reason: impl std::fmt::Display) -> Error {
    tracing::warn!(reason = %reason, "rejected google credential");
    Error::Unauthorized("Invalid Google credential".into())
}

/// Key id of an RS256-signed credential. Anything else is refused before keys are fetched.
fn credential_key_id(credential: &str) -> Result<String> {
    let header = decode_header(credential).map_err(rejected_credential)?;
    if header.alg != Algorithm::RS256 {
        return Err(rejected_credential(format!("unexpected algorithm {:?}", header.alg)));
    }
    header.kid.ok_or_else(|| rejected_credential("missing key id"))
}

/// Verifies an ID token against Google's published keys: RS256 signature,
/// issuer, expiry and audience.
pub fn decode_google_credential(credential: &str, keys: &JwkSet, client_id: &str) -> Result<GoogleClaims> {
    let kid = credential_key_id(credential)?;
    let jwk = keys
        .find(&kid)
        .ok_or_else(|| rejected_credential(format!("unknown key id {}", kid)))?;
    let key = DecodingKey::from_jwk(jwk).map_err(rejected_credential)?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(&GOOGLE_ISSUERS);
    validation.set_audience(&[client_id]);
    decode::<GoogleClaims>(credential, &key, &validation)
        .map(|data| data.claims)
        .map_err(rejected_credential)
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Google's signing keys, fetched on demand and cached for an hour.
#[derive(Clone)]
pub struct GoogleKeyStore {
    client: Client,
    certs_url: String,
    cache: Arc<RwLock<Option<CachedKeys>>>,
}

impl GoogleKeyStore {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            certs_url: GOOGLE_CERTS_URL.to_string(),
            cache: Arc::new(RwLock::new(None)),
        }
    }

    #[cfg(test)]
    pub fn preloaded(keys: JwkSet) -> Self {
        Self {
            client: Client::new(),
            certs_url: GOOGLE_CERTS_URL.to_string(),
            cache: Arc::new(RwLock::new(Some(CachedKeys {
                keys,
                fetched_at: Instant::now(),
            }))),
        }
    }

    async fn keys(&self, force_refresh: bool) -> Result<JwkSet> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                let age = cached.fetched_at.elapsed();
                let fresh = if force_refresh {
                    age < GOOGLE_KEYS_MIN_REFRESH
                } else {
                    age < GOOGLE_KEYS_TTL
                };
                if fresh {
                    return Ok(cached.keys.clone());
                }
            }
        }

        let keys = self
            .client
            .get(&self.certs_url)
            .send()
            .await?
            .error_for_status()?
            .json::<JwkSet>()
            .await?;
        tracing::info!(keys = keys.keys.len(), "refreshed google signing keys");

        *self.cache.write().await = Some(CachedKeys {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });
        Ok(keys)
    }

    pub async fn verify(&self, credential: &str, client_id: &str) -> Result<GoogleClaims> {
        let kid = credential_key_id(credential)?;
        let mut keys = self.keys(false).await?;
        if keys.find(&kid).is_none() {
            keys = self.keys(true).await?;
        }
        decode_google_credential(credential, &keys, client_id)
    }
}

/// Lowercased local part of the email restricted to `[a-z0-9._]`, padded to the minimum length.
pub fn username_base(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let mut base: String = local
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '_')
        .collect();
    if base.is_empty() {
        base.push_str("user");
    }
    while base.len() < MIN_USERNAME_LEN {
        base.push('0');
    }
    base
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn unique_violation(err: sqlx::Error, message: &str) -> Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => Error::Conflict(message.to_string()),
        _ => Error::Database(err),
    }
}

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    email: EmailService,
    otp: OtpPolicy,
    google_client_id: Option<String>,
    google_keys: GoogleKeyStore,
}

impl AuthService {
    pub fn new(
        pool: PgPool,
        email: EmailService,
        otp: OtpPolicy,
        google_client_id: Option<String>,
        google_keys: GoogleKeyStore,
    ) -> Self {
        Self {
            pool,
            email,
            otp,
            google_client_id,
            google_keys,
        }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE email = $1"#)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn username_taken(&self, username: &str, except: Option<uuid::Uuid>) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 AND ($2::uuid IS NULL OR id <> $2))"#,
        )
        .bind(username)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse> {
        let email = normalize_email(&req.email);
        let username = req.username.trim().to_string();

        if self.find_by_email(&email).await?.is_some() {
            return Err(Error::Conflict("Email already registered".into()));
        }
        if self.username_taken(&username, None).await? {
            return Err(Error::Conflict("Username already taken".into()));
        }

        let hashed = hash_password(&req.password)?;
        let otp = generate_otp();
        let expires_at = Utc::now() + Duration::minutes(self.otp.ttl_minutes);

        sqlx::query(
            r#"
            INSERT INTO pending_registrations
                (email, username, full_name, hashed_password, otp_code, otp_expires_at, failed_attempts, last_sent_at)
            VALUES ($1, $2, $3, $4, $5, $6, 0, NOW())
            ON CONFLICT (email) DO UPDATE SET
                username = EXCLUDED.username,
                full_name = EXCLUDED.full_name,
                hashed_password = EXCLUDED.hashed_password,
                otp_code = EXCLUDED.otp_code,
                otp_expires_at = EXCLUDED.otp_expires_at,
                failed_attempts = 0,
                last_sent_at = NOW()
            "#,
        )
        .bind(&email)
        .bind(&username)
        .bind(&req.full_name)
        .bind(&hashed)
        .bind(&otp)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        self.email
            .send_otp(&email, &otp, self.otp.ttl_minutes)
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, email = %email, "failed to deliver verification code");
                Error::Internal("Failed to send verification email".into())
            })?;

        tracing::info!(email = %email, "registration pending verification");
        Ok(RegisterResponse {
            message: "Verification code sent to your email".to_string(),
            email,
        })
    }

    async fn pending(&self, email: &str) -> Result<PendingRegistration> {
        sqlx::query_as::<_, PendingRegistration>(
            r#"SELECT * FROM pending_registrations WHERE email = $1"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("No pending registration for this email".into()))
    }

    /// Creates the account once the code matches and returns an access token.
    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<String> {
        let email = normalize_email(email);
        let pending = self.pending(&email).await?;

        if pending.failed_attempts >= self.otp.max_attempts {
            return Err(Error::BadRequest(
                "Too many failed attempts. Please request a new code".into(),
            ));
        }
        if pending.is_expired(Utc::now()) {
            return Err(Error::BadRequest("Verification code has expired".into()));
        }
        if !constant_time_eq(otp.trim(), &pending.otp_code) {
            sqlx::query(
                r#"UPDATE pending_registrations SET failed_attempts = failed_attempts + 1 WHERE email = $1"#,
            )
            .bind(&email)
            .execute(&self.pool)
            .await?;
            tracing::warn!(email = %email, attempts = pending.failed_attempts + 1, "wrong verification code");
            return Err(Error::BadRequest("Invalid verification code".into()));
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO users (username, email, full_name, hashed_password, auth_provider)
            VALUES ($1, $2, $3, $4, 'local')
            "#,
        )
        .bind(&pending.username)
        .bind(&pending.email)
        .bind(&pending.full_name)
        .bind(&pending.hashed_password)
        .execute(&mut *tx)
        .await
        .map_err(|e| unique_violation(e, "Email or username already registered"))?;

        sqlx::query(r#"DELETE FROM pending_registrations WHERE email = $1"#)
            .bind(&email)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(email = %email, "account verified");
        issue_token(&email)
    }

    pub async fn resend_otp(&self, email: &str) -> Result<()> {
        let email = normalize_email(email);
        let pending = self.pending(&email).await?;

        let elapsed = (Utc::now() - pending.last_sent_at).num_seconds();
        if elapsed < self.otp.resend_cooldown_seconds {
            return Err(Error::BadRequest(format!(
                "Please wait {} seconds before requesting a new code",
                self.otp.resend_cooldown_seconds - elapsed
            )));
        }

        let otp = generate_otp();
        let expires_at = Utc::now() + Duration::minutes(self.otp.ttl_minutes);
        sqlx::query(
            r#"
            UPDATE pending_registrations
            SET otp_code = $2, otp_expires_at = $3, failed_attempts = 0, last_sent_at = NOW()
            WHERE email = $1
            "#,
        )
        .bind(&email)
        .bind(&otp)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        self.email
            .send_otp(&email, &otp, self.otp.ttl_minutes)
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, email = %email, "failed to resend verification code");
                Error::Internal("Failed to send verification email".into())
            })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let invalid = || Error::Unauthorized("Incorrect email or password".into());
        let user = self.find_by_email(email).await?.ok_or_else(invalid)?;
        let Some(hashed) = user.hashed_password.as_deref() else {
            return Err(invalid());
        };
        if !verify_password(password, hashed) {
            return Err(invalid());
        }
        issue_token(&user.email)
    }

    pub async fn google_sign_in(&self, credential: &str) -> Result<String> {
        let client_id = self
            .google_client_id
            .as_deref()
            .ok_or_else(|| Error::BadRequest("Google sign-in is not configured".into()))?;
        let claims = self.google_keys.verify(credential, client_id).await?;
        let email = claims.verified_email()?;

        let existing = sqlx::query_as::<_, User>(
            r#"SELECT * FROM users WHERE google_sub = $1 OR email = $2 ORDER BY (google_sub = $1) DESC NULLS LAST LIMIT 1"#,
        )
        .bind(&claims.sub)
        .bind(&email)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(user) = existing {
            if user.google_sub.is_none() {
                sqlx::query(r#"UPDATE users SET google_sub = $1, updated_at = NOW() WHERE id = $2"#)
                    .bind(&claims.sub)
                    .bind(user.id)
                    .execute(&self.pool)
                    .await?;
            }
            return issue_token(&user.email);
        }

        let username = self.unique_username(&username_base(&email)).await?;
        sqlx::query(
            r#"
            INSERT INTO users (username, email, full_name, auth_provider, google_sub)
            VALUES ($1, $2, $3, 'google', $4)
            "#,
        )
        .bind(&username)
        .bind(&email)
        .bind(&claims.name)
        .bind(&claims.sub)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Account already exists"))?;

        tracing::info!(email = %email, username = %username, "google account created");
        issue_token(&email)
    }

    async fn unique_username(&self, base: &str) -> Result<String> {
        if !self.username_taken(base, None).await? {
            return Ok(base.to_string());
        }
        for n in 1..1000 {
            let candidate = format!("{}{}", base, n);
            if !self.username_taken(&candidate, None).await? {
                return Ok(candidate);
            }
        }
        Err(Error::Conflict("Could not derive a free username".into()))
    }

    pub async fn update_profile(&self, user: &User, req: UpdateProfileRequest) -> Result<User> {
        let username = req.username.trim();
        if self.username_taken(username, Some(user.id)).await? {
            return Err(Error::Conflict("Username already taken".into()));
        }
        let updated = sqlx::query_as::<_, User>(
            r#"UPDATE users SET username = $1, full_name = $2, updated_at = NOW() WHERE id = $3 RETURNING *"#,
        )
        .bind(username)
        .bind(&req.full_name)
        .bind(user.id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Username already taken"))?;
        Ok(updated)
    }

    pub async fn change_password(&self, user: &User, req: UpdatePasswordRequest) -> Result<()> {
        let current_ok = user
            .hashed_password
            .as_deref()
            .is_some_and(|h| verify_password(&req.current_password, h));
        if !current_ok {
            return Err(Error::Unauthorized("Incorrect current password".into()));
        }
        let hashed = hash_password(&req.new_password)?;
        sqlx::query(r#"UPDATE users SET hashed_password = $1, updated_at = NOW() WHERE id = $2"#)
            .bind(hashed)
            .bind(user.id)
            .execute(&self.pool)
            .await?;
        tracing::info!(user_id = %user.id, "password changed");
        Ok(())
    }
}

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::user::User;
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User email.
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

pub fn issue_token(email: &str) -> Result<String> {
    let config = crate::config::get_config();
    issue_token_with(email, &config.jwt_secret, config.jwt_expiry_minutes)
}

pub fn issue_token_with(email: &str, secret: &str, expiry_minutes: i64) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: email.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::minutes(expiry_minutes)).timestamp() as usize,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("Failed to sign token: {}", e)))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| Error::Unauthorized("invalid_token".into()))
}

fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>> {
    let Some(auth_header) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let auth_str = auth_header
        .to_str()
        .map_err(|_| Error::Unauthorized("bad_authorization".into()))?;
    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| Error::Unauthorized("unsupported_scheme".into()))?;
    Ok(Some(token))
}

/// `None` when no Authorization header is present; an invalid token is still an error.
pub async fn optional_user(state: &AppState, headers: &HeaderMap) -> Result<Option<User>> {
    let Some(token) = bearer_token(headers)? else {
        return Ok(None);
    };
    let config = crate::config::get_config();
    let claims = decode_token(token, &config.jwt_secret)?;
    let user = state
        .auth_service
        .find_by_email(&claims.sub)
        .await?
        .ok_or_else(|| Error::Unauthorized("invalid_token".into()))?;
    Ok(Some(user))
}

pub async fn require_user(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    match optional_user(&state, req.headers()).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Ok(None) => Error::Unauthorized("missing_authorization".into()).into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn issued_token_decodes_to_email() {
        let token = issue_token_with("ana@example.com", "secret", 5).unwrap();
        let claims = decode_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "ana@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_and_expired_tokens_fail() {
        let token = issue_token_with("ana@example.com", "secret", 5).unwrap();
        assert!(matches!(decode_token(&token, "other"), Err(Error::Unauthorized(_))));
        let expired = issue_token_with("ana@example.com", "secret", -10).unwrap();
        assert!(decode_token(&expired, "secret").is_err());
    }

    #[test]
    fn bearer_header_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).unwrap().is_none());
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers).unwrap(), Some("abc"));
    }
}

use axum::{extract::State, http::StatusCode, response::IntoResponse, Form, Json};
use validator::Validate;

use crate::dto::auth_dto::{
    GoogleAuthRequest, LoginRequest, RegisterRequest, ResendOtpRequest, TokenForm, TokenResponse,
    VerifyOtpRequest,
};
use crate::dto::MessageResponse;
use crate::error::Result;
use crate::AppState;

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Verification code sent"),
        (status = 400, description = "Invalid registration data"),
        (status = 409, description = "Email or username already taken"),
    ),
)]
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let resp = state.auth_service.register(payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Account created, access token issued"),
        (status = 400, description = "Code invalid, expired or locked"),
        (status = 404, description = "No pending registration"),
    ),
)]
#[axum::debug_handler]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let token = state
        .auth_service
        .verify_otp(&payload.email, &payload.otp)
        .await?;
    Ok(Json(TokenResponse::bearer(token)))
}

#[utoipa::path(
    post,
    path = "/api/auth/resend-otp",
    request_body = ResendOtpRequest,
    responses(
        (status = 200, description = "New code sent"),
        (status = 400, description = "Cooldown still running"),
        (status = 404, description = "No pending registration"),
    ),
)]
#[axum::debug_handler]
pub async fn resend_otp(
    State(state): State<AppState>,
    Json(payload): Json<ResendOtpRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    state.auth_service.resend_otp(&payload.email).await?;
    Ok(Json(MessageResponse::new("Verification code resent")))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access token issued"),
        (status = 401, description = "Incorrect email or password"),
    ),
)]
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let token = state
        .auth_service
        .login(&payload.email, &payload.password)
        .await?;
    Ok(Json(TokenResponse::bearer(token)))
}

/// OAuth2 password flow; the `username` form field carries the email.
#[utoipa::path(
    post,
    path = "/api/auth/token",
    request_body(content = TokenForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Access token issued"),
        (status = 401, description = "Incorrect email or password"),
    ),
)]
#[axum::debug_handler]
pub async fn token(
    State(state): State<AppState>,
    Form(form): Form<TokenForm>,
) -> Result<impl IntoResponse> {
    form.validate()?;
    let token = state
        .auth_service
        .login(&form.username, &form.password)
        .await?;
    Ok(Json(TokenResponse::bearer(token)))
}

#[utoipa::path(
    post,
    path = "/api/auth/google",
    request_body = GoogleAuthRequest,
    responses(
        (status = 200, description = "Access token issued"),
        (status = 400, description = "Google sign-in is not configured"),
        (status = 401, description = "Invalid Google credential"),
        (status = 502, description = "Google signing keys unavailable"),
    ),
)]
#[axum::debug_handler]
pub async fn google(
    State(state): State<AppState>,
    Json(payload): Json<GoogleAuthRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let token = state.auth_service.google_sign_in(&payload.credential).await?;
    Ok(Json(TokenResponse::bearer(token)))
}

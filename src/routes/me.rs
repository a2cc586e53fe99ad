use axum::{extract::State, response::IntoResponse, Extension, Json};
use validator::Validate;

use crate::dto::auth_dto::{MeResponse, UpdatePasswordRequest, UpdateProfileRequest};
use crate::dto::MessageResponse;
use crate::error::Result;
use crate::models::user::User;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Current user profile"),
        (status = 401, description = "Missing or invalid token"),
    ),
)]
#[axum::debug_handler]
pub async fn get_me(Extension(user): Extension<User>) -> Result<impl IntoResponse> {
    Ok(Json(MeResponse::from(user)))
}

#[utoipa::path(
    put,
    path = "/api/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated"),
        (status = 409, description = "Username already taken"),
    ),
)]
#[axum::debug_handler]
pub async fn update_me(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let updated = state.auth_service.update_profile(&user, payload).await?;
    Ok(Json(MeResponse::from(updated)))
}

#[utoipa::path(
    put,
    path = "/api/me/password",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 401, description = "Incorrect current password"),
    ),
)]
#[axum::debug_handler]
pub async fn update_password(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    state.auth_service.change_password(&user, payload).await?;
    Ok(Json(MessageResponse::new("Password updated successfully")))
}

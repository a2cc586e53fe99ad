use axum::{extract::State, response::IntoResponse, Extension, Json};
use validator::Validate;

use crate::dto::chat_dto::{ChatMessageRequest, RateMessageRequest};
use crate::dto::MessageResponse;
use crate::error::Result;
use crate::models::user::User;
use crate::AppState;

#[utoipa::path(
    post,
    path = "/api/chat/message",
    request_body = ChatMessageRequest,
    responses(
        (status = 200, description = "Assistant reply with suggestions and resources"),
        (status = 401, description = "Missing or invalid token"),
    ),
)]
#[axum::debug_handler]
pub async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<ChatMessageRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    tracing::debug!(user_id = %user.id, "chat message received");
    let reply = state.chat_service.reply(&payload).await;
    Ok(Json(reply))
}

#[utoipa::path(
    post,
    path = "/api/chat/rate",
    request_body = RateMessageRequest,
    responses(
        (status = 200, description = "Rating stored"),
        (status = 401, description = "Missing or invalid token"),
    ),
)]
#[axum::debug_handler]
pub async fn rate_message(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<RateMessageRequest>,
) -> Result<impl IntoResponse> {
    state
        .chat_service
        .rate(user.id, payload.message_id, payload.rating)
        .await?;
    Ok(Json(MessageResponse::new("Rating recorded successfully")))
}

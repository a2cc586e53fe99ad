use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::room_dto::{
    CreateRoomRequest, JoinRoomRequest, JoinRoomResponse, LeaderboardResponse, RoomCreatedResponse,
    RoomListResponse,
};
use crate::dto::MessageResponse;
use crate::error::Result;
use crate::models::user::User;
use crate::services::room_service::JoinOutcome;
use crate::AppState;

#[utoipa::path(
    post,
    path = "/api/rooms/create",
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created in waiting state"),
        (status = 404, description = "Quiz not found"),
    ),
)]
#[axum::debug_handler]
pub async fn create_room(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreateRoomRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let room = state.room_service.create(&user, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(RoomCreatedResponse {
            message: "Room created successfully".to_string(),
            room,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/rooms",
    responses((status = 200, description = "Waiting and active rooms")),
)]
#[axum::debug_handler]
pub async fn list_rooms(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let rooms = state.room_service.list_open().await?;
    Ok(Json(RoomListResponse { rooms }))
}

#[utoipa::path(
    get,
    path = "/api/rooms/my-rooms",
    responses((status = 200, description = "Rooms hosted by the caller")),
)]
#[axum::debug_handler]
pub async fn my_rooms(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse> {
    let rooms = state.room_service.list_hosted(user.id).await?;
    Ok(Json(RoomListResponse { rooms }))
}

#[utoipa::path(
    post,
    path = "/api/rooms/join",
    request_body = JoinRoomRequest,
    responses(
        (status = 200, description = "Joined, or already a participant"),
        (status = 400, description = "Room is full or completed"),
        (status = 404, description = "Room not found"),
    ),
)]
#[axum::debug_handler]
pub async fn join_room(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<JoinRoomRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let outcome = state.room_service.join(&payload.room_code, user.id).await?;
    let message = match &outcome {
        JoinOutcome::Joined(_) => "Joined room successfully",
        JoinOutcome::AlreadyJoined(_) => "Already a participant in this room",
    };
    let room = outcome.room();
    Ok(Json(JoinRoomResponse {
        message: message.to_string(),
        room_id: room.id,
        room_code: room.room_code.clone(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/rooms/{id}",
    params(("id" = Uuid, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Room with quiz and participant details"),
        (status = 404, description = "Room not found"),
    ),
)]
#[axum::debug_handler]
pub async fn get_room(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let detail = state.room_service.detail(id, &user).await?;
    Ok(Json(detail))
}

#[utoipa::path(
    delete,
    path = "/api/rooms/{id}",
    params(("id" = Uuid, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Room deleted"),
        (status = 403, description = "Caller is not the host"),
        (status = 404, description = "Room not found"),
    ),
)]
#[axum::debug_handler]
pub async fn delete_room(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.room_service.delete(id, user.id).await?;
    Ok(Json(MessageResponse::new("Room deleted successfully")))
}

#[utoipa::path(
    post,
    path = "/api/rooms/{id}/start",
    params(("id" = Uuid, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Room is now active"),
        (status = 400, description = "Room is not waiting"),
        (status = 403, description = "Caller is not the host"),
        (status = 404, description = "Room not found"),
    ),
)]
#[axum::debug_handler]
pub async fn start_room(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.room_service.start(id, user.id).await?;
    Ok(Json(MessageResponse::new("Room started successfully")))
}

#[utoipa::path(
    post,
    path = "/api/rooms/{id}/complete",
    params(("id" = Uuid, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Room completed"),
        (status = 400, description = "Room already completed"),
        (status = 403, description = "Caller is not the host"),
        (status = 404, description = "Room not found"),
    ),
)]
#[axum::debug_handler]
pub async fn complete_room(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.room_service.complete(id, user.id).await?;
    Ok(Json(MessageResponse::new("Room completed successfully")))
}

#[utoipa::path(
    get,
    path = "/api/rooms/{id}/leaderboard",
    params(("id" = Uuid, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Best attempt per student"),
        (status = 404, description = "Room not found"),
    ),
)]
#[axum::debug_handler]
pub async fn leaderboard(
    State(state): State<AppState>,
    Extension(_user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let room = state.room_service.get(id).await?;
    let entries = state.attempt_service.leaderboard(room.id).await?;
    Ok(Json(LeaderboardResponse {
        room_id: room.id,
        entries,
    }))
}

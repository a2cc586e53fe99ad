use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::public_dto::{SubmitQuizRequest, SubmitResponse, VerifyAccessRequest, VerifyAccessResponse};
use crate::dto::quiz_dto::{PublicQuizQuery, PublicQuizView};
use crate::error::{Error, Result};
use crate::middleware::auth::optional_user;
use crate::models::room::RoomStatus;
use crate::services::quiz_service::check_share_password;
use crate::utils::time::format_time;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/public/quiz/{id}",
    params(
        ("id" = Uuid, Path, description = "Quiz ID"),
        ("password" = Option<String>, Query, description = "Share password for protected quizzes"),
    ),
    responses(
        (status = 200, description = "Quiz without answer key"),
        (status = 401, description = "Password required or incorrect"),
        (status = 404, description = "Quiz not found"),
    ),
)]
#[axum::debug_handler]
pub async fn get_public_quiz(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PublicQuizQuery>,
) -> Result<impl IntoResponse> {
    let quiz = state.quiz_service.get(id).await?;
    check_share_password(&quiz.share(), query.password.as_deref())?;
    Ok(Json(PublicQuizView::from(&quiz)))
}

#[utoipa::path(
    post,
    path = "/api/public/quiz/{id}/verify-access",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    request_body = VerifyAccessRequest,
    responses(
        (status = 200, description = "Access granted"),
        (status = 401, description = "Password required or incorrect"),
        (status = 404, description = "Quiz not found"),
    ),
)]
#[axum::debug_handler]
pub async fn verify_access(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerifyAccessRequest>,
) -> Result<impl IntoResponse> {
    let quiz = state.quiz_service.get(id).await?;
    check_share_password(&quiz.share(), payload.password.as_deref())?;
    Ok(Json(VerifyAccessResponse {
        access_granted: true,
    }))
}

#[utoipa::path(
    post,
    path = "/api/public/quiz/submit",
    request_body = SubmitQuizRequest,
    responses(
        (status = 201, description = "Attempt graded and stored"),
        (status = 400, description = "Invalid submission or room not active"),
        (status = 401, description = "Password or sign-in required"),
        (status = 403, description = "Not a participant of the room"),
        (status = 404, description = "Quiz or room not found"),
    ),
)]
#[axum::debug_handler]
pub async fn submit_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SubmitQuizRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let quiz = state.quiz_service.get(payload.quiz_id).await?;
    let share = quiz.share();
    check_share_password(&share, payload.password.as_deref())?;

    let user = optional_user(&state, &headers).await?;
    if !share.allow_anonymous && user.is_none() {
        return Err(Error::Unauthorized(
            "Sign in is required to take this quiz".into(),
        ));
    }

    if let Some(room_id) = payload.room_id {
        let user = user
            .as_ref()
            .ok_or_else(|| Error::Unauthorized("Sign in is required for room submissions".into()))?;
        let room = state.room_service.get(room_id).await?;
        if room.quiz_id != quiz.id {
            return Err(Error::BadRequest("Room does not use this quiz".into()));
        }
        if !room.is_participant(user.id) {
            return Err(Error::Forbidden("You are not a participant of this room".into()));
        }
        if room.status() != Some(RoomStatus::Active) {
            return Err(Error::InvalidState("Room is not active".into()));
        }
    }

    let (attempt, outcome) = state
        .attempt_service
        .submit(&quiz, &payload, user.as_ref().map(|u| u.id))
        .await?;

    let resp = SubmitResponse {
        message: "Quiz submitted successfully".to_string(),
        attempt_id: attempt.id,
        score: attempt.score,
        total_questions: attempt.total_questions,
        percentage: attempt.percentage,
        time_taken: attempt.time_taken,
        correct_count: outcome.correct_answers.len(),
        incorrect_count: outcome.incorrect_answers.len(),
        unanswered_count: outcome.unanswered.len(),
        time_formatted: format_time(attempt.time_taken as i64),
    };
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/public/attempt/{id}",
    params(("id" = Uuid, Path, description = "Attempt ID")),
    responses(
        (status = 200, description = "Attempt with per-question review"),
        (status = 404, description = "Attempt not found"),
    ),
)]
#[axum::debug_handler]
pub async fn get_attempt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let attempt = state.attempt_service.get(id).await?;
    Ok(Json(attempt))
}

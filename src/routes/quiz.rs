use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::public_dto::{AttemptSummary, AttemptsListResponse};
use crate::dto::quiz_dto::{
    GenerationSummary, ManualQuizRequest, QuizSummary, ShareSettingsRequest, ShareSettingsResponse,
    ShareSettingsView, TimerSettingsRequest, TimerSettingsResponse, UpdateQuizRequest, UploadQuery,
    UploadResponse,
};
use crate::dto::MessageResponse;
use crate::error::{Error, Result};
use crate::models::user::User;
use crate::services::extract_service::ExtractService;
use crate::services::quiz_service::{NewQuiz, QuizSource};
use crate::utils::validation::{validate_difficulty, DIFFICULTIES};
use crate::AppState;

const DEFAULT_NUM_QUESTIONS: usize = 5;
const DEFAULT_DIFFICULTY: &str = "medium";

#[utoipa::path(
    post,
    path = "/api/quizzes/upload-and-generate",
    params(
        ("num_questions" = Option<usize>, Query, description = "Questions to generate (default 5)"),
        ("difficulty" = Option<String>, Query, description = "easy, medium or hard"),
    ),
    responses(
        (status = 201, description = "Quiz generated from the uploaded document"),
        (status = 400, description = "Unsupported file or no extractable text"),
        (status = 401, description = "Missing or invalid token"),
    ),
)]
#[axum::debug_handler]
pub async fn upload_and_generate(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let difficulty = query
        .difficulty
        .as_deref()
        .unwrap_or(DEFAULT_DIFFICULTY)
        .trim()
        .to_lowercase();
    validate_difficulty(&difficulty).map_err(|_| {
        Error::BadRequest(format!("difficulty must be one of: {}", DIFFICULTIES.join(", ")))
    })?;
    let num_questions = query.num_questions.unwrap_or(DEFAULT_NUM_QUESTIONS);

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let filename = field
                .file_name()
                .map(str::to_string)
                .ok_or_else(|| Error::BadRequest("Uploaded file has no name".into()))?;
            let bytes = field.bytes().await?;
            upload = Some((filename, bytes.to_vec()));
            break;
        }
    }
    let (filename, bytes) =
        upload.ok_or_else(|| Error::BadRequest("Missing multipart field 'file'".into()))?;

    tracing::info!(user_id = %user.id, %filename, size = bytes.len(), "document uploaded");
    let text = ExtractService::extract_text(&filename, &bytes).await?;
    if text.trim().is_empty() {
        return Err(Error::BadRequest(
            "Could not extract any text from the uploaded file".into(),
        ));
    }

    let generation = state
        .ai_service
        .generate_quiz(&text, num_questions, &difficulty)
        .await;
    for line in &generation.logs {
        tracing::debug!(%filename, "{}", line);
    }

    let quiz = state
        .quiz_service
        .create(
            user.id,
            NewQuiz {
                title: format!("Quiz from {}", filename),
                questions: generation.questions,
                source: QuizSource::Upload,
                source_file: Some(filename),
                difficulty: Some(difficulty),
            },
        )
        .await?;

    let resp = UploadResponse {
        message: "Quiz generated successfully".to_string(),
        num_questions: quiz.question_count(),
        quiz,
        generation: GenerationSummary {
            ai_accepted: generation.ai_accepted,
            ai_rejected: generation.ai_rejected,
            fallback_used: generation.fallback_used,
        },
    };
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/quizzes/create-manual",
    request_body = ManualQuizRequest,
    responses(
        (status = 201, description = "Quiz created"),
        (status = 400, description = "Invalid questions"),
    ),
)]
#[axum::debug_handler]
pub async fn create_manual(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<ManualQuizRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let quiz = state.quiz_service.create_manual(user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

#[utoipa::path(
    get,
    path = "/api/quizzes",
    responses((status = 200, description = "Quizzes owned by the caller")),
)]
#[axum::debug_handler]
pub async fn list_quizzes(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse> {
    let quizzes = state.quiz_service.list_owned(user.id).await?;
    let summaries: Vec<QuizSummary> = quizzes.iter().map(QuizSummary::from).collect();
    Ok(Json(summaries))
}

#[utoipa::path(
    get,
    path = "/api/quizzes/{id}",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    responses(
        (status = 200, description = "Quiz with answer key"),
        (status = 404, description = "Quiz not found"),
    ),
)]
#[axum::debug_handler]
pub async fn get_quiz(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let quiz = state.quiz_service.get_owned(id, user.id).await?;
    Ok(Json(quiz))
}

#[utoipa::path(
    put,
    path = "/api/quizzes/{id}",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    request_body = UpdateQuizRequest,
    responses(
        (status = 200, description = "Quiz updated"),
        (status = 400, description = "Invalid questions"),
        (status = 404, description = "Quiz not found"),
    ),
)]
#[axum::debug_handler]
pub async fn update_quiz(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let quiz = state.quiz_service.update(id, user.id, payload).await?;
    Ok(Json(quiz))
}

#[utoipa::path(
    delete,
    path = "/api/quizzes/{id}",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    responses(
        (status = 200, description = "Quiz deleted"),
        (status = 404, description = "Quiz not found"),
    ),
)]
#[axum::debug_handler]
pub async fn delete_quiz(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.quiz_service.delete(id, user.id).await?;
    Ok(Json(MessageResponse::new("Quiz deleted successfully")))
}

#[utoipa::path(
    put,
    path = "/api/quizzes/{id}/share-settings",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    request_body = ShareSettingsRequest,
    responses(
        (status = 200, description = "Share settings saved"),
        (status = 400, description = "Password missing for a protected quiz"),
        (status = 404, description = "Quiz not found"),
    ),
)]
#[axum::debug_handler]
pub async fn update_share_settings(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ShareSettingsRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let settings = state
        .quiz_service
        .update_share_settings(id, user.id, payload)
        .await?;
    Ok(Json(ShareSettingsResponse {
        message: "Share settings updated successfully".to_string(),
        settings: ShareSettingsView::from(&settings),
    }))
}

#[utoipa::path(
    put,
    path = "/api/quizzes/{id}/timer-settings",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    request_body = TimerSettingsRequest,
    responses(
        (status = 200, description = "Timer settings saved"),
        (status = 400, description = "Durations must be positive"),
        (status = 404, description = "Quiz not found"),
    ),
)]
#[axum::debug_handler]
pub async fn update_timer_settings(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TimerSettingsRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let settings = state
        .quiz_service
        .update_timer_settings(id, user.id, payload.into())
        .await?;
    Ok(Json(TimerSettingsResponse {
        message: "Timer settings updated successfully".to_string(),
        settings,
    }))
}

#[utoipa::path(
    get,
    path = "/api/quizzes/{id}/attempts",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    responses(
        (status = 200, description = "Attempts, newest first"),
        (status = 404, description = "Quiz not found"),
    ),
)]
#[axum::debug_handler]
pub async fn list_attempts(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let quiz = state.quiz_service.get_owned(id, user.id).await?;
    let attempts = state.attempt_service.list_for_quiz(quiz.id).await?;
    Ok(Json(AttemptsListResponse {
        quiz_id: quiz.id,
        quiz_title: quiz.title,
        total_attempts: attempts.len(),
        attempts: attempts.iter().map(AttemptSummary::from).collect(),
    }))
}

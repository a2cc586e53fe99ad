use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension,
};
use uuid::Uuid;

use crate::error::Result;
use crate::models::user::User;
use crate::services::export_service::{
    analytics_csv_filename, attempts_csv_filename, attempts_xlsx_filename, quiz_pdf_filename,
    ExportService,
};
use crate::AppState;

const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const PDF_CONTENT_TYPE: &str = "application/pdf";

fn attachment(content_type: &str, filename: &str, body: Vec<u8>) -> impl IntoResponse {
    let disposition = format!("attachment; filename=\"{}\"", filename);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
}

/// Export quiz attempts as CSV
#[utoipa::path(
    get,
    path = "/api/quizzes/{id}/export/csv",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    responses(
        (status = 200, description = "Attempts CSV", content_type = "text/csv"),
        (status = 404, description = "Quiz not found"),
    ),
)]
pub async fn export_attempts_csv(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let quiz = state.quiz_service.get_owned(id, user.id).await?;
    let attempts = state.attempt_service.list_for_quiz(quiz.id).await?;
    let buffer = ExportService::attempts_csv(&attempts)?;
    Ok(attachment(CSV_CONTENT_TYPE, &attempts_csv_filename(&quiz.title), buffer))
}

/// Export quiz attempts as a styled XLSX workbook
#[utoipa::path(
    get,
    path = "/api/quizzes/{id}/export/xlsx",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    responses(
        (status = 200, description = "Attempts workbook"),
        (status = 404, description = "Quiz not found"),
    ),
)]
pub async fn export_attempts_xlsx(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let quiz = state.quiz_service.get_owned(id, user.id).await?;
    let attempts = state.attempt_service.list_for_quiz(quiz.id).await?;
    let buffer = ExportService::attempts_xlsx(&quiz.title, &attempts)?;
    Ok(attachment(XLSX_CONTENT_TYPE, &attempts_xlsx_filename(&quiz.title), buffer))
}

/// Export the quiz with its answer key as PDF
#[utoipa::path(
    get,
    path = "/api/quizzes/{id}/export/pdf",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    responses(
        (status = 200, description = "Quiz PDF", content_type = "application/pdf"),
        (status = 404, description = "Quiz not found"),
        (status = 500, description = "PDF conversion failed"),
    ),
)]
pub async fn export_quiz_pdf(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let quiz = state.quiz_service.get_owned(id, user.id).await?;
    let buffer = ExportService::quiz_pdf(&quiz).await?;
    Ok(attachment(PDF_CONTENT_TYPE, &quiz_pdf_filename(&quiz.title), buffer))
}

/// Export the analytics report as CSV
#[utoipa::path(
    get,
    path = "/api/analytics/quiz/{id}/export",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    responses(
        (status = 200, description = "Analytics CSV", content_type = "text/csv"),
        (status = 404, description = "Quiz not found"),
    ),
)]
pub async fn export_analytics_csv(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let report = state.analytics_service.quiz_report(id, &user).await?;
    let buffer = ExportService::analytics_csv(&report)?;
    Ok(attachment(CSV_CONTENT_TYPE, &analytics_csv_filename(&report.quiz_title), buffer))
}

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use crate::dto::analytics_dto::PerformanceQuery;
use crate::error::Result;
use crate::models::user::User;
use crate::AppState;

const DEFAULT_PERFORMANCE_LIMIT: i64 = 10;

#[utoipa::path(
    get,
    path = "/api/analytics/quiz/{id}",
    params(("id" = Uuid, Path, description = "Quiz ID")),
    responses(
        (status = 200, description = "Per-question analytics report"),
        (status = 404, description = "Quiz not found"),
    ),
)]
#[axum::debug_handler]
pub async fn quiz_analytics(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let report = state.analytics_service.quiz_report(id, &user).await?;
    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/api/analytics/performance-over-time",
    params(("limit" = Option<i64>, Query, description = "Most recent attempts to include (1-100, default 10)")),
    responses((status = 200, description = "Score trend for the caller")),
)]
#[axum::debug_handler]
pub async fn performance_over_time(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<PerformanceQuery>,
) -> Result<impl IntoResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_PERFORMANCE_LIMIT);
    let performance = state
        .analytics_service
        .performance_over_time(&user, limit)
        .await?;
    Ok(Json(performance))
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::attempt::{AnswerMap, QuestionTimes};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SubmitQuizRequest {
    pub quiz_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub student_name: String,
    #[validate(email)]
    pub student_email: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub answers: AnswerMap,
    #[validate(range(min = 0))]
    pub time_taken: i32,
    #[schema(value_type = Option<Object>)]
    pub time_per_question: Option<QuestionTimes>,
    pub room_id: Option<Uuid>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub message: String,
    pub attempt_id: Uuid,
    pub score: i32,
    pub total_questions: i32,
    pub percentage: f64,
    pub time_taken: i32,
    pub correct_count: usize,
    pub incorrect_count: usize,
    pub unanswered_count: usize,
    pub time_formatted: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct VerifyAccessRequest {
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyAccessResponse {
    pub access_granted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptSummary {
    pub id: Uuid,
    pub student_name: String,
    pub student_email: String,
    pub score: i32,
    pub total_questions: i32,
    pub percentage: f64,
    pub time_taken: i32,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptsListResponse {
    pub quiz_id: Uuid,
    pub quiz_title: String,
    pub total_attempts: usize,
    pub attempts: Vec<AttemptSummary>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::quiz::{Question, Quiz, ShareSettings, TimerSettings, TimerType, Visibility};
use crate::utils::validation::validate_not_blank;

#[derive(Debug, Clone, Deserialize)]
pub struct UploadQuery {
    pub num_questions: Option<usize>,
    pub difficulty: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ManualQuizRequest {
    #[validate(custom(function = validate_not_blank))]
    pub title: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateQuizRequest {
    #[validate(custom(function = validate_not_blank))]
    pub title: Option<String>,
    pub questions: Option<Vec<Question>>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ShareSettingsRequest {
    #[serde(default)]
    pub visibility: Visibility,
    pub password: Option<String>,
    #[serde(default = "default_true")]
    pub allow_anonymous: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShareSettingsView {
    pub visibility: Visibility,
    pub allow_anonymous: bool,
    pub has_password: bool,
}

impl From<&ShareSettings> for ShareSettingsView {
    fn from(s: &ShareSettings) -> Self {
        Self {
            visibility: s.visibility,
            allow_anonymous: s.allow_anonymous,
            has_password: s.password.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ShareSettingsResponse {
    pub message: String,
    pub settings: ShareSettingsView,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimerSettingsResponse {
    pub message: String,
    pub settings: TimerSettings,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct TimerSettingsRequest {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub timer_type: TimerType,
    #[validate(range(min = 1))]
    pub global_duration: Option<i32>,
    #[validate(range(min = 1))]
    pub per_question_duration: Option<i32>,
    #[serde(default = "default_true")]
    pub auto_submit: bool,
    #[serde(default = "default_true")]
    pub show_timer: bool,
}

impl From<TimerSettingsRequest> for TimerSettings {
    fn from(r: TimerSettingsRequest) -> Self {
        let defaults = TimerSettings::default();
        Self {
            enabled: r.enabled,
            timer_type: r.timer_type,
            global_duration: r.global_duration.unwrap_or(defaults.global_duration),
            per_question_duration: r
                .per_question_duration
                .unwrap_or(defaults.per_question_duration),
            auto_submit: r.auto_submit,
            show_timer: r.show_timer,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizSummary {
    pub id: Uuid,
    pub title: String,
    pub num_questions: usize,
    pub source: String,
    pub difficulty: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Quiz> for QuizSummary {
    fn from(q: &Quiz) -> Self {
        Self {
            id: q.id,
            title: q.title.clone(),
            num_questions: q.question_count(),
            source: q.source.clone(),
            difficulty: q.difficulty.clone(),
            created_at: q.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationSummary {
    pub ai_accepted: usize,
    pub ai_rejected: usize,
    pub fallback_used: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub quiz: Quiz,
    pub num_questions: usize,
    pub generation: GenerationSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicOption {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub question: String,
    pub options: Vec<PublicOption>,
}

/// Quiz as shown to students: no owner, no answer key, no explanations.
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuizView {
    pub id: Uuid,
    pub title: String,
    pub questions: Vec<PublicQuestion>,
    pub num_questions: usize,
    pub timer_settings: TimerSettings,
    pub requires_password: bool,
    pub allow_anonymous: bool,
}

impl From<&Quiz> for PublicQuizView {
    fn from(q: &Quiz) -> Self {
        let share = q.share();
        Self {
            id: q.id,
            title: q.title.clone(),
            questions: q
                .questions
                .0
                .iter()
                .map(|question| PublicQuestion {
                    question: question.question.clone(),
                    options: question
                        .options
                        .iter()
                        .map(|o| PublicOption {
                            text: o.text.clone(),
                        })
                        .collect(),
                })
                .collect(),
            num_questions: q.question_count(),
            timer_settings: q.timer(),
            requires_password: share.is_password_protected(),
            allow_anonymous: share.allow_anonymous,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublicQuizQuery {
    pub password: Option<String>,
}

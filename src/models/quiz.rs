use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct McqOption {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Question {
    pub question: String,
    pub options: Vec<McqOption>,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl Question {
    pub fn correct_indices(&self) -> Vec<usize> {
        self.options
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_correct)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn correct_count(&self) -> usize {
        self.options.iter().filter(|o| o.is_correct).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    #[default]
    Unlisted,
    PasswordProtected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareSettings {
    #[serde(default)]
    pub visibility: Visibility,
    /// Argon2 hash, never the plain password.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_true")]
    pub allow_anonymous: bool,
}

impl Default for ShareSettings {
    fn default() -> Self {
        Self {
            visibility: Visibility::Unlisted,
            password: None,
            allow_anonymous: true,
        }
    }
}

impl ShareSettings {
    pub fn is_password_protected(&self) -> bool {
        self.visibility == Visibility::PasswordProtected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimerType {
    #[default]
    Global,
    PerQuestion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TimerSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub timer_type: TimerType,
    #[serde(default = "default_global_duration")]
    pub global_duration: i32,
    #[serde(default = "default_per_question_duration")]
    pub per_question_duration: i32,
    #[serde(default = "default_true")]
    pub auto_submit: bool,
    #[serde(default = "default_true")]
    pub show_timer: bool,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            timer_type: TimerType::Global,
            global_duration: default_global_duration(),
            per_question_duration: default_per_question_duration(),
            auto_submit: true,
            show_timer: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_global_duration() -> i32 {
    1800
}

fn default_per_question_duration() -> i32 {
    30
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
    pub questions: Json<Vec<Question>>,
    pub created_by: Uuid,
    pub source: String,
    pub source_file: Option<String>,
    pub difficulty: Option<String>,
    #[serde(skip_serializing)]
    pub share_settings: Option<Json<ShareSettings>>,
    pub timer_settings: Option<Json<TimerSettings>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quiz {
    pub fn share(&self) -> ShareSettings {
        self.share_settings
            .as_ref()
            .map(|s| s.0.clone())
            .unwrap_or_default()
    }

    pub fn timer(&self) -> TimerSettings {
        self.timer_settings
            .as_ref()
            .map(|s| s.0.clone())
            .unwrap_or_default()
    }

    pub fn question_count(&self) -> usize {
        self.questions.0.len()
    }
}

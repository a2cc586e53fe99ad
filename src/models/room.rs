use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

pub const ROOM_CODE_LEN: usize = 6;
pub const DEFAULT_MAX_PARTICIPANTS: i32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Active,
    Completed,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Waiting => "waiting",
            RoomStatus::Active => "active",
            RoomStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "waiting" => Some(RoomStatus::Waiting),
            "active" => Some(RoomStatus::Active),
            "completed" => Some(RoomStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RoomSettings {
    #[serde(default)]
    pub enable_timer: bool,
    #[serde(default = "default_timer_duration")]
    pub timer_duration: i32,
    #[serde(default)]
    pub shuffle_questions: bool,
    #[serde(default)]
    pub shuffle_options: bool,
    #[serde(default = "default_attempts_allowed")]
    pub attempts_allowed: i32,
    #[serde(default = "default_true")]
    pub show_results_immediately: bool,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            enable_timer: false,
            timer_duration: default_timer_duration(),
            shuffle_questions: false,
            shuffle_options: false,
            attempts_allowed: default_attempts_allowed(),
            show_results_immediately: true,
        }
    }
}

fn default_timer_duration() -> i32 {
    60
}

fn default_attempts_allowed() -> i32 {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Room {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub quiz_id: Uuid,
    pub host_id: Uuid,
    pub room_code: String,
    pub settings: Json<RoomSettings>,
    pub status: String,
    pub participants: Vec<Uuid>,
    pub max_participants: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Room {
    pub fn status(&self) -> Option<RoomStatus> {
        RoomStatus::parse(&self.status)
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() as i32 >= self.max_participants
    }
}

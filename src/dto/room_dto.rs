use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::room::{Room, RoomSettings};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateRoomRequest {
    pub quiz_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub settings: Option<RoomSettings>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct JoinRoomRequest {
    #[validate(length(min = 1, max = 16))]
    pub room_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomCreatedResponse {
    pub message: String,
    pub room: Room,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinRoomResponse {
    pub message: String,
    pub room_id: Uuid,
    pub room_code: String,
}

/// Room row joined with the quiz title and host username.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RoomListItem {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub quiz_id: Uuid,
    pub quiz_title: Option<String>,
    pub host_id: Uuid,
    pub host_username: Option<String>,
    pub room_code: String,
    pub status: String,
    pub participant_count: i32,
    pub max_participants: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomListResponse {
    pub rooms: Vec<RoomListItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomQuizInfo {
    pub id: Uuid,
    pub title: String,
    pub num_questions: usize,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ParticipantInfo {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomDetail {
    #[serde(flatten)]
    pub room: Room,
    pub is_host: bool,
    pub quiz: Option<RoomQuizInfo>,
    pub participants_details: Vec<ParticipantInfo>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LeaderboardEntry {
    #[sqlx(skip)]
    pub rank: usize,
    pub attempt_id: Uuid,
    pub student_name: String,
    pub student_email: String,
    pub score: i32,
    pub total_questions: i32,
    pub percentage: f64,
    pub time_taken: i32,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardResponse {
    pub room_id: Uuid,
    pub entries: Vec<LeaderboardEntry>,
}

use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::room_dto::{CreateRoomRequest, ParticipantInfo, RoomDetail, RoomListItem, RoomQuizInfo};
use crate::error::{Error, Result};
use crate::models::room::{Room, RoomStatus, DEFAULT_MAX_PARTICIPANTS};
use crate::models::user::User;
use crate::services::quiz_service::QuizService;
use crate::utils::token::generate_room_code;

const CODE_ATTEMPTS: usize = 10;

const LIST_COLUMNS: &str = r#"
    r.id, r.title, r.description, r.quiz_id, q.title AS quiz_title, r.host_id,
    u.username AS host_username, r.room_code, r.status,
    cardinality(r.participants) AS participant_count, r.max_participants,
    r.created_at, r.started_at
"#;

#[derive(Debug, Clone)]
pub enum JoinOutcome {
    Joined(Room),
    AlreadyJoined(Room),
}

impl JoinOutcome {
    pub fn room(&self) -> &Room {
        match self {
            JoinOutcome::Joined(r) | JoinOutcome::AlreadyJoined(r) => r,
        }
    }
}

/// Why a conditional join matched no row.
pub fn diagnose_join(room: Room, user_id: Uuid) -> Result<JoinOutcome> {
    if room.is_participant(user_id) {
        return Ok(JoinOutcome::AlreadyJoined(room));
    }
    if room.status() == Some(RoomStatus::Completed) {
        return Err(Error::InvalidState("Room has already completed".into()));
    }
    if room.is_full() {
        return Err(Error::BadRequest("Room is full".into()));
    }
    Err(Error::InvalidState("Room cannot be joined right now".into()))
}

/// Why a host-only transition matched no row.
pub fn diagnose_transition(room: &Room, user_id: Uuid, action: &str) -> Error {
    if room.host_id != user_id {
        return Error::Forbidden(format!("Only the host can {} the room", action));
    }
    Error::InvalidState(format!(
        "Room cannot {} while {}",
        action, room.status
    ))
}

#[derive(Clone)]
pub struct RoomService {
    pool: PgPool,
}

impl RoomService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, room_id: Uuid) -> Result<Room> {
        sqlx::query_as::<_, Room>(r#"SELECT * FROM rooms WHERE id = $1"#)
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Room not found".into()))
    }

    pub async fn create(&self, host: &User, req: CreateRoomRequest) -> Result<Room> {
        let quiz = QuizService::new(self.pool.clone())
            .get_owned(req.quiz_id, host.id)
            .await?;
        let settings = req.settings.unwrap_or_default();

        for _ in 0..CODE_ATTEMPTS {
            let code = generate_room_code();
            let inserted = sqlx::query_as::<_, Room>(
                r#"
                INSERT INTO rooms (title, description, quiz_id, host_id, room_code, settings, status, participants, max_participants)
                VALUES ($1, $2, $3, $4, $5, $6, 'waiting', ARRAY[$4]::uuid[], $7)
                ON CONFLICT (room_code) DO NOTHING
                RETURNING *
                "#,
            )
            .bind(req.title.trim())
            .bind(&req.description)
            .bind(quiz.id)
            .bind(host.id)
            .bind(&code)
            .bind(Json(&settings))
            .bind(DEFAULT_MAX_PARTICIPANTS)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(room) = inserted {
                tracing::info!(room_id = %room.id, room_code = %room.room_code, host_id = %host.id, "room created");
                return Ok(room);
            }
            tracing::debug!(room_code = %code, "room code collision, retrying");
        }
        Err(Error::Internal("Could not allocate a unique room code".into()))
    }

    pub async fn list_open(&self) -> Result<Vec<RoomListItem>> {
        let sql = format!(
            r#"SELECT {LIST_COLUMNS}
               FROM rooms r
               LEFT JOIN quizzes q ON q.id = r.quiz_id
               LEFT JOIN users u ON u.id = r.host_id
               WHERE r.status IN ('waiting', 'active')
               ORDER BY r.created_at DESC"#
        );
        let rooms = sqlx::query_as::<_, RoomListItem>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rooms)
    }

    pub async fn list_hosted(&self, host_id: Uuid) -> Result<Vec<RoomListItem>> {
        let sql = format!(
            r#"SELECT {LIST_COLUMNS}
               FROM rooms r
               LEFT JOIN quizzes q ON q.id = r.quiz_id
               LEFT JOIN users u ON u.id = r.host_id
               WHERE r.host_id = $1
               ORDER BY r.created_at DESC"#
        );
        let rooms = sqlx::query_as::<_, RoomListItem>(&sql)
            .bind(host_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rooms)
    }

    pub async fn detail(&self, room_id: Uuid, viewer: &User) -> Result<RoomDetail> {
        let room = self.get(room_id).await?;

        let quiz = sqlx::query_as::<_, (Uuid, String, i32)>(
            r#"SELECT id, title, jsonb_array_length(questions) FROM quizzes WHERE id = $1"#,
        )
        .bind(room.quiz_id)
        .fetch_optional(&self.pool)
        .await?
        .map(|(id, title, n)| RoomQuizInfo {
            id,
            title,
            num_questions: n.max(0) as usize,
        });

        let participants_details = sqlx::query_as::<_, ParticipantInfo>(
            r#"SELECT id, email, username, full_name FROM users WHERE id = ANY($1) ORDER BY username"#,
        )
        .bind(&room.participants)
        .fetch_all(&self.pool)
        .await?;

        Ok(RoomDetail {
            is_host: room.host_id == viewer.id,
            room,
            quiz,
            participants_details,
        })
    }

    pub async fn join(&self, room_code: &str, user_id: Uuid) -> Result<JoinOutcome> {
        let code = room_code.trim().to_uppercase();
        let joined = sqlx::query_as::<_, Room>(
            r#"
            UPDATE rooms
            SET participants = array_append(participants, $2)
            WHERE room_code = $1
              AND status <> 'completed'
              AND NOT ($2 = ANY(participants))
              AND cardinality(participants) < max_participants
            RETURNING *
            "#,
        )
        .bind(&code)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(room) = joined {
            tracing::info!(room_id = %room.id, %user_id, "participant joined room");
            return Ok(JoinOutcome::Joined(room));
        }

        let room = sqlx::query_as::<_, Room>(r#"SELECT * FROM rooms WHERE room_code = $1"#)
            .bind(&code)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Room not found".into()))?;
        diagnose_join(room, user_id)
    }

    pub async fn start(&self, room_id: Uuid, user_id: Uuid) -> Result<Room> {
        let started = sqlx::query_as::<_, Room>(
            r#"
            UPDATE rooms
            SET status = 'active', started_at = NOW()
            WHERE id = $1 AND host_id = $2 AND status = 'waiting'
            RETURNING *
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match started {
            Some(room) => {
                tracing::info!(%room_id, "room started");
                Ok(room)
            }
            None => Err(diagnose_transition(&self.get(room_id).await?, user_id, "start")),
        }
    }

    pub async fn complete(&self, room_id: Uuid, user_id: Uuid) -> Result<Room> {
        let completed = sqlx::query_as::<_, Room>(
            r#"
            UPDATE rooms
            SET status = 'completed', completed_at = NOW()
            WHERE id = $1 AND host_id = $2 AND status IN ('waiting', 'active')
            RETURNING *
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match completed {
            Some(room) => {
                tracing::info!(%room_id, "room completed");
                Ok(room)
            }
            None => Err(diagnose_transition(&self.get(room_id).await?, user_id, "complete")),
        }
    }

    pub async fn delete(&self, room_id: Uuid, user_id: Uuid) -> Result<()> {
        let room = self.get(room_id).await?;
        if room.host_id != user_id {
            return Err(Error::Forbidden("Only the host can delete the room".into()));
        }
        sqlx::query(r#"DELETE FROM rooms WHERE id = $1"#)
            .bind(room_id)
            .execute(&self.pool)
            .await?;
        tracing::info!(%room_id, "room deleted");
        Ok(())
    }
}

use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::quiz_dto::{ManualQuizRequest, ShareSettingsRequest, UpdateQuizRequest};
use crate::error::{Error, Result};
use crate::models::quiz::{Question, Quiz, ShareSettings, TimerSettings, Visibility};
use crate::utils::crypto::{hash_password, verify_password};
use crate::utils::validation::validate_authored_questions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizSource {
    Upload,
    Manual,
}

impl QuizSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizSource::Upload => "upload",
            QuizSource::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub title: String,
    pub questions: Vec<Question>,
    pub source: QuizSource,
    pub source_file: Option<String>,
    pub difficulty: Option<String>,
}

/// Gate for password-protected quizzes. Open quizzes always pass.
pub fn check_share_password(share: &ShareSettings, password: Option<&str>) -> Result<()> {
    if !share.is_password_protected() {
        return Ok(());
    }
    let Some(given) = password.filter(|p| !p.is_empty()) else {
        return Err(Error::Unauthorized("Password required".into()));
    };
    let matches = share
        .password
        .as_deref()
        .is_some_and(|hash| verify_password(given, hash));
    if matches {
        Ok(())
    } else {
        Err(Error::Unauthorized("Incorrect password".into()))
    }
}

pub fn build_share_settings(req: ShareSettingsRequest) -> Result<ShareSettings> {
    let password = req
        .password
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());
    if req.visibility == Visibility::PasswordProtected && password.is_none() {
        return Err(Error::BadRequest(
            "Password is required for password protected quizzes".into(),
        ));
    }
    Ok(ShareSettings {
        visibility: req.visibility,
        password: password.map(hash_password).transpose()?,
        allow_anonymous: req.allow_anonymous,
    })
}

#[derive(Clone)]
pub struct QuizService {
    pool: PgPool,
}

impl QuizService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, owner_id: Uuid, quiz: NewQuiz) -> Result<Quiz> {
        let created = sqlx::query_as::<_, Quiz>(
            r#"
            INSERT INTO quizzes (title, questions, created_by, source, source_file, difficulty)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&quiz.title)
        .bind(Json(&quiz.questions))
        .bind(owner_id)
        .bind(quiz.source.as_str())
        .bind(&quiz.source_file)
        .bind(&quiz.difficulty)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            quiz_id = %created.id,
            %owner_id,
            source = quiz.source.as_str(),
            questions = quiz.questions.len(),
            "quiz created"
        );
        Ok(created)
    }

    pub async fn create_manual(&self, owner_id: Uuid, req: ManualQuizRequest) -> Result<Quiz> {
        validate_authored_questions(&req.questions)?;
        self.create(
            owner_id,
            NewQuiz {
                title: req.title.trim().to_string(),
                questions: req.questions,
                source: QuizSource::Manual,
                source_file: None,
                difficulty: None,
            },
        )
        .await
    }

    pub async fn list_owned(&self, owner_id: Uuid) -> Result<Vec<Quiz>> {
        let quizzes = sqlx::query_as::<_, Quiz>(
            r#"SELECT * FROM quizzes WHERE created_by = $1 ORDER BY created_at DESC"#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(quizzes)
    }

    pub async fn get(&self, quiz_id: Uuid) -> Result<Quiz> {
        sqlx::query_as::<_, Quiz>(r#"SELECT * FROM quizzes WHERE id = $1"#)
            .bind(quiz_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Quiz not found".into()))
    }

    /// Other owners' quizzes are reported as missing.
    pub async fn get_owned(&self, quiz_id: Uuid, owner_id: Uuid) -> Result<Quiz> {
        sqlx::query_as::<_, Quiz>(r#"SELECT * FROM quizzes WHERE id = $1 AND created_by = $2"#)
            .bind(quiz_id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Quiz not found".into()))
    }

    pub async fn update(&self, quiz_id: Uuid, owner_id: Uuid, req: UpdateQuizRequest) -> Result<Quiz> {
        if let Some(questions) = &req.questions {
            validate_authored_questions(questions)?;
        }
        let title = req.title.as_deref().map(str::trim);
        sqlx::query_as::<_, Quiz>(
            r#"
            UPDATE quizzes
            SET title = COALESCE($1, title),
                questions = COALESCE($2, questions),
                updated_at = NOW()
            WHERE id = $3 AND created_by = $4
            RETURNING *
            "#,
        )
        .bind(title)
        .bind(req.questions.map(Json))
        .bind(quiz_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Quiz not found".into()))
    }

    pub async fn delete(&self, quiz_id: Uuid, owner_id: Uuid) -> Result<()> {
        let result = sqlx::query(r#"DELETE FROM quizzes WHERE id = $1 AND created_by = $2"#)
            .bind(quiz_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("Quiz not found".into()));
        }
        tracing::info!(%quiz_id, %owner_id, "quiz deleted");
        Ok(())
    }

    pub async fn update_share_settings(
        &self,
        quiz_id: Uuid,
        owner_id: Uuid,
        req: ShareSettingsRequest,
    ) -> Result<ShareSettings> {
        let settings = build_share_settings(req)?;
        let updated = sqlx::query(
            r#"UPDATE quizzes SET share_settings = $1, updated_at = NOW() WHERE id = $2 AND created_by = $3"#,
        )
        .bind(Json(&settings))
        .bind(quiz_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(Error::NotFound("Quiz not found".into()));
        }
        Ok(settings)
    }

    pub async fn update_timer_settings(
        &self,
        quiz_id: Uuid,
        owner_id: Uuid,
        settings: TimerSettings,
    ) -> Result<TimerSettings> {
        let updated = sqlx::query(
            r#"UPDATE quizzes SET timer_settings = $1, updated_at = NOW() WHERE id = $2 AND created_by = $3"#,
        )
        .bind(Json(&settings))
        .bind(quiz_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(Error::NotFound("Quiz not found".into()));
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protected(password: &str) -> ShareSettings {
        build_share_settings(ShareSettingsRequest {
            visibility: Visibility::PasswordProtected,
            password: Some(password.to_string()),
            allow_anonymous: true,
        })
        .unwrap()
    }

    #[test]
    fn share_password_is_hashed() {
        let settings = protected("letmein");
        let stored = settings.password.as_deref().unwrap();
        assert_ne!(stored, "letmein");
        assert!(verify_password("letmein", stored));
    }

    #[test]
    fn protected_without_password_is_rejected() {
        let req = ShareSettingsRequest {
            visibility: Visibility::PasswordProtected,
            password: Some("   ".into()),
            allow_anonymous: true,
        };
        assert!(matches!(build_share_settings(req), Err(Error::BadRequest(_))));
    }

    #[test]
    fn password_gate() {
        let settings = protected("letmein");
        match check_share_password(&settings, None) {
            Err(Error::Unauthorized(msg)) => assert_eq!(msg, "Password required"),
            other => panic!("unexpected: {:?}", other),
        }
        match check_share_password(&settings, Some("nope")) {
            Err(Error::Unauthorized(msg)) => assert_eq!(msg, "Incorrect password"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(check_share_password(&settings, Some("letmein")).is_ok());
        assert!(check_share_password(&ShareSettings::default(), None).is_ok());
    }
}

use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::public_dto::{AttemptSummary, SubmitQuizRequest};
use crate::dto::room_dto::LeaderboardEntry;
use crate::error::{Error, Result};
use crate::models::attempt::QuizAttempt;
use crate::models::quiz::Quiz;
use crate::services::grading_service::{GradeOutcome, GradingService};

impl From<&QuizAttempt> for AttemptSummary {
    fn from(a: &QuizAttempt) -> Self {
        Self {
            id: a.id,
            student_name: a.student_name.clone(),
            student_email: a.student_email.clone(),
            score: a.score,
            total_questions: a.total_questions,
            percentage: a.percentage,
            time_taken: a.time_taken,
            submitted_at: a.submitted_at,
        }
    }
}

/// Assigns 1-based ranks in the order given.
pub fn rank_entries(mut entries: Vec<LeaderboardEntry>) -> Vec<LeaderboardEntry> {
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i + 1;
    }
    entries
}

#[derive(Clone)]
pub struct AttemptService {
    pool: PgPool,
}

impl AttemptService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Grades the answers against the quiz and stores the attempt.
    pub async fn submit(
        &self,
        quiz: &Quiz,
        req: &SubmitQuizRequest,
        user_id: Option<Uuid>,
    ) -> Result<(QuizAttempt, GradeOutcome)> {
        let outcome = GradingService::grade(&quiz.questions.0, &req.answers);

        let attempt = sqlx::query_as::<_, QuizAttempt>(
            r#"
            INSERT INTO quiz_attempts (
                quiz_id, quiz_title, room_id, user_id, student_name, student_email,
                answers, score, total_questions, percentage, time_taken, time_per_question,
                correct_answers, incorrect_answers, unanswered, question_details
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(quiz.id)
        .bind(&quiz.title)
        .bind(req.room_id)
        .bind(user_id)
        .bind(req.student_name.trim())
        .bind(req.student_email.trim())
        .bind(Json(&req.answers))
        .bind(outcome.score)
        .bind(outcome.total_questions)
        .bind(outcome.percentage)
        .bind(req.time_taken)
        .bind(req.time_per_question.as_ref().map(Json))
        .bind(&outcome.correct_answers)
        .bind(&outcome.incorrect_answers)
        .bind(&outcome.unanswered)
        .bind(Json(&outcome.details))
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            attempt_id = %attempt.id,
            quiz_id = %quiz.id,
            room_id = ?req.room_id,
            score = outcome.score,
            total = outcome.total_questions,
            "attempt submitted"
        );
        Ok((attempt, outcome))
    }

    pub async fn get(&self, attempt_id: Uuid) -> Result<QuizAttempt> {
        sqlx::query_as::<_, QuizAttempt>(r#"SELECT * FROM quiz_attempts WHERE id = $1"#)
            .bind(attempt_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Attempt not found".into()))
    }

    /// Newest first.
    pub async fn list_for_quiz(&self, quiz_id: Uuid) -> Result<Vec<QuizAttempt>> {
        let attempts = sqlx::query_as::<_, QuizAttempt>(
            r#"SELECT * FROM quiz_attempts WHERE quiz_id = $1 ORDER BY submitted_at DESC"#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }

    /// Best attempt per student email: higher score wins, then shorter time, then earlier submission.
    pub async fn leaderboard(&self, room_id: Uuid) -> Result<Vec<LeaderboardEntry>> {
        let entries = sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT attempt_id, student_name, student_email, score, total_questions,
                   percentage, time_taken, submitted_at
            FROM (
                SELECT DISTINCT ON (lower(student_email))
                    id AS attempt_id, student_name, student_email, score, total_questions,
                    percentage, time_taken, submitted_at
                FROM quiz_attempts
                WHERE room_id = $1
                ORDER BY lower(student_email), score DESC, time_taken ASC, submitted_at ASC
            ) best
            ORDER BY score DESC, time_taken ASC, submitted_at ASC
            "#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rank_entries(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(email: &str, score: i32) -> LeaderboardEntry {
        LeaderboardEntry {
            rank: 0,
            attempt_id: Uuid::new_v4(),
            student_name: email.to_string(),
            student_email: email.to_string(),
            score,
            total_questions: 10,
            percentage: score as f64 * 10.0,
            time_taken: 60,
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn ranks_follow_query_order() {
        let ranked = rank_entries(vec![entry("a@x.io", 9), entry("b@x.io", 7), entry("c@x.io", 7)]);
        let ranks: Vec<usize> = ranked.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert_eq!(ranked[0].student_email, "a@x.io");
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Selected option indices keyed by the question index rendered as a string.
pub type AnswerMap = BTreeMap<String, Vec<usize>>;

/// Seconds spent per question, keyed like [`AnswerMap`].
pub type QuestionTimes = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionReview {
    pub question_index: usize,
    pub question: String,
    pub options: Vec<String>,
    pub correct_indices: Vec<usize>,
    pub user_answers: Vec<usize>,
    pub is_correct: bool,
    pub is_answered: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub quiz_title: String,
    pub room_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub student_name: String,
    pub student_email: String,
    pub answers: Json<AnswerMap>,
    pub score: i32,
    pub total_questions: i32,
    pub percentage: f64,
    pub time_taken: i32,
    pub time_per_question: Option<Json<QuestionTimes>>,
    pub correct_answers: Vec<i32>,
    pub incorrect_answers: Vec<i32>,
    pub unanswered: Vec<i32>,
    pub question_details: Json<Vec<QuestionReview>>,
    pub submitted_at: DateTime<Utc>,
}

impl QuizAttempt {
    pub fn selected_for(&self, question_index: usize) -> &[usize] {
        self.answers
            .0
            .get(&question_index.to_string())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn time_for(&self, question_index: usize) -> Option<f64> {
        self.time_per_question
            .as_ref()
            .and_then(|t| t.0.get(&question_index.to_string()).copied())
    }

    pub fn answered_correctly(&self, question_index: usize) -> bool {
        self.correct_answers.contains(&(question_index as i32))
    }
}

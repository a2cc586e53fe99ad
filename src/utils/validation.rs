use validator::ValidationError;

use crate::error::{Error, Result};
use crate::models::quiz::Question;

pub const DIFFICULTIES: [&str; 3] = ["easy", "medium", "hard"];

pub fn validate_difficulty(value: &str) -> std::result::Result<(), ValidationError> {
    if DIFFICULTIES.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_difficulty"))
    }
}

pub fn validate_not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("blank"))
    } else {
        Ok(())
    }
}

/// Rules for instructor-authored questions. Messages use 1-based numbering.
pub fn validate_authored_questions(questions: &[Question]) -> Result<()> {
    if questions.is_empty() {
        return Err(Error::BadRequest("At least one question is required".into()));
    }
    for (i, question) in questions.iter().enumerate() {
        let n = i + 1;
        if question.question.trim().is_empty() {
            return Err(Error::BadRequest(format!(
                "Question {}: Question text is required",
                n
            )));
        }
        if question.options.len() < 2 {
            return Err(Error::BadRequest(format!(
                "Question {}: At least 2 options are required",
                n
            )));
        }
        if question.correct_count() != 1 {
            return Err(Error::BadRequest(format!(
                "Question {}: Exactly one correct answer is required",
                n
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::McqOption;

    fn q(text: &str, opts: &[(&str, bool)]) -> Question {
        Question {
            question: text.into(),
            options: opts
                .iter()
                .map(|(t, c)| McqOption {
                    text: (*t).into(),
                    is_correct: *c,
                })
                .collect(),
            explanation: None,
        }
    }

    #[test]
    fn rejects_empty_list() {
        assert!(validate_authored_questions(&[]).is_err());
    }

    #[test]
    fn reports_question_number() {
        let questions = vec![
            q("Fine?", &[("a", true), ("b", false)]),
            q("Two right?", &[("a", true), ("b", true)]),
        ];
        match validate_authored_questions(&questions) {
            Err(Error::BadRequest(msg)) => assert!(msg.starts_with("Question 2:")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn rejects_single_option_and_blank_text() {
        assert!(validate_authored_questions(&[q("One?", &[("a", true)])]).is_err());
        assert!(validate_authored_questions(&[q("  ", &[("a", true), ("b", false)])]).is_err());
    }

    #[test]
    fn difficulty_values() {
        assert!(validate_difficulty("medium").is_ok());
        assert!(validate_difficulty("extreme").is_err());
    }
}

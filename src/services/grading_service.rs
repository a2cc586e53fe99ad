use std::collections::BTreeSet;

use crate::models::attempt::{AnswerMap, QuestionReview};
use crate::models::quiz::Question;

#[derive(Debug, Clone, PartialEq)]
pub struct GradeOutcome {
    pub score: i32,
    pub total_questions: i32,
    pub percentage: f64,
    pub correct_answers: Vec<i32>,
    pub incorrect_answers: Vec<i32>,
    pub unanswered: Vec<i32>,
    pub details: Vec<QuestionReview>,
}

pub struct GradingService;

impl GradingService {
    /// A question counts as correct only when the selected set equals the correct set.
    pub fn grade(questions: &[Question], answers: &AnswerMap) -> GradeOutcome {
        let mut correct_answers = Vec::new();
        let mut incorrect_answers = Vec::new();
        let mut unanswered = Vec::new();
        let mut details = Vec::with_capacity(questions.len());

        for (idx, q) in questions.iter().enumerate() {
            let selected: BTreeSet<usize> = answers
                .get(&idx.to_string())
                .map(|v| v.iter().copied().collect())
                .unwrap_or_default();
            let correct: BTreeSet<usize> = q.correct_indices().into_iter().collect();

            let is_answered = !selected.is_empty();
            let is_correct = is_answered && selected == correct;
            if !is_answered {
                unanswered.push(idx as i32);
            } else if is_correct {
                correct_answers.push(idx as i32);
            } else {
                incorrect_answers.push(idx as i32);
            }

            details.push(QuestionReview {
                question_index: idx,
                question: q.question.clone(),
                options: q.options.iter().map(|o| o.text.clone()).collect(),
                correct_indices: correct.into_iter().collect(),
                user_answers: selected.into_iter().collect(),
                is_correct,
                is_answered,
                explanation: q.explanation.clone().unwrap_or_default(),
            });
        }

        let score = correct_answers.len() as i32;
        let total_questions = questions.len() as i32;
        let percentage = if total_questions == 0 {
            0.0
        } else {
            (score as f64 / total_questions as f64 * 1000.0).round() / 10.0
        };

        GradeOutcome {
            score,
            total_questions,
            percentage,
            correct_answers,
            incorrect_answers,
            unanswered,
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::McqOption;

    fn q(correct: &[usize]) -> Question {
        Question {
            question: "Pick".into(),
            options: (0..4)
                .map(|i| McqOption {
                    text: format!("opt {}", i),
                    is_correct: correct.contains(&i),
                })
                .collect(),
            explanation: Some("because".into()),
        }
    }

    fn answers(pairs: &[(usize, &[usize])]) -> AnswerMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_vec()))
            .collect()
    }

    #[test]
    fn classifies_each_question_once() {
        let questions = vec![q(&[0]), q(&[1]), q(&[2])];
        let outcome = GradingService::grade(&questions, &answers(&[(0, &[0]), (1, &[3])]));
        assert_eq!(outcome.correct_answers, vec![0]);
        assert_eq!(outcome.incorrect_answers, vec![1]);
        assert_eq!(outcome.unanswered, vec![2]);
        assert_eq!(outcome.score, 1);
        assert_eq!(outcome.percentage, 33.3);
        assert_eq!(outcome.details[2].explanation, "because");
    }

    #[test]
    fn set_equality_for_multi_correct() {
        let questions = vec![q(&[0, 2])];
        let partial = GradingService::grade(&questions, &answers(&[(0, &[0])]));
        assert_eq!(partial.incorrect_answers, vec![0]);
        let exact = GradingService::grade(&questions, &answers(&[(0, &[2, 0])]));
        assert_eq!(exact.correct_answers, vec![0]);
        let extra = GradingService::grade(&questions, &answers(&[(0, &[0, 1, 2])]));
        assert_eq!(extra.incorrect_answers, vec![0]);
    }

    #[test]
    fn selection_order_does_not_change_the_outcome() {
        let questions = vec![q(&[0, 2]), q(&[1])];
        let forward = GradingService::grade(&questions, &answers(&[(0, &[0, 2]), (1, &[1])]));
        let reversed = GradingService::grade(&questions, &answers(&[(0, &[2, 0]), (1, &[1])]));
        assert_eq!(forward, reversed);
        assert_eq!(forward.details[0].user_answers, vec![0, 2]);
    }

    #[test]
    fn empty_selection_is_unanswered() {
        let outcome = GradingService::grade(&[q(&[0])], &answers(&[(0, &[])]));
        assert_eq!(outcome.unanswered, vec![0]);
        assert!(!outcome.details[0].is_answered);
    }

    #[test]
    fn empty_quiz_scores_zero_percent() {
        let outcome = GradingService::grade(&[], &AnswerMap::new());
        assert_eq!(outcome.percentage, 0.0);
        assert_eq!(outcome.total_questions, 0);
    }
}

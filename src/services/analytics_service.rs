use std::collections::HashSet;

use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::analytics_dto::{
    Discrimination, OptionAnalytics, PerformanceOverTime, PerformancePoint, QualityFlag,
    QuestionAnalytics, QuizAnalytics, ScoreDistribution, Trend, NO_OPTION_SENTINEL,
};
use crate::error::Result;
use crate::models::attempt::QuizAttempt;
use crate::models::quiz::Question;
use crate::models::user::User;
use crate::services::quiz_service::QuizService;

pub const MIN_ATTEMPTS_FOR_REPORT: usize = 10;
pub const MIN_ATTEMPTS_FOR_DISCRIMINATION: usize = 20;
pub const MIN_QUARTILE_SIZE: usize = 5;

const TOO_DIFFICULT_BELOW: f64 = 40.0;
const LOW_DISCRIMINATION_BELOW: f64 = 0.2;
const HIGH_SKIP_RATE_ABOVE: f64 = 20.0;

const TREND_WINDOW: usize = 3;
const TREND_THRESHOLD: f64 = 5.0;

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `round(count / total * 100, 1)`, or 0 when there is nothing to divide by.
pub fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(count as f64 / total as f64 * 100.0)
}

pub fn option_letter(index: usize) -> String {
    if index < 26 {
        ((b'A' + index as u8) as char).to_string()
    } else {
        format!("#{}", index + 1)
    }
}

/// Top and bottom quartiles of attempts ranked by raw score.
pub struct QuartileSplit<'a> {
    pub size: usize,
    pub top: Vec<&'a QuizAttempt>,
    pub bottom: Vec<&'a QuizAttempt>,
}

impl<'a> QuartileSplit<'a> {
    /// `None` when the sample is too small for a meaningful index.
    pub fn build(attempts: &'a [QuizAttempt]) -> Option<Self> {
        let n = attempts.len();
        let size = (n / 4).max(1);
        if n < MIN_ATTEMPTS_FOR_DISCRIMINATION || size < MIN_QUARTILE_SIZE {
            return None;
        }

        let mut ranked: Vec<&QuizAttempt> = attempts.iter().collect();
        // stable: equal scores keep submission order
        ranked.sort_by(|a, b| b.score.cmp(&a.score));

        let top = ranked[..size].to_vec();
        let bottom = ranked[n - size..].to_vec();
        Some(Self { size, top, bottom })
    }

    pub fn discrimination(&self, question_index: usize) -> Discrimination {
        let fraction = |group: &[&QuizAttempt]| {
            let correct = group
                .iter()
                .filter(|a| a.answered_correctly(question_index))
                .count();
            correct as f64 / self.size as f64
        };
        Discrimination::Value(round1(fraction(&self.top) - fraction(&self.bottom)))
    }
}

pub fn quality_flags(
    attempts: usize,
    correct_percentage: f64,
    discrimination: Discrimination,
    skip_rate: f64,
) -> Vec<QualityFlag> {
    let mut flags = Vec::new();
    if attempts == 0 {
        return flags;
    }
    if correct_percentage < TOO_DIFFICULT_BELOW {
        flags.push(QualityFlag::TooDifficult);
    }
    if let Some(d) = discrimination.value() {
        if d < LOW_DISCRIMINATION_BELOW {
            flags.push(QualityFlag::NeedsReview);
        }
    }
    if skip_rate > HIGH_SKIP_RATE_ABOVE {
        flags.push(QualityFlag::Unclear);
    }
    flags
}

pub fn analyze_question(
    question_index: usize,
    question: &Question,
    attempts: &[QuizAttempt],
    split: Option<&QuartileSplit<'_>>,
) -> QuestionAnalytics {
    let total = attempts.len();
    let idx = question_index as i32;

    let correct_count = attempts
        .iter()
        .filter(|a| a.correct_answers.contains(&idx))
        .count();
    let incorrect_count = attempts
        .iter()
        .filter(|a| a.incorrect_answers.contains(&idx))
        .count();
    let skipped_count = attempts
        .iter()
        .filter(|a| a.unanswered.contains(&idx))
        .count();

    let counts_consistent = correct_count + incorrect_count + skipped_count == total;
    if !counts_consistent {
        tracing::warn!(
            question_index,
            correct_count,
            incorrect_count,
            skipped_count,
            total_attempts = total,
            "stored answer classifications do not add up to the attempt count"
        );
    }

    let times: Vec<f64> = attempts
        .iter()
        .filter_map(|a| a.time_for(question_index))
        .filter(|t| *t > 0.0)
        .collect();
    let average_time_spent = if times.is_empty() {
        0.0
    } else {
        round1(times.iter().sum::<f64>() / times.len() as f64)
    };

    let options: Vec<OptionAnalytics> = question
        .options
        .iter()
        .enumerate()
        .map(|(option_index, option)| {
            let selected_count = attempts
                .iter()
                .filter(|a| a.selected_for(question_index).contains(&option_index))
                .count();
            OptionAnalytics {
                option_index,
                option_letter: option_letter(option_index),
                option_text: option.text.clone(),
                is_correct: option.is_correct,
                selected_count,
                selection_percentage: percent(selected_count, total),
            }
        })
        .collect();

    let most_chosen_option = options
        .iter()
        .filter(|o| o.selected_count > 0)
        .fold(None::<&OptionAnalytics>, |best, o| match best {
            Some(b) if b.selected_count >= o.selected_count => Some(b),
            _ => Some(o),
        })
        .map(|o| o.option_letter.clone())
        .unwrap_or_else(|| NO_OPTION_SENTINEL.to_string());

    let discrimination_index = split
        .map(|s| s.discrimination(question_index))
        .unwrap_or(Discrimination::NotApplicable);

    let correct_percentage = percent(correct_count, total);
    let skip_rate = percent(skipped_count, total);
    let flags = quality_flags(total, correct_percentage, discrimination_index, skip_rate);
    let flag_icon = flags.first().map(|f| f.icon().to_string());
    let flag_tooltip = if flags.is_empty() {
        None
    } else {
        Some(
            flags
                .iter()
                .map(|f| f.tooltip())
                .collect::<Vec<_>>()
                .join("; "),
        )
    };

    QuestionAnalytics {
        question_index,
        question_number: question_index + 1,
        question_text: question.question.clone(),
        attempts: total,
        correct_count,
        incorrect_count,
        skipped_count,
        counts_consistent,
        correct_percentage,
        incorrect_percentage: percent(incorrect_count, total),
        skip_rate,
        average_time_spent,
        discrimination_index,
        options,
        most_chosen_option,
        is_problematic: !flags.is_empty(),
        flags,
        flag_icon,
        flag_tooltip,
    }
}

/// Builds the analytics view of one quiz from its full attempt history.
pub fn build_report(title: &str, questions: &[Question], attempts: &[QuizAttempt]) -> QuizAnalytics {
    let total_attempts = attempts.len();
    let total_students = attempts
        .iter()
        .map(|a| a.student_email.trim().to_lowercase())
        .collect::<HashSet<_>>()
        .len();
    let total_questions = questions.len();

    if total_attempts < MIN_ATTEMPTS_FOR_REPORT {
        return QuizAnalytics {
            quiz_title: title.to_string(),
            total_attempts,
            total_students,
            total_questions,
            average_score: 0.0,
            average_percentage: 0.0,
            average_time_per_question: 0.0,
            score_distribution: ScoreDistribution::default(),
            insufficient_data: true,
            message: Some(format!(
                "At least {} attempts are needed for detailed analytics ({} so far)",
                MIN_ATTEMPTS_FOR_REPORT, total_attempts
            )),
            questions: Vec::new(),
        };
    }

    let n = total_attempts as f64;
    let average_score = round2(attempts.iter().map(|a| a.score as f64).sum::<f64>() / n);
    let average_percentage = round2(attempts.iter().map(|a| a.percentage).sum::<f64>() / n);
    let total_time: f64 = attempts.iter().map(|a| a.time_taken as f64).sum();
    let average_time_per_question = if total_questions == 0 {
        0.0
    } else {
        round1(total_time / (n * total_questions as f64))
    };

    let mut score_distribution = ScoreDistribution::default();
    for attempt in attempts {
        score_distribution.record(attempt.score);
    }

    let split = QuartileSplit::build(attempts);
    let questions = questions
        .iter()
        .enumerate()
        .map(|(i, q)| analyze_question(i, q, attempts, split.as_ref()))
        .collect();

    QuizAnalytics {
        quiz_title: title.to_string(),
        total_attempts,
        total_students,
        total_questions,
        average_score,
        average_percentage,
        average_time_per_question,
        score_distribution,
        insufficient_data: false,
        message: None,
        questions,
    }
}

/// `percentages` are ordered newest first.
pub fn performance_trend(percentages: &[f64]) -> (Trend, f64) {
    match percentages.len() {
        0 => (Trend::NoData, 0.0),
        1 => (Trend::InsufficientData, 0.0),
        len => {
            let window = TREND_WINDOW.min(len);
            let recent = percentages[..window].iter().sum::<f64>() / window as f64;
            let older = percentages[len - window..].iter().sum::<f64>() / window as f64;
            let improvement = recent - older;
            let trend = if improvement > TREND_THRESHOLD {
                Trend::Improving
            } else if improvement < -TREND_THRESHOLD {
                Trend::Declining
            } else {
                Trend::Stable
            };
            (trend, round2(improvement))
        }
    }
}

#[derive(Clone)]
pub struct AnalyticsService {
    pool: PgPool,
}

impl AnalyticsService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_attempts(&self, quiz_id: Uuid) -> Result<Vec<QuizAttempt>> {
        let attempts = sqlx::query_as::<_, QuizAttempt>(
            r#"SELECT * FROM quiz_attempts WHERE quiz_id = $1 ORDER BY submitted_at ASC"#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }

    pub async fn quiz_report(&self, quiz_id: Uuid, owner: &User) -> Result<QuizAnalytics> {
        let quiz = QuizService::new(self.pool.clone())
            .get_owned(quiz_id, owner.id)
            .await?;
        let attempts = self.list_attempts(quiz.id).await?;
        tracing::info!(
            quiz_id = %quiz.id,
            attempts = attempts.len(),
            "building quiz analytics"
        );
        Ok(build_report(&quiz.title, &quiz.questions.0, &attempts))
    }

    pub async fn performance_over_time(&self, user: &User, limit: i64) -> Result<PerformanceOverTime> {
        let limit = limit.clamp(1, 100);
        let results = sqlx::query_as::<_, QuizAttempt>(
            r#"SELECT * FROM quiz_attempts
               WHERE user_id = $1 OR lower(student_email) = lower($2)
               ORDER BY submitted_at DESC
               LIMIT $3"#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let percentages: Vec<f64> = results.iter().map(|r| r.percentage).collect();
        let (trend, improvement) = performance_trend(&percentages);
        let average_score = if results.is_empty() {
            0.0
        } else {
            round2(percentages.iter().sum::<f64>() / percentages.len() as f64)
        };

        let data = results
            .iter()
            .rev()
            .enumerate()
            .map(|(i, r)| PerformancePoint {
                quiz_number: i + 1,
                score: r.percentage,
                date: r.submitted_at.to_rfc3339(),
                quiz_title: r.quiz_title.clone(),
                total_questions: r.total_questions,
                correct_answers: r.score,
            })
            .collect();

        Ok(PerformanceOverTime {
            data,
            trend,
            improvement,
            total_quizzes: results.len(),
            average_score,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::attempt::{AnswerMap, QuestionTimes};
    use crate::models::quiz::McqOption;
    use chrono::Utc;
    use sqlx::types::Json;

    pub(crate) fn question(text: &str, options: usize, correct: usize) -> Question {
        Question {
            question: text.to_string(),
            options: (0..options)
                .map(|i| McqOption {
                    text: format!("Option {}", i + 1),
                    is_correct: i == correct,
                })
                .collect(),
            explanation: None,
        }
    }

    pub(crate) struct AttemptBuilder {
        attempt: QuizAttempt,
    }

    impl AttemptBuilder {
        pub(crate) fn new(score: i32) -> Self {
            Self {
                attempt: QuizAttempt {
                    id: Uuid::new_v4(),
                    quiz_id: Uuid::nil(),
                    quiz_title: "Quiz".into(),
                    room_id: None,
                    user_id: None,
                    student_name: "Student".into(),
                    student_email: format!("{}@example.com", Uuid::new_v4()),
                    answers: Json(AnswerMap::new()),
                    score,
                    total_questions: 1,
                    percentage: 0.0,
                    time_taken: 60,
                    time_per_question: None,
                    correct_answers: vec![],
                    incorrect_answers: vec![],
                    unanswered: vec![],
                    question_details: Json(vec![]),
                    submitted_at: Utc::now(),
                },
            }
        }

        pub(crate) fn email(mut self, email: &str) -> Self {
            self.attempt.student_email = email.to_string();
            self
        }

        pub(crate) fn correct(mut self, q: i32, selected: &[usize]) -> Self {
            self.attempt.correct_answers.push(q);
            self.attempt.answers.0.insert(q.to_string(), selected.to_vec());
            self
        }

        pub(crate) fn incorrect(mut self, q: i32, selected: &[usize]) -> Self {
            self.attempt.incorrect_answers.push(q);
            self.attempt.answers.0.insert(q.to_string(), selected.to_vec());
            self
        }

        pub(crate) fn skipped(mut self, q: i32) -> Self {
            self.attempt.unanswered.push(q);
            self
        }

        pub(crate) fn time(mut self, q: i32, secs: f64) -> Self {
            self.attempt
                .time_per_question
                .get_or_insert_with(|| Json(QuestionTimes::new()))
                .0
                .insert(q.to_string(), secs);
            self
        }

        pub(crate) fn build(self) -> QuizAttempt {
            self.attempt
        }
    }

    /// `correct` attempts scoring 1 followed by `wrong` attempts scoring 0.
    fn single_question_attempts(correct: usize, wrong: usize) -> Vec<QuizAttempt> {
        let mut attempts = Vec::new();
        for _ in 0..correct {
            attempts.push(AttemptBuilder::new(1).correct(0, &[0]).build());
        }
        for _ in 0..wrong {
            attempts.push(AttemptBuilder::new(0).incorrect(0, &[1]).build());
        }
        attempts
    }

    #[test]
    fn fewer_than_ten_attempts_yields_shell() {
        let questions = vec![question("What is two plus two?", 4, 1)];
        let attempts = single_question_attempts(5, 4);
        let report = build_report("Arithmetic", &questions, &attempts);

        assert!(report.insufficient_data);
        assert_eq!(report.total_attempts, 9);
        assert!(report.questions.is_empty());
        assert!(report.message.is_some());
    }

    #[test]
    fn ten_attempts_produce_full_report_without_discrimination() {
        let questions = vec![question("What is two plus two?", 4, 0)];
        let attempts = single_question_attempts(6, 4);
        let report = build_report("Arithmetic", &questions, &attempts);

        assert!(!report.insufficient_data);
        assert_eq!(report.questions.len(), 1);
        assert_eq!(
            report.questions[0].discrimination_index,
            Discrimination::NotApplicable
        );
    }

    #[test]
    fn counts_sum_to_total_and_percentages_are_rounded() {
        let questions = vec![question("Capital of France?", 4, 2)];
        let mut attempts = Vec::new();
        for _ in 0..4 {
            attempts.push(AttemptBuilder::new(1).correct(0, &[2]).build());
        }
        for _ in 0..5 {
            attempts.push(AttemptBuilder::new(0).incorrect(0, &[1]).build());
        }
        for _ in 0..3 {
            attempts.push(AttemptBuilder::new(0).skipped(0).build());
        }

        let report = build_report("Geo", &questions, &attempts);
        let q = &report.questions[0];
        assert_eq!(q.correct_count + q.incorrect_count + q.skipped_count, 12);
        assert!(q.counts_consistent);
        assert_eq!(q.correct_percentage, 33.3);
        assert_eq!(q.incorrect_percentage, 41.7);
        assert_eq!(q.skip_rate, 25.0);
        for p in [q.correct_percentage, q.incorrect_percentage, q.skip_rate] {
            assert!((0.0..=100.0).contains(&p));
        }
    }

    #[test]
    fn drifted_classification_is_flagged_not_corrected() {
        let questions = vec![question("Drift?", 4, 0)];
        let mut attempts = single_question_attempts(5, 5);
        // an attempt with no classification for question 0
        attempts.push(AttemptBuilder::new(0).build());

        let q = &build_report("Drift", &questions, &attempts).questions[0];
        assert!(!q.counts_consistent);
        assert_eq!(q.correct_count + q.incorrect_count + q.skipped_count, 10);
        assert_eq!(q.attempts, 11);
    }

    #[test]
    fn discrimination_requires_twenty_attempts() {
        let questions = vec![question("Q?", 4, 0)];
        let attempts = single_question_attempts(10, 9);
        let report = build_report("Q", &questions, &attempts);
        assert_eq!(
            report.questions[0].discrimination_index,
            Discrimination::NotApplicable
        );

        let attempts = single_question_attempts(10, 10);
        let report = build_report("Q", &questions, &attempts);
        assert!(matches!(
            report.questions[0].discrimination_index,
            Discrimination::Value(_)
        ));
    }

    #[test]
    fn perfect_separation_gives_index_of_one() {
        let questions = vec![question("Q?", 4, 0)];
        // only the five highest scorers got it right
        let mut attempts = single_question_attempts(5, 15);
        attempts.reverse();

        let report = build_report("Q", &questions, &attempts);
        assert_eq!(
            report.questions[0].discrimination_index,
            Discrimination::Value(1.0)
        );
    }

    #[test]
    fn low_discrimination_is_flagged() {
        let questions = vec![question("Q?", 4, 0), question("Easy?", 4, 0)];
        let mut attempts = Vec::new();
        // question 1 is answered correctly by everyone, so it cannot discriminate
        for i in 0..20 {
            let b = AttemptBuilder::new(if i < 10 { 2 } else { 1 });
            let b = if i < 10 { b.correct(0, &[0]) } else { b.incorrect(0, &[1]) };
            attempts.push(b.correct(1, &[0]).build());
        }
        let report = build_report("Q", &questions, &attempts);
        let easy = &report.questions[1];
        assert_eq!(easy.discrimination_index, Discrimination::Value(0.0));
        assert_eq!(easy.flags, vec![QualityFlag::NeedsReview]);
        assert_eq!(
            report.questions[0].discrimination_index,
            Discrimination::Value(1.0)
        );
    }

    #[test]
    fn zero_attempts_question_defaults() {
        let q = analyze_question(0, &question("Lonely?", 4, 0), &[], None);
        assert_eq!(q.correct_percentage, 0.0);
        assert_eq!(q.incorrect_percentage, 0.0);
        assert_eq!(q.skip_rate, 0.0);
        assert_eq!(q.average_time_spent, 0.0);
        assert_eq!(q.most_chosen_option, NO_OPTION_SENTINEL);
        assert!(q.options.iter().all(|o| o.selection_percentage == 0.0));
        assert!(q.flags.is_empty());
    }

    #[test]
    fn quiz_without_questions_has_empty_list() {
        let attempts = single_question_attempts(6, 6);
        let report = build_report("Empty", &[], &attempts);
        assert!(!report.insufficient_data);
        assert!(report.questions.is_empty());
        assert_eq!(report.average_time_per_question, 0.0);
    }

    #[test]
    fn average_time_ignores_missing_and_zero_durations() {
        let questions = vec![question("Timed?", 4, 0)];
        let mut attempts = vec![
            AttemptBuilder::new(1).correct(0, &[0]).time(0, 10.0).build(),
            AttemptBuilder::new(1).correct(0, &[0]).time(0, 20.0).build(),
            AttemptBuilder::new(1).correct(0, &[0]).time(0, 0.0).build(),
        ];
        attempts.extend(single_question_attempts(7, 0));
        let q = &build_report("T", &questions, &attempts).questions[0];
        assert_eq!(q.average_time_spent, 15.0);
    }

    #[test]
    fn option_breakdown_and_most_chosen() {
        let questions = vec![question("Pick?", 4, 0)];
        let mut attempts = Vec::new();
        for _ in 0..3 {
            attempts.push(AttemptBuilder::new(1).correct(0, &[0]).build());
        }
        for _ in 0..6 {
            attempts.push(AttemptBuilder::new(0).incorrect(0, &[2]).build());
        }
        attempts.push(AttemptBuilder::new(0).incorrect(0, &[1, 2]).build());

        let q = &build_report("P", &questions, &attempts).questions[0];
        assert_eq!(q.options[2].selected_count, 7);
        assert_eq!(q.options[2].selection_percentage, 70.0);
        assert_eq!(q.options[1].selected_count, 1);
        assert_eq!(q.most_chosen_option, "C");
        assert!(q.flags.contains(&QualityFlag::TooDifficult));
    }

    #[test]
    fn all_matched_flags_are_reported() {
        let questions = vec![question("Hard and skipped?", 4, 0)];
        let mut attempts = Vec::new();
        for _ in 0..3 {
            attempts.push(AttemptBuilder::new(1).correct(0, &[0]).build());
        }
        for _ in 0..3 {
            attempts.push(AttemptBuilder::new(0).incorrect(0, &[1]).build());
        }
        for _ in 0..4 {
            attempts.push(AttemptBuilder::new(0).skipped(0).build());
        }
        let q = &build_report("F", &questions, &attempts).questions[0];
        assert_eq!(q.flags, vec![QualityFlag::TooDifficult, QualityFlag::Unclear]);
        assert_eq!(q.flag_icon.as_deref(), Some(QualityFlag::TooDifficult.icon()));
        let tooltip = q.flag_tooltip.as_deref().unwrap();
        assert!(tooltip.contains(QualityFlag::TooDifficult.tooltip()));
        assert!(tooltip.contains(QualityFlag::Unclear.tooltip()));
        assert!(q.is_problematic);
    }

    #[test]
    fn quiz_level_aggregates() {
        let questions = vec![question("A?", 4, 0), question("B?", 4, 0)];
        let mut attempts = Vec::new();
        for i in 0..10 {
            let mut a = AttemptBuilder::new(if i % 2 == 0 { 2 } else { 0 })
                .email(if i < 5 { "Same@Example.com" } else { "same@example.com " })
                .build();
            a.percentage = if i % 2 == 0 { 100.0 } else { 0.0 };
            a.time_taken = 40;
            a.unanswered = vec![0, 1];
            attempts.push(a);
        }
        let report = build_report("Agg", &questions, &attempts);
        assert_eq!(report.total_students, 1);
        assert_eq!(report.average_score, 1.0);
        assert_eq!(report.average_percentage, 50.0);
        assert_eq!(report.average_time_per_question, 20.0);
        assert_eq!(report.score_distribution.low, 10);
    }

    #[test]
    fn trend_classification() {
        assert_eq!(performance_trend(&[]).0, Trend::NoData);
        assert_eq!(performance_trend(&[80.0]).0, Trend::InsufficientData);
        let (trend, improvement) = performance_trend(&[90.0, 85.0, 80.0, 60.0, 55.0, 50.0]);
        assert_eq!(trend, Trend::Improving);
        assert_eq!(improvement, 30.0);
        assert_eq!(
            performance_trend(&[50.0, 50.0, 50.0, 70.0, 70.0, 70.0]).0,
            Trend::Declining
        );
        // Two results fall into both windows.
        assert_eq!(performance_trend(&[50.0, 70.0]), (Trend::Stable, 0.0));
        assert_eq!(performance_trend(&[70.0, 68.0]).0, Trend::Stable);
    }
}

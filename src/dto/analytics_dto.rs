use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Placeholder shown when no option of a question was ever selected.
pub const NO_OPTION_SENTINEL: &str = "—";

const NOT_APPLICABLE: &str = "N/A";

/// Serialized as a bare number, or the string `"N/A"` when the sample is too small.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Discrimination {
    Value(f64),
    NotApplicable,
}

impl Discrimination {
    pub fn value(&self) -> Option<f64> {
        match self {
            Discrimination::Value(v) => Some(*v),
            Discrimination::NotApplicable => None,
        }
    }
}

impl fmt::Display for Discrimination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discrimination::Value(v) => write!(f, "{:.1}", v),
            Discrimination::NotApplicable => f.write_str(NOT_APPLICABLE),
        }
    }
}

impl FromStr for Discrimination {
    type Err = std::num::ParseFloatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(NOT_APPLICABLE) {
            return Ok(Discrimination::NotApplicable);
        }
        s.parse::<f64>().map(Discrimination::Value)
    }
}

impl Serialize for Discrimination {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Discrimination::Value(v) => serializer.serialize_f64(*v),
            Discrimination::NotApplicable => serializer.serialize_str(NOT_APPLICABLE),
        }
    }
}

impl<'de> Deserialize<'de> for Discrimination {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(v) => Ok(Discrimination::Value(v)),
            Raw::Text(t) => t.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    TooDifficult,
    NeedsReview,
    Unclear,
}

impl QualityFlag {
    pub fn label(&self) -> &'static str {
        match self {
            QualityFlag::TooDifficult => "too difficult",
            QualityFlag::NeedsReview => "needs review",
            QualityFlag::Unclear => "unclear",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            QualityFlag::TooDifficult => "🔴",
            QualityFlag::NeedsReview => "⚠️",
            QualityFlag::Unclear => "❓",
        }
    }

    pub fn tooltip(&self) -> &'static str {
        match self {
            QualityFlag::TooDifficult => "Too difficult: fewer than 40% of students answered correctly",
            QualityFlag::NeedsReview => "Needs review: the question does not separate strong and weak students",
            QualityFlag::Unclear => "Unclear: more than 20% of students skipped this question",
        }
    }
}

/// Fixed raw-score buckets; they do not adapt to the question count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreDistribution {
    #[serde(rename = "0-3")]
    pub low: usize,
    #[serde(rename = "4-6")]
    pub mid: usize,
    #[serde(rename = "7-9")]
    pub high: usize,
    #[serde(rename = "10+")]
    pub top: usize,
}

impl ScoreDistribution {
    pub fn record(&mut self, score: i32) {
        match score {
            i32::MIN..=3 => self.low += 1,
            4..=6 => self.mid += 1,
            7..=9 => self.high += 1,
            _ => self.top += 1,
        }
    }

    pub fn buckets(&self) -> [(&'static str, usize); 4] {
        [
            ("0-3", self.low),
            ("4-6", self.mid),
            ("7-9", self.high),
            ("10+", self.top),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionAnalytics {
    pub option_index: usize,
    pub option_letter: String,
    pub option_text: String,
    pub is_correct: bool,
    pub selected_count: usize,
    pub selection_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAnalytics {
    pub question_index: usize,
    pub question_number: usize,
    pub question_text: String,
    pub attempts: usize,
    pub correct_count: usize,
    pub incorrect_count: usize,
    pub skipped_count: usize,
    /// False when the stored classifications do not add up to `attempts`.
    pub counts_consistent: bool,
    pub correct_percentage: f64,
    pub incorrect_percentage: f64,
    pub skip_rate: f64,
    pub average_time_spent: f64,
    pub discrimination_index: Discrimination,
    pub options: Vec<OptionAnalytics>,
    pub most_chosen_option: String,
    pub flags: Vec<QualityFlag>,
    pub flag_icon: Option<String>,
    pub flag_tooltip: Option<String>,
    pub is_problematic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAnalytics {
    pub quiz_title: String,
    pub total_attempts: usize,
    pub total_students: usize,
    pub total_questions: usize,
    pub average_score: f64,
    pub average_percentage: f64,
    pub average_time_per_question: f64,
    pub score_distribution: ScoreDistribution,
    pub insufficient_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub questions: Vec<QuestionAnalytics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformancePoint {
    pub quiz_number: usize,
    pub score: f64,
    pub date: String,
    pub quiz_title: String,
    pub total_questions: i32,
    pub correct_answers: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    NoData,
    InsufficientData,
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceOverTime {
    pub data: Vec<PerformancePoint>,
    pub trend: Trend,
    pub improvement: f64,
    pub total_quizzes: usize,
    pub average_score: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceQuery {
    pub limit: Option<i64>,
}

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value as JsonValue;
use url::Url;

use crate::error::{Error, Result};
use crate::models::quiz::{McqOption, Question};
use crate::services::fallback_generator::FallbackGenerator;
use crate::services::mcq_quality::{DocumentProfile, QualityPolicy, Verdict};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MAX_PROMPT_CONTENT_CHARS: usize = 4000;
const QUIZ_MAX_OUTPUT_TOKENS: u32 = 8192;

/// A text-in, text-out generative model.
#[cfg_attr(test, mockall::automock)]
pub trait TextModel: Send + Sync {
    fn is_configured(&self) -> bool;

    fn generate(
        &self,
        prompt: &str,
        max_output_tokens: u32,
    ) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, model: String, client: Client) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }
}

impl TextModel for GeminiClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Internal("Gemini API key is not configured".into()))?;
        let url = Url::parse_with_params(
            &format!("{}/{}:generateContent", GEMINI_BASE_URL, self.model),
            &[("key", key)],
        )
        .map_err(|e| Error::Internal(format!("Invalid Gemini URL: {}", e)))?;

        let payload = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "maxOutputTokens": max_output_tokens,
                "temperature": 0.7
            }
        });

        let res = self
            .client
            .post(url)
            .json(&payload)
            .timeout(Duration::from_secs(120))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Gemini API Error {}: {}", status, text).into());
        }

        let body: JsonValue = res.json().await?;
        body.pointer("/candidates/0/content/parts/0/text")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response format").into())
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct GenerationOutput {
    pub questions: Vec<Question>,
    pub ai_accepted: usize,
    pub ai_rejected: usize,
    pub fallback_used: usize,
    pub logs: Vec<String>,
}

pub struct AIService<M: TextModel = GeminiClient> {
    model: M,
    policy: QualityPolicy,
    max_questions: usize,
}

impl<M: TextModel + Clone> Clone for AIService<M> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
            policy: self.policy.clone(),
            max_questions: self.max_questions,
        }
    }
}

impl<M: TextModel> AIService<M> {
    pub fn new(model: M, max_questions: usize) -> Self {
        Self {
            model,
            policy: QualityPolicy::default(),
            max_questions: max_questions.max(1),
        }
    }

    /// Never fails: model errors and rejected candidates are replaced by fallback questions.
    pub async fn generate_quiz(
        &self,
        content: &str,
        num_questions: usize,
        difficulty: &str,
    ) -> GenerationOutput {
        let requested = num_questions.clamp(1, self.max_questions);
        let profile = DocumentProfile::from_text(content);
        let mut logs: Vec<String> = vec![format!(
            "Generating {} {} questions ({} key concepts found).",
            requested,
            difficulty,
            profile.key_concepts.len()
        )];

        let candidates = if self.model.is_configured() {
            let prompt = build_quiz_prompt(content, requested, difficulty);
            match self.model.generate(&prompt, QUIZ_MAX_OUTPUT_TOKENS).await {
                Ok(text) => {
                    let parsed = parse_candidates(&text);
                    logs.push(format!("Model returned {} candidate questions.", parsed.len()));
                    parsed
                }
                Err(e) => {
                    tracing::error!(error = ?e, "quiz generation call failed");
                    logs.push("Model call failed; using rule-based questions.".to_string());
                    Vec::new()
                }
            }
        } else {
            tracing::warn!("no AI model configured, generating rule-based questions");
            logs.push("AI not configured; using rule-based questions.".to_string());
            Vec::new()
        };

        let mut accepted = Vec::new();
        let mut ai_rejected = 0;
        for candidate in candidates {
            match self.policy.evaluate(&candidate, &profile) {
                Verdict::Accepted { .. } => accepted.push(candidate),
                verdict => {
                    tracing::debug!(question = %candidate.question, ?verdict, "rejected generated question");
                    ai_rejected += 1;
                }
            }
        }
        accepted.truncate(requested);
        let ai_accepted = accepted.len();
        logs.push(format!(
            "Accepted {} generated questions, rejected {}.",
            ai_accepted, ai_rejected
        ));

        let shortfall = requested - ai_accepted;
        if shortfall > 0 {
            accepted.extend(FallbackGenerator::new(&profile).generate(shortfall));
            logs.push(format!("Filled {} questions with the rule-based generator.", shortfall));
        }

        GenerationOutput {
            questions: accepted,
            ai_accepted,
            ai_rejected,
            fallback_used: shortfall,
            logs,
        }
    }
}

fn build_quiz_prompt(content: &str, count: usize, difficulty: &str) -> String {
    let excerpt: String = content.chars().take(MAX_PROMPT_CONTENT_CHARS).collect();
    format!(
        r#"Based on the following content, generate EXACTLY {count} multiple-choice questions with {difficulty} difficulty level.

IMPORTANT: You must generate exactly {count} questions, no more, no less.

Content:
{excerpt}

Format the response as a JSON array with the following structure:
[
    {{
        "question": "Question text here?",
        "options": [
            {{"text": "Option A", "is_correct": false}},
            {{"text": "Option B", "is_correct": true}},
            {{"text": "Option C", "is_correct": false}},
            {{"text": "Option D", "is_correct": false}}
        ],
        "explanation": "Why the correct answer is correct"
    }}
]

Requirements:
- Each question must have exactly 4 options
- Only one correct answer per question
- Do not use "All of the above" or "None of the above"
- Return ONLY the JSON array, no additional text"#
    )
}

/// Extracts the outermost JSON array from model output and coerces each item.
pub fn parse_candidates(text: &str) -> Vec<Question> {
    let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) else {
        return Vec::new();
    };
    if end <= start {
        return Vec::new();
    }
    let Ok(items) = serde_json::from_str::<Vec<JsonValue>>(&text[start..=end]) else {
        tracing::warn!("model output did not contain a parseable JSON array");
        return Vec::new();
    };
    items.iter().filter_map(coerce_question).collect()
}

fn coerce_question(value: &JsonValue) -> Option<Question> {
    let question = value.get("question")?.as_str()?.trim().to_string();
    let answer_index = ["answerIndex", "answer_index", "correct_answer"]
        .iter()
        .find_map(|k| value.get(*k).and_then(|v| v.as_u64()))
        .map(|i| i as usize);

    let options = value
        .get("options")?
        .as_array()?
        .iter()
        .enumerate()
        .filter_map(|(i, opt)| match opt {
            JsonValue::String(text) => Some(McqOption {
                text: text.trim().to_string(),
                is_correct: answer_index == Some(i),
            }),
            JsonValue::Object(map) => Some(McqOption {
                text: map.get("text")?.as_str()?.trim().to_string(),
                is_correct: map
                    .get("is_correct")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(answer_index == Some(i)),
            }),
            _ => None,
        })
        .collect();

    let explanation = value
        .get("explanation")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Some(Question {
        question,
        options,
        explanation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "Cell Biology\n\
        The mitochondria produce energy for the cell through respiration.\n\
        The chloroplast captures light energy during photosynthesis in plants.\n\
        The nucleus stores genetic material and controls the activity of the cell.\n";

    fn good_item(text: &str, correct: usize) -> JsonValue {
        serde_json::json!({
            "question": text,
            "options": (0..4).map(|i| serde_json::json!({
                "text": (["Mitochondria", "Chloroplast", "Nucleus", "Ribosome"][i]),
                "is_correct": i == correct
            })).collect::<Vec<_>>(),
            "explanation": "The organelle named here is described in the cell biology notes."
        })
    }

    fn mock_returning(text: String) -> MockTextModel {
        let mut mock = MockTextModel::new();
        mock.expect_is_configured().return_const(true);
        mock.expect_generate().times(1).returning(move |_, _| {
            let text = text.clone();
            Box::pin(async move { Ok(text) })
        });
        mock
    }

    #[tokio::test]
    async fn accepted_model_output_is_used() {
        let items: Vec<JsonValue> = (0..3)
            .map(|i| good_item(&format!("Which organelle handles cell energy step {}?", i), i % 4))
            .collect();
        let text = format!("Here you go:\n{}\nGood luck!", serde_json::to_string(&items).unwrap());
        let service = AIService::new(mock_returning(text), 20);

        let out = service.generate_quiz(DOC, 3, "medium").await;
        assert_eq!(out.questions.len(), 3);
        assert_eq!(out.ai_accepted, 3);
        assert_eq!(out.fallback_used, 0);
    }

    #[tokio::test]
    async fn malformed_candidates_are_replaced() {
        let mut two_correct = good_item("Which organelle produces energy for the cell?", 0);
        two_correct["options"][1]["is_correct"] = JsonValue::Bool(true);
        let items = vec![
            good_item("Which organelle stores genetic material in the cell?", 2),
            two_correct,
        ];
        let service = AIService::new(mock_returning(serde_json::to_string(&items).unwrap()), 20);

        let out = service.generate_quiz(DOC, 2, "easy").await;
        assert_eq!(out.questions.len(), 2);
        assert_eq!(out.ai_accepted, 1);
        assert_eq!(out.ai_rejected, 1);
        assert_eq!(out.fallback_used, 1);
        assert!(out.questions.iter().all(|q| q.correct_count() == 1));
    }

    #[tokio::test]
    async fn model_failure_falls_back_entirely() {
        let mut mock = MockTextModel::new();
        mock.expect_is_configured().return_const(true);
        mock.expect_generate()
            .returning(|_, _| Box::pin(async { Err(Error::Internal("boom".into())) }));
        let service = AIService::new(mock, 20);

        let out = service.generate_quiz(DOC, 4, "hard").await;
        assert_eq!(out.questions.len(), 4);
        assert_eq!(out.ai_accepted, 0);
        assert_eq!(out.fallback_used, 4);
    }

    #[tokio::test]
    async fn unconfigured_model_is_never_called() {
        let mut mock = MockTextModel::new();
        mock.expect_is_configured().return_const(false);
        mock.expect_generate().never();
        let service = AIService::new(mock, 5);

        let out = service.generate_quiz(DOC, 50, "medium").await;
        assert_eq!(out.questions.len(), 5);
    }

    #[test]
    fn string_options_with_answer_index_are_coerced() {
        let text = r#"[{"question": "What stores genetic material?",
            "options": ["Nucleus", "Ribosome", "Vacuole", "Membrane"],
            "answerIndex": 0, "explanation": "The nucleus holds DNA."}]"#;
        let parsed = parse_candidates(text);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].correct_indices(), vec![0]);
        assert_eq!(parsed[0].options[3].text, "Membrane");
    }

    #[test]
    fn garbage_output_yields_nothing() {
        assert!(parse_candidates("I cannot help with that").is_empty());
        assert!(parse_candidates("] oops [").is_empty());
    }

    #[test]
    fn prompt_truncates_content() {
        let long = "a".repeat(10_000);
        let prompt = build_quiz_prompt(&long, 5, "medium");
        assert!(prompt.contains("EXACTLY 5"));
        assert!(!prompt.contains(&"a".repeat(4001)));
    }
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Bot,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct HistoryMessage {
    #[serde(rename = "type")]
    pub role: HistoryRole,
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ChatContext {
    pub topic: Option<String>,
    pub question: Option<String>,
    #[serde(default)]
    pub conversation_history: Vec<HistoryMessage>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ChatMessageRequest {
    #[validate(length(min = 1, max = 4000))]
    pub message: String,
    pub context: Option<ChatContext>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub suggestions: Vec<String>,
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Positive,
    Negative,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Positive => "positive",
            Rating::Negative => "negative",
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RateMessageRequest {
    pub message_id: i64,
    pub rating: Rating,
}

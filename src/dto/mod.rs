use serde::Serialize;

pub mod analytics_dto;
pub mod auth_dto;
pub mod chat_dto;
pub mod public_dto;
pub mod quiz_dto;
pub mod room_dto;

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

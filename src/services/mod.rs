pub mod ai_service;
pub mod analytics_service;
pub mod attempt_service;
pub mod auth_service;
pub mod chat_service;
pub mod email_service;
pub mod export_service;
pub mod extract_service;
pub mod fallback_generator;
pub mod grading_service;
pub mod mcq_quality;
pub mod quiz_service;
pub mod room_service;

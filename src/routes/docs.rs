use axum::{response::IntoResponse, Json};
use utoipa::OpenApi;

use crate::dto::auth_dto::{
    GoogleAuthRequest, LoginRequest, RegisterRequest, ResendOtpRequest, TokenForm,
    UpdatePasswordRequest, UpdateProfileRequest, VerifyOtpRequest,
};
use crate::dto::chat_dto::{ChatContext, ChatMessageRequest, HistoryMessage, HistoryRole, RateMessageRequest, Rating};
use crate::dto::public_dto::{SubmitQuizRequest, VerifyAccessRequest};
use crate::dto::quiz_dto::{ManualQuizRequest, ShareSettingsRequest, TimerSettingsRequest, UpdateQuizRequest};
use crate::dto::room_dto::{CreateRoomRequest, JoinRoomRequest};
use crate::models::quiz::{McqOption, Question, TimerSettings, TimerType, Visibility};
use crate::models::room::RoomSettings;

#[derive(OpenApi)]
#[openapi(
    info(title = "Quizzify API", description = "Quiz generation, sharing, rooms and analytics"),
    paths(
        crate::routes::auth::register,
        crate::routes::auth::verify_otp,
        crate::routes::auth::resend_otp,
        crate::routes::auth::login,
        crate::routes::auth::token,
        crate::routes::auth::google,
        crate::routes::me::get_me,
        crate::routes::me::update_me,
        crate::routes::me::update_password,
        crate::routes::quiz::upload_and_generate,
        crate::routes::quiz::create_manual,
        crate::routes::quiz::list_quizzes,
        crate::routes::quiz::get_quiz,
        crate::routes::quiz::update_quiz,
        crate::routes::quiz::delete_quiz,
        crate::routes::quiz::update_share_settings,
        crate::routes::quiz::update_timer_settings,
        crate::routes::quiz::list_attempts,
        crate::routes::export::export_attempts_csv,
        crate::routes::export::export_attempts_xlsx,
        crate::routes::export::export_quiz_pdf,
        crate::routes::export::export_analytics_csv,
        crate::routes::analytics::quiz_analytics,
        crate::routes::analytics::performance_over_time,
        crate::routes::room::create_room,
        crate::routes::room::list_rooms,
        crate::routes::room::my_rooms,
        crate::routes::room::join_room,
        crate::routes::room::get_room,
        crate::routes::room::delete_room,
        crate::routes::room::start_room,
        crate::routes::room::complete_room,
        crate::routes::room::leaderboard,
        crate::routes::public::get_public_quiz,
        crate::routes::public::verify_access,
        crate::routes::public::submit_quiz,
        crate::routes::public::get_attempt,
        crate::routes::chat::send_message,
        crate::routes::chat::rate_message,
    ),
    components(schemas(
        RegisterRequest,
        VerifyOtpRequest,
        ResendOtpRequest,
        LoginRequest,
        TokenForm,
        GoogleAuthRequest,
        UpdateProfileRequest,
        UpdatePasswordRequest,
        ManualQuizRequest,
        UpdateQuizRequest,
        ShareSettingsRequest,
        TimerSettingsRequest,
        CreateRoomRequest,
        JoinRoomRequest,
        SubmitQuizRequest,
        VerifyAccessRequest,
        ChatMessageRequest,
        ChatContext,
        HistoryMessage,
        HistoryRole,
        RateMessageRequest,
        Rating,
        Question,
        McqOption,
        Visibility,
        TimerType,
        TimerSettings,
        RoomSettings,
    )),
    tags(
        (name = "auth"),
        (name = "quizzes"),
        (name = "rooms"),
        (name = "public"),
        (name = "analytics"),
        (name = "chat"),
    )
)]
pub struct ApiDoc;

pub async fn openapi() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_public_and_room_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/public/quiz/submit"));
        assert!(doc.paths.paths.contains_key("/api/rooms/{id}/leaderboard"));
        assert!(doc.paths.paths.contains_key("/api/auth/token"));
    }
}

pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use reqwest::Client;
use sqlx::PgPool;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::config::Config;
use crate::error::Result;
use crate::middleware::{auth::require_user, cors::cors_layer, rate_limit};
use crate::services::{
    ai_service::{AIService, GeminiClient},
    analytics_service::AnalyticsService,
    attempt_service::AttemptService,
    auth_service::{AuthService, GoogleKeyStore, OtpPolicy},
    chat_service::ChatService,
    email_service::EmailService,
    quiz_service::QuizService,
    room_service::RoomService,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub auth_service: AuthService,
    pub quiz_service: QuizService,
    pub attempt_service: AttemptService,
    pub room_service: RoomService,
    pub analytics_service: AnalyticsService,
    pub ai_service: AIService,
    pub chat_service: ChatService,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        let gemini = GeminiClient::new(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            http_client.clone(),
        );
        let google_keys = GoogleKeyStore::new(http_client.clone());
        let email_service = EmailService::new(
            http_client,
            config.email_api_url.clone(),
            config.email_api_key.clone(),
            config.email_from.clone(),
        );
        let otp = OtpPolicy {
            ttl_minutes: config.otp_ttl_minutes,
            max_attempts: config.otp_max_attempts,
            resend_cooldown_seconds: config.otp_resend_cooldown_seconds,
        };

        if !config.ai_enabled() {
            tracing::warn!("GEMINI_API_KEY is not set; quizzes and chat replies use the offline fallbacks");
        }
        if config.google_client_id.is_none() {
            tracing::warn!("GOOGLE_CLIENT_ID is not set; Google sign-in is disabled");
        }
        if !email_service.is_enabled() {
            tracing::warn!("EMAIL_API_KEY is not set; verification codes are only logged");
        }

        Ok(Self {
            auth_service: AuthService::new(
                pool.clone(),
                email_service,
                otp,
                config.google_client_id.clone(),
                google_keys,
            ),
            quiz_service: QuizService::new(pool.clone()),
            attempt_service: AttemptService::new(pool.clone()),
            room_service: RoomService::new(pool.clone()),
            analytics_service: AnalyticsService::new(pool.clone()),
            ai_service: AIService::new(gemini.clone(), config.max_ai_questions),
            chat_service: ChatService::new(pool.clone(), gemini),
            pool,
        })
    }
}

/// Full HTTP surface: unauthenticated routes under the public limiter,
/// bearer-protected routes under the API limiter.
pub fn build_router(state: AppState, config: &Config) -> Router {
    use crate::routes;

    let public_api = Router::new()
        .route("/health", get(routes::health::health))
        .route("/api-docs/openapi.json", get(routes::docs::openapi))
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/verify-otp", post(routes::auth::verify_otp))
        .route("/api/auth/resend-otp", post(routes::auth::resend_otp))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/token", post(routes::auth::token))
        .route("/api/auth/google", post(routes::auth::google))
        .route("/api/public/quiz/submit", post(routes::public::submit_quiz))
        .route("/api/public/quiz/:id", get(routes::public::get_public_quiz))
        .route(
            "/api/public/quiz/:id/verify-access",
            post(routes::public::verify_access),
        )
        .route("/api/public/attempt/:id", get(routes::public::get_attempt))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::new_rps_state(config.public_rps),
            rate_limit::rps_middleware,
        ));

    let authed_api = Router::new()
        .route(
            "/api/me",
            get(routes::me::get_me).put(routes::me::update_me),
        )
        .route("/api/me/password", axum::routing::put(routes::me::update_password))
        .route(
            "/api/quizzes/upload-and-generate",
            post(routes::quiz::upload_and_generate),
        )
        .route("/api/quizzes/create-manual", post(routes::quiz::create_manual))
        .route("/api/quizzes", get(routes::quiz::list_quizzes))
        .route(
            "/api/quizzes/:id",
            get(routes::quiz::get_quiz)
                .put(routes::quiz::update_quiz)
                .delete(routes::quiz::delete_quiz),
        )
        .route(
            "/api/quizzes/:id/share-settings",
            axum::routing::put(routes::quiz::update_share_settings),
        )
        .route(
            "/api/quizzes/:id/timer-settings",
            axum::routing::put(routes::quiz::update_timer_settings),
        )
        .route("/api/quizzes/:id/attempts", get(routes::quiz::list_attempts))
        .route(
            "/api/quizzes/:id/export/csv",
            get(routes::export::export_attempts_csv),
        )
        .route(
            "/api/quizzes/:id/export/xlsx",
            get(routes::export::export_attempts_xlsx),
        )
        .route(
            "/api/quizzes/:id/export/pdf",
            get(routes::export::export_quiz_pdf),
        )
        .route(
            "/api/analytics/quiz/:id",
            get(routes::analytics::quiz_analytics),
        )
        .route(
            "/api/analytics/quiz/:id/export",
            get(routes::export::export_analytics_csv),
        )
        .route(
            "/api/analytics/performance-over-time",
            get(routes::analytics::performance_over_time),
        )
        .route("/api/rooms/create", post(routes::room::create_room))
        .route("/api/rooms", get(routes::room::list_rooms))
        .route("/api/rooms/my-rooms", get(routes::room::my_rooms))
        .route("/api/rooms/join", post(routes::room::join_room))
        .route(
            "/api/rooms/:id",
            get(routes::room::get_room).delete(routes::room::delete_room),
        )
        .route("/api/rooms/:id/start", post(routes::room::start_room))
        .route("/api/rooms/:id/complete", post(routes::room::complete_room))
        .route("/api/rooms/:id/leaderboard", get(routes::room::leaderboard))
        .route("/api/chat/message", post(routes::chat::send_message))
        .route("/api/chat/rate", post(routes::chat::rate_message))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_user,
        ))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::new_rps_state(config.api_rps),
            rate_limit::rps_middleware,
        ));

    public_api
        .merge(authed_api)
        .with_state(state)
        .layer(cors_layer(&config.cors_origins))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(config.upload_max_bytes))
}

use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiry_minutes: i64,
    pub public_rps: u32,
    pub api_rps: u32,
    pub max_ai_questions: usize,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub otp_ttl_minutes: i64,
    pub otp_max_attempts: i32,
    pub otp_resend_cooldown_seconds: i64,
    pub email_api_url: String,
    pub email_api_key: Option<String>,
    pub email_from: String,
    pub google_client_id: Option<String>,
    pub cors_origins: Vec<String>,
    pub upload_max_bytes: usize,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            jwt_secret: get_env("JWT_SECRET")?,
            jwt_expiry_minutes: get_env_parse_or("JWT_EXPIRY_MINUTES", 1440)?,
            public_rps: get_env_parse("PUBLIC_RPS")?,
            api_rps: get_env_parse("API_RPS")?,
            max_ai_questions: get_env_parse_or("MAX_AI_QUESTIONS", 20)?,
            gemini_api_key: get_env_opt("GEMINI_API_KEY"),
            gemini_model: get_env_opt("GEMINI_MODEL").unwrap_or_else(|| "gemini-1.5-flash".to_string()),
            otp_ttl_minutes: get_env_parse_or("OTP_TTL_MINUTES", 10)?,
            otp_max_attempts: get_env_parse_or("OTP_MAX_ATTEMPTS", 5)?,
            otp_resend_cooldown_seconds: get_env_parse_or("OTP_RESEND_COOLDOWN_SECONDS", 60)?,
            email_api_url: get_env_opt("EMAIL_API_URL")
                .unwrap_or_else(|| "https://api.resend.com/emails".to_string()),
            email_api_key: get_env_opt("EMAIL_API_KEY"),
            email_from: get_env_opt("EMAIL_FROM")
                .unwrap_or_else(|| "Quizzify <no-reply@quizzify.app>".to_string()),
            google_client_id: get_env_opt("GOOGLE_CLIENT_ID"),
            cors_origins: get_env_opt("CORS_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            upload_max_bytes: get_env_parse_or("UPLOAD_MAX_BYTES", 20 * 1024 * 1024)?,
        })
    }

    pub fn ai_enabled(&self) -> bool {
        self.gemini_api_key.is_some()
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

/// Empty values count as unset.
fn get_env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_parse<T>(name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name)?;
    raw.parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_env_opt(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        None => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}

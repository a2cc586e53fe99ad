use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct PendingRegistration {
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub hashed_password: String,
    pub otp_code: String,
    pub otp_expires_at: DateTime<Utc>,
    pub failed_attempts: i32,
    pub last_sent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PendingRegistration {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.otp_expires_at <= now
    }
}

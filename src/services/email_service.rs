use reqwest::Client;
use serde::Serialize;

use crate::error::Result;

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: String,
}

/// Transactional mail over a Resend-compatible HTTP API.
#[derive(Clone)]
pub struct EmailService {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
}

impl EmailService {
    pub fn new(client: Client, api_url: String, api_key: Option<String>, from: String) -> Self {
        Self {
            client,
            api_url,
            api_key,
            from,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Without an API key the code is written to the log instead.
    pub async fn send_otp(&self, to_email: &str, otp: &str, ttl_minutes: i64) -> Result<()> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::info!(email = %to_email, otp = %otp, "email delivery disabled, logging verification code");
            return Ok(());
        };

        let body = SendEmailRequest {
            from: &self.from,
            to: vec![to_email],
            subject: "Your Quizzify verification code",
            html: format!(
                r#"<h2>Welcome to Quizzify!</h2>
<p>Your verification code is:</p>
<p style="font-size:24px;font-weight:bold;letter-spacing:4px">{otp}</p>
<p>This code expires in {ttl_minutes} minutes.</p>"#
            ),
        };

        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            tracing::error!(%status, body = %text, "email API rejected the message");
            return Err(anyhow::anyhow!("Email API returned {}", status).into());
        }

        tracing::info!(email = %to_email, "verification email sent");
        Ok(())
    }
}

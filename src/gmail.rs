use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use hyper::client::HttpConnector;
use hyper_rustls::HttpsConnector;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use yup_oauth2::authenticator::Authenticator;

use crate::model::RenderedEmail;

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/";
const GMAIL_SEND_SCOPE: &[&str] = &["https://www.googleapis.com/auth/gmail.send"];

/// Outbound mail delivery. One call sends one email; failures propagate
/// so the orchestrator can collapse the whole event.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send_html(&self, to: &str, email: &RenderedEmail) -> Result<()>;
}

/// Produces bearer tokens for the Gmail API. Abstracted so the client
/// can be tested without a service-account key file.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Service-account token source using domain-wide delegation: tokens are
/// minted with `subject` set to the impersonated sender mailbox, so the
/// API treats `users/me` as that mailbox.
pub struct GoogleTokenSource {
    auth: Authenticator<HttpsConnector<HttpConnector>>,
}

impl GoogleTokenSource {
    pub async fn delegated(credentials_path: &str, impersonate_user: &str) -> Result<Self> {
        let key = yup_oauth2::read_service_account_key(credentials_path)
            .await
            .with_context(|| {
                format!("failed to read service account key at {credentials_path}")
            })?;
        let auth = yup_oauth2::ServiceAccountAuthenticator::builder(key)
            .subject(impersonate_user)
            .build()
            .await
            .context("failed to build Google service-account authenticator")?;
        Ok(Self { auth })
    }
}

#[async_trait]
impl TokenSource for GoogleTokenSource {
    async fn access_token(&self) -> Result<String> {
        let token = self
            .auth
            .token(GMAIL_SEND_SCOPE)
            .await
            .context("failed to obtain Gmail access token")?;
        token
            .token()
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("Gmail token response contained no access token"))
    }
}

/// Gmail REST client sending messages as the delegated identity.
#[derive(Clone)]
pub struct GmailClient {
    http: Client,
    base_url: Url,
    tokens: Arc<dyn TokenSource>,
}

impl fmt::Debug for GmailClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GmailClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

impl GmailClient {
    pub fn new(tokens: Arc<dyn TokenSource>) -> Self {
        let base_url = Url::parse(GMAIL_API_BASE).expect("valid default Gmail URL");
        Self::with_base_url(tokens, base_url)
    }

    pub fn with_base_url(tokens: Arc<dyn TokenSource>, base_url: Url) -> Self {
        let http = Client::builder()
            .user_agent("office-relay/0.1")
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            tokens,
        }
    }

    pub fn build_send_request(&self, access_token: &str, raw: &str) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join("gmail/v1/users/me/messages/send")
            .context("invalid Gmail base URL")?;
        self.http
            .post(endpoint)
            .header("Authorization", format!("Bearer {access_token}"))
            .header("Content-Type", "application/json")
            .json(&json!({ "raw": raw }))
            .build()
            .context("failed to build Gmail request")
    }
}

#[async_trait]
impl MailSender for GmailClient {
    async fn send_html(&self, to: &str, email: &RenderedEmail) -> Result<()> {
        info!(to, subject = %email.subject, "sending email");

        let access_token = self.tokens.access_token().await?;
        let raw = encode_message(to, email);
        let request = self.build_send_request(&access_token, &raw)?;

        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach Gmail")?;

        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            warn!(to, "rate limited by Gmail: {body}");
            return Err(anyhow!("received 429 from Gmail: {body}"));
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(to, %status, "Gmail API error: {body}");
            return Err(anyhow!("gmail error {status}: {body}"));
        }

        let payload: SendResponse = res.json().await.context("invalid Gmail response JSON")?;
        info!(to, message_id = %payload.id, "email sent");
        Ok(())
    }
}

/// Assemble the RFC-2822-shaped message and base64url-encode it the way
/// the Gmail API expects (`+` -> `-`, `/` -> `_`, padding kept).
pub fn encode_message(to: &str, email: &RenderedEmail) -> String {
    let message = build_raw_message(to, email);
    URL_SAFE.encode(message)
}

fn build_raw_message(to: &str, email: &RenderedEmail) -> String {
    [
        format!("To: {to}"),
        format!("Subject: {}", email.subject),
        "Content-Type: text/html; charset=utf-8".to_string(),
        String::new(),
        email.html.clone(),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticTokens;

    #[async_trait]
    impl TokenSource for StaticTokens {
        async fn access_token(&self) -> Result<String> {
            Ok("test-token".into())
        }
    }

    fn sample_email() -> RenderedEmail {
        RenderedEmail {
            subject: "Patient Status Update - Office".into(),
            html: "<p>body</p>".into(),
        }
    }

    #[test]
    fn raw_message_has_headers_blank_line_then_body() {
        let raw = build_raw_message("dr@office.com", &sample_email());
        let lines: Vec<&str> = raw.split('\n').collect();
        assert_eq!(lines[0], "To: dr@office.com");
        assert_eq!(lines[1], "Subject: Patient Status Update - Office");
        assert_eq!(lines[2], "Content-Type: text/html; charset=utf-8");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "<p>body</p>");
    }

    #[test]
    fn encoded_message_is_url_safe_base64() {
        let encoded = encode_message("dr@office.com", &sample_email());
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        let decoded = URL_SAFE.decode(encoded.as_bytes()).unwrap();
        let text = String::from_utf8(decoded).unwrap();
        assert!(text.starts_with("To: dr@office.com\n"));
        assert!(text.ends_with("<p>body</p>"));
    }

    #[test]
    fn send_request_targets_messages_send_with_bearer_auth() {
        let client = GmailClient::new(Arc::new(StaticTokens));
        let request = client.build_send_request("test-token", "abc123").unwrap();
        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.url().path(), "/gmail/v1/users/me/messages/send");
        assert_eq!(
            request
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "Bearer test-token"
        );
    }

    #[test]
    fn send_request_body_wraps_raw_payload() {
        let client = GmailClient::new(Arc::new(StaticTokens));
        let request = client.build_send_request("t", "encoded-message").unwrap();
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(value, serde_json::json!({ "raw": "encoded-message" }));
    }
}

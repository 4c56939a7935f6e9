use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

use office_relay::gmail::MailSender;
use office_relay::http;
use office_relay::model::{NotificationSettings, RenderedEmail};
use office_relay::relay::Relay;
use office_relay::supabase::OfficeStore;

struct FakeStore {
    settings: Option<NotificationSettings>,
    office_name: Option<String>,
}

#[async_trait]
impl OfficeStore for FakeStore {
    async fn fetch_settings(&self, _office_id: i64) -> Result<Option<NotificationSettings>> {
        Ok(self.settings.clone())
    }

    async fn fetch_office_name(&self, _office_id: i64) -> Result<Option<String>> {
        Ok(self.office_name.clone())
    }
}

struct NoopMailer;

#[async_trait]
impl MailSender for NoopMailer {
    async fn send_html(&self, _to: &str, _email: &RenderedEmail) -> Result<()> {
        Ok(())
    }
}

async fn serve(relay: Relay) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = http::router(Arc::new(relay));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn relay_with(settings: Option<NotificationSettings>, office_name: Option<&str>) -> Relay {
    Relay::new(
        Arc::new(FakeStore {
            settings,
            office_name: office_name.map(str::to_owned),
        }),
        Arc::new(NoopMailer),
    )
}

fn enabled_settings() -> NotificationSettings {
    NotificationSettings {
        office_id: 42,
        recipient_emails: vec!["a@x.com".into()],
        notify_on_date_request: true,
        notify_on_patient_status: true,
        notify_on_production_summary: true,
    }
}

#[tokio::test]
async fn health_always_reports_healthy() {
    let addr = serve(relay_with(None, None)).await;
    let res = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "status": "healthy" }));
}

#[tokio::test]
async fn webhook_success_returns_200_with_message() {
    let addr = serve(relay_with(Some(enabled_settings()), Some("Office"))).await;
    let res = reqwest::Client::new()
        .post(format!("http://{addr}/webhook/notification"))
        .json(&json!({
            "office_id": 42,
            "notification_type": "patient_status",
            "data": { "date": "2024-01-01" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Notification processed successfully");
}

#[tokio::test]
async fn suppressed_notification_still_returns_200() {
    let mut settings = enabled_settings();
    settings.notify_on_patient_status = false;
    let addr = serve(relay_with(Some(settings), Some("Office"))).await;
    let res = reqwest::Client::new()
        .post(format!("http://{addr}/webhook/notification"))
        .json(&json!({
            "office_id": 42,
            "notification_type": "patient_status",
            "data": {}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn webhook_failure_returns_500_with_error() {
    let addr = serve(relay_with(None, None)).await;
    let res = reqwest::Client::new()
        .post(format!("http://{addr}/webhook/notification"))
        .json(&json!({
            "office_id": 7,
            "notification_type": "patient_status",
            "data": {}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await.unwrap();
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("no notification settings found for office 7"));
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::fmt;
use tracing::debug;

use crate::model::NotificationSettings;

/// Read access to the externally owned office tables. Abstracted so the
/// orchestrator can be exercised against an in-memory fake.
#[async_trait]
pub trait OfficeStore: Send + Sync {
    /// Fetch the notification settings row for one office.
    /// `Ok(None)` covers both "no row" and a query that errored, which
    /// the orchestrator treats identically.
    async fn fetch_settings(&self, office_id: i64) -> Result<Option<NotificationSettings>>;

    /// Fetch the display name for one office.
    async fn fetch_office_name(&self, office_id: i64) -> Result<Option<String>>;
}

const SETTINGS_TABLE: &str = "office_notification_settings";
const OFFICE_TABLE: &str = "gol";

/// PostgREST client for the Supabase project, authenticated with the
/// service-role key.
#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: Url,
    service_role_key: String,
}

impl fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct OfficeRow {
    office_name: String,
}

impl SupabaseClient {
    pub fn new(supabase_url: &str, service_role_key: String) -> Result<Self> {
        let base_url = Url::parse(supabase_url).context("invalid Supabase URL")?;
        let http = Client::builder()
            .user_agent("office-relay/0.1")
            .build()
            .context("reqwest client")?;
        Ok(Self {
            http,
            base_url,
            service_role_key,
        })
    }

    /// Build a single-row PostgREST query against `table`, filtered on
    /// `office_id`. The `Accept: application/vnd.pgrst.object+json`
    /// header makes PostgREST return exactly one object or an error
    /// status, the same contract supabase-js `.single()` relies on.
    pub fn build_single_row_request(
        &self,
        table: &str,
        office_id: i64,
        select: &str,
    ) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join(&format!("rest/v1/{table}"))
            .context("invalid Supabase base URL")?;
        self.http
            .get(endpoint)
            .query(&[
                ("office_id", format!("eq.{office_id}").as_str()),
                ("select", select),
            ])
            .header("apikey", &self.service_role_key)
            .header(
                "Authorization",
                format!("Bearer {}", self.service_role_key),
            )
            .header("Accept", "application/vnd.pgrst.object+json")
            .build()
            .context("failed to build Supabase request")
    }

    async fn fetch_single_row<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        office_id: i64,
        select: &str,
    ) -> Result<Option<T>> {
        let request = self.build_single_row_request(table, office_id, select)?;
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach Supabase")?;

        let status = res.status();
        if !status.is_success() {
            // PostgREST answers 406 for "not exactly one row"; anything
            // else non-success is also a lookup miss for the caller.
            let body = res.text().await.unwrap_or_default();
            debug!(table, office_id, %status, body = %body, "supabase single-row lookup miss");
            return Ok(None);
        }

        let row = res
            .json::<T>()
            .await
            .with_context(|| format!("invalid Supabase response for table {table}"))?;
        Ok(Some(row))
    }
}

#[async_trait]
impl OfficeStore for SupabaseClient {
    async fn fetch_settings(&self, office_id: i64) -> Result<Option<NotificationSettings>> {
        self.fetch_single_row(SETTINGS_TABLE, office_id, "*").await
    }

    async fn fetch_office_name(&self, office_id: i64) -> Result<Option<String>> {
        let row: Option<OfficeRow> = self
            .fetch_single_row(OFFICE_TABLE, office_id, "office_name")
            .await?;
        Ok(row.map(|r| r.office_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SupabaseClient {
        SupabaseClient::new("https://demo.supabase.co", "secret-key".into()).unwrap()
    }

    #[test]
    fn settings_request_targets_settings_table() {
        let request = client()
            .build_single_row_request(SETTINGS_TABLE, 42, "*")
            .unwrap();
        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(request.url().path(), "/rest/v1/office_notification_settings");
        assert_eq!(request.url().query(), Some("office_id=eq.42&select=*"));
    }

    #[test]
    fn office_request_projects_only_the_name() {
        let request = client()
            .build_single_row_request(OFFICE_TABLE, 7, "office_name")
            .unwrap();
        assert_eq!(request.url().path(), "/rest/v1/gol");
        assert_eq!(
            request.url().query(),
            Some("office_id=eq.7&select=office_name")
        );
    }

    #[test]
    fn request_carries_service_role_auth_and_single_row_accept() {
        let request = client()
            .build_single_row_request(SETTINGS_TABLE, 1, "*")
            .unwrap();
        let headers = request.headers();
        assert_eq!(
            headers.get("apikey").and_then(|h| h.to_str().ok()).unwrap(),
            "secret-key"
        );
        assert_eq!(
            headers
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "Bearer secret-key"
        );
        assert_eq!(
            headers.get("Accept").and_then(|h| h.to_str().ok()).unwrap(),
            "application/vnd.pgrst.object+json"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(SupabaseClient::new("not a url", "key".into()).is_err());
    }
}

//! Notification orchestrator: one linear pipeline per event with a
//! single concurrent fan-out stage for the per-recipient sends.

use futures::future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::gmail::MailSender;
use crate::model::{NotificationEvent, ProcessOutcome};
use crate::render;
use crate::supabase::OfficeStore;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("no notification settings found for office {office_id}: {reason}")]
    SettingsNotFound { office_id: i64, reason: String },
    #[error("office not found for office_id {office_id}: {reason}")]
    OfficeNotFound { office_id: i64, reason: String },
    #[error("failed to send notification email: {0}")]
    Send(#[source] anyhow::Error),
}

/// Long-lived handles into the backing store and the mail API, injected
/// once at startup. Processing itself is stateless; every event stands
/// alone.
#[derive(Clone)]
pub struct Relay {
    store: Arc<dyn OfficeStore>,
    mailer: Arc<dyn MailSender>,
}

impl Relay {
    pub fn new(store: Arc<dyn OfficeStore>, mailer: Arc<dyn MailSender>) -> Self {
        Self { store, mailer }
    }

    /// Process one notification event end to end.
    ///
    /// Pipeline: settings lookup -> preference gate -> office-name
    /// resolve -> render once -> concurrent fan-out to every recipient.
    /// The fan-out is all-or-nothing: every send is awaited, then the
    /// first failure fails the whole event with no per-recipient detail.
    #[instrument(skip_all, fields(event_id = %event.id, office_id = event.office_id, kind = %event.kind))]
    pub async fn process(&self, event: &NotificationEvent) -> Result<ProcessOutcome, RelayError> {
        let settings = match self.store.fetch_settings(event.office_id).await {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                return Err(RelayError::SettingsNotFound {
                    office_id: event.office_id,
                    reason: "no row".into(),
                })
            }
            Err(err) => {
                return Err(RelayError::SettingsNotFound {
                    office_id: event.office_id,
                    reason: err.to_string(),
                })
            }
        };

        if !settings.is_enabled(&event.kind) {
            info!("notification kind disabled for office; suppressing");
            return Ok(ProcessOutcome::Suppressed);
        }

        let office_name = match self.store.fetch_office_name(event.office_id).await {
            Ok(Some(name)) => name,
            Ok(None) => {
                return Err(RelayError::OfficeNotFound {
                    office_id: event.office_id,
                    reason: "no row".into(),
                })
            }
            Err(err) => {
                return Err(RelayError::OfficeNotFound {
                    office_id: event.office_id,
                    reason: err.to_string(),
                })
            }
        };

        let email = render::render(&event.kind, &event.data, &office_name);

        let sends = settings
            .recipient_emails
            .iter()
            .map(|to| self.mailer.send_html(to, &email));
        let results = future::join_all(sends).await;

        let recipients = results.len();
        for result in results {
            if let Err(err) = result {
                warn!(?err, "fan-out send failed; reporting whole event as failed");
                return Err(RelayError::Send(err));
            }
        }

        info!(recipients, "notification sent to all recipients");
        Ok(ProcessOutcome::Sent { recipients })
    }
}

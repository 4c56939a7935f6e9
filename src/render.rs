//! Fixed email templates, one per notification kind.
//!
//! Rendering is pure and never fails: missing payload fields degrade to
//! empty text or a literal placeholder, and unrecognized kinds fall back
//! to a generic template embedding the serialized payload.

use crate::model::{NotificationKind, RenderedEmail};
use serde_json::Value;
use tracing::warn;

const BASE_STYLE: &str = r#"
    <style>
      body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }
      .header { background-color: #1e40af; color: white; padding: 20px; text-align: center; }
      .content { padding: 20px; }
      .footer { background-color: #f3f4f6; padding: 15px; text-align: center; font-size: 12px; color: #666; }
      .status-approved { color: #059669; font-weight: bold; }
      .status-denied { color: #dc2626; font-weight: bold; }
      .highlight { background-color: #fef3c7; padding: 10px; border-left: 4px solid #f59e0b; margin: 15px 0; }
    </style>
  "#;

/// Render the email for one event. The kind switch is exhaustive; the
/// `Unknown` arm is the generic fallback rather than an error path.
pub fn render(kind: &NotificationKind, data: &Value, office_name: &str) -> RenderedEmail {
    match kind {
        NotificationKind::DateRequest => render_date_request(data, office_name),
        NotificationKind::PatientStatus => render_patient_status(data, office_name),
        NotificationKind::ProductionSummary => render_production_summary(data, office_name),
        NotificationKind::Unknown(tag) => {
            warn!(kind = %tag, "no template for notification kind; using generic fallback");
            render_generic(tag, data, office_name)
        }
    }
}

fn render_date_request(data: &Value, office_name: &str) -> RenderedEmail {
    let status = field(data, "status");
    let approved = status == "approved";
    let verdict = if approved { "Approved" } else { "Denied" };

    let denial_block = match field_opt(data, "denial_reason") {
        Some(reason) => format!(
            r#"<div class="highlight"><strong>Reason:</strong> {reason}</div>"#
        ),
        None => String::new(),
    };

    RenderedEmail {
        subject: format!("Date Request {verdict} - {office_name}"),
        html: format!(
            r#"
          {BASE_STYLE}
          <div class="header">
            <h1>Elite Sedation - Date Request Update</h1>
          </div>
          <div class="content">
            <h2>Date Request {verdict}</h2>
            <p><strong>Office:</strong> {office_name}</p>
            <p><strong>Requested Date:</strong> {date}</p>
            <p><strong>Status:</strong> <span class="status-{status}">{status_upper}</span></p>
            {denial_block}
            <p>Please log into your portal for more details.</p>
          </div>
          <div class="footer">
            <p>This is an automated notification from Elite Sedation</p>
          </div>
        "#,
            date = field(data, "date"),
            status_upper = status.to_uppercase(),
        ),
    }
}

fn render_patient_status(data: &Value, office_name: &str) -> RenderedEmail {
    RenderedEmail {
        subject: format!("Patient Status Update - {office_name}"),
        html: format!(
            r#"
          {BASE_STYLE}
          <div class="header">
            <h1>Elite Sedation - Patient Status Update</h1>
          </div>
          <div class="content">
            <h2>Patient Status Changed</h2>
            <p><strong>Office:</strong> {office_name}</p>
            <p><strong>Date:</strong> {date}</p>
            <p><strong>Provider ID:</strong> {provider}</p>
            <p>Please review the patient details in your portal.</p>
          </div>
          <div class="footer">
            <p>This is an automated notification from Elite Sedation</p>
          </div>
        "#,
            date = field(data, "date"),
            provider = field_opt(data, "provider_id").unwrap_or_else(|| "Not assigned".into()),
        ),
    }
}

fn render_production_summary(data: &Value, office_name: &str) -> RenderedEmail {
    RenderedEmail {
        subject: format!("Production Summary Updated - {office_name}"),
        html: format!(
            r#"
          {BASE_STYLE}
          <div class="header">
            <h1>Elite Sedation - Production Summary</h1>
          </div>
          <div class="content">
            <h2>Payment Update</h2>
            <p><strong>Office:</strong> {office_name}</p>
            <p><strong>Amount:</strong> ${amount}</p>
            <p><strong>Due Date:</strong> {due_date}</p>
            <p><strong>Status:</strong> {status}</p>
            <div class="highlight">
              <p>Your production summary has been updated. Please log into your portal to view the complete details.</p>
            </div>
          </div>
          <div class="footer">
            <p>This is an automated notification from Elite Sedation</p>
          </div>
        "#,
            amount = format_amount(data.get("amount")),
            due_date = field(data, "due_date"),
            status = field(data, "status"),
        ),
    }
}

fn render_generic(tag: &str, data: &Value, office_name: &str) -> RenderedEmail {
    RenderedEmail {
        subject: format!("Notification Update - {office_name}"),
        html: format!(
            r#"{BASE_STYLE}<div><h2>Generic Notification</h2><p>Office: {office_name}</p><p>Type: {tag}</p><p>Data: {data}</p></div>"#,
            data = serde_json::to_string(data).unwrap_or_default(),
        ),
    }
}

/// A payload field as display text: strings pass through, numbers are
/// stringified, anything absent or non-scalar renders empty.
fn field(data: &Value, key: &str) -> String {
    field_opt(data, key).unwrap_or_default()
}

/// Same as [`field`], but empty strings count as absent so callers can
/// substitute a placeholder.
fn field_opt(data: &Value, key: &str) -> Option<String> {
    match data.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Dollar amount with thousands grouping, e.g. `12500.5` -> `12,500.5`.
/// Non-numeric or missing amounts render empty.
fn format_amount(value: Option<&Value>) -> String {
    let Some(n) = value.and_then(Value::as_f64) else {
        return String::new();
    };

    // Round to three fractional digits first so grouping and trimming
    // operate on the final decimal representation.
    let formatted = format!("{n:.3}");
    let (int_part, frac_part) = formatted
        .split_once('.')
        .unwrap_or((formatted.as_str(), ""));
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int_part),
    };

    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let frac = frac_part.trim_end_matches('0');
    if frac.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    }
}

//! Outbound alerts for critical incidents (Slack incoming webhook).

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::info;

use crate::error::EngineError;
use crate::types::Incident;

/// Header line of every alert message.
pub const ALERT_HEADER: &str = "Alert: critical events detected in the authentication logs.";

/// Render incidents into a plain-text alert: the header, then one bullet per incident.
pub fn format_alert(incidents: &[Incident]) -> String {
  let mut text = String::from(ALERT_HEADER);
  text.push('\n');
  for incident in incidents {
    text.push_str("- ");
    text.push_str(&incident.to_string());
    text.push('\n');
  }
  text
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
  text: &'a str,
}

/// Posts alert text to a Slack incoming webhook.
pub struct SlackNotifier {
  client: Client,
  webhook_url: String,
}

impl SlackNotifier {
  pub fn new(webhook_url: impl Into<String>) -> Result<Self, EngineError> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self {
      client,
      webhook_url: webhook_url.into(),
    })
  }

  /// Send one message for the whole batch. A non-2xx response is an error.
  pub async fn send(&self, incidents: &[Incident]) -> Result<(), EngineError> {
    let text = format_alert(incidents);
    self
      .client
      .post(&self.webhook_url)
      .json(&WebhookPayload { text: &text })
      .send()
      .await?
      .error_for_status()?;
    info!(incidents = incidents.len(), "slack notification sent");
    Ok(())
  }
}

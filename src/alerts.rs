//! Alert dispatch
//!
//! [`AlertDispatcher`] fans one [`TransitionEvent`] out to the configured
//! notification channels. Channels are strictly isolated from each other and
//! from the monitoring cycle: a channel with missing configuration is skipped
//! (that is not an error), and a delivery failure is logged with device and
//! channel context but never propagated. A broken mail server must not stop
//! device polling, and a dead webhook endpoint must not stop the mail.

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error, info, instrument};

use crate::TransitionEvent;
use crate::config::{EmailConfig, WebhookConfig};

/// Upper bound on a single webhook delivery, so a hung endpoint cannot stall
/// the next monitoring cycle.
const WEBHOOK_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct AlertDispatcher {
    client: Client,
    email: Option<EmailConfig>,
    webhook: Option<WebhookConfig>,
}

impl AlertDispatcher {
    pub fn new(email: Option<EmailConfig>, webhook: Option<WebhookConfig>) -> Self {
        Self {
            client: Client::builder()
                .timeout(WEBHOOK_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            email,
            webhook,
        }
    }

    /// Notify every configured channel about an outage.
    ///
    /// Invoked exactly once per `Online` -> `Offline` transition; each channel
    /// is attempted independently of the others' results.
    #[instrument(skip(self, event), fields(device = %event.name))]
    pub async fn dispatch(&self, event: &TransitionEvent) {
        self.send_email_alert(event).await;
        self.send_webhook_alert(event).await;
    }

    async fn send_email_alert(&self, event: &TransitionEvent) {
        let Some(email) = &self.email else {
            debug!("SMTP credentials not set, skipping email alert");
            return;
        };

        let subject = format!("ALERT: Device {} is Offline", event.name);
        let body = format!(
            "Device Name: {}\nIP Address: {}\nStatus: Offline\nTime: {}",
            event.name,
            event.address,
            event.occurred_at.format(TIMESTAMP_FORMAT)
        );

        let message = Message::builder()
            .from(match email.username.parse() {
                Ok(from) => from,
                Err(e) => {
                    error!("invalid sender address {:?}: {e}", email.username);
                    return;
                }
            })
            .to(match email.recipient.parse() {
                Ok(to) => to,
                Err(e) => {
                    error!("invalid alert recipient {:?}: {e}", email.recipient);
                    return;
                }
            })
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body);

        let message = match message {
            Ok(message) => message,
            Err(e) => {
                error!("failed to build alert email: {e}");
                return;
            }
        };

        let transport = match AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&email.server) {
            Ok(builder) => builder
                .port(email.port)
                .credentials(Credentials::new(
                    email.username.clone(),
                    email.password.clone(),
                ))
                .build(),
            Err(e) => {
                error!("failed to build SMTP transport for {}: {e}", email.server);
                return;
            }
        };

        match transport.send(message).await {
            Ok(_) => {
                info!("alert email sent for {} ({})", event.name, event.address);
            }
            Err(e) => {
                error!("failed to send email alert for {}: {e}", event.name);
            }
        }
    }

    async fn send_webhook_alert(&self, event: &TransitionEvent) {
        let Some(webhook) = &self.webhook else {
            debug!("webhook credentials not set, skipping webhook alert");
            return;
        };

        let payload = json!({
            "recipient": webhook.recipient,
            "content": format!(
                "ALERT: Device {} ({}) is Offline at {}",
                event.name,
                event.address,
                event.occurred_at.format(TIMESTAMP_FORMAT)
            ),
            "instance_id": webhook.instance_id,
        });

        let response = self
            .client
            .post(&webhook.endpoint)
            .header("API-Key", &webhook.api_key)
            .json(&payload)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                error!("failed to send webhook alert for {}: {e}", event.name);
                return;
            }
        };

        // Success requires HTTP 200 plus an explicit success flag in the body;
        // the endpoint reports delivery errors with a 200 + { success: false }.
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            error!(
                "webhook alert for {} failed with status: {status}",
                event.name
            );
            return;
        }

        match response.json::<serde_json::Value>().await {
            Ok(body) if body.get("success").and_then(|v| v.as_bool()) == Some(true) => {
                info!("webhook alert sent for {} ({})", event.name, event.address);
            }
            Ok(body) => {
                error!(
                    "webhook alert for {} rejected by endpoint: {body}",
                    event.name
                );
            }
            Err(e) => {
                error!(
                    "webhook alert for {} returned malformed response: {e}",
                    event.name
                );
            }
        }
    }
}

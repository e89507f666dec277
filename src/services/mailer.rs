// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Booking confirmation mails.
//!
//! Sends one message per invitee through an HTTP mail API. Mail is best
//! effort: failures are logged and never undo a booking.

use crate::config::Config;
use crate::error::AppError;
use crate::models::{Activity, MeetingTarget};
use crate::time_utils::format_utc_rfc3339;
use futures_util::{stream, StreamExt};
use serde::Serialize;

const MAX_CONCURRENT_MAILS: usize = 8;

/// Outgoing message body accepted by the mail API.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// Mail API client.
#[derive(Clone)]
pub struct ConfirmationMailer {
    http: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<String>,
    from: String,
}

impl ConfirmationMailer {
    pub fn new(config: &Config) -> Self {
        if config.mail_api_url.is_none() {
            tracing::info!("Mail API not configured, confirmations disabled");
        }
        Self {
            http: reqwest::Client::new(),
            endpoint: config.mail_api_url.clone(),
            api_key: config.mail_api_key.clone(),
            from: config.mail_from.clone(),
        }
    }

    /// Mailer that never sends (tests and local development).
    pub fn disabled() -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: None,
            api_key: None,
            from: String::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Send confirmations to `targets` of `activity`.
    ///
    /// Returns how many messages were accepted by the mail API.
    pub async fn send_confirmations(
        &self,
        activity: &Activity,
        organizer: &str,
        targets: &[MeetingTarget],
    ) -> usize {
        let Some(endpoint) = self.endpoint.as_deref() else {
            tracing::debug!(activity_id = %activity.id, "Mail disabled, skipping confirmations");
            return 0;
        };

        let messages: Vec<MailMessage> = targets
            .iter()
            .filter_map(|t| build_confirmation(&self.from, activity, organizer, t))
            .collect();

        let results = stream::iter(messages)
            .map(|message| async move {
                let to = message.to.clone();
                let result = self.post(endpoint, &message).await;
                if let Err(e) = &result {
                    tracing::warn!(activity_id = %activity.id, to = %to, error = %e, "Confirmation mail failed");
                }
                result
            })
            .buffer_unordered(MAX_CONCURRENT_MAILS)
            .collect::<Vec<Result<(), AppError>>>()
            .await;

        let sent = results.iter().filter(|r| r.is_ok()).count();
        tracing::info!(
            activity_id = %activity.id,
            sent,
            failed = results.len() - sent,
            "Confirmation mails processed"
        );
        sent
    }

    async fn post(&self, endpoint: &str, message: &MailMessage) -> Result<(), AppError> {
        let mut request = self.http.post(endpoint).json(message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::MailApi(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::MailApi(format!("HTTP {}: {}", status, body)))
    }
}

/// Build the message for one invitee; `None` if they have no email.
pub fn build_confirmation(
    from: &str,
    activity: &Activity,
    organizer: &str,
    target: &MeetingTarget,
) -> Option<MailMessage> {
    let to = target.email.as_deref().filter(|e| !e.is_empty())?;

    let mut text = format!(
        "Hi {},\n\n{} booked \"{}\" with you.\n\nStarts: {}\nEnds: {}\n",
        target.name,
        organizer,
        activity.title,
        format_utc_rfc3339(activity.start_time),
        format_utc_rfc3339(activity.end_time),
    );
    if !activity.description.is_empty() {
        text.push('\n');
        text.push_str(&activity.description);
        text.push('\n');
    }

    Some(MailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: format!("Booking confirmation: {}", activity.title),
        text,
    })
}

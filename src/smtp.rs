//! Outbound submission: one attempt through the SMTP relay.
//!
//! The gateway's only responsibility here is rendering task fields into a
//! plain-text body and handing the message to the relay. No pooling, no
//! retries; errors surface verbatim to the caller since sending has no
//! fallback path.

use chrono::{DateTime, Utc};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::MailConfig;
use crate::error::SendError;

/// Receipt for a submission the relay accepted.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub message_id: Option<String>,
}

/// Task fields a notification mail is rendered from.
#[derive(Debug, Clone)]
pub struct TaskSummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Thin submission client over the SMTP relay.
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl Mailer {
    pub fn new(config: &MailConfig) -> Result<Self, SendError> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let builder = if config.smtp.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp.host)
                .map_err(|e| SendError::Transport(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp.host)
        };
        let transport = builder.port(config.smtp.port).credentials(creds).build();

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }

    /// Send one message. When no HTML alternative is supplied, one is
    /// derived from the text body with newlines as `<br>`.
    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        text: &str,
        html: Option<&str>,
    ) -> Result<SendReceipt, SendError> {
        let from: Mailbox = format!("Task Board <{}>", self.from_address)
            .parse()
            .map_err(|e| SendError::Address {
                address: self.from_address.clone(),
                reason: format!("{e}"),
            })?;
        let to_mailbox: Mailbox = to.parse().map_err(|e| SendError::Address {
            address: to.to_string(),
            reason: format!("{e}"),
        })?;

        let html_body = html
            .map(str::to_string)
            .unwrap_or_else(|| text.replace('\n', "<br>"));
        let message_id = format!(
            "<{}.taskmail@{}>",
            Utc::now().timestamp_millis(),
            self.from_domain()
        );

        let message = Message::builder()
            .from(from)
            .to(to_mailbox)
            .subject(subject)
            .message_id(Some(message_id.clone()))
            .multipart(MultiPart::alternative_plain_html(
                text.to_string(),
                html_body,
            ))
            .map_err(|e| SendError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        info!(to, subject, "mail submitted");
        Ok(SendReceipt {
            message_id: Some(message_id),
        })
    }

    /// Render a task into the notification body and send it.
    pub async fn send_task_summary(
        &self,
        to: &str,
        subject: &str,
        task: &TaskSummary,
    ) -> Result<SendReceipt, SendError> {
        info!(task = %task.id, to, "sending task summary");
        let body = format_task_body(task);
        self.send(to, subject, &body, None).await
    }

    /// Open and close a connection to the relay without sending anything.
    /// Used by the connection test probe.
    pub async fn verify(&self) -> Result<bool, SendError> {
        self.transport
            .test_connection()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))
    }

    fn from_domain(&self) -> &str {
        self.from_address
            .split('@')
            .nth(1)
            .unwrap_or("localhost")
    }
}

/// Plain-text notification body for a task.
pub fn format_task_body(task: &TaskSummary) -> String {
    let due = task
        .due_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unspecified".into());

    format!(
        "Task details:\n\
         \n\
         ID: {}\n\
         Title: {}\n\
         Description: {}\n\
         Status: {}\n\
         Priority: {}\n\
         Due date: {}\n\
         \n\
         This is an automated notification. Please do not reply.",
        task.id,
        task.title,
        task.description.as_deref().unwrap_or("none"),
        task.status,
        task.priority.as_deref().unwrap_or("normal"),
        due,
    )
}

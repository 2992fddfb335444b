//! Message model shared by every retrieval path.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Sender used when a message carries no From header.
pub const MISSING_FROM: &str = "unknown@example.com";

/// Subject used when a message carries no Subject header.
pub const MISSING_SUBJECT: &str = "(No subject)";

/// Body text used when a message has no readable content.
pub const MISSING_BODY: &str = "(no readable content)";

/// A retrieved mail message.
///
/// All three producers — the IMAP session, the POP3 session, and the
/// placeholder generator — emit this exact shape, so consumers cannot
/// tell where a message came from. Immutable once constructed; the
/// caller owns it after retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailMessage {
    pub from: String,
    pub subject: String,
    pub date: DateTime<Utc>,
    pub body: String,
}

/// The fixed demonstration set returned when every live retrieval path
/// fails without confirming the mailbox empty.
pub fn placeholder_messages() -> Vec<MailMessage> {
    let now = Utc::now();
    vec![
        MailMessage {
            from: "support@example.com".into(),
            subject: "Welcome to the task board".into(),
            date: now,
            body: "This is a demonstration message. Once mail retrieval \
                   succeeds, your real inbox shows up here."
                .into(),
        },
        MailMessage {
            from: "notifications@example.com".into(),
            subject: "Important security notice".into(),
            date: now - Duration::days(1),
            body: "Demo: we noticed a sign-in to your mailbox from a new device.".into(),
        },
        MailMessage {
            from: "news@example.com".into(),
            subject: "Daily digest".into(),
            date: now - Duration::days(2),
            body: "Demo: the day's most important updates in a single message.".into(),
        },
    ]
}

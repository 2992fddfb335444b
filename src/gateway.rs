//! Fallback orchestration: IMAP first, POP3 next, placeholder set last.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::MailConfig;
use crate::error::SessionError;
use crate::imap::ImapSession;
use crate::message::{self, MailMessage};
use crate::pop3::Pop3Session;

/// Result of one protocol attempt that completed without error.
#[derive(Debug)]
pub enum FetchOutcome {
    /// At least one message was retrieved.
    Messages(Vec<MailMessage>),
    /// The protocol itself reported zero messages present — a terminal
    /// state, distinct from failing to determine the count.
    ConfirmedEmpty,
}

/// A retrieval path the orchestrator can try: one bounded-lifetime
/// session fetching the latest `count` messages.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Protocol name for logging.
    fn protocol(&self) -> &'static str;

    async fn fetch_latest(&self, count: usize) -> Result<FetchOutcome, SessionError>;
}

/// Multi-protocol retrieval gateway.
///
/// Stateless between calls: every `fetch_latest` builds fresh sessions
/// from the shared read-only configuration, so concurrent callers are
/// fully independent.
#[derive(Clone)]
pub struct MailGateway {
    config: Arc<MailConfig>,
}

impl MailGateway {
    pub fn new(config: Arc<MailConfig>) -> Self {
        Self { config }
    }

    /// Fetch the `count` most recent messages.
    ///
    /// Tries IMAP, then POP3, strictly in sequence. Total failure
    /// degrades to the fixed placeholder set; a mailbox confirmed empty
    /// yields an empty vec. Never returns an error, and never outlives
    /// the configured session budgets.
    pub async fn fetch_latest(&self, count: usize) -> Vec<MailMessage> {
        let count = count.max(1);
        let imap = ImapSession::new(&self.config);
        let pop3 = Pop3Session::new(&self.config);
        run_fallback(&[&imap, &pop3], count).await
    }
}

/// Try each source in order; the first non-empty batch wins and later
/// sources are never attempted. Session errors are absorbed here.
pub(crate) async fn run_fallback(
    sources: &[&dyn MessageSource],
    count: usize,
) -> Vec<MailMessage> {
    for source in sources {
        match source.fetch_latest(count).await {
            Ok(FetchOutcome::Messages(messages)) if !messages.is_empty() => {
                info!(
                    protocol = source.protocol(),
                    count = messages.len(),
                    "retrieved messages"
                );
                return messages;
            }
            Ok(FetchOutcome::Messages(_)) => {
                warn!(
                    protocol = source.protocol(),
                    "session returned an empty batch; trying next path"
                );
            }
            Ok(FetchOutcome::ConfirmedEmpty) => {
                debug!(protocol = source.protocol(), "mailbox confirmed empty");
                return Vec::new();
            }
            Err(e) => {
                warn!(
                    protocol = source.protocol(),
                    error = %e,
                    "retrieval attempt failed; trying next path"
                );
            }
        }
    }

    info!("all retrieval paths failed; returning placeholder messages");
    message::placeholder_messages()
        .into_iter()
        .take(count)
        .collect()
}

// ── Tests ───────────────────────────────────────────────────────────

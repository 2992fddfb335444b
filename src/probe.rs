//! Connection diagnostics: verify the retrieval endpoint and the
//! submission relay without fetching or sending content.

use serde::Serialize;
use tokio::time::timeout;
use tracing::debug;

use crate::config::MailConfig;
use crate::pop3;
use crate::smtp::Mailer;

/// Result of probing one endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Aggregated probe report.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    pub retrieval: ProbeOutcome,
    pub submission: ProbeOutcome,
}

/// Probe both endpoints. Always returns a full report: a failing probe is
/// folded into its outcome, never propagated.
pub async fn test_connections(config: &MailConfig) -> ConnectionReport {
    debug!("probing retrieval endpoint");
    let retrieval = probe_retrieval(config).await;
    debug!("probing submission relay");
    let submission = probe_submission(config).await;
    ConnectionReport {
        retrieval,
        submission,
    }
}

/// Connect + authenticate + disconnect over POP3.
async fn probe_retrieval(config: &MailConfig) -> ProbeOutcome {
    let attempt = pop3::verify_login(&config.pop3, &config.username, &config.password);
    match timeout(config.connect_timeout, attempt).await {
        Ok(Ok(())) => ProbeOutcome::ok(),
        Ok(Err(e)) => ProbeOutcome::failed(e.to_string()),
        Err(_) => ProbeOutcome::failed(format!(
            "connection timed out after {:?}",
            config.connect_timeout
        )),
    }
}

/// SMTP connection check through the submission client.
async fn probe_submission(config: &MailConfig) -> ProbeOutcome {
    let mailer = match Mailer::new(config) {
        Ok(mailer) => mailer,
        Err(e) => return ProbeOutcome::failed(e.to_string()),
    };
    match timeout(config.connect_timeout, mailer.verify()).await {
        Ok(Ok(true)) => ProbeOutcome::ok(),
        Ok(Ok(false)) => ProbeOutcome::failed("relay refused the connection check"),
        Ok(Err(e)) => ProbeOutcome::failed(e.to_string()),
        Err(_) => ProbeOutcome::failed(format!(
            "connection timed out after {:?}",
            config.connect_timeout
        )),
    }
}

//! Gateway configuration, built once from environment variables.

use std::time::Duration;

/// One protocol endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

/// Mailbox and relay configuration shared by all sessions.
///
/// Loaded at process start and read-only afterwards; callers share it via
/// `Arc` and every session takes the snapshot it needs at construction.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub imap: Endpoint,
    pub pop3: Endpoint,
    pub smtp: Endpoint,
    pub username: String,
    pub password: String,
    pub from_address: String,
    /// Budget for establishing a connection and authenticating.
    pub connect_timeout: Duration,
    /// Budget for a whole IMAP session, connect to teardown.
    pub imap_session_timeout: Duration,
    /// Budget for a whole POP3 session, connect to teardown.
    pub pop3_session_timeout: Duration,
}

impl MailConfig {
    /// Build config from environment variables.
    /// Returns `None` if `TASKMAIL_IMAP_HOST` is not set (gateway disabled).
    pub fn from_env() -> Option<Self> {
        let imap_host = std::env::var("TASKMAIL_IMAP_HOST").ok()?;

        let imap_port: u16 = std::env::var("TASKMAIL_IMAP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(993);

        let pop3_host = std::env::var("TASKMAIL_POP3_HOST")
            .unwrap_or_else(|_| imap_host.replace("imap", "pop"));

        let pop3_port: u16 = std::env::var("TASKMAIL_POP3_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(995);

        let smtp_host = std::env::var("TASKMAIL_SMTP_HOST")
            .unwrap_or_else(|_| imap_host.replace("imap", "smtp"));

        let smtp_port: u16 = std::env::var("TASKMAIL_SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(465);

        let use_tls = std::env::var("TASKMAIL_USE_TLS")
            .map(|s| !matches!(s.trim(), "0" | "false" | "no"))
            .unwrap_or(true);

        let username = std::env::var("TASKMAIL_USERNAME").unwrap_or_default();
        let password = std::env::var("TASKMAIL_PASSWORD").unwrap_or_default();
        let from_address =
            std::env::var("TASKMAIL_FROM_ADDRESS").unwrap_or_else(|_| username.clone());

        Some(Self {
            imap: Endpoint {
                host: imap_host,
                port: imap_port,
                use_tls,
            },
            pop3: Endpoint {
                host: pop3_host,
                port: pop3_port,
                use_tls,
            },
            smtp: Endpoint {
                host: smtp_host,
                port: smtp_port,
                use_tls,
            },
            username,
            password,
            from_address,
            connect_timeout: env_timeout("TASKMAIL_CONNECT_TIMEOUT_SECS", 10),
            imap_session_timeout: env_timeout("TASKMAIL_IMAP_TIMEOUT_SECS", 15),
            pop3_session_timeout: env_timeout("TASKMAIL_POP3_TIMEOUT_SECS", 30),
        })
    }
}

fn env_timeout(var: &str, default_secs: u64) -> Duration {
    let secs = std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_returns_none_when_no_host() {
        // SAFETY: no other test in this crate reads TASKMAIL_IMAP_HOST
        // concurrently.
        unsafe { std::env::remove_var("TASKMAIL_IMAP_HOST") };
        assert!(MailConfig::from_env().is_none());
    }

    #[test]
    fn env_timeout_falls_back_to_default() {
        assert_eq!(
            env_timeout("TASKMAIL_NO_SUCH_TIMEOUT", 10),
            Duration::from_secs(10)
        );
    }
}

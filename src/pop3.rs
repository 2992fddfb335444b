//! POP3 retrieval session: connect → USER/PASS → STAT → sequential RETR → QUIT.
//!
//! Retrieval walks message indices from newest-numbered down, strictly one
//! RETR at a time. A per-session deadline races every wire operation; when
//! it expires the session stops issuing commands, the connection drops, and
//! whatever was collected so far is returned.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use crate::config::{Endpoint, MailConfig};
use crate::error::SessionError;
use crate::extract::{extract_body, extract_header, parse_date};
use crate::gateway::{FetchOutcome, MessageSource};
use crate::message::{MISSING_FROM, MISSING_SUBJECT, MailMessage};
use crate::net::{self, MailStream};

/// One bounded-lifetime POP3 session; constructed per retrieval call.
pub struct Pop3Session {
    endpoint: Endpoint,
    username: String,
    password: String,
    connect_timeout: Duration,
    session_timeout: Duration,
}

impl Pop3Session {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            endpoint: config.pop3.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            connect_timeout: config.connect_timeout,
            session_timeout: config.pop3_session_timeout,
        }
    }
}

#[async_trait]
impl MessageSource for Pop3Session {
    fn protocol(&self) -> &'static str {
        "pop3"
    }

    async fn fetch_latest(&self, count: usize) -> Result<FetchOutcome, SessionError> {
        let deadline = Instant::now() + self.session_timeout;
        let auth_deadline = deadline.min(Instant::now() + self.connect_timeout);

        let mut client = timeout_at(auth_deadline, async {
            let mut client = Pop3Client::connect(&self.endpoint).await?;
            client.login(&self.username, &self.password).await?;
            Ok::<_, SessionError>(client)
        })
        .await
        .map_err(|_| SessionError::Timeout {
            elapsed: self.connect_timeout,
        })??;

        let total = timeout_at(deadline, client.stat())
            .await
            .map_err(|_| SessionError::Timeout {
                elapsed: self.session_timeout,
            })??;
        if total == 0 {
            debug!("mailbox confirmed empty");
            client.quit().await;
            return Ok(FetchOutcome::ConfirmedEmpty);
        }

        let want = u32::try_from(count).unwrap_or(u32::MAX);
        let first = total.saturating_sub(want).saturating_add(1).max(1);

        // Newest-numbered first, one message at a time. Each retrieval
        // completes or fails before the next is issued.
        let mut messages = Vec::new();
        let mut timed_out = false;
        for index in (first..=total).rev() {
            match timeout_at(deadline, client.retr(index)).await {
                Ok(Ok(raw)) => messages.push(parse_message(&raw)),
                Ok(Err(e)) => {
                    warn!(index, error = %e, "retrieval failed; skipping message");
                }
                Err(_) => {
                    warn!(index, collected = messages.len(), "session deadline hit; stopping retrieval");
                    timed_out = true;
                    break;
                }
            }
        }

        if !timed_out {
            let _ = timeout_at(deadline, client.quit()).await;
        }

        if messages.is_empty() {
            if timed_out {
                return Err(SessionError::Timeout {
                    elapsed: self.session_timeout,
                });
            }
            return Err(SessionError::Protocol(
                "no messages could be retrieved".into(),
            ));
        }
        Ok(FetchOutcome::Messages(messages))
    }
}

/// Connect, authenticate, and disconnect without retrieving content.
/// Used by the connection test probe.
pub(crate) async fn verify_login(
    endpoint: &Endpoint,
    username: &str,
    password: &str,
) -> Result<(), SessionError> {
    let mut client = Pop3Client::connect(endpoint).await?;
    client.login(username, password).await?;
    client.quit().await;
    Ok(())
}

/// Headers via the line-anchored extractor with defined defaults; body is
/// everything past the first blank line. Total — POP3 payloads never fail
/// to produce a message.
fn parse_message(raw: &str) -> MailMessage {
    let from = extract_header(raw, "From").unwrap_or_else(|| MISSING_FROM.into());
    let subject = extract_header(raw, "Subject").unwrap_or_else(|| MISSING_SUBJECT.into());
    let date = extract_header(raw, "Date")
        .and_then(|value| parse_date(&value))
        .unwrap_or_else(Utc::now);
    let body = extract_body(raw);

    MailMessage {
        from,
        subject,
        date,
        body,
    }
}

// ── Wire client ─────────────────────────────────────────────────────

struct Pop3Client {
    reader: BufReader<ReadHalf<MailStream>>,
    writer: WriteHalf<MailStream>,
}

impl Pop3Client {
    async fn connect(endpoint: &Endpoint) -> Result<Self, SessionError> {
        let stream = net::connect(endpoint)
            .await
            .map_err(|e| SessionError::Connect(e.to_string()))?;
        let (read, write) = tokio::io::split(stream);
        let mut client = Self {
            reader: BufReader::new(read),
            writer: write,
        };

        let greeting = client
            .read_line()
            .await
            .map_err(|e| SessionError::Connect(e.to_string()))?;
        if !greeting.starts_with("+OK") {
            return Err(SessionError::Connect(format!(
                "unexpected greeting: {greeting}"
            )));
        }
        debug!(greeting = %greeting, "POP3 connected");
        Ok(client)
    }

    async fn read_line(&mut self) -> std::io::Result<String> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed",
            ));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Send one command and read its status line. `+OK` yields the status
    /// text, `-ERR` becomes a protocol error carrying the server's text.
    async fn command(&mut self, line: &str) -> Result<String, SessionError> {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .map_err(|e| SessionError::Protocol(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| SessionError::Protocol(e.to_string()))?;

        let status = self
            .read_line()
            .await
            .map_err(|e| SessionError::Protocol(e.to_string()))?;
        if let Some(rest) = status.strip_prefix("+OK") {
            Ok(rest.trim().to_string())
        } else if let Some(rest) = status.strip_prefix("-ERR") {
            Err(SessionError::Protocol(rest.trim().to_string()))
        } else {
            Err(SessionError::Protocol(format!(
                "unparseable response: {status}"
            )))
        }
    }

    async fn login(&mut self, username: &str, password: &str) -> Result<(), SessionError> {
        self.command(&format!("USER {username}"))
            .await
            .map_err(auth_err)?;
        self.command(&format!("PASS {password}"))
            .await
            .map_err(auth_err)?;
        Ok(())
    }

    /// Mailbox message count from STAT.
    async fn stat(&mut self) -> Result<u32, SessionError> {
        let status = self.command("STAT").await?;
        status
            .split_whitespace()
            .next()
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| SessionError::Protocol(format!("bad STAT response: {status}")))
    }

    /// Retrieve one message: status line, then dot-terminated multiline
    /// payload with leading-dot unstuffing.
    async fn retr(&mut self, index: u32) -> Result<String, SessionError> {
        self.command(&format!("RETR {index}")).await?;

        let mut lines = Vec::new();
        loop {
            let line = self
                .read_line()
                .await
                .map_err(|e| SessionError::Protocol(e.to_string()))?;
            if line == "." {
                return Ok(lines.join("\r\n"));
            }
            let line = match line.strip_prefix('.') {
                Some(unstuffed) => unstuffed.to_string(),
                None => line,
            };
            lines.push(line);
        }
    }

    /// Best-effort QUIT; the socket closes on drop either way.
    async fn quit(&mut self) {
        let _ = self.command("QUIT").await;
    }
}

fn auth_err(e: SessionError) -> SessionError {
    match e {
        SessionError::Protocol(text) => SessionError::Auth(text),
        other => other,
    }
}

// ── Tests ───────────────────────────────────────────────────────────

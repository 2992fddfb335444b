//! IMAP retrieval session: connect → login → EXAMINE → range FETCH → logout.
//!
//! A minimal tagged-command IMAP client over the shared transport. The
//! mailbox is opened read-only and bodies are fetched with BODY.PEEK, so
//! the session never mutates remote state. One session value lives for
//! exactly one retrieval call; its connection closes on every exit path.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mail_parser::MessageParser;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tracing::{debug, warn};

use crate::config::{Endpoint, MailConfig};
use crate::error::SessionError;
use crate::extract::strip_html;
use crate::gateway::{FetchOutcome, MessageSource};
use crate::message::{MISSING_BODY, MISSING_FROM, MISSING_SUBJECT, MailMessage};
use crate::net::{self, MailStream};

/// One bounded-lifetime IMAP session; constructed per retrieval call.
pub struct ImapSession {
    endpoint: Endpoint,
    username: String,
    password: String,
    connect_timeout: Duration,
    session_timeout: Duration,
}

impl ImapSession {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            endpoint: config.imap.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            connect_timeout: config.connect_timeout,
            session_timeout: config.imap_session_timeout,
        }
    }

    async fn run(&self, count: usize) -> Result<FetchOutcome, SessionError> {
        let mut client = tokio::time::timeout(self.connect_timeout, async {
            let mut client = ImapClient::connect(&self.endpoint).await?;
            client.login(&self.username, &self.password).await?;
            Ok::<_, SessionError>(client)
        })
        .await
        .map_err(|_| SessionError::Timeout {
            elapsed: self.connect_timeout,
        })??;

        let total = client.examine("INBOX").await?;
        if total == 0 {
            debug!("mailbox confirmed empty");
            client.logout().await;
            return Ok(FetchOutcome::ConfirmedEmpty);
        }

        let want = u32::try_from(count).unwrap_or(u32::MAX);
        let first = total.saturating_sub(want).saturating_add(1).max(1);
        debug!(first, last = total, "fetching message range");

        let mut messages = Vec::new();
        match client.fetch_range(first, total, &mut messages).await {
            Ok(()) => client.logout().await,
            Err(e) if messages.is_empty() => return Err(e),
            Err(e) => {
                // Partial batches still count as success; the connection
                // is already unusable, so no logout.
                warn!(error = %e, fetched = messages.len(), "fetch stream failed part-way; keeping partial batch");
            }
        }

        if messages.is_empty() {
            return Err(SessionError::Protocol(
                "no messages survived parsing".into(),
            ));
        }
        Ok(FetchOutcome::Messages(messages))
    }
}

#[async_trait]
impl MessageSource for ImapSession {
    fn protocol(&self) -> &'static str {
        "imap"
    }

    async fn fetch_latest(&self, count: usize) -> Result<FetchOutcome, SessionError> {
        match tokio::time::timeout(self.session_timeout, self.run(count)).await {
            Ok(outcome) => outcome,
            // Dropping the session future drops its connection with it.
            Err(_) => Err(SessionError::Timeout {
                elapsed: self.session_timeout,
            }),
        }
    }
}

// ── Wire client ─────────────────────────────────────────────────────

struct ImapClient {
    reader: BufReader<ReadHalf<MailStream>>,
    writer: WriteHalf<MailStream>,
    tag_counter: u32,
}

impl ImapClient {
    async fn connect(endpoint: &Endpoint) -> Result<Self, SessionError> {
        let stream = net::connect(endpoint)
            .await
            .map_err(|e| SessionError::Connect(e.to_string()))?;
        let (read, write) = tokio::io::split(stream);
        let mut client = Self {
            reader: BufReader::new(read),
            writer: write,
            tag_counter: 0,
        };

        let greeting = client
            .read_line()
            .await
            .map_err(|e| SessionError::Connect(e.to_string()))?;
        if !greeting.to_uppercase().starts_with("* OK") {
            return Err(SessionError::Connect(format!(
                "unexpected greeting: {greeting}"
            )));
        }
        debug!(greeting = %greeting, "IMAP connected");
        Ok(client)
    }

    /// Read a single line, stripped of its CRLF terminator.
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

    /// Send a tagged command and return its tag.
    async fn send_command(&mut self, cmd: &str) -> Result<String, SessionError> {
        self.tag_counter += 1;
        let tag = format!("A{:04}", self.tag_counter);
        let line = format!("{tag} {cmd}\r\n");
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| SessionError::Protocol(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| SessionError::Protocol(e.to_string()))?;
        Ok(tag)
    }

    /// Read responses until the tagged completion line.
    async fn read_response(&mut self, tag: &str) -> Result<(Vec<String>, String), SessionError> {
        let mut untagged = Vec::new();
        loop {
            let line = self
                .read_line()
                .await
                .map_err(|e| SessionError::Protocol(e.to_string()))?;
            if line.starts_with(tag) {
                return Ok((untagged, line));
            }
            untagged.push(line);
        }
    }

    async fn login(&mut self, username: &str, password: &str) -> Result<(), SessionError> {
        let cmd = format!("LOGIN \"{}\" \"{}\"", quote(username), quote(password));
        let tag = self.send_command(&cmd).await?;
        let (_, status) = self.read_response(&tag).await?;
        if !response_ok(&status) {
            return Err(SessionError::Auth(status));
        }
        Ok(())
    }

    /// Open a mailbox read-only; the total message count comes from the
    /// untagged `* n EXISTS` line.
    async fn examine(&mut self, mailbox: &str) -> Result<u32, SessionError> {
        let cmd = format!("EXAMINE \"{}\"", quote(mailbox));
        let tag = self.send_command(&cmd).await?;
        let (untagged, status) = self.read_response(&tag).await?;
        if !response_ok(&status) {
            return Err(SessionError::Protocol(format!("EXAMINE failed: {status}")));
        }

        for line in &untagged {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 3
                && parts[0] == "*"
                && parts[2].eq_ignore_ascii_case("EXISTS")
                && let Ok(n) = parts[1].parse()
            {
                return Ok(n);
            }
        }
        Err(SessionError::Protocol(
            "EXAMINE response missing EXISTS".into(),
        ))
    }

    /// FETCH full bodies for the inclusive range, parsing each message as
    /// its literal arrives. A message that fails to parse is skipped; a
    /// transport failure aborts, leaving `out` holding what was parsed.
    async fn fetch_range(
        &mut self,
        first: u32,
        last: u32,
        out: &mut Vec<MailMessage>,
    ) -> Result<(), SessionError> {
        let tag = self
            .send_command(&format!("FETCH {first}:{last} (BODY.PEEK[])"))
            .await?;

        loop {
            let line = self
                .read_line()
                .await
                .map_err(|e| SessionError::Protocol(e.to_string()))?;

            if line.starts_with(&tag) {
                if !response_ok(&line) {
                    return Err(SessionError::Protocol(format!("FETCH failed: {line}")));
                }
                return Ok(());
            }

            // Untagged data line: * n FETCH (BODY[] {size}
            if !(line.starts_with("* ") && line.to_uppercase().contains("FETCH")) {
                continue;
            }
            let Some(size) = literal_size(&line) else {
                continue;
            };

            let mut raw = vec![0u8; size];
            self.reader
                .read_exact(&mut raw)
                .await
                .map_err(|e| SessionError::Protocol(e.to_string()))?;
            // Closing line after the literal, usually just ")".
            self.read_line()
                .await
                .map_err(|e| SessionError::Protocol(e.to_string()))?;

            match parse_message(&raw) {
                Some(message) => out.push(message),
                None => warn!("skipping unparseable message in fetch batch"),
            }
        }
    }

    /// Best-effort LOGOUT; the socket closes on drop either way.
    async fn logout(&mut self) {
        if let Ok(tag) = self.send_command("LOGOUT").await {
            let _ = self.read_response(&tag).await;
        }
    }
}

// ── Response parsing helpers ────────────────────────────────────────

fn quote(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Whether a tagged status line reports OK.
fn response_ok(status_line: &str) -> bool {
    status_line
        .split_whitespace()
        .nth(1)
        .is_some_and(|word| word.eq_ignore_ascii_case("OK"))
}

/// Size of the `{n}` literal announced at the end of a FETCH data line.
fn literal_size(line: &str) -> Option<usize> {
    let start = line.rfind('{')?;
    let end = line.rfind('}')?;
    if end <= start {
        return None;
    }
    line[start + 1..end].parse().ok()
}

/// Parse one raw RFC 822 message into the shared message shape.
fn parse_message(raw: &[u8]) -> Option<MailMessage> {
    let parsed = MessageParser::default().parse(raw)?;

    let from = from_display(&parsed);
    let subject = parsed.subject().unwrap_or(MISSING_SUBJECT).to_string();
    let date = parsed
        .date()
        .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0))
        .unwrap_or_else(Utc::now);
    let body = readable_body(&parsed);

    Some(MailMessage {
        from,
        subject,
        date,
        body,
    })
}

/// From header display text: `Name <addr>`, bare address, or the default.
fn from_display(parsed: &mail_parser::Message) -> String {
    let Some(addr) = parsed.from().and_then(|a| a.first()) else {
        return MISSING_FROM.into();
    };
    match (addr.name.as_deref(), addr.address.as_deref()) {
        (Some(name), Some(email)) => format!("{name} <{email}>"),
        (None, Some(email)) => email.to_string(),
        (Some(name), None) => name.to_string(),
        (None, None) => MISSING_FROM.into(),
    }
}

/// Plain text preferred, stripped HTML next, placeholder last.
fn readable_body(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.trim().to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    MISSING_BODY.to_string()
}

// ── Tests ───────────────────────────────────────────────────────────

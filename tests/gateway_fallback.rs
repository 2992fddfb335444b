//! End-to-end fallback behavior against scripted in-process servers.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use taskmail::config::{Endpoint, MailConfig};
use taskmail::gateway::MailGateway;

fn endpoint(port: u16) -> Endpoint {
    Endpoint {
        host: "127.0.0.1".into(),
        port,
        use_tls: false,
    }
}

fn config(imap_port: u16, pop3_port: u16) -> MailConfig {
    MailConfig {
        imap: endpoint(imap_port),
        pop3: endpoint(pop3_port),
        smtp: endpoint(1),
        username: "user".into(),
        password: "secret".into(),
        from_address: "user@example.com".into(),
        connect_timeout: Duration::from_millis(200),
        imap_session_timeout: Duration::from_millis(400),
        pop3_session_timeout: Duration::from_millis(400),
    }
}

/// Port with nothing listening on it.
fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// POP3 server with two well-formed messages.
async fn spawn_pop3_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read);
        write.write_all(b"+OK ready\r\n").await.unwrap();
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                return;
            }
            let mut parts = line.trim_end().split_whitespace();
            let cmd = parts.next().unwrap_or("").to_uppercase();
            match cmd.as_str() {
                "USER" | "PASS" => write.write_all(b"+OK\r\n").await.unwrap(),
                "STAT" => write.write_all(b"+OK 2 240\r\n").await.unwrap(),
                "RETR" => {
                    let index: u32 = parts.next().unwrap_or("0").parse().unwrap();
                    let payload = format!(
                        "From: sender{index}@example.com\r\nSubject: pop3 message {index}\r\n\
                         Date: Tue, 1 Jul 2025 10:52:37 +0200\r\n\r\nbody {index}"
                    );
                    write
                        .write_all(
                            format!("+OK {} octets\r\n{payload}\r\n.\r\n", payload.len())
                                .as_bytes(),
                        )
                        .await
                        .unwrap();
                }
                "QUIT" => {
                    write.write_all(b"+OK bye\r\n").await.unwrap();
                    return;
                }
                _ => write.write_all(b"-ERR\r\n").await.unwrap(),
            }
        }
    });
    port
}

/// Server that accepts connections and never says a word.
async fn spawn_silent_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                // Hold the connection open without responding.
                let _stream = stream;
                tokio::time::sleep(Duration::from_secs(60)).await;
            });
        }
    });
    port
}

#[tokio::test]
async fn imap_failure_falls_back_to_pop3() {
    let pop3_port = spawn_pop3_server().await;
    let gateway = MailGateway::new(Arc::new(config(unused_port(), pop3_port)));

    let messages = gateway.fetch_latest(2).await;

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].subject, "pop3 message 2");
    assert_eq!(messages[1].subject, "pop3 message 1");
}

#[tokio::test]
async fn total_failure_degrades_to_placeholder_within_budget() {
    let imap_port = spawn_silent_server().await;
    let pop3_port = spawn_silent_server().await;
    let gateway = MailGateway::new(Arc::new(config(imap_port, pop3_port)));

    let started = tokio::time::Instant::now();
    let messages = gateway.fetch_latest(5).await;
    let elapsed = started.elapsed();

    // Both sessions hit their budgets (400ms each); the whole call must
    // stay within a small constant factor of their sum.
    assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].from, "support@example.com");
}

#[tokio::test]
async fn result_length_never_exceeds_count() {
    let imap_port = unused_port();
    let pop3_port = unused_port();
    let gateway = MailGateway::new(Arc::new(config(imap_port, pop3_port)));

    for count in 1..=4 {
        let messages = gateway.fetch_latest(count).await;
        assert!(messages.len() <= count, "count {count} gave {}", messages.len());
        assert!(!messages.is_empty(), "placeholder guarantees non-empty");
    }
}

#[tokio::test]
async fn concurrent_callers_get_independent_sessions() {
    let pop3_a = spawn_pop3_server().await;
    let pop3_b = spawn_pop3_server().await;
    let gateway_a = MailGateway::new(Arc::new(config(unused_port(), pop3_a)));
    let gateway_b = MailGateway::new(Arc::new(config(unused_port(), pop3_b)));

    let (a, b) = tokio::join!(gateway_a.fetch_latest(2), gateway_b.fetch_latest(1));

    assert_eq!(a.len(), 2);
    assert_eq!(b.len(), 1);
    assert_eq!(b[0].subject, "pop3 message 2");
}

use std::sync::Arc;

use taskmail::config::MailConfig;
use taskmail::gateway::MailGateway;
use taskmail::probe;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let Some(config) = MailConfig::from_env() else {
        eprintln!("Error: TASKMAIL_IMAP_HOST not set");
        eprintln!("  export TASKMAIL_IMAP_HOST=imap.example.com");
        eprintln!("  export TASKMAIL_USERNAME=you@example.com");
        eprintln!("  export TASKMAIL_PASSWORD=...");
        std::process::exit(1);
    };
    let config = Arc::new(config);

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("fetch") | None => {
            let count: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(5);
            let gateway = MailGateway::new(Arc::clone(&config));
            let messages = gateway.fetch_latest(count).await;

            if messages.is_empty() {
                println!("Mailbox is empty.");
            }
            for (i, message) in messages.iter().enumerate() {
                println!("── {} ──", i + 1);
                println!("From:    {}", message.from);
                println!("Subject: {}", message.subject);
                println!("Date:    {}", message.date.to_rfc2822());
                println!("{}\n", message.body);
            }
        }
        Some("test") => {
            let report = probe::test_connections(&config).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !(report.retrieval.success && report.submission.success) {
                std::process::exit(1);
            }
        }
        Some(other) => {
            eprintln!("Unknown command: {other}");
            eprintln!("Usage: taskmail [fetch [count] | test]");
            std::process::exit(2);
        }
    }

    Ok(())
}

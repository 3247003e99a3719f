use std::sync::Arc;
use std::sync::atomic::Ordering;

use inbox_sorter::classify::examples::labels;
use inbox_sorter::classify::load_examples;
use inbox_sorter::config::AppConfig;
use inbox_sorter::pipeline::{MailOrganizer, next_fire, spawn_organizer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let once = std::env::args().skip(1).any(|arg| arg == "--once");

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export EMAIL_HOST=imap.example.com EMAIL_ADDRESS=... EMAIL_PASSWORD=...");
        eprintln!("  export COHERE_API_KEY=...");
        std::process::exit(1);
    });

    let examples = load_examples(&config.classifier.examples_path)?;

    eprintln!("📬 Inbox Sorter v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   IMAP: {}@{}:{}{}",
        config.imap.username,
        config.imap.host,
        config.imap.port,
        if config.imap.tls { " (TLS)" } else { "" }
    );
    eprintln!("   Mailbox: {} (search: {})", config.organizer.mailbox, config.organizer.search);
    eprintln!("   Classifier: {}", config.classifier.endpoint);
    eprintln!(
        "   Examples: {} across {} folders ({})",
        examples.len(),
        labels(&examples).len(),
        config.classifier.examples_path.display()
    );

    let organizer = Arc::new(MailOrganizer::from_config(&config, examples)?);

    if once {
        eprintln!("   Mode: single run\n");
        let summary = organizer.organize(&config.organizer.mailbox).await?;
        eprintln!(
            "Moved {} of {} messages ({} unclassified, {} failed moves)",
            summary.moved,
            summary.fetched,
            summary.unclassified,
            summary.failed_moves.len()
        );
        return Ok(());
    }

    let next = next_fire(&config.organizer.schedule)?;
    eprintln!("   Schedule: {}", config.organizer.schedule);
    if let Some(next) = next {
        eprintln!("   Next run: {}", next.to_rfc3339());
    }
    eprintln!("   Press Ctrl-C to stop.\n");

    let (handle, shutdown) = spawn_organizer(organizer, config.organizer.clone());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    shutdown.store(true, Ordering::Relaxed);
    handle.await?;

    Ok(())
}

use anyhow::Context;
use bank_mail_assist::config::AssistConfig;
use bank_mail_assist::pipeline::{QueryPipeline, run_poll_loop};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AssistConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!(
            "  export BANK_ASSIST_EMAIL_ADDRESS=... BANK_ASSIST_EMAIL_PASSWORD=... GROQ_API_KEY=..."
        );
        std::process::exit(1);
    });

    eprintln!("🏦 Bank Mail Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Monitoring: {}", config.email.address);
    eprintln!("   Check interval: {} seconds", config.poll_interval.as_secs());
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Press Ctrl+C to stop\n");

    let pipeline = QueryPipeline::from_config(&config).context("building query pipeline")?;

    // Register the handler up front; it is only acted on between cycles.
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop_tx.send(());
        }
    });
    let shutdown = async move {
        if stop_rx.await.is_err() {
            // Signal handler could not be installed; run until killed.
            std::future::pending::<()>().await;
        }
    };

    run_poll_loop(&pipeline, config.poll_interval, shutdown).await;
    Ok(())
}

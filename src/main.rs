use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use signal_relay::config::RelayConfig;
use signal_relay::relay::Relay;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real environment variables still apply.
    dotenvy::dotenv().ok();

    let config = RelayConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("  Copy .env.example to .env and fill in the required values.");
        std::process::exit(1);
    });

    // Initialize tracing (stderr, plus a daily file when RELAY_LOG_DIR is set)
    let file_writer = config.log_dir.as_ref().map(|dir| {
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "signal-relay.log"))
    });
    let (file_layer, _log_guard) = match file_writer {
        Some((writer, guard)) => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer),
            ),
            Some(guard),
        ),
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    eprintln!("📡 Signal Relay v{}", env!("CARGO_PKG_VERSION"));
    for line in config.summary() {
        eprintln!("   {}", line);
    }
    if let Some(dir) = &config.log_dir {
        eprintln!("   Logs: {}", dir);
    }

    let relay = Relay::from_config(&config)?;

    // Install the Ctrl+C handler before startup so an interrupt while the
    // source connects still produces a stop notice.
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = stop_tx.send(());
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl+C: {}", e),
        }
    });
    tokio::task::yield_now().await;

    let shutdown = async {
        if stop_rx.await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    relay.run(shutdown).await?;

    Ok(())
}

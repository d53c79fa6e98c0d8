use anyhow::Result;
use devicekit::config::AppConfig;
use devicekit::services::Services;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

fn load_config() -> Result<AppConfig> {
    let explicit = std::env::var_os("CONFIG_FILE").is_some();
    if !explicit && !std::path::Path::new("config.toml").exists() {
        tracing::info!("No config.toml found; using defaults");
        return Ok(AppConfig::default());
    }
    AppConfig::load()
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(s) => s,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = load_config()?;
    let services = Services::from_config(&app_config)?;
    tracing::info!(
        "{} {} sampling every {} ms",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        app_config.sampler.interval_ms
    );

    let log_handle = services.sampler.subscribe(|snapshot| {
        match serde_json::to_string(&snapshot) {
            Ok(json) => tracing::debug!(snapshot = %json, "snapshot"),
            Err(e) => tracing::warn!(error = %e, "snapshot serialization failed"),
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let sampler_handle = services.sampler.clone().spawn(shutdown_rx);

    shutdown_signal().await;
    tracing::info!("Received shutdown signal");
    services.sampler.unsubscribe(log_handle);
    let _ = shutdown_tx.send(());
    let _ = sampler_handle.await;

    Ok(())
}

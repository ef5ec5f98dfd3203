mod config;
mod protocol;
mod queue;
mod server;
mod telemetry;

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use tokio::net::{TcpListener, UnixListener};
use tracing::info;

use config::Config;
use queue::QueueManager;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    telemetry::init_with(config.log_format);
    queue::init_coarse_time();

    let queue_manager = QueueManager::with_settings(config.queue.clone());
    info!(
        visibility_timeout_ms = config.queue.visibility_timeout_ms,
        max_deliveries = config.queue.max_deliveries,
        max_queue_len = config.queue.max_queue_len,
        "Queue engine ready"
    );

    tokio::spawn(Arc::clone(&queue_manager).background_tasks());

    tokio::select! {
        result = serve(&config, &queue_manager) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    queue_manager.shutdown();
    if let Some(path) = &config.unix_socket {
        let _ = std::fs::remove_file(path);
    }
    let stats = queue_manager.stats();
    info!(
        pending = stats.pending,
        in_flight = stats.in_flight,
        "Server stopped"
    );
    Ok(())
}

async fn serve(
    config: &Config,
    queue_manager: &Arc<QueueManager>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = &config.unix_socket {
        let _ = std::fs::remove_file(path);
        let listener = UnixListener::bind(path)?;
        info!(path = %path, "rqueue listening on unix socket");
        server::serve_unix(listener, Arc::clone(queue_manager)).await;
    } else {
        let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
        info!(port = config.port, "rqueue listening on tcp");
        server::serve_tcp(listener, Arc::clone(queue_manager)).await;
    }
    Ok(())
}

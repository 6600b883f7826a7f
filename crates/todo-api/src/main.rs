//! todo-api バイナリのエントリポイント

use anyhow::Context;
use infrastructure::connect_with_retry;
use shared::{init_tracing, Config, RetryExecutor};
use todo_api::{serve, AppState};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    // 設定が読めなかった場合も本番と同じ JSON 形式でエラーを出す
    let json_logs = !matches!(&config, Ok(c) if c.environment.is_development());
    init_tracing(json_logs).map_err(|e| anyhow::anyhow!(e))?;

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e).context("failed to load configuration");
        }
    };

    let executor =
        RetryExecutor::exponential_backoff(config.connect_max_attempts, config.connect_initial_delay);
    let store = connect_with_retry(&config.store_uri, &executor)
        .await
        .context("failed to connect to store")?;

    let state = AppState::new(store.clone()).with_error_details(config.environment.is_development());

    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, backend = store.backend(), "Server running");
    info!("Health check: http://{addr}/health");

    serve(listener, state, shutdown_signal())
        .await
        .context("server error")?;

    store.close().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

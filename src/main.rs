use leadforge_pipeline::config::AppConfig;
use leadforge_pipeline::lifecycle;

#[tokio::main]
async fn main() {
    lifecycle::init_logging();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let services = match lifecycle::build_services(&config).await {
        Ok(services) => services,
        Err(e) => {
            tracing::error!(error = %e, "failed to start services");
            std::process::exit(1);
        }
    };

    let listen_addr = config.listen_addr.clone();
    let app = leadforge_pipeline::api::router(services.app_state.clone());

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %listen_addr, "failed to bind listen address");
            std::process::exit(1);
        }
    };

    tracing::info!(addr = %listen_addr, "leadforge-pipeline listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        tracing::error!(error = %e, "server exited with an error");
    }

    services.shutdown().await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining workers");
}

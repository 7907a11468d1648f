use clap::Parser;
use tokio::fs;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use upshare::{router, Args, Config};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let absolute_root_dir = match fs::canonicalize(&args.root_dir).await {
        Ok(path) => path,
        Err(e) => {
            error!(
                "Failed to resolve root directory '{}': {}. Exiting.",
                args.root_dir.display(),
                e
            );
            std::process::exit(1);
        }
    };

    if !absolute_root_dir.is_dir() {
        error!(
            "Root path '{}' is not a directory. Exiting.",
            absolute_root_dir.display()
        );
        std::process::exit(1);
    }

    let config =
        Config::new(absolute_root_dir).with_strict_upload_status(args.strict_upload_status);
    let bind_addr = args.bind_addr();

    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to address {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };

    info!("upshare/{}", env!("CARGO_PKG_VERSION"));
    info!("Serving files from: {}", config.root().display());
    info!(
        "Serving http on {} port {} (http://{}/)",
        bind_addr.ip(),
        bind_addr.port(),
        bind_addr
    );

    if let Err(e) = axum::serve(listener, router(config))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
    info!("Server stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
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
    info!("Shutdown signal received");
}

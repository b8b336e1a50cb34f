use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bitbucket_source::hooks::{ProcessorRegistry, ReindexApi};
use bitbucket_source::server::{build_router, AppState};

/// Stand-in re-index API that logs each trigger. A deployment embeds this
/// service in a host that supplies the real implementation.
struct LoggingReindex;

impl ReindexApi for LoggingReindex {
    fn trigger_reindex(&self, owner: &str, repo: &str, origin: &str) {
        tracing::info!(owner, repo, origin, "re-index requested");
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bitbucket_source=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000u16);

    let app_state = AppState::new(ProcessorRegistry::standard(Arc::new(LoggingReindex)));
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "cannot bind {addr}");
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server exited");
        std::process::exit(1);
    }
}

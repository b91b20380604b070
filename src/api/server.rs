//! HTTP server setup: router, CORS, and graceful shutdown.

use super::{ApiState, bots};
use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use std::net::SocketAddr;

/// Build the versioned admin router.
pub fn router(state: ApiState, cors: CorsLayer) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/bots", get(bots::list_bots).put(bots::create_bot))
        .route(
            "/bots/{id}",
            get(bots::get_bot)
                .put(bots::update_bot)
                .delete(bots::delete_bot),
        )
        .route("/bots/{id}/threads", get(bots::list_threads))
        .route("/bots/{id}/answers", get(bots::export_answers))
        .route("/bots/{id}/start", post(bots::start_bot))
        .route("/bots/{id}/stop", post(bots::stop_bot))
        .route("/bots/{id}/enable", post(bots::enable_bot))
        .route("/bots/{id}/disable", post(bots::disable_bot))
        .route("/bots/{id}/status", get(bots::bot_status))
        .route("/bots/{id}/mailing", post(bots::mailing));

    Router::new()
        .nest("/v1", api)
        .layer(cors)
        .with_state(state)
}

/// CORS layer from the configured allow-list; an empty list allows any
/// origin.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the HTTP server; resolves to a handle that finishes after
/// graceful shutdown.
pub async fn serve(
    bind: SocketAddr,
    state: ApiState,
    cors: CorsLayer,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let app = router(state, cors);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "HTTP server listening");

    let handle = tokio::spawn(async move {
        let mut shutdown = shutdown_rx;
        if let Err(error) = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stopping| *stopping).await;
            })
            .await
        {
            tracing::error!(%error, "HTTP server exited with error");
        }
    });

    Ok(handle)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse { status: "ok" })
}

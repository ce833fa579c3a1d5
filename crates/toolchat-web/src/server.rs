//! Axum server setup and router construction.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use toolchat::chatbot::ToolChatbot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{error, info};

use crate::api::{self, AppState};

/// Build the full axum router.
///
/// The router serves:
/// - `POST /chat` and `GET /api/status`
/// - `GET /` from `templates_dir/index.html`, when configured
/// - `/static/*` from `static_dir`, when configured
pub fn build_router(
    chatbot: Arc<ToolChatbot>,
    templates_dir: Option<PathBuf>,
    static_dir: Option<PathBuf>,
) -> Router {
    let app_state = AppState { chatbot };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/chat", post(api::post_chat))
        .route("/api/status", get(api::get_status))
        .with_state(app_state);

    if let Some(dir) = templates_dir {
        router = router.route_service("/", ServeFile::new(dir.join("index.html")));
    }
    if let Some(dir) = static_dir {
        router = router.nest_service("/static", ServeDir::new(dir));
    }

    router.layer(cors)
}

/// Bind `bind_addr`, serve `router` on a background task and return the
/// bound address.
pub async fn start_server(router: Router, bind_addr: SocketAddr) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;
    info!("Listening on http://{addr}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("Server stopped: {e}");
        }
    });

    Ok(addr)
}

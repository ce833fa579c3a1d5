//! HTTP front end for the `toolchat` catalog chatbot.
//!
//! `toolchat-web` wraps a shared [`ToolChatbot`] in an axum server. The chat
//! endpoint takes a form-encoded `message` and always answers with JSON,
//! either `{"response": ...}` or `{"error": ...}` with a status code that
//! reflects the failure class.
//!
//! # Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use toolchat::prelude::*;
//! use toolchat_web::{WebConfig, spawn_web};
//!
//! let config = ChatConfig::default();
//! let client = GeminiClient::new(api_key, config.generation_config())?;
//! let bot = ToolChatbot::new(DatasetStore::open(&config.dataset_path), Arc::new(client), &config);
//!
//! let addr = spawn_web(Arc::new(bot), WebConfig::default()).await?;
//! println!("Chat UI: http://{addr}");
//! ```
//!
//! # Routes
//!
//! | Route | Description |
//! |-------|-------------|
//! | `POST /chat` | Answer the form field `message` |
//! | `GET /api/status` | Catalog size, model and rate window as JSON |
//! | `GET /` | `index.html` from the templates directory |
//! | `/static/*` | Files from the static directory |

mod api;
mod server;

pub use api::{AppState, ChatForm, ChatResponse, ErrorResponse};
pub use server::{build_router, start_server};

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use toolchat::chatbot::ToolChatbot;

/// Configuration for the web server.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Address to bind to. Default: `127.0.0.1:5000`.
    pub bind_addr: SocketAddr,
    /// Directory holding `index.html`. Default: `templates`.
    ///
    /// If `None`, `GET /` answers 404.
    pub templates_dir: Option<PathBuf>,
    /// Directory served under `/static`. Default: `static`.
    pub static_dir: Option<PathBuf>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            templates_dir: Some(PathBuf::from("templates")),
            static_dir: Some(PathBuf::from("static")),
        }
    }
}

/// Spawn the web server on a Tokio task and return the bound address.
///
/// The server runs until the Tokio runtime shuts down. Fails only if the
/// listener cannot be bound.
pub async fn spawn_web(
    chatbot: Arc<ToolChatbot>,
    config: WebConfig,
) -> std::io::Result<SocketAddr> {
    let router = build_router(chatbot, config.templates_dir, config.static_dir);
    start_server(router, config.bind_addr).await
}

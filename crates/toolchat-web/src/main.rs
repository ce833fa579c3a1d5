//! Serve the tool catalog chatbot over HTTP.
//!
//! # Usage
//!
//! ```bash
//! GEMINI_API_KEY=... cargo run -p toolchat-web
//! GEMINI_API_KEY=... cargo run -p toolchat-web -- --port 8080 --dataset plant2.json
//! GEMINI_API_KEY=... cargo run -p toolchat-web -- --throttle fail-fast --max-requests 10
//! ```
//!
//! Then open the printed URL in a browser, or post a form directly:
//!
//! ```bash
//! curl -d "message=What is the status of tool T-100?" http://127.0.0.1:5000/chat
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use toolchat::API_KEY_ENV;
use toolchat::prelude::*;
use toolchat_web::{WebConfig, spawn_web};

/// Tool catalog chatbot with a browser-based UI.
#[derive(Parser)]
#[command(about = "Tool catalog chatbot with a browser-based UI")]
struct Args {
    #[command(flatten)]
    chat: ChatArgs,

    /// Interface to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: std::net::IpAddr,

    /// Port for the web server.
    #[arg(long, default_value_t = 5000)]
    port: u16,

    /// Directory containing index.html.
    #[arg(long, default_value = "templates")]
    templates_dir: PathBuf,

    /// Directory served under /static.
    #[arg(long, default_value = "static")]
    static_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    toolchat::logging::init("info");
    let args = Args::parse();
    let config: ChatConfig = args.chat.into();

    // 1. Create the Gemini client.
    let api_key = std::env::var(API_KEY_ENV)
        .map_err(|_| format!("Set {API_KEY_ENV} env var to your Gemini API key"))?;
    let client = GeminiClient::new(api_key, config.generation_config())?;

    // 2. Load the catalog and assemble the pipeline.
    let store = DatasetStore::open(&config.dataset_path);
    let chatbot = Arc::new(ToolChatbot::new(store, Arc::new(client), &config));

    // 3. Serve until Ctrl-C.
    let web_config = WebConfig {
        bind_addr: (args.host, args.port).into(),
        templates_dir: Some(args.templates_dir),
        static_dir: Some(args.static_dir),
    };
    let addr = spawn_web(chatbot, web_config)
        .await
        .map_err(|e| format!("failed to bind {}:{}: {e}", args.host, args.port))?;
    println!("Chat UI: http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to listen for Ctrl-C: {e}"))?;
    Ok(())
}

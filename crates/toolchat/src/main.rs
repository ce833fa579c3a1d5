//! Ask the tool catalog chatbot a question from the command line.
//!
//! Reads the API key from the `GEMINI_API_KEY` environment variable.
//!
//! # Examples
//!
//! ```sh
//! # One question against the default catalog
//! toolchat ask "What is the status of tool T-100?"
//!
//! # Pipe the question from stdin, using a different catalog
//! echo "Who created T-100?" | toolchat --dataset plant2.json ask --stdin
//!
//! # Print the context block the model would be grounded with
//! toolchat --context-limit 5 context
//!
//! # Replace the catalog with a new document
//! toolchat import exported_tools.json
//!
//! # Verify the key and the configured model
//! toolchat check
//! ```

use std::io::{self, Read};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use toolchat::API_KEY_ENV;
use toolchat::context::build_context;
use toolchat::prelude::*;

/// Grounded question answering over a JSON tool catalog.
#[derive(Parser)]
#[command(name = "toolchat")]
struct Cli {
    #[command(flatten)]
    chat: ChatArgs,

    /// Log filter when RUST_LOG is unset
    #[arg(long, default_value = "info", global = true)]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer one question against the catalog
    Ask {
        /// The question; words are joined with spaces
        question: Vec<String>,

        /// Read the question from stdin
        #[arg(long)]
        stdin: bool,
    },
    /// Print the rendered context block
    Context,
    /// Validate a JSON document and adopt it as the catalog
    Import {
        /// Document of the form {"tools": [...]}
        file: String,
    },
    /// Look up the configured model with the current API key
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    toolchat::logging::init(&cli.log);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let config: ChatConfig = cli.chat.into();

    match cli.command {
        Command::Ask { question, stdin } => {
            let question = build_question(question, stdin)?;
            let client = gemini_client(&config)?;
            let bot = ToolChatbot::new(
                DatasetStore::open(&config.dataset_path),
                Arc::new(client),
                &config,
            );
            let answer = bot.answer(&question).await.map_err(|e| e.to_string())?;
            println!("{answer}");
        }
        Command::Context => {
            let store = DatasetStore::open(&config.dataset_path);
            println!("{}", build_context(&store.snapshot(), config.context_limit));
        }
        Command::Import { file } => {
            let content = std::fs::read_to_string(&file)
                .map_err(|e| format!("failed to read '{file}': {e}"))?;
            let value: serde_json::Value = serde_json::from_str(&content)
                .map_err(|e| format!("failed to parse '{file}': {e}"))?;
            let store = DatasetStore::open(&config.dataset_path);
            let dataset = store.try_replace(value).map_err(|e| e.to_string())?;
            println!(
                "Imported {} tools into {}",
                dataset.len(),
                store.path().display()
            );
        }
        Command::Check => {
            let client = gemini_client(&config)?;
            let info = client.check_model().await.map_err(|e| e.to_string())?;
            println!(
                "{} ({})",
                info.name,
                info.display_name.as_deref().unwrap_or("no display name")
            );
            if let (Some(input), Some(output)) = (info.input_token_limit, info.output_token_limit)
            {
                println!("  token limits: {input} in / {output} out");
            }
        }
    }
    Ok(())
}

// ── Helpers ────────────────────────────────────────────────────────

fn gemini_client(config: &ChatConfig) -> Result<GeminiClient, String> {
    let api_key =
        std::env::var(API_KEY_ENV).map_err(|_| format!("{API_KEY_ENV} is not set"))?;
    GeminiClient::new(api_key, config.generation_config())
}

fn build_question(words: Vec<String>, stdin: bool) -> Result<String, String> {
    let mut question = words.join(" ");
    if stdin {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("failed to read stdin: {e}"))?;
        if !question.is_empty() {
            question.push_str("\n\n");
        }
        question.push_str(&buf);
    }
    if question.trim().is_empty() {
        return Err("provide a question or --stdin".to_string());
    }
    Ok(question)
}

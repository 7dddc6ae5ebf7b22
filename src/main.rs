//! ragpipe - interactive console entry point
//!
//! Thin REPL over the library: loads config, wires the collaborators,
//! refuses to start on an empty collection and then answers questions
//! until quit.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use ragpipe::clients::GeminiClient;
use ragpipe::config::Config;
use ragpipe::persona::Persona;
use ragpipe::rag::{CrossEncoderScorer, RagPipeline};
use ragpipe::store::{QdrantStore, VectorStore};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ragpipe", version, about = "Grounded Q&A over an indexed document collection")]
struct Args {
    /// Qdrant collection to query (overrides config)
    #[arg(long)]
    collection: Option<String>,

    /// Disable cross-encoder reranking even if the model loads
    #[arg(long)]
    no_rerank: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let mut config = Config::load()?;
    if let Some(collection) = args.collection {
        config.store.collection = collection;
    }

    let api_key = config.api_key()?;

    let gemini = Arc::new(GeminiClient::with_base_url(
        config.gemini.base_url.clone(),
        api_key,
        config.gemini.generation_model.clone(),
        config.gemini.embedding_model.clone(),
        Duration::from_secs(config.gemini.request_timeout_secs),
    )?);

    let store = Arc::new(QdrantStore::new(
        &config.store.url,
        &config.store.collection,
    )?);

    let count = store
        .count()
        .await
        .context("Failed to reach the vector store")?;
    if count == 0 {
        eprintln!(
            "{}",
            format!(
                "Collection '{}' is empty. Run the ingestion process first.",
                config.store.collection
            )
            .red()
        );
        std::process::exit(1);
    }
    println!(
        "{}",
        format!("Collection loaded: {} records", count).green()
    );

    let scorer = if args.no_rerank {
        None
    } else {
        CrossEncoderScorer::load_default()
    };
    if scorer.is_none() {
        println!("{}", "Reranking disabled, using vector similarity order".yellow());
    }

    let persona = match &config.pipeline.persona_path {
        Some(path) => Persona::from_file(path)?,
        None => Persona::default(),
    };

    let pipeline = RagPipeline::new(
        gemini.clone(),
        gemini,
        store,
        scorer,
        persona,
        config.pipeline.clone(),
    );

    println!("{}", "Type 'quit' to exit".dimmed());

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("question> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q") {
                    break;
                }
                editor.add_history_entry(input)?;

                let result = pipeline.answer(input, "").await;

                println!();
                println!("{}", result.answer);
                if !result.degradations.is_empty() {
                    println!(
                        "{}",
                        format!("({} stage(s) degraded this run)", result.degradations.len())
                            .yellow()
                            .dimmed()
                    );
                }
                println!();
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    println!("{}", "Goodbye!".green());
    Ok(())
}

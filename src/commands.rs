use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::database::snapshot;
use crate::embeddings::{Embedder, OllamaClient};
use crate::indexer::{Indexer, IndexingStats};
use crate::llm::build_language_model;
use crate::rag::Orchestrator;
use crate::server::{self, AppState};

/// Overrides for `serve` given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ServeOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[inline]
pub fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let client = OllamaClient::new(&config.ollama).context("Failed to create embedding client")?;
    Ok(Arc::new(client))
}

/// Wire the indexer, language model and orchestrator for `config`.
#[inline]
pub fn build_orchestrator(config: &Config) -> Result<Arc<Orchestrator>> {
    let indexer = Arc::new(Indexer::new(config, build_embedder(config)?)?);
    let llm = build_language_model(&config.llm, &config.ollama)
        .context("Failed to create language model client")?;
    info!("Using language model {}", llm.describe());

    Ok(Arc::new(Orchestrator::from_config(config, indexer, llm)))
}

/// Load the index (building it if needed) and run the HTTP server.
#[inline]
pub async fn serve(base_dir: &Path, options: ServeOptions) -> Result<()> {
    let mut config = Config::load(base_dir)?;
    if let Some(host) = options.host {
        config.server.host = host;
    }
    if let Some(port) = options.port {
        config.server.set_port(port)?;
    }

    let orchestrator = build_orchestrator(&config)?;
    if let Err(e) = orchestrator.indexer().initialize().await {
        warn!(
            "Vector store could not be prepared ({}), answering without context until retrain",
            e
        );
    }

    server::serve(AppState::new(orchestrator, Arc::new(config))).await
}

/// Rebuild the index from the document directory.
#[inline]
pub async fn retrain(base_dir: &Path) -> Result<()> {
    let config = Config::load(base_dir)?;
    let indexer = Indexer::new(&config, build_embedder(&config)?)?;

    println!(
        "Retraining from {}...",
        config.document_dir().display()
    );
    let stats = indexer.retrain().await?;
    print_stats(&stats);

    if stats.chunks == 0 {
        println!("⚠️  No chunks were produced; the vector store was removed.");
    } else {
        println!(
            "✅ Vector store saved to {}",
            config.vector_db_path().display()
        );
    }
    Ok(())
}

/// Answer one question from the command line.
#[inline]
pub async fn ask(base_dir: &Path, question: &str) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        anyhow::bail!("Question cannot be empty");
    }

    let config = Config::load(base_dir)?;
    let orchestrator = build_orchestrator(&config)?;
    orchestrator.indexer().initialize().await?;

    let state = orchestrator.ask(question).await?;

    println!("{}", state.answer);
    if !state.context.is_empty() {
        println!();
        println!("Sources:");
        for chunk in &state.context {
            match chunk.metadata.page {
                Some(page) => println!("  - {} (page {})", chunk.metadata.source, page + 1),
                None => println!("  - {}", chunk.metadata.source),
            }
        }
    }
    Ok(())
}

#[inline]
pub async fn show_status(base_dir: &Path) -> Result<()> {
    let config = Config::load(base_dir).unwrap_or_default();

    println!("📊 Chatbot RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Embedding Server:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => {
            let check = tokio::task::spawn_blocking(move || client.health_check()).await?;
            match check {
                Ok(()) => {
                    println!(
                        "   ✅ Ollama: Connected ({}:{})",
                        config.ollama.host, config.ollama.port
                    );
                    println!("   📋 Model: {}", config.ollama.model);
                }
                Err(e) => println!("   ⚠️  Ollama: Unhealthy - {:#}", e),
            }
        }
        Err(e) => println!("   ❌ Ollama: Invalid configuration - {:#}", e),
    }

    println!();
    println!("💬 Language Model:");
    match build_language_model(&config.llm, &config.ollama) {
        Ok(llm) => println!("   ✅ {}", llm.describe()),
        Err(e) => println!("   ❌ Not usable - {:#}", e),
    }

    println!();
    println!("📂 Documents: {}", config.document_dir().display());
    let vector_db_path = config.vector_db_path();
    println!("🔍 Vector Store: {}", vector_db_path.display());
    if snapshot::exists(&vector_db_path) {
        match snapshot::read_manifest(&vector_db_path) {
            Ok(manifest) => {
                println!("   Chunks: {}", manifest.chunk_count);
                println!("   Dimension: {}", manifest.dimension);
                println!("   Embedding Model: {}", manifest.embedding_model);
                println!("   Built: {}", manifest.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
                if manifest.embedding_model != config.ollama.model {
                    println!(
                        "   ⚠️  Built with a different model than the configured {}; it will be rebuilt on next start",
                        config.ollama.model
                    );
                }
            }
            Err(e) => println!("   ❌ Unreadable - {}", e),
        }
    } else {
        println!("   Not built yet. Run 'chatbot-rag retrain' or start the server.");
    }

    Ok(())
}

fn print_stats(stats: &IndexingStats) {
    println!("  Files loaded: {}", stats.files_loaded);
    if stats.files_unsupported > 0 {
        println!("  Unsupported files skipped: {}", stats.files_unsupported);
    }
    if stats.files_failed > 0 {
        println!("  Files that failed to load: {}", stats.files_failed);
    }
    println!("  Documents: {}", stats.documents);
    println!("  Chunks: {}", stats.chunks);
}

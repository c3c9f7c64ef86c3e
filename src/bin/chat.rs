use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use clap::Parser;

use lexrag::{
    AnthropicClient, IndexStore, PipelineConfig, Reranker, Retriever, VoyageEmbedder,
    VoyageReranker,
};

#[derive(Parser, Debug)]
#[command(
    name = "chat",
    about = "Interactive query loop over the persisted document index"
)]
struct ChatCli {
    /// Directory holding the LanceDB index built by build-index
    #[arg(long, env = "LEXRAG_OUTPUT", default_value = "./docs-ai")]
    db: PathBuf,

    /// Name of the index table inside the database directory
    #[arg(long, env = "LEXRAG_TABLE", default_value = "dev_docs")]
    table: String,

    /// Voyage API key used for query embedding and reranking
    #[arg(long, env = "VOYAGE_API_KEY", hide_env_values = true)]
    voyage_api_key: String,

    /// Anthropic API key for answer generation (not needed with --dry-run)
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    anthropic_api_key: Option<String>,

    /// Embedding model identifier (must match the one used at index time)
    #[arg(long, env = "LEXRAG_EMBEDDING_MODEL", default_value = "voyage-law-2")]
    embedding_model: String,

    /// Rerank model identifier
    #[arg(long, env = "LEXRAG_RERANK_MODEL", default_value = "rerank-2")]
    rerank_model: String,

    /// Anthropic model used for answer synthesis
    #[arg(long, env = "LEXRAG_ANTHROPIC_MODEL", default_value = "claude-sonnet-4-5")]
    anthropic_model: String,

    /// Skip the precision rerank stage and use raw similarity scores
    #[arg(long, default_value_t = false)]
    no_rerank: bool,

    /// Number of results kept after reranking
    #[arg(long, default_value_t = 5)]
    k: usize,

    /// Candidate count for the broad first-stage search
    #[arg(long, default_value_t = 20)]
    k_broad: usize,

    /// Only print the retrieved context (skip the LLM call)
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

fn main() -> Result<()> {
    let cli = ChatCli::parse();
    let config = PipelineConfig {
        embedding_model: cli.embedding_model.clone(),
        rerank_model: cli.rerank_model.clone(),
        k_broad: cli.k_broad.max(1),
        k_final: cli.k.max(1),
        table_name: cli.table.clone(),
        ..PipelineConfig::default()
    };

    let store = IndexStore::open(&cli.db, &config.table_name)?;
    if !store.table_exists()? {
        bail!(
            "no index table '{}' in {}; run build-index first",
            config.table_name,
            cli.db.display()
        );
    }

    let embedder = VoyageEmbedder::new(
        cli.voyage_api_key.clone(),
        config.embedding_model.clone(),
        config.http_timeout,
        config.max_retries,
        1,
    )?;
    let reranker = if cli.no_rerank {
        None
    } else {
        Some(VoyageReranker::new(
            cli.voyage_api_key.clone(),
            config.rerank_model.clone(),
            config.http_timeout,
        )?)
    };
    let answerer = if cli.dry_run {
        None
    } else {
        let key = cli
            .anthropic_api_key
            .clone()
            .ok_or_else(|| anyhow!("ANTHROPIC_API_KEY must be set (or pass --dry-run)"))?;
        Some(AnthropicClient::new(
            key,
            cli.anthropic_model.clone(),
            Duration::from_secs(120),
        )?)
    };

    let retriever = Retriever::new(
        &embedder,
        &store,
        reranker.as_ref().map(|r| r as &dyn Reranker),
        config.k_broad,
    );

    println!("Ready. Type your question below (or 'exit' to quit).");
    let stdin = io::stdin();
    loop {
        print!("\n> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query.to_lowercase().as_str(), "exit" | "quit" | "q") {
            break;
        }

        eprintln!("   [1/3] Retrieving candidates...");
        let results = match retriever.search(query, config.k_final) {
            Ok(results) => results,
            Err(err) => {
                eprintln!("   query failed: {:#}", err);
                continue;
            }
        };
        if results.is_empty() {
            println!("No relevant documents found.");
            continue;
        }

        eprintln!("   [2/3] Top matches:");
        for result in results.iter().take(2) {
            eprintln!("         - {} (Score: {:.3})", result.filename, result.score);
        }

        let Some(answerer) = &answerer else {
            println!("--- Retrieved Context ---");
            for result in &results {
                println!(
                    "SOURCE: {} (Score: {:.3})\n{}\n---",
                    result.filename, result.score, result.text
                );
            }
            continue;
        };

        eprintln!("   [3/3] Generating answer...\n");
        match answerer.answer(query, &results) {
            Ok(answer) => println!("{}", answer),
            Err(err) => eprintln!("   answer generation failed: {:#}", err),
        }
    }
    Ok(())
}

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};

use lexrag::{Chunker, IndexMode, IndexStore, Indexer, PipelineConfig, VoyageEmbedder};

#[derive(Parser, Debug)]
#[command(
    name = "build-index",
    about = "Chunk a folder of Markdown/PDF documents, embed them, and persist the vector index"
)]
struct BuildIndexCli {
    /// Directory containing the source documents
    #[arg(long, env = "LEXRAG_INPUT", default_value = "./docs")]
    input: PathBuf,

    /// Directory where the LanceDB index is persisted (created if missing)
    #[arg(long, env = "LEXRAG_OUTPUT", default_value = "./docs-ai")]
    output: PathBuf,

    /// Keep existing records (append) or rebuild the table from scratch (overwrite)
    #[arg(long, value_enum, default_value_t = ModeArg::Append)]
    mode: ModeArg,

    /// Voyage API key used for embedding calls
    #[arg(long, env = "VOYAGE_API_KEY", hide_env_values = true)]
    voyage_api_key: String,

    /// Embedding model identifier
    #[arg(long, env = "LEXRAG_EMBEDDING_MODEL", default_value = "voyage-law-2")]
    embedding_model: String,

    /// Max number of chunks to send per embedding request
    #[arg(long, env = "LEXRAG_BATCH_SIZE", default_value_t = 50)]
    batch_size: usize,

    /// Milliseconds to pause between successful batches (rate-limit throttling)
    #[arg(long, env = "LEXRAG_BATCH_DELAY_MS", default_value_t = 1000)]
    batch_delay_ms: u64,

    /// Number of retries for rate limits or transient errors
    #[arg(long, env = "LEXRAG_MAX_RETRIES", default_value_t = 5)]
    max_retries: usize,

    /// Max seconds to wait for each embedding request
    #[arg(long, env = "LEXRAG_TIMEOUT_SECS", default_value_t = 60)]
    timeout_secs: u64,

    /// Name of the index table inside the database directory
    #[arg(long, env = "LEXRAG_TABLE", default_value = "dev_docs")]
    table: String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ModeArg {
    Append,
    Overwrite,
}

impl From<ModeArg> for IndexMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Append => IndexMode::Append,
            ModeArg::Overwrite => IndexMode::Overwrite,
        }
    }
}

fn main() -> Result<()> {
    let cli = BuildIndexCli::parse();
    if !cli.input.is_dir() {
        bail!(
            "input directory {} not found; pass --input or set LEXRAG_INPUT",
            cli.input.display()
        );
    }

    let config = PipelineConfig {
        embedding_model: cli.embedding_model.clone(),
        batch_size: cli.batch_size.max(1),
        inter_batch_delay: Duration::from_millis(cli.batch_delay_ms),
        max_retries: cli.max_retries,
        table_name: cli.table.clone(),
        http_timeout: Duration::from_secs(cli.timeout_secs.max(1)),
        ..PipelineConfig::default()
    };

    eprintln!("1. Scanning documents in {}...", cli.input.display());
    let chunker = Chunker::new();
    let chunks: Vec<_> = chunker.chunks(&cli.input).collect();
    if chunks.is_empty() {
        eprintln!("   No .md or .pdf files found; nothing to index.");
        return Ok(());
    }
    eprintln!("   Found {} chunks (pages/sections).", chunks.len());

    eprintln!("2. Opening index at {}...", cli.output.display());
    let mut store = IndexStore::open(&cli.output, &config.table_name)?;

    eprintln!("3. Embedding with {}...", config.embedding_model);
    let embedder = VoyageEmbedder::new(
        cli.voyage_api_key,
        config.embedding_model.clone(),
        config.http_timeout,
        config.max_retries,
        config.batch_size,
    )?;

    let indexer = Indexer::new(&config, cli.mode.into());
    let report = indexer.run(chunks, &embedder, &mut store)?;

    eprintln!(
        "Done: {} chunks indexed, {} skipped as already present.",
        report.indexed, report.skipped
    );
    Ok(())
}

//! vrag CLI - Command-line interface
//!
//! Usage:
//!   vrag init
//!   vrag ingest <path> --level 2 --dept eng --project x --roles member,admin
//!   vrag search <question> --level 2 --role member --dept eng --project x

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use vrag_core::{AllowRoles, AppConfig, ChunkMetadata, LoggingConfig, UserContext};
use vrag_rag::RetrievalPipeline;
use vrag_vector::{
    create_embedding_client, DocumentIndex, InMemoryStore, QdrantStore, VectorBackend,
};

#[derive(Parser)]
#[command(name = "vrag")]
#[command(about = "Access-controlled retrieval over a Qdrant collection")]
#[command(version)]
struct Cli {
    /// TOML config file; environment variables take precedence
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use an in-process store instead of Qdrant (nothing is persisted)
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or repair the collection and its payload indexes
    Init,
    /// Chunk, embed and store a UTF-8 text file
    Ingest {
        /// Path to the document
        path: PathBuf,
        /// Clearance level of the uploader
        #[arg(long)]
        level: i64,
        #[arg(long)]
        dept: String,
        #[arg(long)]
        project: String,
        /// Comma-separated roles allowed to read the document
        #[arg(long, value_delimiter = ',', required = true)]
        roles: Vec<String>,
    },
    /// Search and re-rank passages visible to a user
    Search {
        /// Question to ask
        question: String,
        #[arg(long)]
        level: i64,
        #[arg(long)]
        role: String,
        #[arg(long)]
        dept: String,
        #[arg(long)]
        project: String,
        /// Candidates fetched by filtered search
        #[arg(long)]
        top_k: Option<usize>,
        /// Passages kept after re-ranking
        #[arg(long)]
        final_k: Option<usize>,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("vrag={0},vrag_vector={0},vrag_rag={0}", logging.level).into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

fn connect(config: &AppConfig, memory: bool) -> anyhow::Result<Arc<dyn VectorBackend>> {
    if memory {
        tracing::warn!("Using in-process store; data is discarded on exit");
        return Ok(Arc::new(InMemoryStore::new()));
    }
    Ok(Arc::new(QdrantStore::connect(&config.store)?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;
    init_tracing(&config.logging);

    let backend = connect(&config, cli.memory)?;
    let index = DocumentIndex::from_config(backend, &config.store);

    let outcome = index.ensure_collection().await;
    tracing::info!(collection = index.collection(), %outcome, "Collection ensured");

    match cli.command {
        Commands::Init => {
            println!("{}: {outcome}", index.collection());
            if !outcome.is_usable() {
                anyhow::bail!("collection {} is not usable", index.collection());
            }
        }
        Commands::Ingest {
            path,
            level,
            dept,
            project,
            roles,
        } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let metadata = ChunkMetadata::new(level, dept, project, AllowRoles::from_list(roles))
                .with_extra("source", path.display().to_string());

            let embedder = create_embedding_client(&config.embedding)?;
            let pipeline = RetrievalPipeline::new(index, embedder, config.retrieval.clone());
            let ids = pipeline.ingest_document(&text, &metadata).await?;

            let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
            println!("{}", serde_json::to_string_pretty(&ids)?);
        }
        Commands::Search {
            question,
            level,
            role,
            dept,
            project,
            top_k,
            final_k,
        } => {
            let user = UserContext::new(level, role, dept, project);

            let embedder = create_embedding_client(&config.embedding)?;
            let pipeline = RetrievalPipeline::new(index, embedder, config.retrieval.clone());
            let results = pipeline
                .query_with(
                    &question,
                    &user,
                    top_k.unwrap_or(config.retrieval.search_top_k),
                    final_k.unwrap_or(config.retrieval.rerank_top_k),
                )
                .await?;

            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }

    Ok(())
}

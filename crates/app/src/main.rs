use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use rag_retrieval_core::{
    BuildError, CharacterNgramEmbedder, Embedder, Retrieval, RetrievalConfig, RetrievalService,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type DynEmbedder = Box<dyn Embedder + Send + Sync>;

#[derive(Parser)]
#[command(name = "rag-retrieval", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the snapshot files
    #[arg(long, env = "RAG_SNAPSHOT_DIR", default_value = "data/processed")]
    snapshot_dir: PathBuf,

    /// Sentences per passage
    #[arg(long, env = "RAG_CHUNK_SIZE", default_value = "3")]
    chunk_size: usize,

    /// Passages per embedding call
    #[arg(long, env = "RAG_EMBED_BATCH_SIZE", default_value = "16")]
    batch_size: usize,

    /// Embedding model
    #[arg(long, env = "RAG_EMBEDDER", value_enum, default_value_t = EmbedderKind::CharNgram)]
    embedder: EmbedderKind,

    /// Vector dimension for the char-ngram embedder
    #[arg(
        long,
        env = "RAG_EMBEDDING_DIMENSIONS",
        default_value = "384",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    dimensions: u32,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmbedderKind {
    /// Hashed character trigrams, no model download.
    CharNgram,
    /// all-MiniLM-L6-v2 (requires the `minilm` feature).
    Minilm,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the snapshot from every PDF in a folder.
    Build {
        /// Folder that contains the PDFs.
        #[arg(long, default_value = "data/documents")]
        folder: PathBuf,
    },
    /// Print the passages nearest to one or more queries.
    Query {
        /// Query text; repeat to run several queries concurrently.
        #[arg(long, required = true)]
        query: Vec<String>,
        /// Number of passages per query.
        #[arg(long, default_value = "3")]
        top_k: usize,
    },
    /// Print the snapshot manifest and its first passages.
    Inspect {
        /// Number of passages to print.
        #[arg(long, default_value = "5")]
        limit: usize,
    },
}

fn load_embedder(kind: EmbedderKind, dimensions: u32) -> anyhow::Result<DynEmbedder> {
    match kind {
        EmbedderKind::CharNgram => {
            let embedder = CharacterNgramEmbedder::new(usize::try_from(dimensions)?)?;
            Ok(Box::new(embedder))
        }
        #[cfg(feature = "minilm")]
        EmbedderKind::Minilm => {
            let model = rag_retrieval_core::MiniLmEmbedder::new()?;
            Ok(Box::new(model))
        }
        #[cfg(not(feature = "minilm"))]
        EmbedderKind::Minilm => Err(anyhow::anyhow!(
            "the minilm embedder is not compiled in; rebuild with --features minilm"
        )),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "rag-retrieval boot"
    );

    let config = RetrievalConfig {
        snapshot_dir: cli.snapshot_dir.clone(),
        chunk_size: cli.chunk_size,
        embed_batch_size: cli.batch_size,
        ..RetrievalConfig::default()
    };
    let embedder = load_embedder(cli.embedder, cli.dimensions)?;
    let service = Arc::new(RetrievalService::open(config, embedder)?);

    match cli.command {
        Command::Build { folder } => {
            let builder = Arc::clone(&service);
            let built = tokio::task::spawn_blocking(move || builder.build(&folder)).await?;

            match built {
                Ok(report) => {
                    for skipped in &report.skipped {
                        warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
                    }
                    println!(
                        "{} passages from {}/{} documents ({} skipped), dimension {}, built at {}",
                        report.passages,
                        report.documents_processed,
                        report.documents_found,
                        report.skipped.len(),
                        report.dimension,
                        report.built_at.to_rfc3339()
                    );
                }
                Err(BuildError::NoDocuments { folder, skipped }) => {
                    for skipped in &skipped {
                        warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
                    }
                    println!("no readable pdf documents in {folder}; previous snapshot kept");
                }
                Err(error) => return Err(error.into()),
            }
        }
        Command::Query { query, top_k } => {
            let mut pending = JoinSet::new();
            for (slot, text) in query.into_iter().enumerate() {
                let searcher = Arc::clone(&service);
                pending.spawn_blocking(move || {
                    let retrieval = searcher.retrieve(&text, top_k);
                    (slot, text, retrieval)
                });
            }

            let mut answers = Vec::new();
            while let Some(joined) = pending.join_next().await {
                answers.push(joined?);
            }
            answers.sort_by_key(|(slot, _, _)| *slot);

            for (_, text, retrieval) in answers {
                println!("query: {text}");
                match retrieval? {
                    Retrieval::Content(passages) if passages.is_empty() => {
                        println!("  (no passages)");
                    }
                    Retrieval::Content(passages) => {
                        for (rank, passage) in passages.iter().enumerate() {
                            println!("  [{}] {passage}", rank + 1);
                        }
                    }
                    Retrieval::Unavailable(reason) => {
                        println!("  {reason}");
                    }
                }
            }
        }
        Command::Inspect { limit } => match service.snapshot() {
            Ok(snapshot) => {
                let manifest = &snapshot.manifest;
                println!(
                    "embedder={} dimension={} passages={} built_at={}",
                    manifest.embedder,
                    manifest.dimension,
                    manifest.vector_count,
                    manifest.built_at.to_rfc3339()
                );
                for (position, passage) in snapshot.passages.iter().take(limit).enumerate() {
                    println!("{}. {passage}", position + 1);
                }
            }
            Err(reason) => println!("{reason}"),
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dimensions_are_rejected_by_the_parser() {
        let parsed = Cli::try_parse_from(["rag-retrieval", "--dimensions", "0", "inspect"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn default_dimensions_build_an_embedder() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["rag-retrieval", "inspect"])?;
        let embedder = load_embedder(cli.embedder, cli.dimensions)?;
        assert_eq!(embedder.dimensions(), 384);
        Ok(())
    }
}

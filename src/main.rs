//! # fieldmap CLI (`fmap`)
//!
//! ## Usage
//!
//! ```bash
//! fmap --config ./config/fmap.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fmap load <dir>` | Parse and embed a directory into the corpus |
//! | `fmap map <source> <target>` | Propose field mappings between two files |
//! | `fmap analyze <file>` | Show the structure extracted from a file |
//! | `fmap query <text...>` | Retrieve related documents and fields |
//! | `fmap completions <shell>` | Print shell completions |
//!
//! Results go to stdout; logs go to stderr (`RUST_LOG` overrides the
//! default `fieldmap=info`).

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use fieldmap::config::{self, Config};
use fieldmap::corpus::{self, Corpus};
use fieldmap::embedding::OllamaEmbeddingService;
use fieldmap::generation::OllamaGenerationService;
use fieldmap::loader;
use fieldmap::mapper::{format_mapping_table, structure_field_texts, Mapper, MapperSettings};
use fieldmap::parser::StructureParser;
use fieldmap_core::store::{InMemoryVectorStore, VectorIndex};

/// fieldmap: propose field mappings between data structure descriptions.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "fmap",
    about = "Semantic field mapping between data structure descriptions",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/fmap.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and embed every matching file under a directory.
    ///
    /// Unchanged files already present in the corpus are reused without
    /// calling the embedding service. Afterwards the corpus holds this
    /// directory's files plus every entry loaded from outside it.
    Load {
        /// Directory to walk.
        dir: PathBuf,
    },

    /// Propose target candidates for every field of the source file.
    Map {
        source: PathBuf,
        target: PathBuf,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,

        /// Also retrieve prior context and ask for commentary.
        #[arg(long)]
        enrich: bool,
    },

    /// Show the structure and field texts extracted from a file.
    Analyze {
        file: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Retrieve documents and fields related to a free-text query.
    Query {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Number of documents to retrieve (fields get twice as many).
        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Print shell completions.
    Completions {
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fieldmap=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "fmap", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    let embedder = OllamaEmbeddingService::new(&cfg.embedding)?;
    let generator = OllamaGenerationService::new(&cfg.generation)?;
    let parser = StructureParser::new(&generator);

    match cli.command {
        Commands::Load { dir } => {
            let mapper = Mapper::new(&embedder, &generator, MapperSettings::from(&cfg));
            run_load(&cfg, &dir, &parser, &mapper).await?;
        }
        Commands::Map {
            source,
            target,
            json,
            enrich,
        } => {
            let mut settings = MapperSettings::from(&cfg);
            settings.enrich |= enrich;
            let mapper = Mapper::new(&embedder, &generator, settings);
            run_map(&cfg, &source, &target, json, &parser, &mapper).await?;
        }
        Commands::Analyze { file, json } => {
            let structure = parser.parse_file(&file).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&structure)?);
            } else {
                println!("{} ({:?})", structure.filename(), structure.shape());
                for field in structure_field_texts(&structure) {
                    println!("  {}", field.text);
                }
            }
        }
        Commands::Query { text, top_k, json } => {
            let mapper = Mapper::new(&embedder, &generator, MapperSettings::from(&cfg));
            let mut store = InMemoryVectorStore::new();
            if let Some(previous) = corpus::load_corpus(&cfg.corpus.path)? {
                corpus::rebuild_store(previous, &mut store)?;
            }
            let query = text.join(" ");
            let top_k = top_k.unwrap_or(cfg.retrieval.top_k);
            let result = mapper.extract_knowledge(&store, &query, top_k).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Documents:");
                for doc in &result.relevant_documents {
                    println!("  {:.3}  {}", doc.similarity, doc.path);
                }
                println!("Fields:");
                for field in &result.relevant_fields {
                    let desc = field.description.as_deref().unwrap_or("");
                    println!(
                        "  {:.3}  {} [{}] {}",
                        field.similarity, field.field, field.source_document, desc
                    );
                }
                println!("\n{}", result.synthesized_knowledge.trim());
            }
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

async fn run_load(
    cfg: &Config,
    dir: &Path,
    parser: &StructureParser<'_>,
    mapper: &Mapper<'_>,
) -> Result<()> {
    let root = dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve load root: {}", dir.display()))?;
    let previous = corpus::load_corpus(&cfg.corpus.path)?;
    let mut store = InMemoryVectorStore::new();
    let (structures, summary) = loader::load_directory(
        &root,
        &cfg.corpus,
        parser,
        mapper,
        &mut store,
        previous.as_ref(),
    )
    .await?;

    let corpus = Corpus::replace_under(previous, &root, &structures);
    corpus::save_corpus(&cfg.corpus.path, &corpus)?;
    println!(
        "Loaded {} files: {} embedded, {} reused, {} skipped ({} vectors, {} structures in corpus)",
        summary.scanned,
        summary.embedded,
        summary.reused,
        summary.skipped,
        store.len(),
        corpus.structures.len()
    );
    Ok(())
}

async fn run_map(
    cfg: &Config,
    source: &Path,
    target: &Path,
    json: bool,
    parser: &StructureParser<'_>,
    mapper: &Mapper<'_>,
) -> Result<()> {
    let previous = corpus::load_corpus(&cfg.corpus.path)?;
    let mut store = InMemoryVectorStore::new();
    let files = [source.to_path_buf(), target.to_path_buf()];
    let resolved = loader::load_files(&files, previous, parser, mapper, &mut store).await?;
    let report = mapper
        .map_with_context(&store, &resolved[0], &resolved[1])
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", format_mapping_table(&report.mappings));
        if let Some(commentary) = &report.commentary {
            println!("\n{}", commentary.trim());
        }
    }
    Ok(())
}

use anyhow::{Context, Result};
use bookdex::persist::{load_index, save_documents, save_index, DocumentTexts, IndexPaths};
use bookdex::{ArtifactFormat, BoolMode, Document, Index, IndexBuilder, IndexConfig, Pipeline, QueryOverrides};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// One input record. Fields may be nested under `fields` or given at the top
/// level; only string values are indexed.
#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    #[serde(default)]
    fields: BTreeMap<String, String>,
    #[serde(flatten)]
    rest: BTreeMap<String, serde_json::Value>,
}

impl InputDoc {
    fn into_document(self) -> Document {
        let mut doc = Document::new(self.id);
        for (name, value) in self.rest {
            if let serde_json::Value::String(text) = value {
                doc.fields.insert(name, text);
            }
        }
        doc.fields.extend(self.fields);
        doc
    }
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build, inspect and query trie search indexes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// JSON index configuration (fields, boosts, pipeline, options)
        #[arg(long)]
        config: Option<String>,
        /// Write the compact binary artifact instead of JSON
        #[arg(long, default_value_t = false)]
        binary: bool,
    },
    /// Run a query against a built index
    Query {
        #[arg(long)]
        index: String,
        query: String,
        /// Boolean mode: OR or AND
        #[arg(long = "bool")]
        mode: Option<BoolMode>,
        /// Match only literal tokens
        #[arg(long, default_value_t = false)]
        no_expand: bool,
        #[arg(long)]
        limit: Option<usize>,
        /// Comma-separated stage names the index must have been built with
        #[arg(long, value_delimiter = ',')]
        pipeline: Option<Vec<String>>,
    },
    /// Print index statistics
    Inspect {
        #[arg(long)]
        index: String,
        /// Number of most frequent tokens to list
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, config, binary } => {
            let format = if binary { ArtifactFormat::Binary } else { ArtifactFormat::Json };
            build_index(&input, &output, config.as_deref(), format)
        }
        Commands::Query { index, query, mode, no_expand, limit, pipeline } => {
            let expected = pipeline.map(|names| Pipeline::from_names(&names)).transpose()?;
            let index = load_index(&IndexPaths::new(&index), expected.as_ref())?;
            let overrides = QueryOverrides { mode, expand: no_expand.then_some(false), fields: None, limit };
            let outcome = index.query(&query, Some(&overrides))?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Commands::Inspect { index, top } => {
            let index = load_index(&IndexPaths::new(&index), None)?;
            println!("{}", serde_json::to_string_pretty(&inspect(&index, top))?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&str>) -> Result<IndexConfig> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("reading config {path}"))?;
            Ok(IndexConfig::from_json(&text)?)
        }
        None => Ok(IndexConfig::default()),
    }
}

fn build_index(input: &str, output: &str, config: Option<&str>, format: ArtifactFormat) -> Result<()> {
    let config = load_config(config)?;
    let input_path = Path::new(input);
    let out_paths = IndexPaths::new(output);

    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    } else {
        anyhow::bail!("input {input} does not exist");
    }

    let mut docs = Vec::new();
    for file in &files {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(file, &mut docs)?;
        } else {
            read_json(file, &mut docs)?;
        }
    }
    tracing::info!(files = files.len(), num_docs = docs.len(), "read input documents");

    let (index, texts) = ingest(config, docs)?;
    // Texts go first: a reload in between sees the old index with newer texts,
    // never a new index whose documents have no text yet.
    save_documents(&out_paths, &texts)?;
    save_index(&out_paths, &index, format)?;
    tracing::info!(output, num_docs = index.document_count(), "index build complete");
    Ok(())
}

/// Index every document and collect the raw text of configured fields.
fn ingest(config: IndexConfig, docs: Vec<Document>) -> Result<(Index, DocumentTexts)> {
    let mut builder = IndexBuilder::new(config)?;
    let mut texts = DocumentTexts::new();
    for doc in docs {
        builder.add_document(&doc).with_context(|| format!("indexing document {}", doc.id))?;
        let kept: BTreeMap<String, String> = doc
            .fields
            .into_iter()
            .filter(|(name, _)| builder.config().boost(name).is_some())
            .collect();
        texts.insert(doc.id, kept);
    }
    Ok((builder.freeze(), texts))
}

fn read_jsonl(file: &Path, docs: &mut Vec<Document>) -> Result<()> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: InputDoc = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), n + 1))?;
        docs.push(doc.into_document());
    }
    Ok(())
}

fn read_json(file: &Path, docs: &mut Vec<Document>) -> Result<()> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                let doc: InputDoc = serde_json::from_value(v)?;
                docs.push(doc.into_document());
            }
        }
        serde_json::Value::Object(_) => {
            let doc: InputDoc = serde_json::from_value(json)?;
            docs.push(doc.into_document());
        }
        _ => tracing::warn!(file = %file.display(), "skipping input that is neither object nor array"),
    }
    Ok(())
}

fn inspect(index: &Index, top: usize) -> serde_json::Value {
    let mut terms: Vec<(String, u32)> = index.terms().into_iter().map(|(t, e)| (t, e.df())).collect();
    terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let config = index.config();
    serde_json::json!({
        "documents": index.document_count(),
        "fields": config.fields,
        "pipeline": config.pipeline.names(),
        "tokens": terms.len(),
        "trieNodes": index.trie_node_count(),
        "topTokens": terms.into_iter().take(top).collect::<Vec<_>>(),
    })
}

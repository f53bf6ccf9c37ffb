//! Persisted index artifact.
//!
//! The artifact is one record holding the document store, the trie, the field
//! list with boosts, the pipeline by stage name and format metadata. It is
//! written as JSON (the canonical form shipped to query-only consumers) or as
//! a compact bincode blob of the same record.

use crate::config::{FieldConfig, IndexConfig, ResultsOptions, SearchOptions};
use crate::error::{Error, Result};
use crate::index::Index;
use crate::pipeline::Pipeline;
use crate::store::DocumentStore;
use crate::trie::Trie;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// `MAJOR.MINOR`; artifacts with another major version are rejected.
pub const FORMAT_VERSION: &str = "1.0";
pub const LANG: &str = "English";

/// Raw field text per document id, kept next to the index for teasers.
pub type DocumentTexts = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Json,
    Binary,
}

impl ArtifactFormat {
    pub fn file_name(self) -> &'static str {
        match self {
            ArtifactFormat::Json => "searchindex.json",
            ArtifactFormat::Binary => "searchindex.bin",
        }
    }
}

// Field order is part of the binary encoding; keep both records in sync.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactRef<'a> {
    version: &'a str,
    lang: &'a str,
    pipeline: Vec<String>,
    document_count: usize,
    doc_info: &'a DocumentStore,
    index: TrieSectionRef<'a>,
    search_options: SearchOptions,
    results_options: ResultsOptions,
}

#[derive(Serialize)]
struct TrieSectionRef<'a> {
    fields: Vec<&'a str>,
    root: &'a Trie,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Artifact {
    version: String,
    lang: String,
    pipeline: Vec<String>,
    document_count: usize,
    doc_info: DocumentStore,
    index: TrieSection,
    search_options: SearchOptions,
    results_options: ResultsOptions,
}

#[derive(Deserialize)]
struct TrieSection {
    fields: Vec<String>,
    root: Trie,
}

pub fn encode(index: &Index, format: ArtifactFormat) -> Result<Vec<u8>> {
    let config = index.config();
    let artifact = ArtifactRef {
        version: FORMAT_VERSION,
        lang: LANG,
        pipeline: config.pipeline.names(),
        document_count: index.store.len(),
        doc_info: &index.store,
        index: TrieSectionRef { fields: config.field_names().collect(), root: &index.trie },
        search_options: config.search_options(),
        results_options: config.results_options,
    };
    match format {
        ArtifactFormat::Json => serde_json::to_vec(&artifact).map_err(|e| Error::Encode(e.to_string())),
        ArtifactFormat::Binary => bincode::serialize(&artifact).map_err(|e| Error::Encode(e.to_string())),
    }
}

pub fn decode(bytes: &[u8], format: ArtifactFormat) -> Result<Index> {
    let artifact: Artifact = match format {
        ArtifactFormat::Json => serde_json::from_slice(bytes).map_err(|e| Error::Validation(e.to_string()))?,
        ArtifactFormat::Binary => bincode::deserialize(bytes).map_err(|e| Error::Validation(e.to_string()))?,
    };
    artifact.into_index()
}

fn check_version(version: &str) -> Result<()> {
    let major = |v: &str| v.split('.').next().and_then(|m| m.parse::<u32>().ok());
    match major(version) {
        Some(m) if Some(m) == major(FORMAT_VERSION) => Ok(()),
        _ => Err(Error::Validation(format!(
            "unsupported format version `{version}`, expected {FORMAT_VERSION}"
        ))),
    }
}

impl Artifact {
    fn into_index(self) -> Result<Index> {
        check_version(&self.version)?;
        if self.lang != LANG {
            return Err(Error::Validation(format!("unsupported language `{}`", self.lang)));
        }
        let pipeline = Pipeline::from_names(&self.pipeline)?;
        if self.document_count != self.doc_info.len() {
            return Err(Error::Validation(format!(
                "documentCount is {} but docInfo holds {} documents",
                self.document_count,
                self.doc_info.len()
            )));
        }

        let mut fields = Vec::with_capacity(self.index.fields.len());
        for name in &self.index.fields {
            let boost = self
                .search_options
                .fields
                .get(name)
                .ok_or_else(|| Error::Validation(format!("field `{name}` has no boost")))?
                .boost;
            fields.push(FieldConfig::new(name.clone(), boost));
        }
        if self.search_options.fields.len() != fields.len() {
            return Err(Error::Validation("searchOptions names fields missing from the index".into()));
        }
        let config = IndexConfig {
            fields,
            pipeline,
            mode: self.search_options.mode,
            expand: self.search_options.expand,
            expand_limit: self.search_options.expand_limit,
            results_options: self.results_options,
        };
        config.validate().map_err(|e| match e {
            Error::Configuration(msg) => Error::Validation(msg),
            other => other,
        })?;

        let known: HashSet<&str> = config.field_names().collect();
        for (token, entry) in self.index.root.terms() {
            for (doc, freqs) in entry.docs() {
                if !self.doc_info.contains(doc) {
                    return Err(Error::Validation(format!("token `{token}` references unknown document `{doc}`")));
                }
                for (field, tf) in freqs {
                    if !known.contains(field.as_str()) {
                        return Err(Error::Validation(format!("token `{token}` references unknown field `{field}`")));
                    }
                    if !(tf.is_finite() && *tf > 0.0) {
                        return Err(Error::Validation(format!("token `{token}` has invalid weight {tf}")));
                    }
                }
            }
        }

        Ok(Index::from_parts(config, self.index.root, self.doc_info))
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn artifact(&self, format: ArtifactFormat) -> PathBuf { self.root.join(format.file_name()) }
    pub fn documents(&self) -> PathBuf { self.root.join("documents.json") }
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("artifact");
    let tmp = path.with_file_name(format!("{file_name}.tmp"));
    let mut f = File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_all(path: &Path) -> Result<Vec<u8>> {
    let mut f = File::open(path)?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    Ok(buf)
}

pub fn save_index(paths: &IndexPaths, index: &Index, format: ArtifactFormat) -> Result<PathBuf> {
    create_dir_all(&paths.root)?;
    let path = paths.artifact(format);
    let bytes = encode(index, format)?;
    write_atomic(&path, &bytes)?;
    // Drop a stale artifact of the other format so loaders see this build.
    let stale = paths.artifact(match format {
        ArtifactFormat::Json => ArtifactFormat::Binary,
        ArtifactFormat::Binary => ArtifactFormat::Json,
    });
    match fs::remove_file(&stale) {
        Ok(()) => tracing::debug!(path = %stale.display(), "removed stale artifact"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    tracing::info!(path = %path.display(), bytes = bytes.len(), "saved index");
    Ok(path)
}

/// Load the artifact under `paths`, preferring JSON over binary. When
/// `expected` is given the persisted pipeline must match it.
pub fn load_index(paths: &IndexPaths, expected: Option<&Pipeline>) -> Result<Index> {
    let json = paths.artifact(ArtifactFormat::Json);
    let (path, format) = if json.exists() {
        (json, ArtifactFormat::Json)
    } else {
        (paths.artifact(ArtifactFormat::Binary), ArtifactFormat::Binary)
    };
    let index = decode(&read_all(&path)?, format)?;
    if let Some(expected) = expected {
        index.verify_pipeline(expected)?;
    }
    tracing::info!(path = %path.display(), num_docs = index.document_count(), "loaded index");
    Ok(index)
}

pub fn save_documents(paths: &IndexPaths, docs: &DocumentTexts) -> Result<()> {
    create_dir_all(&paths.root)?;
    let json = serde_json::to_vec_pretty(docs).map_err(|e| Error::Encode(e.to_string()))?;
    write_atomic(&paths.documents(), &json)
}

pub fn load_documents(paths: &IndexPaths) -> Result<DocumentTexts> {
    let buf = read_all(&paths.documents())?;
    serde_json::from_slice(&buf).map_err(|e| Error::Validation(format!("malformed documents file: {e}")))
}

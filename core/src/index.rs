use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::store::{DocumentStore, FieldLengths};
use crate::trie::{TermEntry, Trie};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A document as handed to the builder: a stable id and raw text per field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: BTreeMap<String, String>,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), fields: BTreeMap::new() }
    }

    pub fn with_field(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.fields.insert(name.into(), text.into());
        self
    }
}

/// Mutable index under construction. Call [`IndexBuilder::freeze`] to get a
/// queryable [`Index`].
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    config: IndexConfig,
    trie: Trie,
    store: DocumentStore,
    /// Distinct tokens per document, kept so removal can retrace insertion.
    doc_tokens: HashMap<String, BTreeSet<String>>,
}

impl IndexBuilder {
    pub fn new(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            trie: Trie::new(),
            store: DocumentStore::new(),
            doc_tokens: HashMap::new(),
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.store.contains(id)
    }

    /// Tokenize every configured field of `doc` and record it.
    ///
    /// Fields outside the configuration are ignored; configured fields the
    /// document lacks count as empty.
    pub fn add_document(&mut self, doc: &Document) -> Result<()> {
        if self.store.contains(&doc.id) {
            return Err(Error::DuplicateDocument(doc.id.clone()));
        }
        for name in doc.fields.keys() {
            if self.config.boost(name).is_none() {
                tracing::debug!(doc = %doc.id, field = %name, "ignoring unconfigured field");
            }
        }

        let mut lengths = FieldLengths::new();
        let mut counts: BTreeMap<String, BTreeMap<&str, u32>> = BTreeMap::new();
        for field in self.config.field_names() {
            let text = doc.fields.get(field).map(String::as_str).unwrap_or("");
            let tokens = self.config.pipeline.process(text);
            lengths.insert(field.to_string(), tokens.len() as u32);
            for token in tokens {
                *counts.entry(token).or_default().entry(field).or_insert(0) += 1;
            }
        }

        for (token, fields) in &counts {
            for (field, occurrences) in fields {
                self.trie.insert(token, &doc.id, field, *occurrences);
            }
        }
        self.store.insert(&doc.id, lengths);
        tracing::debug!(doc = %doc.id, distinct_tokens = counts.len(), "indexed document");
        self.doc_tokens.insert(doc.id.clone(), counts.into_keys().collect());
        Ok(())
    }

    /// Undo [`IndexBuilder::add_document`] for `id`.
    pub fn remove_document(&mut self, id: &str) -> Result<()> {
        if self.store.remove(id).is_none() {
            return Err(Error::UnknownDocument(id.to_string()));
        }
        let tokens = self.doc_tokens.remove(id).unwrap_or_default();
        for token in &tokens {
            self.trie.remove(token, id);
        }
        tracing::debug!(doc = %id, distinct_tokens = tokens.len(), "removed document");
        Ok(())
    }

    pub fn freeze(self) -> Index {
        tracing::info!(
            num_docs = self.store.len(),
            trie_nodes = self.trie.node_count(),
            "index frozen"
        );
        Index { config: self.config, trie: self.trie, store: self.store }
    }
}

/// A frozen, read-only index. Queries take `&self` and never mutate it, so one
/// instance can be shared across threads.
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub(crate) config: IndexConfig,
    pub(crate) trie: Trie,
    pub(crate) store: DocumentStore,
}

impl Index {
    pub(crate) fn from_parts(config: IndexConfig, trie: Trie, store: DocumentStore) -> Self {
        Self { config, trie, store }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.config.pipeline
    }

    pub fn document_count(&self) -> usize {
        self.store.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.store.contains(id)
    }

    pub fn field_lengths(&self, id: &str) -> Option<&FieldLengths> {
        self.store.get(id)
    }

    pub fn document_ids(&self) -> impl Iterator<Item = &str> {
        self.store.iter().map(|(id, _)| id.as_str())
    }

    pub fn lookup(&self, token: &str) -> Option<TermEntry<'_>> {
        self.trie.lookup(token)
    }

    pub fn expand(&self, prefix: &str, limit: usize) -> Vec<String> {
        self.trie.expand(prefix, limit)
    }

    pub fn terms(&self) -> Vec<(String, TermEntry<'_>)> {
        self.trie.terms()
    }

    pub fn trie_node_count(&self) -> usize {
        self.trie.node_count()
    }

    /// Reject an index built with a different pipeline than the caller queries with.
    pub fn verify_pipeline(&self, expected: &Pipeline) -> Result<()> {
        if &self.config.pipeline != expected {
            return Err(Error::Validation(format!(
                "index was built with pipeline [{}] but [{}] is configured",
                self.config.pipeline, expected
            )));
        }
        Ok(())
    }
}

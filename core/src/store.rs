use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Token counts per field of one document.
pub type FieldLengths = BTreeMap<String, u32>;

/// Per-document field lengths used to normalize term frequencies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentStore {
    doc_info: BTreeMap<String, FieldLengths>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false without touching the store when `doc` is already present.
    pub fn insert(&mut self, doc: &str, lengths: FieldLengths) -> bool {
        if self.doc_info.contains_key(doc) {
            return false;
        }
        self.doc_info.insert(doc.to_string(), lengths);
        true
    }

    pub fn remove(&mut self, doc: &str) -> Option<FieldLengths> {
        self.doc_info.remove(doc)
    }

    pub fn contains(&self, doc: &str) -> bool {
        self.doc_info.contains_key(doc)
    }

    pub fn field_length(&self, doc: &str, field: &str) -> u32 {
        self.doc_info
            .get(doc)
            .and_then(|fields| fields.get(field))
            .copied()
            .unwrap_or(0)
    }

    pub fn get(&self, doc: &str) -> Option<&FieldLengths> {
        self.doc_info.get(doc)
    }

    pub fn len(&self) -> usize {
        self.doc_info.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_info.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldLengths)> {
        self.doc_info.iter()
    }
}

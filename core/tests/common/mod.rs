//! Shared fixtures.

#![allow(dead_code)]

use bookdex::{Document, FieldConfig, Index, IndexBuilder, IndexConfig};

pub fn doc(id: &str, title: &str, body: &str) -> Document {
    Document::new(id).with_field("title", title).with_field("body", body)
}

pub fn config() -> IndexConfig {
    IndexConfig::with_fields(vec![FieldConfig::new("title", 2.0), FieldConfig::new("body", 1.0)])
}

pub fn build(config: IndexConfig, docs: &[Document]) -> Index {
    let mut builder = IndexBuilder::new(config).unwrap();
    for d in docs {
        builder.add_document(d).unwrap();
    }
    builder.freeze()
}

/// The two-document corpus used throughout the scenarios.
pub fn scenario() -> Index {
    build(
        config(),
        &[
            doc("D1", "Intro", "the use of skill to create something"),
            doc("D2", "Progress", "to develop to a higher stage"),
        ],
    )
}

pub fn ids(index: &Index, query: &str) -> Vec<String> {
    index
        .search(query, None)
        .unwrap()
        .into_iter()
        .map(|h| h.doc_ref)
        .collect()
}

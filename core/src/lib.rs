//! Embeddable full-text search over small, mostly static corpora.
//!
//! Documents are tokenized by a configurable [`Pipeline`], stored in a
//! character trie with per-field term frequencies, and queried with TF-IDF
//! scoring, field boosts and prefix expansion. A built index is frozen into an
//! immutable [`Index`] and shipped as a serialized artifact (see [`persist`]).
//!
//! ```
//! use bookdex::{Document, IndexBuilder, IndexConfig};
//!
//! let mut builder = IndexBuilder::new(IndexConfig::default())?;
//! builder.add_document(&Document::new("progress").with_field("title", "Progress"))?;
//! let index = builder.freeze();
//! let hits = index.search("prog", None)?;
//! assert_eq!(hits[0].doc_ref, "progress");
//! # Ok::<(), bookdex::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod persist;
pub mod pipeline;
pub mod query;
pub mod store;
pub mod tokenizer;
pub mod trie;

pub use config::{BoolMode, FieldConfig, IndexConfig, QueryOverrides, ResultsOptions, SearchOptions};
pub use error::{Error, Result};
pub use index::{Document, Index, IndexBuilder};
pub use persist::{decode, encode, ArtifactFormat};
pub use pipeline::{Pipeline, Stage};
pub use query::{SearchHit, SearchOutcome};

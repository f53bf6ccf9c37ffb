//! Build-time index configuration and query options.

use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

pub const DEFAULT_EXPAND_LIMIT: usize = 128;
pub const DEFAULT_LIMIT_RESULTS: usize = 30;
pub const DEFAULT_TEASER_WORD_COUNT: usize = 30;

/// How matches of distinct query terms are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolMode {
    #[default]
    #[serde(rename = "OR")]
    Or,
    #[serde(rename = "AND")]
    And,
}

impl FromStr for BoolMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OR" => Ok(BoolMode::Or),
            "AND" => Ok(BoolMode::And),
            _ => Err(Error::Configuration(format!("unknown boolean mode `{s}`"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    pub boost: f64,
}

impl FieldConfig {
    pub fn new(name: impl Into<String>, boost: f64) -> Self {
        Self { name: name.into(), boost }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldBoost {
    pub boost: f64,
}

/// Persisted query defaults (`searchOptions` in the artifact).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    #[serde(rename = "bool")]
    pub mode: BoolMode,
    pub expand: bool,
    #[serde(default = "default_expand_limit")]
    pub expand_limit: usize,
    pub fields: BTreeMap<String, FieldBoost>,
}

fn default_expand_limit() -> usize {
    DEFAULT_EXPAND_LIMIT
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsOptions {
    pub limit_results: usize,
    pub teaser_word_count: usize,
}

impl Default for ResultsOptions {
    fn default() -> Self {
        Self {
            limit_results: DEFAULT_LIMIT_RESULTS,
            teaser_word_count: DEFAULT_TEASER_WORD_COUNT,
        }
    }
}

/// Everything fixed at build time. Changing any of it means building a new index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexConfig {
    pub fields: Vec<FieldConfig>,
    pub pipeline: Pipeline,
    #[serde(rename = "bool")]
    pub mode: BoolMode,
    pub expand: bool,
    pub expand_limit: usize,
    pub results_options: ResultsOptions,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            fields: vec![
                FieldConfig::new("title", 2.0),
                FieldConfig::new("body", 1.0),
                FieldConfig::new("breadcrumbs", 1.0),
            ],
            pipeline: Pipeline::default(),
            mode: BoolMode::Or,
            expand: true,
            expand_limit: DEFAULT_EXPAND_LIMIT,
            results_options: ResultsOptions::default(),
        }
    }
}

impl IndexConfig {
    pub fn with_fields(fields: Vec<FieldConfig>) -> Self {
        Self { fields, ..Self::default() }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: IndexConfig = serde_json::from_str(text)
            .map_err(|e| Error::Configuration(format!("malformed config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(Error::Configuration("at least one field is required".into()));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(Error::Configuration("field names must not be empty".into()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(Error::Configuration(format!("field `{}` is configured twice", field.name)));
            }
            check_boost(&field.name, field.boost)?;
        }
        if self.expand_limit == 0 {
            return Err(Error::Configuration("expandLimit must be at least 1".into()));
        }
        Ok(())
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn boost(&self, field: &str) -> Option<f64> {
        self.fields.iter().find(|f| f.name == field).map(|f| f.boost)
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            mode: self.mode,
            expand: self.expand,
            expand_limit: self.expand_limit,
            fields: self
                .fields
                .iter()
                .map(|f| (f.name.clone(), FieldBoost { boost: f.boost }))
                .collect(),
        }
    }
}

pub(crate) fn check_boost(field: &str, boost: f64) -> Result<()> {
    if boost.is_finite() && boost > 0.0 {
        Ok(())
    } else {
        Err(Error::Configuration(format!("boost for field `{field}` must be positive, got {boost}")))
    }
}

/// Per-query overrides of the persisted search options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOverrides {
    pub mode: Option<BoolMode>,
    pub expand: Option<bool>,
    /// Restricts scoring to these fields with these boosts.
    pub fields: Option<BTreeMap<String, f64>>,
    pub limit: Option<usize>,
}

impl QueryOverrides {
    pub fn mode(mut self, mode: BoolMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn expand(mut self, expand: bool) -> Self {
        self.expand = Some(expand);
        self
    }

    pub fn field(mut self, name: impl Into<String>, boost: f64) -> Self {
        self.fields.get_or_insert_with(BTreeMap::new).insert(name.into(), boost);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = IndexConfig::default();
        config.validate().unwrap();
        assert_eq!(config.boost("title"), Some(2.0));
        assert_eq!(config.search_options().fields.len(), 3);
    }

    #[test]
    fn rejects_bad_boosts_and_duplicates() {
        for boost in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = IndexConfig::with_fields(vec![FieldConfig::new("body", boost)]);
            assert!(matches!(config.validate(), Err(Error::Configuration(_))));
        }
        let config = IndexConfig::with_fields(vec![
            FieldConfig::new("body", 1.0),
            FieldConfig::new("body", 2.0),
        ]);
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
        assert!(IndexConfig::with_fields(Vec::new()).validate().is_err());
    }

    #[test]
    fn parses_partial_json() {
        let config = IndexConfig::from_json(
            r#"{"fields":[{"name":"title","boost":3}],"bool":"AND","pipeline":["trimmer"]}"#,
        )
        .unwrap();
        assert_eq!(config.mode, BoolMode::And);
        assert!(config.expand);
        assert_eq!(config.pipeline.names(), vec!["trimmer"]);
        assert_eq!(config.results_options.limit_results, DEFAULT_LIMIT_RESULTS);
    }

    #[test]
    fn unknown_stage_in_config_is_a_configuration_error() {
        let err = IndexConfig::from_json(r#"{"pipeline":["lemmatizer"]}"#).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn bool_mode_parses_case_insensitively() {
        assert_eq!("and".parse::<BoolMode>().unwrap(), BoolMode::And);
        assert!("xor".parse::<BoolMode>().is_err());
    }
}

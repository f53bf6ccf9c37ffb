//! Query evaluation over a frozen [`Index`].
//!
//! Scoring is TF-IDF with field boosts and field-length normalization:
//!
//! ```text
//! contribution(t, d) = Σ_f tf(t,d,f) · idf(t) · boost(f) / sqrt(len(d,f)) · penalty(t)
//! idf(t)             = 1 + ln(N / (df(t) + 1))
//! ```
//!
//! For an expanded token `len(d,f)` excludes the occurrences of the literal
//! query term, which keeps a term's score non-decreasing in its own count.
//!
//! A query term resolving to several index tokens (prefix expansion) keeps the
//! best contribution per document; distinct query terms are summed. Results are
//! ordered by score descending, then document id ascending.

use crate::config::{check_boost, BoolMode, QueryOverrides};
use crate::error::{Error, Result};
use crate::index::Index;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Expansions shorter than this many extra characters share the same penalty.
const EXPANSION_PENALTY_FLOOR: usize = 3;

/// One ranked document. Carries what a caller needs to build a teaser; the
/// index holds no raw text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub doc_ref: String,
    pub score: f64,
    /// Query terms (after the pipeline) that matched this document.
    pub matched_terms: BTreeSet<String>,
    /// Index tokens that matched, by field.
    pub matched: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchOutcome {
    /// Matching documents before truncation.
    pub total_hits: usize,
    pub hits: Vec<SearchHit>,
}

struct Plan {
    mode: BoolMode,
    expand: bool,
    expand_limit: usize,
    boosts: BTreeMap<String, f64>,
    limit: usize,
}

#[derive(Default)]
struct Accumulator {
    score: f64,
    terms: BTreeSet<String>,
    matched: BTreeMap<String, BTreeSet<String>>,
}

pub fn idf(df: u32, num_docs: usize) -> f64 {
    1.0 + (num_docs as f64 / (f64::from(df) + 1.0)).ln()
}

/// Damping applied to an index token reached by expanding `term`.
pub fn expansion_penalty(term: &str, token: &str) -> f64 {
    if term == token {
        return 1.0;
    }
    let extra = token.chars().count().saturating_sub(term.chars().count());
    1.0 / (extra.max(EXPANSION_PENALTY_FLOOR) as f64).ln()
}

impl Index {
    /// Ranked hits for `query`, truncated to the result limit.
    ///
    /// Only invalid `overrides` produce an error; queries that resolve to
    /// nothing return an empty list.
    pub fn search(&self, query: &str, overrides: Option<&QueryOverrides>) -> Result<Vec<SearchHit>> {
        Ok(self.query(query, overrides)?.hits)
    }

    pub fn query(&self, query: &str, overrides: Option<&QueryOverrides>) -> Result<SearchOutcome> {
        let plan = self.plan(overrides)?;

        let mut seen = HashSet::new();
        let terms: Vec<String> = self
            .config
            .pipeline
            .process(query)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();
        if terms.is_empty() {
            return Ok(SearchOutcome::default());
        }

        let mut totals: BTreeMap<&str, Accumulator> = BTreeMap::new();
        let mut hits_per_doc: BTreeMap<&str, usize> = BTreeMap::new();
        for term in &terms {
            for (doc, (score, matched)) in self.score_term(term, &plan) {
                let acc = totals.entry(doc).or_default();
                acc.score += score;
                acc.terms.insert(term.clone());
                for (field, tokens) in matched {
                    acc.matched.entry(field).or_default().extend(tokens);
                }
                *hits_per_doc.entry(doc).or_insert(0) += 1;
            }
        }

        let mut hits: Vec<SearchHit> = totals
            .into_iter()
            .filter(|(doc, _)| plan.mode == BoolMode::Or || hits_per_doc[doc] == terms.len())
            .map(|(doc, acc)| SearchHit {
                doc_ref: doc.to_string(),
                score: acc.score,
                matched_terms: acc.terms,
                matched: acc.matched,
            })
            .collect();
        hits.sort_by(|a, b| match b.score.total_cmp(&a.score) {
            Ordering::Equal => a.doc_ref.cmp(&b.doc_ref),
            other => other,
        });

        let total_hits = hits.len();
        hits.truncate(plan.limit);
        tracing::trace!(query, terms = terms.len(), total_hits, "search");
        Ok(SearchOutcome { total_hits, hits })
    }

    /// Best contribution of any token `term` resolves to, per document.
    fn score_term<'a>(
        &'a self,
        term: &str,
        plan: &Plan,
    ) -> BTreeMap<&'a str, (f64, BTreeMap<String, BTreeSet<String>>)> {
        let candidates = if plan.expand {
            self.trie.expand(term, plan.expand_limit)
        } else if self.trie.lookup(term).is_some() {
            vec![term.to_string()]
        } else {
            Vec::new()
        };

        let num_docs = self.store.len();
        let literal = self.trie.lookup(term).map(|e| e.docs());
        let mut best: BTreeMap<&'a str, (f64, BTreeMap<String, BTreeSet<String>>)> = BTreeMap::new();
        for token in candidates {
            let Some(entry) = self.trie.lookup(&token) else {
                continue;
            };
            let weight = idf(entry.df(), num_docs) * expansion_penalty(term, &token);
            for (doc, freqs) in entry.docs() {
                let mut score = 0.0;
                let mut fields = Vec::new();
                for (field, tf) in freqs {
                    let Some(boost) = plan.boosts.get(field) else {
                        continue;
                    };
                    let mut length = f64::from(self.store.field_length(doc, field));
                    if token != term {
                        // Expansions are normed against the field without the
                        // literal term, so more occurrences of it never dilute them.
                        let occurrences = literal
                            .and_then(|docs| docs.get(doc))
                            .and_then(|freqs| freqs.get(field))
                            .map_or(0.0, |tf| (tf * tf).round());
                        length -= occurrences;
                    }
                    if length < 1.0 {
                        continue;
                    }
                    score += tf * weight * boost / length.sqrt();
                    fields.push(field);
                }
                if fields.is_empty() {
                    continue;
                }
                let slot = best.entry(doc.as_str()).or_default();
                slot.0 = slot.0.max(score);
                for field in fields {
                    slot.1.entry(field.clone()).or_default().insert(token.clone());
                }
            }
        }
        best
    }

    fn plan(&self, overrides: Option<&QueryOverrides>) -> Result<Plan> {
        let defaults = QueryOverrides::default();
        let overrides = overrides.unwrap_or(&defaults);
        let boosts = match &overrides.fields {
            Some(fields) => {
                for (name, boost) in fields {
                    if self.config.boost(name).is_none() {
                        return Err(Error::Configuration(format!("unknown field `{name}` in query options")));
                    }
                    check_boost(name, *boost)?;
                }
                fields.clone()
            }
            None => self
                .config
                .fields
                .iter()
                .map(|f| (f.name.clone(), f.boost))
                .collect(),
        };
        Ok(Plan {
            mode: overrides.mode.unwrap_or(self.config.mode),
            expand: overrides.expand.unwrap_or(self.config.expand),
            expand_limit: self.config.expand_limit,
            boosts,
            limit: overrides.limit.unwrap_or(self.config.results_options.limit_results),
        })
    }
}

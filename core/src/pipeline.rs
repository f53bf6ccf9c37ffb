//! Token normalization pipeline.
//!
//! A pipeline is an ordered list of [`Stage`]s. It is persisted by name next to
//! the trie, and the same list must be used at build and query time.

use crate::error::{Error, Result};
use crate::tokenizer::{self, Token};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Trimmer,
    StopWordFilter,
    Stemmer,
    DiacriticFolder,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Trimmer,
        Stage::StopWordFilter,
        Stage::Stemmer,
        Stage::DiacriticFolder,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Trimmer => "trimmer",
            Stage::StopWordFilter => "stopWordFilter",
            Stage::Stemmer => "stemmer",
            Stage::DiacriticFolder => "diacriticFolder",
        }
    }

    pub fn from_name(name: &str) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| s.name() == name)
    }

    /// Map tokens to tokens. Stages may drop tokens but never reorder them.
    pub fn apply(self, tokens: Vec<Token>) -> Vec<Token> {
        tokens.into_iter().filter_map(|t| self.rewrite(t)).collect()
    }

    fn rewrite(self, token: Token) -> Option<Token> {
        let text = match self {
            Stage::StopWordFilter => {
                return (!tokenizer::is_stopword(&token.text)).then_some(token);
            }
            Stage::Trimmer => tokenizer::trim(&token.text),
            Stage::Stemmer => tokenizer::stem(&token.text),
            Stage::DiacriticFolder => tokenizer::fold_diacritics(&token.text),
        };
        (!text.is_empty()).then_some(Token { text, position: token.position })
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Stage::from_name(s).ok_or_else(|| Error::Validation(format!("unknown pipeline stage `{s}`")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(vec![Stage::Trimmer, Stage::StopWordFilter, Stage::Stemmer])
    }
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Resolve persisted stage names, rejecting any name this build does not know.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let stages = names
            .iter()
            .map(|n| n.as_ref().parse())
            .collect::<Result<Vec<Stage>>>()?;
        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }

    /// Tokenize `text` and run every stage, keeping word positions.
    pub fn analyze(&self, text: &str) -> Vec<Token> {
        self.stages
            .iter()
            .fold(tokenizer::tokenize(text), |tokens, stage| stage.apply(tokens))
    }

    pub fn process(&self, text: &str) -> Vec<String> {
        self.analyze(text).into_iter().map(|t| t.text).collect()
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(" -> "))
    }
}

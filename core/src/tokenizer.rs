use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Words longer than this are skipped; they still consume a position.
pub const MAX_TOKEN_CHARS: usize = 64;

lazy_static! {
    static ref SEPARATOR: Regex = Regex::new(r"[\s\-]+").expect("valid regex");
    static ref LEADING: Regex = Regex::new(r"^\W+").expect("valid regex");
    static ref TRAILING: Regex = Regex::new(r"\W+$").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// A normalized word and the ordinal position of the raw word it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub position: usize,
}

/// Raw words of `text` in order. Index `i` is the word at position `i` of [`tokenize`].
pub fn split_words(text: &str) -> Vec<&str> {
    SEPARATOR.split(text).filter(|w| !w.is_empty()).collect()
}

/// Split on whitespace and hyphens, then NFKC-normalize and lowercase each word.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for (position, word) in split_words(text).into_iter().enumerate() {
        let normalized = word.nfkc().collect::<String>().to_lowercase();
        if normalized.chars().count() > MAX_TOKEN_CHARS {
            continue;
        }
        tokens.push(Token { text: normalized, position });
    }
    tokens
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

pub fn trim(token: &str) -> String {
    let head = LEADING.replace(token, "");
    TRAILING.replace(&head, "").into_owned()
}

pub fn stem(token: &str) -> String {
    STEMMER.stem(token).into_owned()
}

/// Strip combining marks after canonical decomposition.
pub fn fold_diacritics(token: &str) -> String {
    token.nfd().filter(|c| !is_combining_mark(*c)).nfc().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace_and_hyphens() {
        let t = tokenize("Self-hosted  search\tengine");
        let words: Vec<&str> = t.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(words, vec!["self", "hosted", "search", "engine"]);
        assert_eq!(t[3].position, 3);
    }

    #[test]
    fn long_words_keep_their_position() {
        let long = "x".repeat(MAX_TOKEN_CHARS + 1);
        let t = tokenize(&format!("alpha {long} omega"));
        assert_eq!(t.len(), 2);
        assert_eq!(t[1].text, "omega");
        assert_eq!(t[1].position, 2);
    }

    #[test]
    fn trim_keeps_inner_punctuation() {
        assert_eq!(trim("\"documentation\""), "documentation");
        assert_eq!(trim("doesn't,"), "doesn't");
        assert_eq!(trim("..."), "");
    }

    #[test]
    fn basic_stem() {
        assert_eq!(stem("running"), "run");
    }
}

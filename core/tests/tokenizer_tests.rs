use bookdex::tokenizer::{split_words, tokenize};
use bookdex::{Pipeline, Stage};

#[test]
fn it_normalizes_and_stems() {
    let words = Pipeline::default().process("Running Runners RUN! The menu.");
    assert!(words.contains(&"run".to_string()));
    assert!(words.contains(&"menu".to_string()));
}

#[test]
fn it_filters_stopwords() {
    let words = Pipeline::default().process("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
    assert_eq!(words.len(), 5);
}

#[test]
fn it_folds_diacritics_when_configured() {
    let folding = Pipeline::new(vec![Stage::Trimmer, Stage::DiacriticFolder]);
    assert_eq!(folding.process("Café naïve"), vec!["cafe", "naive"]);
    assert_eq!(Pipeline::new(vec![Stage::Trimmer]).process("Café"), vec!["café"]);
}

#[test]
fn it_applies_nfkc() {
    let t = tokenize("ﬁle Ｆｕｌｌ");
    let words: Vec<&str> = t.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(words, vec!["file", "full"]);
}

#[test]
fn raw_words_line_up_with_positions() {
    let text = "Shell-Scripting: the  basics";
    let raw = split_words(text);
    for token in tokenize(text) {
        assert_eq!(raw[token.position].to_lowercase(), token.text);
    }
}

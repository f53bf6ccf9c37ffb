mod common;

use bookdex::{
    BoolMode, Document, Error, FieldConfig, IndexBuilder, IndexConfig, Pipeline, QueryOverrides, Stage,
};
use bookdex::query::{expansion_penalty, idf};
use common::{build, config, doc, ids, scenario};

#[test]
fn create_matches_only_the_first_document() {
    let index = scenario();
    let hits = index.search("create", None).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].doc_ref, "D1");
    assert!(hits[0].score > 0.0);
    assert!(hits[0].matched["body"].contains("creat"));
    assert!(hits[0].matched_terms.contains("creat"));
}

#[test]
fn stop_words_yield_nothing() {
    let index = scenario();
    assert!(index.search("to", None).unwrap().is_empty());
    assert!(index.search("the of to", None).unwrap().is_empty());
    assert!(index.search("", None).unwrap().is_empty());
    assert!(index.search("  !!! ", None).unwrap().is_empty());
}

#[test]
fn prefix_expands_to_indexed_token() {
    let index = scenario();
    assert_eq!(index.expand("prog", 10), vec!["progress"]);
    let hits = index.search("prog", None).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].doc_ref, "D2");
    assert!(hits[0].matched["title"].contains("progress"));

    let literal_only = QueryOverrides::default().expand(false);
    assert!(index.search("prog", Some(&literal_only)).unwrap().is_empty());
}

#[test]
fn unknown_terms_contribute_nothing() {
    let index = scenario();
    assert!(index.search("zebra", None).unwrap().is_empty());
    assert_eq!(ids(&index, "zebra create"), vec!["D1"]);
}

#[test]
fn empty_corpus_returns_empty_results() {
    let index = build(config(), &[]);
    assert!(index.search("anything", None).unwrap().is_empty());
}

#[test]
fn and_mode_requires_every_term() {
    let index = build(
        config(),
        &[
            doc("a", "Rust", "systems programming"),
            doc("b", "Rust", "web services"),
            doc("c", "Go", "systems programming"),
        ],
    );
    let or = ids(&index, "rust systems");
    assert_eq!(or.len(), 3);

    let and = QueryOverrides::default().mode(BoolMode::And);
    let hits = index.search("rust systems", Some(&and)).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].doc_ref, "a");
    assert!(hits.iter().all(|h| or.contains(&h.doc_ref)));

    assert!(index.search("rust zebra", Some(&and)).unwrap().is_empty());
}

#[test]
fn documents_matching_more_terms_rank_higher() {
    let index = build(
        config(),
        &[doc("a", "", "rust trie index"), doc("b", "", "rust trie"), doc("c", "", "rust")],
    );
    assert_eq!(ids(&index, "rust trie index"), vec!["a", "b", "c"]);
}

#[test]
fn title_boost_outranks_body() {
    let index = build(
        config(),
        &[doc("a", "Containers", "notes"), doc("b", "Notes", "containers")],
    );
    assert_eq!(ids(&index, "containers"), vec!["a", "b"]);

    let body_only = QueryOverrides::default().field("body", 1.0);
    let hits = index.search("containers", Some(&body_only)).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].doc_ref, "b");
}

#[test]
fn ties_break_by_document_id() {
    let index = build(
        config(),
        &[doc("c", "", "stage"), doc("a", "", "stage"), doc("b", "", "stage")],
    );
    let hits = index.search("stage", None).unwrap();
    assert_eq!(hits.iter().map(|h| h.doc_ref.as_str()).collect::<Vec<_>>(), vec!["a", "b", "c"]);
    assert!(hits.windows(2).all(|w| w[0].score == w[1].score));
}

#[test]
fn limit_keeps_the_best_hit() {
    let index = build(
        config(),
        &[
            doc("a", "", "shell notes"),
            doc("b", "Shell", "shell shell scripting"),
            doc("c", "", "shell scripting guide for shell users"),
        ],
    );
    let all = index.search("shell", None).unwrap();
    assert_eq!(all.len(), 3);

    let one = QueryOverrides::default().limit(1);
    let outcome = index.query("shell", Some(&one)).unwrap();
    assert_eq!(outcome.total_hits, 3);
    assert_eq!(outcome.hits.len(), 1);
    assert_eq!(outcome.hits[0], all[0]);
    assert_eq!(outcome.hits[0].doc_ref, "b");

    let none = QueryOverrides::default().limit(0);
    assert!(index.search("shell", Some(&none)).unwrap().is_empty());
}

#[test]
fn configured_limit_applies_by_default() {
    let mut cfg = config();
    cfg.results_options.limit_results = 2;
    let docs: Vec<Document> = (0..5).map(|i| doc(&format!("d{i}"), "", "stage")).collect();
    let index = build(cfg, &docs);
    assert_eq!(index.search("stage", None).unwrap().len(), 2);
}

#[test]
fn exact_match_beats_expansion() {
    let index = build(config(), &[doc("a", "", "main"), doc("b", "", "maintain")]);
    let hits = index.search("main", None).unwrap();
    assert_eq!(hits[0].doc_ref, "a");
    assert_eq!(hits.len(), 2);
}

#[test]
fn expansion_variants_do_not_multiply_count() {
    let mut cfg = config();
    cfg.pipeline = Pipeline::new(vec![Stage::Trimmer]);
    let index = build(cfg, &[doc("a", "", "stage stages staged")]);
    assert_eq!(index.expand("stage", 10), vec!["stage", "staged", "stages"]);

    let expanded = index.search("stage", None).unwrap();
    let exact = QueryOverrides::default().expand(false);
    let literal = index.search("stage", Some(&exact)).unwrap();
    assert!((literal[0].score - idf(1, 1) / 3f64.sqrt()).abs() < 1e-12);

    // "staged" and "stages" tie; the field norm leaves out the one literal "stage".
    let variant = idf(1, 1) * expansion_penalty("stage", "staged") / 2f64.sqrt();
    let best = variant.max(literal[0].score);
    assert!((expanded[0].score - best).abs() < 1e-12);
    assert!(expanded[0].score < literal[0].score + 2.0 * variant);
    assert_eq!(expanded[0].matched["body"].len(), 3);
}

#[test]
fn duplicate_query_terms_count_once() {
    let index = scenario();
    let once = index.search("create", None).unwrap();
    let twice = index.search("create create creating", None).unwrap();
    assert_eq!(once[0].score, twice[0].score);
}

#[test]
fn invalid_overrides_are_configuration_errors() {
    let index = scenario();
    let unknown = QueryOverrides::default().field("footer", 1.0);
    assert!(matches!(index.search("create", Some(&unknown)), Err(Error::Configuration(_))));
    let zero = QueryOverrides::default().field("body", 0.0);
    assert!(matches!(index.search("create", Some(&zero)), Err(Error::Configuration(_))));
}

#[test]
fn rarer_tokens_score_higher() {
    let index = build(
        config(),
        &[
            doc("a", "", "alpha beta"),
            doc("b", "", "alpha gamma"),
            doc("c", "", "alpha delta"),
        ],
    );
    let rare = index.search("beta", None).unwrap();
    let common = index.search("alpha", None).unwrap();
    let common_a = common.iter().find(|h| h.doc_ref == "a").unwrap();
    assert!(rare[0].score > common_a.score);
}

#[test]
fn more_occurrences_never_lower_the_score() {
    let score = |body: &str| {
        let index = build(config(), &[doc("a", "", body), doc("b", "", "unrelated text")]);
        index.search("stage", None).unwrap()[0].score
    };
    let once = score("stage one two three");
    let twice = score("stage stage two three");
    let thrice = score("stage stage stage three");
    assert!(twice >= once);
    assert!(thrice >= twice);
}

#[test]
fn literal_occurrences_do_not_dilute_expansions() {
    let body_only = IndexConfig::with_fields(vec![FieldConfig::new("body", 1.0)]);
    let score = |body: &str, overrides: &QueryOverrides| {
        let docs = [
            Document::new("a").with_field("body", body),
            Document::new("b").with_field("body", "unrelated text"),
        ];
        let index = build(body_only.clone(), &docs);
        index.search("main", Some(overrides)).unwrap()[0].score
    };
    let maintain = vec!["maintain"; 8].join(" ");
    let once = format!("main {maintain}");
    let twice = format!("main main {maintain}");
    for overrides in [QueryOverrides::default(), QueryOverrides::default().expand(false)] {
        let before = score(&once, &overrides);
        let after = score(&twice, &overrides);
        assert!(after >= before, "score fell from {before} to {after}");
    }
}

#[test]
fn add_then_remove_is_query_equivalent() {
    let mut builder = IndexBuilder::new(config()).unwrap();
    builder.add_document(&doc("D1", "Intro", "the use of skill")).unwrap();
    let before = builder.clone().freeze();

    builder.add_document(&doc("D2", "Progress", "develop skill to a higher stage")).unwrap();
    builder.remove_document("D2").unwrap();
    let after = builder.freeze();

    for q in ["skill", "stage", "prog", "intro", "use skill"] {
        assert_eq!(before.search(q, None).unwrap(), after.search(q, None).unwrap(), "query {q}");
    }

    let mut empty = IndexBuilder::new(config()).unwrap();
    empty.add_document(&doc("X", "Solo", "lonely words")).unwrap();
    empty.remove_document("X").unwrap();
    let empty = empty.freeze();
    assert!(empty.search("solo lonely", None).unwrap().is_empty());
    assert_eq!(empty.trie_node_count(), 1);
}

#[test]
fn frozen_index_is_shared_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<bookdex::Index>();

    let index = scenario();
    let expected = index.search("create prog", None).unwrap();
    let shared = &index;
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(move || shared.search("create prog", None).unwrap()))
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    });
}

#[test]
fn builder_rejects_invalid_configuration() {
    let cfg = IndexConfig::with_fields(vec![FieldConfig::new("title", -2.0)]);
    assert!(matches!(IndexBuilder::new(cfg), Err(Error::Configuration(_))));
}

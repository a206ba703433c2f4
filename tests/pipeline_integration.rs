//! End-to-end runs over a corpus on disk: tag, write back, read the tags
//! back out, and apply a review.

use std::fs;
use std::path::Path;

use tempfile::tempdir;
use texindex::{
    apply_judgment, build_indexes, collect_judge_items, harvest_lexicon, load_corpus,
    tag_census, tag_corpus, write_source, EntryKey, IndexType, IndexerConfig, JudgeItem,
    JudgeReport, Judgment, Lexicon, LexiconEntry, Mode, SourceDoc,
};

fn lexicon() -> Lexicon {
    Lexicon::from_entries(vec![
        LexiconEntry::new("vowel harmony", IndexType::Subject).with_hierarchy(["phonology"]),
        LexiconEntry::new("Turkish", IndexType::Lexical),
        LexiconEntry::new("Finnish", IndexType::Lexical),
    ])
    .unwrap()
}

fn config() -> IndexerConfig {
    let mut config = IndexerConfig::default();
    config.writer.mode = Mode::Auto;
    config
}

fn book(root: &Path) {
    fs::create_dir_all(root.join("chapters")).unwrap();
    fs::write(
        root.join("chapters/01-turkish.tex"),
        "\\chapter{Turkish}\nTurkish has vowel harmony.\n",
    )
    .unwrap();
    fs::write(
        root.join("chapters/02-finnish.tex"),
        "\\chapter{Finnish}\nFinnish also has vowel harmony.\n",
    )
    .unwrap();
    fs::write(root.join("chapters/notes.txt"), "vowel harmony").unwrap();
}

fn tag_and_write(root: &Path, judgment: Option<&JudgeReport>) -> usize {
    let corpus = load_corpus(root, &config().corpus).unwrap();
    let run = tag_corpus(&corpus, &lexicon(), &config(), judgment).unwrap();
    let mut written = 0;
    for (path, text) in run.changed() {
        write_source(path, text).unwrap();
        written += 1;
    }
    written
}

#[test]
fn tagging_writes_back_only_source_files() {
    let dir = tempdir().unwrap();
    book(dir.path());

    assert_eq!(tag_and_write(dir.path(), None), 2);
    let first = fs::read_to_string(dir.path().join("chapters/01-turkish.tex")).unwrap();
    assert_eq!(
        first,
        "\\chapter{Turkish}\nTurkish\\lindex{Turkish} has vowel harmony\\sindex{phonology!vowel harmony}.\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("chapters/notes.txt")).unwrap(),
        "vowel harmony"
    );

    // Already tagged: nothing left to write.
    assert_eq!(tag_and_write(dir.path(), None), 0);
}

#[test]
fn tags_read_back_as_census_lexicon_and_index_files() {
    let dir = tempdir().unwrap();
    book(dir.path());
    tag_and_write(dir.path(), None);
    let corpus = load_corpus(dir.path(), &config().corpus).unwrap();
    let registry = &config().markup;

    let census = tag_census(&corpus, registry);
    assert_eq!(census.total_tags, 4);
    assert_eq!(census.unique_entries, 3);
    assert!(census.failed.is_empty());

    let harvest = harvest_lexicon(&corpus, registry).unwrap();
    assert_eq!(harvest.lexicon.len(), 3);
    let harmony = harvest
        .lexicon
        .get(&EntryKey::new(IndexType::Subject, "vowel harmony"))
        .expect("subject entry harvested");
    assert_eq!(harmony.hierarchy, vec!["phonology".to_string()]);

    let build = build_indexes(&corpus, registry, "book");
    let out = dir.path().join("indexes");
    let written = build.write_to(&out, "book", "indexes.tex").unwrap();
    assert_eq!(written.len(), 3);
    assert!(out.join("book.sdx").exists());
    assert!(out.join("book.ldx").exists());
    assert!(!out.join("book.adx").exists());
    let subjects = fs::read_to_string(out.join("book.sdx")).unwrap();
    assert_eq!(subjects.matches("\\indexentry{phonology!vowel harmony}").count(), 2);
}

#[test]
fn dropped_tags_are_removed_and_stay_removed() {
    let dir = tempdir().unwrap();
    book(dir.path());
    tag_and_write(dir.path(), None);

    let corpus: Vec<SourceDoc> = load_corpus(dir.path(), &config().corpus).unwrap();
    let items: Vec<JudgeItem> = corpus
        .iter()
        .flat_map(|doc| {
            collect_judge_items(&doc.name(), &doc.text, &config().markup, 40).unwrap()
        })
        .collect();
    assert_eq!(items.len(), 4);
    let finnish = items
        .iter()
        .find(|item| item.tag == "\\lindex{Finnish}")
        .expect("Finnish tag collected");
    let report = JudgeReport {
        decisions: items
            .iter()
            .map(|item| Judgment {
                key: item.key(),
                keep: item.key() != finnish.key(),
                reason: String::new(),
            })
            .collect(),
        items: items.clone(),
        ..JudgeReport::default()
    };

    let summary = apply_judgment(&corpus, &report);
    assert_eq!(summary.removed(), 1);
    assert_eq!(summary.missing(), 0);
    assert!(summary.unknown_files.is_empty());
    for applied in &summary.documents {
        if applied.outcome.removed > 0 {
            write_source(&applied.path, &applied.outcome.text).unwrap();
        }
    }
    let second = fs::read_to_string(dir.path().join("chapters/02-finnish.tex")).unwrap();
    assert!(!second.contains("\\lindex{Finnish}"));

    // Re-tagging with the same review does not bring the tag back.
    assert_eq!(tag_and_write(dir.path(), Some(&report)), 0);
    // Without the review it would.
    assert_eq!(tag_and_write(dir.path(), None), 1);
}

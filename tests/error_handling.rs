use std::fs;

use tempfile::tempdir;
use texindex::{
    load_corpus, tag_corpus, ConfigLoadError, CorpusConfig, IndexType, IndexerConfig, Lexicon,
    LexiconEntry, LexiconError, MarkupError, Mode, PipelineError, SourceDoc, WriterError,
};

fn lexicon() -> Lexicon {
    Lexicon::from_entries(vec![LexiconEntry::new("morpheme", IndexType::Subject)]).unwrap()
}

fn auto() -> IndexerConfig {
    let mut config = IndexerConfig::default();
    config.writer.mode = Mode::Auto;
    config
}

#[test]
fn malformed_document_does_not_stop_the_corpus() {
    let sources = vec![
        SourceDoc::new("good.tex", "A morpheme.\n"),
        SourceDoc::new("bad.tex", "line one\n{ morpheme\n"),
        SourceDoc::new("also-good.tex", "Another morpheme.\n"),
    ];
    let run = tag_corpus(&sources, &lexicon(), &auto(), None).unwrap();

    assert!(matches!(
        run.documents[1].result,
        Err(texindex::DocumentFailure::Markup(MarkupError::MalformedStructure { .. }))
    ));
    assert_eq!(run.changed().count(), 2);
    assert_eq!(run.audit.summary.failed, 1);

    let failed: Vec<_> = run.audit.records_with_action("failed").collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].file, "bad.tex");
    assert!(failed[0].reason.contains("malformed structure"));
}

#[test]
fn invalid_writer_threshold_fails_the_run() {
    let mut config = auto();
    config.writer.safe_auto_insert = 1.5;
    let sources = vec![SourceDoc::new("ch.tex", "A morpheme.\n")];
    let result = tag_corpus(&sources, &lexicon(), &config, None);
    assert!(matches!(
        result,
        Err(PipelineError::Writer(WriterError::InvalidConfig(_)))
    ));
}

#[test]
fn invalid_reason_config_fails_the_run() {
    let mut config = auto();
    config.reason.min_range_size = 1;
    let sources = vec![SourceDoc::new("ch.tex", "A morpheme.\n")];
    let result = tag_corpus(&sources, &lexicon(), &config, None);
    assert!(matches!(result, Err(PipelineError::Reason(_))));
}

#[test]
fn config_errors_are_typed() {
    assert!(matches!(
        IndexerConfig::from_yaml("version: \"9.9\"\n"),
        Err(ConfigLoadError::UnsupportedVersion(_))
    ));
    assert!(matches!(
        IndexerConfig::from_yaml("version: [unterminated\n"),
        Err(ConfigLoadError::YamlParse(_))
    ));
    assert!(matches!(
        IndexerConfig::from_file("/definitely/not/here.yaml"),
        Err(ConfigLoadError::FileRead(_))
    ));
    let empty_extensions = "version: \"1.0\"\ncorpus:\n  extensions: []\n";
    assert!(matches!(
        IndexerConfig::from_yaml(empty_extensions),
        Err(ConfigLoadError::Validation(_))
    ));
}

#[test]
fn lexicon_errors_are_typed() {
    let duplicate = Lexicon::from_entries(vec![
        LexiconEntry::new("Clitic", IndexType::Subject),
        LexiconEntry::new("clitic", IndexType::Subject),
    ]);
    assert!(matches!(
        duplicate,
        Err(LexiconError::DuplicateLabel { index_type: IndexType::Subject, .. })
    ));

    let empty = Lexicon::from_entries(vec![LexiconEntry::new("  ", IndexType::Name)]);
    assert_eq!(empty.unwrap_err(), LexiconError::EmptyLabel { index: 0 });

    let dir = tempdir().unwrap();
    let missing = Lexicon::from_file(dir.path().join("lexicon.yaml"));
    assert!(matches!(missing, Err(LexiconError::Io { .. })));

    let path = dir.path().join("broken.yaml");
    fs::write(&path, "entries: {not: [a, list\n").unwrap();
    assert!(matches!(Lexicon::from_file(&path), Err(LexiconError::Parse(_))));
}

#[test]
fn same_label_in_different_indexes_is_allowed() {
    let lexicon = Lexicon::from_entries(vec![
        LexiconEntry::new("Turkish", IndexType::Lexical),
        LexiconEntry::new("Turkish", IndexType::Subject),
    ]);
    assert_eq!(lexicon.unwrap().len(), 2);
}

#[test]
fn ambiguous_synonym_is_reported_not_tagged() {
    let lexicon = Lexicon::from_entries(vec![
        LexiconEntry::new("morphological root", IndexType::Subject).with_synonyms(["root"]),
        LexiconEntry::new("square root", IndexType::Subject).with_synonyms(["root"]),
    ])
    .unwrap();
    let sources = vec![SourceDoc::new("ch.tex", "Every root matters here.\n")];
    let run = tag_corpus(&sources, &lexicon, &auto(), None).unwrap();

    assert_eq!(run.changed().count(), 0);
    let notes: Vec<_> = run.audit.records_with_action("ambiguous").collect();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].phrase, "root");
    assert!(notes[0].reason.contains("morphological root"));
    assert!(notes[0].reason.contains("square root"));
}

#[test]
fn missing_corpus_root_is_an_io_error() {
    let dir = tempdir().unwrap();
    let err = load_corpus(&dir.path().join("chapters"), &CorpusConfig::default()).unwrap_err();
    match err {
        PipelineError::Io { path, .. } => assert!(path.ends_with("chapters")),
        other => panic!("expected io error, got {other}"),
    }
}

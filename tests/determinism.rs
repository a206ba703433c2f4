//! Determinism, idempotence and non-destructiveness over a small book.

use std::collections::BTreeSet;

use texindex::{
    strip_tags, tag_corpus, IndexType, IndexerConfig, Lexicon, LexiconEntry, Mode, SourceDoc,
    TagRun,
};

const CHAPTER_ONE: &str = r"\chapter{Sound systems}
\section{Harmony}
Vowel harmony is a process in which vowels agree. In Turkish, \emph{vowel harmony}
spreads backness. We return to vowel harmony below.

\begin{equation}
v = \text{vowel harmony}
\end{equation}

Some speakers of Finnish show vowel harmony too.
% vowel harmony in a comment
\section{Consonants}
Lenition is common. See \cite{lenition-survey} for lenition.
";

const CHAPTER_TWO: &str = r"\chapter{Syntax}
A clitic\sindex{clitic} attaches to a host. Clitics are prosodically weak.
\begin{verbatim}
clitic clitic clitic
\end{verbatim}
The FDM is not a syntactic notion. Noam Chomsky discussed the finite
difference method only in passing.
";

fn lexicon() -> Lexicon {
    Lexicon::from_entries(vec![
        LexiconEntry::new("vowel harmony", IndexType::Subject).with_hierarchy(["phonology"]),
        LexiconEntry::new("lenition", IndexType::Subject),
        LexiconEntry::new("clitic", IndexType::Subject).with_synonyms(["clitics"]),
        LexiconEntry::new("finite difference method", IndexType::Subject),
        LexiconEntry::new("FDM", IndexType::Subject).with_see("finite difference method"),
        LexiconEntry::new("Turkish", IndexType::Lexical),
        LexiconEntry::new("Finnish", IndexType::Lexical).with_see_also("Estonian"),
    ])
    .expect("lexicon")
}

fn corpus(texts: &[&str]) -> Vec<SourceDoc> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| SourceDoc::new(format!("ch{i}.tex"), *text))
        .collect()
}

fn auto() -> IndexerConfig {
    let mut config = IndexerConfig::default();
    config.writer.mode = Mode::Auto;
    config
}

fn texts(run: &TagRun) -> Vec<String> {
    run.documents
        .iter()
        .map(|d| d.result.as_ref().expect("document written").text.clone())
        .collect()
}

#[test]
fn identical_inputs_give_identical_runs() {
    let sources = corpus(&[CHAPTER_ONE, CHAPTER_TWO]);
    let first = tag_corpus(&sources, &lexicon(), &auto(), None).unwrap();
    let second = tag_corpus(&sources, &lexicon(), &auto(), None).unwrap();
    assert_eq!(texts(&first), texts(&second));
    assert_eq!(first.plan, second.plan);
    assert_eq!(first.audit, second.audit);
    assert_eq!(
        first.audit.to_json().unwrap(),
        second.audit.to_json().unwrap()
    );
}

#[test]
fn thread_count_does_not_change_the_result() {
    let sources = corpus(&[CHAPTER_ONE, CHAPTER_TWO, CHAPTER_ONE, CHAPTER_TWO]);
    let serial = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .unwrap()
        .install(|| tag_corpus(&sources, &lexicon(), &auto(), None).unwrap());
    let parallel = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .unwrap()
        .install(|| tag_corpus(&sources, &lexicon(), &auto(), None).unwrap());
    assert_eq!(texts(&serial), texts(&parallel));
    assert_eq!(serial.audit, parallel.audit);
}

#[test]
fn second_run_over_output_is_a_no_op() {
    let sources = corpus(&[CHAPTER_ONE, CHAPTER_TWO]);
    let first = tag_corpus(&sources, &lexicon(), &auto(), None).unwrap();
    assert!(first.changed().count() > 0);

    let tagged: Vec<SourceDoc> = sources
        .iter()
        .zip(texts(&first))
        .map(|(doc, text)| SourceDoc::new(doc.path.clone(), text))
        .collect();
    let second = tag_corpus(&tagged, &lexicon(), &auto(), None).unwrap();
    assert_eq!(second.changed().count(), 0);
    assert_eq!(texts(&second), texts(&first));
    assert_eq!(second.audit.summary.actions.get("inserted"), None);
}

#[test]
fn stripping_tagged_output_restores_tag_free_input() {
    let clean = CHAPTER_ONE;
    let sources = corpus(&[clean]);
    let run = tag_corpus(&sources, &lexicon(), &auto(), None).unwrap();
    let tagged = &texts(&run)[0];
    assert_ne!(tagged, clean);
    let stripped = strip_tags(tagged, &texindex::SkipRegistry::default()).unwrap();
    assert_eq!(stripped.text, clean);
    assert_eq!(stripped.removed, run.documents[0].result.as_ref().unwrap().inserted);
}

#[test]
fn excluded_regions_stay_byte_identical() {
    let sources = corpus(&[CHAPTER_ONE, CHAPTER_TWO]);
    let run = tag_corpus(&sources, &lexicon(), &auto(), None).unwrap();
    let out = texts(&run);
    for protected in [
        "\\begin{equation}\nv = \\text{vowel harmony}\n\\end{equation}",
        "% vowel harmony in a comment\n",
        "\\cite{lenition-survey}",
        "\\section{Harmony}\n",
    ] {
        assert!(out[0].contains(protected), "{protected:?} altered");
    }
    assert!(out[1].contains("\\begin{verbatim}\nclitic clitic clitic\n\\end{verbatim}"));
}

#[test]
fn no_duplicate_tags_at_one_point() {
    let sources = corpus(&[CHAPTER_ONE, CHAPTER_TWO]);
    let run = tag_corpus(&sources, &lexicon(), &auto(), None).unwrap();
    let mut seen = BTreeSet::new();
    for tag in &run.plan.tags {
        let key = (
            tag.doc,
            tag.offset,
            tag.tag.render(texindex::CommandSet::Typed),
        );
        assert!(seen.insert(key), "duplicate tag {:?}", tag.tag);
    }
}

#[test]
fn see_target_tags_once_per_corpus() {
    let sources = corpus(&[CHAPTER_TWO, CHAPTER_TWO]);
    let run = tag_corpus(&sources, &lexicon(), &auto(), None).unwrap();
    let see_tags: usize = texts(&run)
        .iter()
        .map(|t| t.matches("\\sindex{FDM|see{finite difference method}}").count())
        .sum();
    assert_eq!(see_tags, 1);
    assert!(texts(&run).iter().all(|t| !t.contains("\\sindex{FDM}")));
}

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use texindex::{
    run_phase1, strip_tags, tag_corpus, IndexType, IndexerConfig, Lexicon, LexiconEntry, Mode,
    SkipRegistry, SourceDoc,
};

const PARAGRAPH: &str = "Vowel harmony in Turkish spreads backness from the root. \
A clitic attaches to its host, and the finite difference method (FDM) \
is cited by Noam Chomsky only in passing. See \\cite{survey} for lenition.\n\n";

const MATH: &str = "\\begin{equation}\nv = \\text{vowel harmony}\n\\end{equation}\n\n";

fn lexicon() -> Lexicon {
    Lexicon::from_entries(vec![
        LexiconEntry::new("vowel harmony", IndexType::Subject).with_hierarchy(["phonology"]),
        LexiconEntry::new("clitic", IndexType::Subject).with_synonyms(["clitics"]),
        LexiconEntry::new("lenition", IndexType::Subject),
        LexiconEntry::new("finite difference method", IndexType::Subject),
        LexiconEntry::new("FDM", IndexType::Subject).with_see("finite difference method"),
        LexiconEntry::new("Turkish", IndexType::Lexical),
        LexiconEntry::new("Noam Chomsky", IndexType::Name),
    ])
    .expect("bench lexicon")
}

fn chapter(n: usize, sections: usize) -> String {
    let mut text = format!("\\chapter{{Chapter {n}}}\n");
    for s in 0..sections {
        text.push_str(&format!("\\section{{Part {s}}}\n"));
        for p in 0..8 {
            text.push_str(PARAGRAPH);
            if p % 3 == 0 {
                text.push_str(MATH);
            }
        }
    }
    text
}

fn corpus(chapters: usize) -> Vec<SourceDoc> {
    (0..chapters)
        .map(|n| SourceDoc::new(format!("ch{n:02}.tex"), chapter(n, 6)))
        .collect()
}

fn auto() -> IndexerConfig {
    let mut config = IndexerConfig::default();
    config.writer.mode = Mode::Auto;
    config
}

fn phase1_bench(c: &mut Criterion) {
    let sources = corpus(12);
    let lexicon = lexicon();
    let config = auto();
    c.bench_function("phase1_twelve_chapters", |b| {
        b.iter(|| {
            let snapshot = run_phase1(black_box(&sources), &lexicon, &config).expect("phase 1");
            black_box(snapshot);
        });
    });
}

fn pipeline_bench(c: &mut Criterion) {
    let sources = corpus(12);
    let lexicon = lexicon();
    let config = auto();
    c.bench_function("tag_corpus_twelve_chapters", |b| {
        b.iter(|| {
            let run = tag_corpus(black_box(&sources), &lexicon, &config, None).expect("tag run");
            black_box(run);
        });
    });
}

fn strip_bench(c: &mut Criterion) {
    let sources = corpus(1);
    let run = tag_corpus(&sources, &lexicon(), &auto(), None).expect("tag run");
    let tagged = run
        .changed()
        .next()
        .map(|(_, text)| text.to_owned())
        .expect("chapter tagged");
    let registry = SkipRegistry::default();
    c.bench_function("strip_tagged_chapter", |b| {
        b.iter(|| {
            let outcome = strip_tags(black_box(&tagged), &registry).expect("strip");
            black_box(outcome);
        });
    });
}

criterion_group!(pipeline_benches, phase1_bench, pipeline_bench, strip_bench);
criterion_main!(pipeline_benches);

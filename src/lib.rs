//! Workspace umbrella crate for texindex.
//!
//! This crate stitches the stage crates (markup, lexicon, detect, reason,
//! writer, assist) into one tagging pipeline over a corpus of LaTeX chapter
//! files, and adds what only makes sense at corpus level: YAML
//! configuration, corpus loading, the audit report, lexicon harvesting,
//! index-file emission and applying reviewer output.
//!
//! ```no_run
//! use std::path::Path;
//! use texindex::{load_corpus, tag_corpus, IndexerConfig, Lexicon};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = IndexerConfig::from_file("texindex.yaml")?;
//! let lexicon = Lexicon::from_file("lexicon.yaml")?;
//! let corpus = load_corpus(Path::new("chapters"), &config.corpus)?;
//! let run = tag_corpus(&corpus, &lexicon, &config, None)?;
//! for (path, text) in run.changed() {
//!     std::fs::write(path, text)?;
//! }
//! println!("{}", run.audit.render_text());
//! # Ok(())
//! # }
//! ```

mod audit;
mod config;
mod corpus;
mod error;
mod harvest;
mod indexes;
mod metrics;
mod pipeline;
mod review;

pub use crate::audit::{AuditRecord, AuditReport, AuditSummary};
pub use crate::config::{ConfigLoadError, CorpusConfig, IndexerConfig};
pub use crate::corpus::{discover, load_corpus, write_source, SourceDoc};
pub use crate::error::{DocumentFailure, PipelineError};
pub use crate::harvest::{harvest_lexicon, tag_census, FileCensus, Harvest, TagCensus};
pub use crate::indexes::{build_indexes, IndexBuild};
pub use crate::metrics::{set_pipeline_metrics, PipelineMetrics};
pub use crate::pipeline::{
    run_phase1, run_phase2, suppressed_by_judgment, tag_corpus, AnalyzedDocument, DocumentOutput,
    DocumentState, Phase1Snapshot, TagRun,
};
pub use crate::review::{
    apply_judgment, apply_report, judgment_removals, render_suggestion_diff, JudgmentApplied,
    JudgmentSummary,
};

pub use assist::{
    build_provider, collect_judge_items, judge, suggest, suggestion_items, AssistConfig,
    JudgeItem, JudgeReport, Judgment, LexiconSuggestion, Provider, ProviderError, ProviderKind,
    RetryConfig, SuggestionReport,
};
pub use detect::{DetectConfig, Occurrence, OccurrenceId};
pub use lexicon::{EntryKey, IndexType, Lexicon, LexiconEntry, LexiconError, Origin};
pub use markup::{CommandSet, MarkupError, SkipRegistry, UnknownMacros};
pub use reason::{Decision, DecisionKind, PlannedTag, ReasonConfig, TagPlan};
pub use writer::{
    strip_tags, Mode, StripOutcome, WriteAction, WriteOutcome, WriterConfig, WriterError,
};

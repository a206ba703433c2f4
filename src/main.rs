//! texindex - index tagging for LaTeX books
//!
//! Thin command-line front end over the `texindex` library: every
//! subcommand loads files, calls one library operation and writes the
//! result back.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use texindex::{
    apply_judgment, apply_report, build_indexes, build_provider, collect_judge_items,
    harvest_lexicon, judge, load_corpus, render_suggestion_diff, strip_tags, suggest,
    suggestion_items, tag_census, tag_corpus, write_source, CommandSet, IndexerConfig,
    JudgeReport, Lexicon, Mode, ProviderKind, SourceDoc, SuggestionReport,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "texindex")]
#[command(about = "Insert and review semantic index tags in LaTeX sources", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pipeline configuration (YAML)
    #[arg(short, long, global = true, env = "TEXINDEX_CONFIG")]
    config: Option<PathBuf>,

    /// Log level, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Descend into hidden directories
    #[arg(long, global = true)]
    include_hidden: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum CommandSetArg {
    Typed,
    Langsci,
}

impl From<CommandSetArg> for CommandSet {
    fn from(value: CommandSetArg) -> Self {
        match value {
            CommandSetArg::Typed => CommandSet::Typed,
            CommandSetArg::Langsci => CommandSet::Langsci,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Plan and insert index tags
    Tag {
        /// Chapter directory or single file
        path: PathBuf,

        #[arg(short, long, default_value = "lexicon.yaml")]
        lexicon: PathBuf,

        /// guide, assist or auto
        #[arg(short, long)]
        mode: Option<Mode>,

        #[arg(long, value_enum)]
        command_set: Option<CommandSetArg>,

        /// Judgment report whose dropped tags must not come back
        #[arg(long)]
        judgment: Option<PathBuf>,

        /// Write the audit report as JSON
        #[arg(long)]
        audit: Option<PathBuf>,

        /// Print the audit report
        #[arg(long)]
        verbose: bool,

        /// Save the lexicon with synthesized entries promoted
        #[arg(long)]
        promote_to: Option<PathBuf>,

        /// Plan and report without touching any file
        #[arg(long)]
        dry_run: bool,
    },

    /// Build a lexicon from the tags already in a corpus
    Scan {
        path: PathBuf,

        #[arg(short, long, default_value = "lexicon.yaml")]
        output: PathBuf,
    },

    /// Count the tags already in a corpus
    Census {
        path: PathBuf,

        /// Entries listed per type and file
        #[arg(long, default_value = "5")]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Remove every index tag
    Strip {
        path: PathBuf,

        #[arg(short, long)]
        verbose: bool,

        #[arg(long)]
        dry_run: bool,
    },

    /// Write makeindex input and an indexes-only TeX file
    BuildIdx {
        path: PathBuf,

        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        #[arg(long, default_value = "main")]
        prefix: String,

        #[arg(long, default_value = "indexes_only.tex")]
        tex: String,
    },

    /// Ask a language model for lexicon improvements
    Assist {
        path: PathBuf,

        #[arg(short, long, default_value = "lexicon.yaml")]
        lexicon: PathBuf,

        #[arg(short, long, default_value = "llm_report.json")]
        report: PathBuf,

        /// Apply the suggestions to the lexicon when done
        #[arg(long)]
        apply: bool,

        /// Continue from an existing report
        #[arg(long)]
        resume: bool,

        #[command(flatten)]
        provider: ProviderArgs,
    },

    /// Apply a saved suggestion report to the lexicon
    ApplyReport {
        report: PathBuf,

        #[arg(short, long, default_value = "lexicon.yaml")]
        lexicon: PathBuf,

        /// Also write the applied changes as JSON
        #[arg(long)]
        applied: Option<PathBuf>,
    },

    /// Ask a language model to keep or drop existing tags
    Judge {
        path: PathBuf,

        #[arg(short, long, default_value = "llm_judgment.json")]
        report: PathBuf,

        #[arg(long)]
        resume: bool,

        #[command(flatten)]
        provider: ProviderArgs,
    },

    /// Remove the tags a judgment report dropped
    ApplyJudgment {
        report: PathBuf,

        /// Corpus root the judgment ran over
        path: PathBuf,

        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(clap::Args)]
struct ProviderArgs {
    /// openai, anthropic or command
    #[arg(long)]
    provider: Option<ProviderKind>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    base_url: Option<String>,

    /// Shell command for the command provider
    #[arg(long = "llm-command")]
    command: Option<String>,

    #[arg(long)]
    chunk_size: Option<usize>,

    #[arg(long)]
    max_concurrency: Option<usize>,
}

impl ProviderArgs {
    fn apply(&self, config: &mut IndexerConfig) {
        let assist = &mut config.assist;
        if let Some(provider) = self.provider {
            assist.provider = provider;
        }
        if let Some(model) = &self.model {
            assist.model = Some(model.clone());
        }
        if let Some(url) = &self.base_url {
            assist.base_url = Some(url.clone());
        }
        if let Some(command) = &self.command {
            assist.command = Some(command.clone());
        }
        if let Some(size) = self.chunk_size {
            assist.chunk_size = size;
            assist.judge_chunk_size = size;
        }
        if let Some(limit) = self.max_concurrency {
            assist.max_concurrency = limit;
        }
    }
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>, include_hidden: bool) -> Result<IndexerConfig> {
    let mut config = match path {
        Some(path) => IndexerConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => IndexerConfig::default(),
    };
    config.corpus.include_hidden |= include_hidden;
    Ok(config)
}

fn load_lexicon(path: &Path) -> Result<Lexicon> {
    Lexicon::from_file(path).with_context(|| format!("loading lexicon {}", path.display()))
}

fn write_back(docs: impl IntoIterator<Item = (PathBuf, String)>, dry_run: bool) -> Result<usize> {
    let mut written = 0;
    for (path, text) in docs {
        if !dry_run {
            write_source(&path, &text)?;
        }
        written += 1;
    }
    Ok(written)
}

#[allow(clippy::too_many_arguments)]
fn cmd_tag(
    config: &mut IndexerConfig,
    path: &Path,
    lexicon_path: &Path,
    mode: Option<Mode>,
    command_set: Option<CommandSetArg>,
    judgment: Option<&Path>,
    audit: Option<&Path>,
    verbose: bool,
    promote_to: Option<&Path>,
    dry_run: bool,
) -> Result<()> {
    if let Some(mode) = mode {
        config.writer.mode = mode;
    }
    if let Some(set) = command_set {
        config.writer.command_set = set.into();
    }
    config.validate()?;

    let lexicon = load_lexicon(lexicon_path)?;
    let corpus = load_corpus(path, &config.corpus)?;
    let judgment = judgment.map(JudgeReport::load).transpose()?;
    let run = tag_corpus(&corpus, &lexicon, config, judgment.as_ref())?;

    let changed: Vec<(PathBuf, String)> = run
        .changed()
        .map(|(path, text)| (path.to_path_buf(), text.to_owned()))
        .collect();
    let written = write_back(changed, dry_run)?;

    if let Some(audit) = audit {
        fs::write(audit, run.audit.to_json()?)
            .with_context(|| format!("writing audit {}", audit.display()))?;
    }
    if verbose {
        print!("{}", run.audit.render_text());
    }
    if let Some(target) = promote_to {
        let promotion = run.snapshot.lexicon.promote(None)?;
        promotion.lexicon.save(target)?;
        println!(
            "Promoted {} synthesized entries into {}",
            promotion.promoted.len(),
            target.display()
        );
    }

    let summary = &run.audit.summary;
    println!(
        "{} {} of {} files ({} tags planned, {} conflicts, {} failed, mode {})",
        if dry_run { "Would change" } else { "Changed" },
        written,
        summary.documents,
        summary.planned,
        summary.conflicts,
        summary.failed,
        config.writer.mode.as_str()
    );
    Ok(())
}

fn cmd_strip(config: &IndexerConfig, path: &Path, verbose: bool, dry_run: bool) -> Result<()> {
    let corpus = load_corpus(path, &config.corpus)?;
    let mut total = 0;
    let mut changed = Vec::new();
    for doc in &corpus {
        match strip_tags(&doc.text, &config.markup) {
            Ok(outcome) if outcome.removed > 0 => {
                total += outcome.removed;
                if verbose {
                    println!("  {}: {}", doc.name(), outcome.removed);
                }
                changed.push((doc.path.clone(), outcome.text));
            }
            Ok(_) => {}
            Err(err) => warn!(document = %doc.name(), error = %err, "not stripped"),
        }
    }
    let files = write_back(changed, dry_run)?;
    println!("Stripped {total} tags from {files} files");
    Ok(())
}

async fn cmd_assist(
    config: &IndexerConfig,
    path: &Path,
    lexicon_path: &Path,
    report_path: &Path,
    apply: bool,
    resume: bool,
) -> Result<()> {
    let lexicon = load_lexicon(lexicon_path)?;
    if lexicon.is_empty() {
        bail!("no entries in lexicon {}", lexicon_path.display());
    }
    let corpus = load_corpus(path, &config.corpus)?;
    let texts: Vec<&str> = corpus.iter().map(|d| d.text.as_str()).collect();
    let items = suggestion_items(&lexicon, &texts, &config.assist);
    let previous = if resume && report_path.exists() {
        Some(SuggestionReport::load(report_path)?)
    } else {
        None
    };

    let provider = build_provider(&config.assist)?;
    info!(provider = provider.name(), entries = items.len(), "requesting suggestions");
    let report = suggest(
        provider.as_ref(),
        &config.assist,
        items,
        previous,
        Some(report_path),
    )
    .await?;
    report.save(report_path)?;
    println!(
        "{} suggestions, {} unresolved, report in {}",
        report.suggestions.len(),
        report.unresolved.len(),
        report_path.display()
    );

    if apply {
        let outcome = apply_report(&lexicon, &report)?;
        outcome.lexicon.save(lexicon_path)?;
        print!("{}", render_suggestion_diff(&outcome));
        println!("Applied {} updates", outcome.applied.len());
    }
    Ok(())
}

fn cmd_apply_report(report_path: &Path, lexicon_path: &Path, applied: Option<&Path>) -> Result<()> {
    let report = SuggestionReport::load(report_path)?;
    let lexicon = load_lexicon(lexicon_path)?;
    let outcome = apply_report(&lexicon, &report)?;
    outcome.lexicon.save(lexicon_path)?;
    if let Some(path) = applied {
        let json = serde_json::to_string_pretty(&outcome.applied)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    }
    print!("{}", render_suggestion_diff(&outcome));
    println!("Applied {} updates", outcome.applied.len());
    Ok(())
}

async fn cmd_judge(
    config: &IndexerConfig,
    path: &Path,
    report_path: &Path,
    resume: bool,
) -> Result<()> {
    let corpus = load_corpus(path, &config.corpus)?;
    let mut items = Vec::new();
    for doc in &corpus {
        match collect_judge_items(
            &doc.name(),
            &doc.text,
            &config.markup,
            config.assist.judge_context_window,
        ) {
            Ok(found) => items.extend(found),
            Err(err) => warn!(document = %doc.name(), error = %err, "tags not collected"),
        }
    }
    if items.is_empty() {
        println!("No index tags found.");
        return Ok(());
    }
    let previous = if resume && report_path.exists() {
        Some(JudgeReport::load(report_path)?)
    } else {
        None
    };

    let provider = build_provider(&config.assist)?;
    info!(provider = provider.name(), tags = items.len(), "requesting judgments");
    let report = judge(
        provider.as_ref(),
        &config.assist,
        items,
        previous,
        Some(report_path),
    )
    .await?;
    report.save(report_path)?;
    println!(
        "{} decisions ({} drop), {} unresolved, report in {}",
        report.decisions.len(),
        report.dropped().len(),
        report.unresolved.len(),
        report_path.display()
    );
    Ok(())
}

fn cmd_apply_judgment(
    config: &IndexerConfig,
    report_path: &Path,
    path: &Path,
    dry_run: bool,
) -> Result<()> {
    let report = JudgeReport::load(report_path)?;
    let corpus: Vec<SourceDoc> = load_corpus(path, &config.corpus)?;
    let summary = apply_judgment(&corpus, &report);
    for file in &summary.unknown_files {
        warn!(file = %file, "judged file is not in the corpus");
    }
    let changed = summary
        .documents
        .iter()
        .filter(|d| d.outcome.removed > 0)
        .map(|d| (d.path.clone(), d.outcome.text.clone()));
    let files = write_back(changed, dry_run)?;
    println!(
        "Removed {} tags from {} files ({} not found)",
        summary.removed(),
        files,
        summary.missing()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);
    let mut config = load_config(cli.config.as_deref(), cli.include_hidden)?;

    match cli.command {
        Commands::Tag {
            path,
            lexicon,
            mode,
            command_set,
            judgment,
            audit,
            verbose,
            promote_to,
            dry_run,
        } => cmd_tag(
            &mut config,
            &path,
            &lexicon,
            mode,
            command_set,
            judgment.as_deref(),
            audit.as_deref(),
            verbose,
            promote_to.as_deref(),
            dry_run,
        )?,
        Commands::Scan { path, output } => {
            let corpus = load_corpus(&path, &config.corpus)?;
            let harvest = harvest_lexicon(&corpus, &config.markup)?;
            harvest.lexicon.save(&output)?;
            println!(
                "Scanned {} unique entries from {}",
                harvest.lexicon.len(),
                path.display()
            );
            for index_type in texindex::IndexType::ALL {
                let count = harvest
                    .lexicon
                    .entries()
                    .iter()
                    .filter(|e| e.index_type == index_type)
                    .count();
                if count > 0 {
                    println!("  {index_type}: {count}");
                }
            }
            println!("Lexicon saved to {}", output.display());
        }
        Commands::Census { path, limit, json } => {
            let corpus = load_corpus(&path, &config.corpus)?;
            let census = tag_census(&corpus, &config.markup);
            if json {
                println!("{}", serde_json::to_string_pretty(&census)?);
            } else {
                print!("{}", census.render_text(limit));
            }
        }
        Commands::Strip {
            path,
            verbose,
            dry_run,
        } => cmd_strip(&config, &path, verbose, dry_run)?,
        Commands::BuildIdx {
            path,
            output_dir,
            prefix,
            tex,
        } => {
            let corpus = load_corpus(&path, &config.corpus)?;
            let build = build_indexes(&corpus, &config.markup, &prefix);
            let written = build.write_to(&output_dir, &prefix, &tex)?;
            for file in &written {
                println!("Wrote {}", file.display());
            }
        }
        Commands::Assist {
            path,
            lexicon,
            report,
            apply,
            resume,
            provider,
        } => {
            provider.apply(&mut config);
            config.validate()?;
            cmd_assist(&config, &path, &lexicon, &report, apply, resume).await?;
        }
        Commands::ApplyReport {
            report,
            lexicon,
            applied,
        } => cmd_apply_report(&report, &lexicon, applied.as_deref())?,
        Commands::Judge {
            path,
            report,
            resume,
            provider,
        } => {
            provider.apply(&mut config);
            config.validate()?;
            cmd_judge(&config, &path, &report, resume).await?;
        }
        Commands::ApplyJudgment {
            report,
            path,
            dry_run,
        } => cmd_apply_judgment(&config, &report, &path, dry_run)?,
    }
    Ok(())
}

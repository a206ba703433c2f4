//! Loading and writing back the chapter files of a book.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::CorpusConfig;
use crate::error::PipelineError;

/// One document of the corpus, held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDoc {
    /// Path as reached from the corpus root; also the name used in reports.
    pub path: PathBuf,
    pub text: String,
}

impl SourceDoc {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    pub fn name(&self) -> String {
        self.path.display().to_string()
    }
}

fn io_error(path: &Path, error: std::io::Error) -> PipelineError {
    PipelineError::Io {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}

fn wanted(path: &Path, config: &CorpusConfig) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| config.extensions.iter().any(|w| w.trim_start_matches('.') == ext))
}

fn walk(dir: &Path, config: &CorpusConfig, out: &mut Vec<PathBuf>) -> Result<(), PipelineError> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| io_error(dir, e))?
        .map(|entry| entry.map(|e| e.path()).map_err(|e| io_error(dir, e)))
        .collect::<Result<_, _>>()?;
    entries.sort();
    for path in entries {
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if path.is_dir() {
            if !hidden || config.include_hidden {
                walk(&path, config, out)?;
            }
        } else if wanted(&path, config) {
            out.push(path);
        }
    }
    Ok(())
}

/// Source files under `root` in path order. A file `root` is returned as is.
pub fn discover(root: &Path, config: &CorpusConfig) -> Result<Vec<PathBuf>, PipelineError> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let mut files = Vec::new();
    walk(root, config, &mut files)?;
    debug!(root = %root.display(), files = files.len(), "corpus discovered");
    Ok(files)
}

/// Read every source file under `root`.
pub fn load_corpus(root: &Path, config: &CorpusConfig) -> Result<Vec<SourceDoc>, PipelineError> {
    discover(root, config)?
        .into_iter()
        .map(|path| {
            let text = fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
            Ok(SourceDoc { path, text })
        })
        .collect()
}

/// Overwrite a document on disk.
pub fn write_source(path: &Path, text: &str) -> Result<(), PipelineError> {
    fs::write(path, text).map_err(|e| io_error(path, e))
}

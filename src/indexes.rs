//! Index files for a whole corpus, paged by source line.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use markup::{classify, parse, IndexType, MarkupError, Outline, SkipRegistry};
use rayon::prelude::*;
use tracing::{info, warn};
use writer::{collect_idx_entries, idx_extension, render_idx, render_preview_tex, IdxEntry};

use crate::corpus::SourceDoc;
use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq)]
pub struct IndexBuild {
    /// `.idx` body per index type that has at least one entry.
    pub bodies: BTreeMap<IndexType, String>,
    pub preview: String,
    pub failed: Vec<(String, MarkupError)>,
}

/// Collect every tag of the corpus, documents in order, into makeindex
/// input. `prefix` is the basename the preview document inputs.
pub fn build_indexes(
    sources: &[SourceDoc],
    registry: &SkipRegistry,
    prefix: &str,
) -> IndexBuild {
    let per_doc: Vec<(String, Result<Vec<IdxEntry>, MarkupError>)> = sources
        .par_iter()
        .map(|source| {
            let entries = parse(&source.text, registry)
                .map(|doc| collect_idx_entries(&classify(&doc), &Outline::build(&doc)));
            (source.name(), entries)
        })
        .collect();

    let mut entries = Vec::new();
    let mut failed = Vec::new();
    for (name, result) in per_doc {
        match result {
            Ok(doc_entries) => entries.extend(doc_entries),
            Err(err) => {
                warn!(document = %name, error = %err, "no index entries taken");
                failed.push((name, err));
            }
        }
    }

    let bodies = render_idx(&entries);
    let present: BTreeSet<IndexType> = bodies.keys().copied().collect();
    info!(entries = entries.len(), indexes = present.len(), "index files built");
    IndexBuild {
        preview: render_preview_tex(prefix, &present),
        bodies,
        failed,
    }
}

impl IndexBuild {
    /// Write `{prefix}.{ext}` per index and the preview document into
    /// `dir`, returning the paths written.
    pub fn write_to(
        &self,
        dir: &Path,
        prefix: &str,
        preview_name: &str,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        let io = |path: &Path, e: std::io::Error| PipelineError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        };
        fs::create_dir_all(dir).map_err(|e| io(dir, e))?;
        let mut written = Vec::new();
        for (index_type, body) in &self.bodies {
            let path = dir.join(format!("{prefix}.{}", idx_extension(*index_type)));
            fs::write(&path, body).map_err(|e| io(&path, e))?;
            written.push(path);
        }
        let path = dir.join(preview_name);
        fs::write(&path, &self.preview).map_err(|e| io(&path, e))?;
        written.push(path);
        Ok(written)
    }
}

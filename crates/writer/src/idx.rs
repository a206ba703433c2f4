//! `.idx` bodies for makeindex, one per index type.
//!
//! Source line numbers stand in for page numbers, which is enough to
//! preview the structure of an index without typesetting the book.

use std::collections::{BTreeMap, BTreeSet};

use markup::{IndexType, Outline, Regions, TagArgument};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdxEntry {
    pub index_type: IndexType,
    pub argument: TagArgument,
    pub page: usize,
}

/// Raw index file extension makeindex reads for `index_type`.
pub fn idx_extension(index_type: IndexType) -> &'static str {
    match index_type {
        IndexType::Subject => "sdx",
        IndexType::Name => "adx",
        IndexType::Lexical => "ldx",
    }
}

/// Extension of the processed index makeindex writes for `index_type`.
pub fn ind_extension(index_type: IndexType) -> &'static str {
    match index_type {
        IndexType::Subject => "snd",
        IndexType::Name => "and",
        IndexType::Lexical => "lnd",
    }
}

/// Every tag of one document as an index entry paged by line.
pub fn collect_idx_entries(regions: &Regions, outline: &Outline) -> Vec<IdxEntry> {
    regions
        .existing_tags
        .iter()
        .filter(|tag| !tag.argument.key.render().trim().is_empty())
        .map(|tag| IdxEntry {
            index_type: tag.index_type,
            argument: tag.argument.clone(),
            page: outline.line_of(tag.span.start),
        })
        .collect()
}

/// One `\indexentry{key}{page}` line per entry, grouped by index type.
/// `!` and `@` inside `see`/`seealso` targets are quoted for makeindex.
pub fn render_idx(entries: &[IdxEntry]) -> BTreeMap<IndexType, String> {
    let mut out: BTreeMap<IndexType, String> = BTreeMap::new();
    for entry in entries {
        let body = out.entry(entry.index_type).or_default();
        body.push_str(&format!(
            "\\indexentry{{{}}}{{{}}}\n",
            entry.argument.render_for_idx(),
            entry.page
        ));
    }
    out
}

/// A minimal document that typesets only the processed indexes.
pub fn render_preview_tex(prefix: &str, present: &BTreeSet<IndexType>) -> String {
    let mut lines = vec![
        r"\documentclass{article}".to_owned(),
        r"\providecommand{\indexspace}{\par\bigskip}".to_owned(),
        r"\providecommand{\see}[2]{\emph{see} #1}".to_owned(),
        r"\providecommand{\seealso}[2]{\emph{see also} #1}".to_owned(),
        r"\begin{document}".to_owned(),
    ];
    let sections = [
        (IndexType::Name, "Name index"),
        (IndexType::Lexical, "Language index"),
        (IndexType::Subject, "Subject index"),
    ];
    let mut first = true;
    for (index_type, title) in sections {
        if !present.contains(&index_type) {
            continue;
        }
        if !first {
            lines.push(r"\clearpage".to_owned());
        }
        first = false;
        lines.push(format!("\\renewcommand{{\\indexname}}{{{title}}}"));
        lines.push(format!("\\input{{{prefix}.{}}}", ind_extension(index_type)));
    }
    lines.push(r"\end{document}".to_owned());
    let mut tex = lines.join("\n");
    tex.push('\n');
    tex
}

#[cfg(test)]
mod tests {
    use super::*;
    use markup::{classify, parse, SkipRegistry};

    fn entries(src: &str) -> Vec<IdxEntry> {
        let doc = parse(src, &SkipRegistry::default()).unwrap();
        collect_idx_entries(&classify(&doc), &Outline::build(&doc))
    }

    #[test]
    fn groups_by_type_with_line_pages() {
        let src = "a\\sindex{grammar}\n\nb\\nindex{Chomsky, Noam}\\isi{syntax}";
        let bodies = render_idx(&entries(src));
        assert_eq!(
            bodies[&IndexType::Subject],
            "\\indexentry{grammar}{1}\n\\indexentry{syntax}{3}\n"
        );
        assert_eq!(
            bodies[&IndexType::Name],
            "\\indexentry{Chomsky, Noam}{3}\n"
        );
        assert!(!bodies.contains_key(&IndexType::Lexical));
    }

    #[test]
    fn crossref_targets_are_quoted() {
        let bodies = render_idx(&entries("\\sindex{FDM|see{methods!finite difference}}"));
        assert_eq!(
            bodies[&IndexType::Subject],
            "\\indexentry{FDM|see{methods\"!finite difference}}{1}\n"
        );
    }

    #[test]
    fn preview_inputs_only_present_indexes() {
        let tex = render_preview_tex("main", &BTreeSet::from([IndexType::Subject]));
        assert!(tex.contains("\\input{main.snd}"));
        assert!(!tex.contains("main.and"));
        assert!(!tex.contains("\\clearpage"));
    }
}

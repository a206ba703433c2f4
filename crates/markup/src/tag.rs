//! Index-tag vocabulary: commands, argument syntax, rendering.
//!
//! Argument syntax follows makeindex: `parent!child` hierarchy, `sort@display`
//! leaves, `|(` / `|)` page ranges, `|see{..}` and `|seealso{..}` cross
//! references, and `"` quoting of a literal `!`, `@`, `|` or `"`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The three indexes a book carries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    #[default]
    Subject,
    Name,
    #[serde(alias = "language")]
    Lexical,
}

impl IndexType {
    pub const ALL: [IndexType; 3] = [IndexType::Subject, IndexType::Name, IndexType::Lexical];

    pub fn as_str(self) -> &'static str {
        match self {
            IndexType::Subject => "subject",
            IndexType::Name => "name",
            IndexType::Lexical => "lexical",
        }
    }

    /// Names are matched case-sensitively; subjects and lexical items are not.
    pub fn is_case_sensitive(self) -> bool {
        matches!(self, IndexType::Name)
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subject" => Ok(IndexType::Subject),
            "name" => Ok(IndexType::Name),
            "lexical" | "language" => Ok(IndexType::Lexical),
            other => Err(format!("unknown index type `{other}`")),
        }
    }
}

/// Which macro family the writer emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommandSet {
    /// `\sindex`, `\nindex`, `\lindex`.
    #[default]
    Typed,
    /// `\is`, `\in`, `\il`.
    Langsci,
}

impl CommandSet {
    pub fn command(self, index_type: IndexType) -> &'static str {
        match (self, index_type) {
            (CommandSet::Typed, IndexType::Subject) => "sindex",
            (CommandSet::Typed, IndexType::Name) => "nindex",
            (CommandSet::Typed, IndexType::Lexical) => "lindex",
            (CommandSet::Langsci, IndexType::Subject) => "is",
            (CommandSet::Langsci, IndexType::Name) => "in",
            (CommandSet::Langsci, IndexType::Lexical) => "il",
        }
    }
}

/// Recognise an index macro by name. Returns its index type and whether it
/// is an inline variant that also typesets its argument.
pub fn recognize_command(name: &str) -> Option<(IndexType, bool)> {
    match name {
        "sindex" | "is" | "index" => Some((IndexType::Subject, false)),
        "isi" => Some((IndexType::Subject, true)),
        "nindex" | "in" => Some((IndexType::Name, false)),
        "ini" => Some((IndexType::Name, true)),
        "lindex" | "il" => Some((IndexType::Lexical, false)),
        "ili" => Some((IndexType::Lexical, true)),
        _ => None,
    }
}

/// One level of an index key: optional sort key plus displayed text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeySegment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    pub display: String,
}

impl KeySegment {
    pub fn plain(display: impl Into<String>) -> Self {
        Self {
            sort: None,
            display: display.into(),
        }
    }

    pub fn sorted(sort: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            sort: Some(sort.into()),
            display: display.into(),
        }
    }

    fn render(&self) -> String {
        match &self.sort {
            Some(sort) => format!("{}@{}", escape(sort), escape(&self.display)),
            None => escape(&self.display),
        }
    }

    fn normalized(&self) -> KeySegment {
        KeySegment {
            sort: self.sort.as_deref().map(collapse),
            display: collapse(&self.display),
        }
    }
}

/// Hierarchical index key, root first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexKey {
    pub segments: Vec<KeySegment>,
}

impl IndexKey {
    pub fn plain(label: impl Into<String>) -> Self {
        Self {
            segments: vec![KeySegment::plain(label)],
        }
    }

    /// Key with parent segments `path` above `leaf`.
    pub fn from_path(path: &[String], leaf: KeySegment) -> Self {
        let mut segments: Vec<KeySegment> = path.iter().map(KeySegment::plain).collect();
        segments.push(leaf);
        Self { segments }
    }

    pub fn leaf(&self) -> Option<&KeySegment> {
        self.segments.last()
    }

    /// Text an inline tag shows in the running text.
    pub fn visible_text(&self) -> &str {
        self.leaf().map_or("", |leaf| leaf.display.as_str())
    }

    pub fn render(&self) -> String {
        self.segments
            .iter()
            .map(KeySegment::render)
            .collect::<Vec<_>>()
            .join("!")
    }

    /// Whitespace-collapsed copy used for equivalence checks.
    pub fn normalized(&self) -> IndexKey {
        IndexKey {
            segments: self.segments.iter().map(KeySegment::normalized).collect(),
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// What a tag says about its page.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "relation", content = "target", rename_all = "kebab-case")]
pub enum Relation {
    Direct,
    /// A direct reference with a page-number format such as `|textbf`.
    Format(String),
    RangeOpen,
    RangeClose,
    See(String),
    SeeAlso(String),
}

impl Relation {
    fn render(&self) -> String {
        match self {
            Relation::Direct => String::new(),
            Relation::Format(fmt) => format!("|{fmt}"),
            Relation::RangeOpen => "|(".to_owned(),
            Relation::RangeClose => "|)".to_owned(),
            Relation::See(target) => format!("|see{{{target}}}"),
            Relation::SeeAlso(target) => format!("|seealso{{{target}}}"),
        }
    }

    fn parse(encap: &str) -> Relation {
        let encap = encap.trim();
        if encap.is_empty() {
            return Relation::Direct;
        }
        if encap.starts_with('(') {
            return Relation::RangeOpen;
        }
        if encap.starts_with(')') {
            return Relation::RangeClose;
        }
        if let Some(target) = braced_suffix(encap, "seealso") {
            return Relation::SeeAlso(target);
        }
        if let Some(target) = braced_suffix(encap, "see") {
            return Relation::See(target);
        }
        Relation::Format(encap.to_owned())
    }

    pub fn is_cross_reference(&self) -> bool {
        matches!(self, Relation::See(_) | Relation::SeeAlso(_))
    }

    fn equivalent(&self, other: &Relation) -> bool {
        match (self, other) {
            (
                Relation::Direct | Relation::Format(_),
                Relation::Direct | Relation::Format(_),
            ) => true,
            (Relation::RangeOpen, Relation::RangeOpen) => true,
            (Relation::RangeClose, Relation::RangeClose) => true,
            (Relation::See(a), Relation::See(b)) => collapse(a) == collapse(b),
            (Relation::SeeAlso(a), Relation::SeeAlso(b)) => collapse(a) == collapse(b),
            _ => false,
        }
    }
}

fn braced_suffix(encap: &str, word: &str) -> Option<String> {
    let rest = encap.strip_prefix(word)?;
    let inner = rest.strip_prefix('{')?.strip_suffix('}')?;
    Some(inner.to_owned())
}

/// Parsed content of an index macro's argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagArgument {
    pub key: IndexKey,
    pub relation: Relation,
}

impl TagArgument {
    pub fn new(key: IndexKey, relation: Relation) -> Self {
        Self { key, relation }
    }

    /// Parse a raw argument such as `lang!Turkish@Türkisch|(`.
    pub fn parse(raw: &str) -> TagArgument {
        let chars = unquote(raw);
        let bar = chars.iter().position(|&(c, quoted)| c == '|' && !quoted);
        let (key_chars, encap) = match bar {
            Some(i) => (&chars[..i], literal(&chars[i + 1..])),
            None => (&chars[..], String::new()),
        };
        let segments = key_chars
            .split(|&(c, quoted)| c == '!' && !quoted)
            .map(|segment| {
                match segment.iter().position(|&(c, quoted)| c == '@' && !quoted) {
                    Some(at) => KeySegment {
                        sort: Some(literal(&segment[..at]).trim().to_owned()),
                        display: literal(&segment[at + 1..]).trim().to_owned(),
                    },
                    None => KeySegment::plain(literal(segment).trim()),
                }
            })
            .collect();
        TagArgument {
            key: IndexKey { segments },
            relation: Relation::parse(&encap),
        }
    }

    pub fn render(&self) -> String {
        format!("{}{}", self.key.render(), self.relation.render())
    }

    /// Same key (modulo whitespace) and compatible relation.
    pub fn is_equivalent(&self, other: &TagArgument) -> bool {
        self.key.normalized() == other.key.normalized() && self.relation.equivalent(&other.relation)
    }

    /// Argument as written to an `.idx` file: cross-reference targets get
    /// their `!` and `@` quoted so makeindex does not split them.
    pub fn render_for_idx(&self) -> String {
        let relation = match &self.relation {
            Relation::See(target) => Relation::See(quote_crossref_target(target)),
            Relation::SeeAlso(target) => Relation::SeeAlso(quote_crossref_target(target)),
            other => other.clone(),
        };
        format!("{}{}", self.key.render(), relation.render())
    }
}

fn quote_crossref_target(target: &str) -> String {
    let mut out = String::with_capacity(target.len());
    let mut prev = '\0';
    for c in target.chars() {
        if (c == '!' || c == '@') && prev != '"' {
            out.push('"');
        }
        out.push(c);
        prev = c;
    }
    out
}

/// Quote makeindex specials in a key part.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev = '\0';
    for c in text.chars() {
        match c {
            '!' | '@' | '|' => out.push('"'),
            '"' if prev != '\\' => out.push('"'),
            _ => {}
        }
        out.push(c);
        prev = c;
    }
    out
}

/// Split raw text into characters, resolving `"` quotes. `\"` stays literal.
fn unquote(raw: &str) -> Vec<(char, bool)> {
    let mut out = Vec::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    let mut prev = '\0';
    while let Some(c) = chars.next() {
        if c == '"' && prev != '\\' {
            if let Some(next) = chars.next() {
                out.push((next, true));
                prev = next;
                continue;
            }
        }
        out.push((c, false));
        prev = c;
    }
    out
}

fn literal(chars: &[(char, bool)]) -> String {
    chars.iter().map(|&(c, _)| c).collect()
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Page-range role of a direct tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RangeMark {
    Single,
    Open,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrossRelation {
    See,
    SeeAlso,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagBody {
    pub key: IndexKey,
    pub range: RangeMark,
}

/// A tag the pipeline may insert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Tag {
    Subject(TagBody),
    Name(TagBody),
    Lexical(TagBody),
    CrossRef {
        index_type: IndexType,
        source: IndexKey,
        relation: CrossRelation,
        target: String,
    },
}

impl Tag {
    pub fn direct(index_type: IndexType, key: IndexKey, range: RangeMark) -> Tag {
        let body = TagBody { key, range };
        match index_type {
            IndexType::Subject => Tag::Subject(body),
            IndexType::Name => Tag::Name(body),
            IndexType::Lexical => Tag::Lexical(body),
        }
    }

    pub fn index_type(&self) -> IndexType {
        match self {
            Tag::Subject(_) => IndexType::Subject,
            Tag::Name(_) => IndexType::Name,
            Tag::Lexical(_) => IndexType::Lexical,
            Tag::CrossRef { index_type, .. } => *index_type,
        }
    }

    pub fn key(&self) -> &IndexKey {
        match self {
            Tag::Subject(body) | Tag::Name(body) | Tag::Lexical(body) => &body.key,
            Tag::CrossRef { source, .. } => source,
        }
    }

    pub fn argument(&self) -> TagArgument {
        match self {
            Tag::Subject(body) | Tag::Name(body) | Tag::Lexical(body) => TagArgument {
                key: body.key.clone(),
                relation: match body.range {
                    RangeMark::Single => Relation::Direct,
                    RangeMark::Open => Relation::RangeOpen,
                    RangeMark::Close => Relation::RangeClose,
                },
            },
            Tag::CrossRef {
                source,
                relation,
                target,
                ..
            } => TagArgument {
                key: source.clone(),
                relation: match relation {
                    CrossRelation::See => Relation::See(target.clone()),
                    CrossRelation::SeeAlso => Relation::SeeAlso(target.clone()),
                },
            },
        }
    }

    /// `\macro{argument}` in the chosen command set.
    pub fn render(&self, commands: CommandSet) -> String {
        format!(
            "\\{}{{{}}}",
            commands.command(self.index_type()),
            self.argument().render()
        )
    }

    /// Ordering among tags at the same offset: direct and range tags, then `see`, then `see-also`.
    pub fn placement_rank(&self) -> u8 {
        match self {
            Tag::CrossRef {
                relation: CrossRelation::See,
                ..
            } => 1,
            Tag::CrossRef {
                relation: CrossRelation::SeeAlso,
                ..
            } => 2,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hierarchy_sort_and_range() {
        let arg = TagArgument::parse("languages!Turkish@T\\\"urkisch|(");
        assert_eq!(arg.key.segments.len(), 2);
        assert_eq!(arg.key.segments[0], KeySegment::plain("languages"));
        assert_eq!(
            arg.key.segments[1],
            KeySegment::sorted("Turkish", "T\\\"urkisch")
        );
        assert_eq!(arg.relation, Relation::RangeOpen);
    }

    #[test]
    fn parses_cross_references() {
        assert_eq!(
            TagArgument::parse("FDM|see{finite difference method}").relation,
            Relation::See("finite difference method".into())
        );
        assert_eq!(
            TagArgument::parse("grammar|seealso{syntax}").relation,
            Relation::SeeAlso("syntax".into())
        );
        assert_eq!(
            TagArgument::parse("grammar|textbf").relation,
            Relation::Format("textbf".into())
        );
    }

    #[test]
    fn quoted_specials_are_literal() {
        let arg = TagArgument::parse("Yahoo\"!|(");
        assert_eq!(arg.key.segments, vec![KeySegment::plain("Yahoo!")]);
        assert_eq!(arg.relation, Relation::RangeOpen);
        assert_eq!(arg.render(), "Yahoo\"!|(");
    }

    #[test]
    fn render_then_parse_preserves_argument() {
        let arg = TagArgument::new(
            IndexKey::from_path(
                &["methods".to_owned()],
                KeySegment::sorted("fd", "finite difference"),
            ),
            Relation::RangeClose,
        );
        let rendered = arg.render();
        assert_eq!(rendered, "methods!fd@finite difference|)");
        assert_eq!(TagArgument::parse(&rendered), arg);
    }

    #[test]
    fn equivalence_ignores_whitespace_and_formats() {
        let a = TagArgument::parse("finite  difference\nmethod");
        let b = TagArgument::parse("finite difference method|textbf");
        let c = TagArgument::parse("finite difference method|(");
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&c));
    }

    #[test]
    fn commands_per_set() {
        let tag = Tag::direct(
            IndexType::Name,
            IndexKey::plain("Chomsky, Noam"),
            RangeMark::Single,
        );
        assert_eq!(tag.render(CommandSet::Typed), "\\nindex{Chomsky, Noam}");
        assert_eq!(tag.render(CommandSet::Langsci), "\\in{Chomsky, Noam}");
        assert_eq!(recognize_command("ili"), Some((IndexType::Lexical, true)));
        assert_eq!(recognize_command("index"), Some((IndexType::Subject, false)));
        assert_eq!(recognize_command("emph"), None);
    }

    #[test]
    fn idx_rendering_quotes_crossref_targets() {
        let arg = TagArgument::parse("FD|see{methods!fd@finite difference}");
        assert_eq!(
            arg.render_for_idx(),
            "FD|see{methods\"!fd\"@finite difference}"
        );
    }

    #[test]
    fn index_type_accepts_language_alias() {
        assert_eq!("language".parse::<IndexType>(), Ok(IndexType::Lexical));
        let parsed: IndexType = serde_json::from_str("\"language\"").unwrap();
        assert_eq!(parsed, IndexType::Lexical);
    }
}

//! Skip-region registry: which environments and macros never receive tags.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::MarkupError;

const VERBATIM_ENVIRONMENTS: &[&str] = &["verbatim", "Verbatim", "lstlisting", "minted", "comment"];

const MATH_ENVIRONMENTS: &[&str] = &[
    "equation",
    "equation*",
    "align",
    "align*",
    "alignat",
    "alignat*",
    "gather",
    "gather*",
    "multline",
    "multline*",
    "displaymath",
    "math",
    "eqnarray",
    "eqnarray*",
];

const SKIP_ENVIRONMENTS: &[&str] = &["tikzpicture", "tabular", "tabular*", "array"];

const SKIP_MACROS: &[&str] = &[
    "cite",
    "citep",
    "citet",
    "citealt",
    "citealp",
    "citeauthor",
    "citeyear",
    "ref",
    "label",
    "eqref",
    "pageref",
    "autoref",
    "nameref",
    "url",
    "href",
    "includegraphics",
    "input",
    "include",
    "bibliographystyle",
    "bibliography",
    "addbibresource",
    "usepackage",
    "documentclass",
    "newcommand",
    "renewcommand",
    "caption",
    "footnote",
];

const TRANSPARENT_MACROS: &[&str] = &["emph", "textit", "textbf", "textsc", "textsl"];

const VERBATIM_MACROS: &[&str] = &["verb", "verb*", "lstinline"];

/// What the classifier does with the arguments of a macro that is neither
/// skipped nor transparent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownMacros {
    /// Arguments are excluded, like those of a skip macro.
    #[default]
    Opaque,
    /// Arguments stay taggable, like those of a transparent macro; only
    /// `skip_macros` and `verbatim_macros` are excluded.
    Transparent,
}

fn names(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

/// Configured names of regions that are never taggable.
///
/// The parser uses `verbatim_environments` and `verbatim_macros` to decide
/// which bodies are scanned literally; the classifier uses the remaining sets
/// to decide exclusion. Macros not listed anywhere follow `unknown_macros`.
/// With the default `opaque` policy `skip_macros` only documents intent;
/// under `transparent` it is the list that keeps arguments out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkipRegistry {
    /// Registry schema version.
    pub version: u32,
    /// Environments whose body is raw text up to the matching `\end`.
    pub verbatim_environments: BTreeSet<String>,
    /// Math-like environments.
    pub math_environments: BTreeSet<String>,
    /// Other environments whose body is excluded (drawings, tables).
    pub skip_environments: BTreeSet<String>,
    /// Macros whose arguments are never taggable.
    pub skip_macros: BTreeSet<String>,
    /// Formatting macros whose argument text stays taggable.
    pub transparent_macros: BTreeSet<String>,
    /// Inline verbatim macros (`\verb|...|`): the text between the delimiters
    /// is read literally.
    pub verbatim_macros: BTreeSet<String>,
    /// Policy for macros in none of the sets above.
    pub unknown_macros: UnknownMacros,
}

/// The registry as embedded in a parsed document.
pub type SkipManifest = SkipRegistry;

impl Default for SkipRegistry {
    fn default() -> Self {
        Self {
            version: 1,
            verbatim_environments: names(VERBATIM_ENVIRONMENTS),
            math_environments: names(MATH_ENVIRONMENTS),
            skip_environments: names(SKIP_ENVIRONMENTS),
            skip_macros: names(SKIP_MACROS),
            transparent_macros: names(TRANSPARENT_MACROS),
            verbatim_macros: names(VERBATIM_MACROS),
            unknown_macros: UnknownMacros::Opaque,
        }
    }
}

impl SkipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an environment whose body is excluded.
    pub fn with_skip_environment(mut self, name: impl Into<String>) -> Self {
        self.skip_environments.insert(name.into());
        self
    }

    /// Add a macro whose arguments are excluded.
    pub fn with_skip_macro(mut self, name: impl Into<String>) -> Self {
        self.skip_macros.insert(name.into());
        self
    }

    /// Add an environment that is scanned literally.
    pub fn with_verbatim_environment(mut self, name: impl Into<String>) -> Self {
        self.verbatim_environments.insert(name.into());
        self
    }

    /// Add a formatting macro whose argument remains taggable.
    pub fn with_transparent_macro(mut self, name: impl Into<String>) -> Self {
        self.transparent_macros.insert(name.into());
        self
    }

    /// Add an inline verbatim macro.
    pub fn with_verbatim_macro(mut self, name: impl Into<String>) -> Self {
        self.verbatim_macros.insert(name.into());
        self
    }

    pub fn with_unknown_macros(mut self, policy: UnknownMacros) -> Self {
        self.unknown_macros = policy;
        self
    }

    pub fn is_verbatim(&self, env: &str) -> bool {
        self.verbatim_environments.contains(env)
    }

    /// True for any environment whose body is excluded from tagging.
    pub fn is_excluded_environment(&self, env: &str) -> bool {
        self.verbatim_environments.contains(env)
            || self.math_environments.contains(env)
            || self.skip_environments.contains(env)
    }

    pub fn is_skip_macro(&self, name: &str) -> bool {
        self.skip_macros.contains(name)
    }

    pub fn is_transparent(&self, name: &str) -> bool {
        self.transparent_macros.contains(name)
    }

    pub fn is_verbatim_macro(&self, name: &str) -> bool {
        self.verbatim_macros.contains(name)
    }

    /// True when the arguments of macro `name` are never taggable.
    pub fn is_opaque_macro(&self, name: &str) -> bool {
        if self.skip_macros.contains(name) || self.verbatim_macros.contains(name) {
            return true;
        }
        if self.transparent_macros.contains(name) {
            return false;
        }
        self.unknown_macros == UnknownMacros::Opaque
    }

    pub fn validate(&self) -> Result<(), MarkupError> {
        if self.version == 0 {
            return Err(MarkupError::InvalidConfig(
                "version must be at least 1".into(),
            ));
        }
        if let Some(name) = self
            .transparent_macros
            .iter()
            .find(|name| self.skip_macros.contains(*name))
        {
            return Err(MarkupError::InvalidConfig(format!(
                "macro `{name}` cannot be both transparent and skipped"
            )));
        }
        if let Some(name) = self
            .verbatim_macros
            .iter()
            .find(|name| self.transparent_macros.contains(*name))
        {
            return Err(MarkupError::InvalidConfig(format!(
                "macro `{name}` cannot be both transparent and verbatim"
            )));
        }
        let all_names = self
            .verbatim_environments
            .iter()
            .chain(&self.math_environments)
            .chain(&self.skip_environments)
            .chain(&self.skip_macros)
            .chain(&self.transparent_macros)
            .chain(&self.verbatim_macros);
        for name in all_names {
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(MarkupError::InvalidConfig(format!(
                    "invalid name `{name}`"
                )));
            }
        }
        Ok(())
    }
}

//! texindex reasoning: from occurrences to a tag plan.
//!
//! Runs once over the frozen occurrence set of a whole corpus and decides,
//! per occurrence, whether it gets a direct tag, opens or closes a page
//! range, carries a cross-reference, or stays untagged (and why). The
//! resulting [`TagPlan`] is input to the writer; it is never altered by
//! mode gating.
//!
//! ```text
//! occurrences ─► conflicts ─► overrides ─► see ─► ranges ─► see also ─► TagPlan
//! ```

mod config;
mod error;
mod plan;
mod reasoner;

pub use crate::config::ReasonConfig;
pub use crate::error::ReasonError;
pub use crate::plan::{
    CrossRefEdge, Decision, DecisionKind, DocumentFacts, PlanRule, PlannedTag, RangeGroup,
    TagPlan,
};
pub use crate::reasoner::Reasoner;

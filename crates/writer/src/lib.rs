//! texindex writing: committing a tag plan to source text.
//!
//! [`write_document`] splices planned tags into a document after mode
//! gating ([`Mode`], [`gate`]). Everything else here works on tags already in
//! the source: [`strip_tags`] removes them, [`render_idx`] turns them into
//! makeindex input, and [`remove_tags`] applies reviewer drops.

mod config;
mod error;
mod gate;
mod idx;
mod judgment;
mod strip;
mod write;

pub use crate::config::{Mode, WriterConfig};
pub use crate::error::WriterError;
pub use crate::gate::{gate, Verdict};
pub use crate::idx::{
    collect_idx_entries, idx_extension, ind_extension, render_idx, render_preview_tex, IdxEntry,
};
pub use crate::judgment::{remove_tags, RemovalOutcome, TagRemoval};
pub use crate::strip::{strip_tags, StripOutcome};
pub use crate::write::{write_document, WriteAction, WriteOutcome, WriteRecord};

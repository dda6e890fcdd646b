//! Helpers for classifying and splitting asset references found in attribute values.
//!
//! Filtering decides which candidate URLs may become imports, while the srcset splitter
//! turns one multi-candidate attribute value into independently rewritable spans.

mod filters;
mod srcset;

pub use filters::{UrlVerdict, check_candidate_url, is_anchor_reference, is_remote_url};
pub use srcset::split_srcset;

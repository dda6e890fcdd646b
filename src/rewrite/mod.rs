//! Rewriting of asset references into generated import bindings.
//!
//! The traversal walks the parsed markup once, replacing every accepted reference with
//! `{binding}` and recording the binding in the registry. The composer then renders the
//! registry as import statements and places them in the component's script.

mod composer;
mod registry;
mod traversal;

pub use composer::{ImportPlacement, insert_imports, render_imports};
pub use registry::{ImportEntry, ImportRegistry};
pub use traversal::Traversal;

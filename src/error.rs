//! Error types returned while preprocessing a component.

use crate::edit::EditError;
use crate::markup::ParseError;

/// Boxed error returned by user supplied filters.
pub type FilterError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that abort processing of a single component.
#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
  /// The markup could not be parsed.
  #[error(transparent)]
  Parse(#[from] ParseError),

  /// A rule filter returned an error.
  #[error("filter for `{attribute}` on <{tag}> failed")]
  Filter {
    /// Tag of the rule whose filter failed.
    tag: String,
    /// Attribute being checked.
    attribute: String,
    /// Error reported by the filter.
    #[source]
    source: FilterError,
  },

  /// The global URL filter returned an error.
  #[error("url filter failed for `{url}`")]
  UrlFilter {
    /// Candidate URL being checked.
    url: String,
    /// Error reported by the filter.
    #[source]
    source: FilterError,
  },

  /// A splice could not be recorded.
  #[error(transparent)]
  Edit(#[from] EditError),

  /// An import statement could not be rendered.
  #[error("failed to render import for `{path}`")]
  Render {
    /// Asset path being imported.
    path: String,
    /// Serialisation error.
    #[source]
    source: serde_json::Error,
  },
}

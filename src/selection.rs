//! Include/exclude scoping used to decide which asset URLs may become imports.

use std::collections::BTreeSet;

use regex::Regex;
use serde::Deserialize;

use crate::models::UrlFilter;

/// `urls` section of the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UrlSelectionFile {
  /// Scopes a URL must fall in when non-empty.
  pub include: Vec<String>,
  /// Scopes that are never rewritten.
  pub exclude: Vec<String>,
  /// Regular expressions rejecting any URL they match.
  pub exclude_patterns: Vec<String>,
}

/// Errors raised while compiling a URL selection.
#[derive(Debug, thiserror::Error)]
pub enum UrlSelectionError {
  /// An exclude pattern is not a valid regular expression.
  #[error("invalid exclude pattern `{pattern}`")]
  Pattern {
    /// Pattern as written.
    pattern: String,
    /// Compilation error.
    #[source]
    source: regex::Error,
  },
}

/// Global URL filter built from include and exclude scopes.
///
/// A scope matches a URL equal to it or nested below it, so `./static` covers
/// `./static/logo.png` but not `./static-old/logo.png`.
#[derive(Debug, Clone, Default)]
pub struct UrlSelection {
  include: Option<BTreeSet<String>>,
  exclude: BTreeSet<String>,
  patterns: Vec<Regex>,
}

impl UrlSelection {
  /// Determine whether `url` may be rewritten.
  pub fn is_included(&self, url: &str) -> bool {
    if self.exclude.iter().any(|scope| scope_matches(scope, url)) {
      return false;
    }

    if self.patterns.iter().any(|pattern| pattern.is_match(url)) {
      return false;
    }

    match &self.include {
      Some(include) => include.iter().any(|scope| scope_matches(scope, url)),
      None => true,
    }
  }

  /// Returns true when no filtering rules are active.
  pub fn is_unfiltered(&self) -> bool {
    self.include.is_none() && self.exclude.is_empty() && self.patterns.is_empty()
  }
}

impl UrlFilter for UrlSelection {
  fn accepts(&self, url: &str) -> anyhow::Result<bool> {
    Ok(self.is_included(url))
  }
}

impl TryFrom<UrlSelectionFile> for UrlSelection {
  type Error = UrlSelectionError;

  fn try_from(file: UrlSelectionFile) -> Result<Self, Self::Error> {
    let include = normalise_list(file.include);
    let exclude = normalise_list(file.exclude);
    let patterns = file
      .exclude_patterns
      .into_iter()
      .map(|pattern| {
        Regex::new(&pattern).map_err(|source| UrlSelectionError::Pattern { pattern, source })
      })
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Self {
      include: (!include.is_empty()).then_some(include),
      exclude,
      patterns,
    })
  }
}

/// Convert raw scopes into a sorted, de-duplicated set.
///
/// Values are trimmed, trailing slashes are dropped and empty entries are discarded.
fn normalise_list(values: impl IntoIterator<Item = String>) -> BTreeSet<String> {
  values
    .into_iter()
    .map(|value| value.trim().trim_end_matches('/').to_string())
    .filter(|value| !value.is_empty())
    .collect()
}

fn scope_matches(scope: &str, url: &str) -> bool {
  if url == scope {
    return true;
  }

  url
    .strip_prefix(scope)
    .is_some_and(|suffix| suffix.starts_with('/'))
}

use regex::Regex;

use crate::models::UrlFilter;

fn remote_url_pattern() -> &'static Regex {
  use std::sync::OnceLock;

  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"^https?://").expect("invalid http(s) regex"))
}

/// Outcome of the acceptance gate for one candidate URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlVerdict {
  /// The URL should become an import.
  Accept,
  /// In-document fragment reference such as `#icon`.
  Anchor,
  /// Absolute `http(s)://` URL while remote URLs are disabled.
  Remote,
  /// Rejected by the configured URL filter.
  Filtered,
}

/// Whether `url` points into the current document, e.g. an SVG sprite id.
pub fn is_anchor_reference(url: &str) -> bool {
  url.starts_with('#')
}

/// Whether `url` is an absolute `http://` or `https://` URL.
pub fn is_remote_url(url: &str) -> bool {
  remote_url_pattern().is_match(url)
}

/// Decide whether a trimmed candidate URL may be registered as an import.
///
/// Checks run in a fixed order: anchors, then remote URLs, then the user filter. The user
/// filter therefore never observes anchors, nor remote URLs unless `allow_remote` is set.
pub fn check_candidate_url(
  url: &str,
  allow_remote: bool,
  url_filter: Option<&dyn UrlFilter>,
) -> anyhow::Result<UrlVerdict> {
  if is_anchor_reference(url) {
    return Ok(UrlVerdict::Anchor);
  }

  if !allow_remote && is_remote_url(url) {
    return Ok(UrlVerdict::Remote);
  }

  if let Some(filter) = url_filter
    && !filter.accepts(url)?
  {
    return Ok(UrlVerdict::Filtered);
  }

  Ok(UrlVerdict::Accept)
}

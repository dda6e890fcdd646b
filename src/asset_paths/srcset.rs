use regex::Regex;

use crate::markup::TextPart;

fn srcset_candidate_pattern() -> &'static Regex {
  use std::sync::OnceLock;

  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"(?m)\s*([^,\s]+).*?(?:,|$)\s*").expect("invalid srcset regex")
  })
}

/// Split a `srcset`-style value into one reference per comma separated candidate.
///
/// Each returned part covers only the URL token of its candidate, with offsets relative to
/// the original source. Width and density descriptors and the separating commas are left
/// outside every returned span.
pub fn split_srcset(value: &TextPart) -> Vec<TextPart> {
  srcset_candidate_pattern()
    .captures_iter(&value.raw)
    .filter_map(|captures| captures.get(1))
    .map(|url| TextPart {
      raw: url.as_str().to_string(),
      start: value.start + url.start(),
      end: value.start + url.end(),
    })
    .collect()
}

//! Rule and result types shared between configuration and the rewrite engine.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use sourcemap::SourceMap;

/// Details handed to a rule's filter for one candidate attribute.
#[derive(Debug, Clone, Copy)]
pub struct FilterMetadata<'a> {
  /// Tag name of the rule that matched.
  pub tag: &'a str,
  /// Attribute holding the candidate reference.
  pub attribute: &'a str,
  /// Verbatim source text of the whole attribute, e.g. `href="./icon.png"`.
  pub value: &'a str,
  /// Static attributes of the element, name to raw text.
  pub attributes: &'a BTreeMap<String, String>,
}

/// Per-rule predicate deciding whether a matched attribute should be rewritten.
pub trait SourceFilter: Send + Sync {
  /// Returns `true` when the attribute described by `metadata` should be rewritten.
  fn accepts(&self, metadata: &FilterMetadata<'_>) -> anyhow::Result<bool>;
}

impl<F> SourceFilter for F
where
  F: Fn(&FilterMetadata<'_>) -> anyhow::Result<bool> + Send + Sync,
{
  fn accepts(&self, metadata: &FilterMetadata<'_>) -> anyhow::Result<bool> {
    self(metadata)
  }
}

/// Global predicate applied to every candidate URL after the built-in checks.
pub trait UrlFilter: Send + Sync {
  /// Returns `true` when `url` may be turned into an import.
  fn accepts(&self, url: &str) -> anyhow::Result<bool>;
}

impl<F> UrlFilter for F
where
  F: Fn(&str) -> anyhow::Result<bool> + Send + Sync,
{
  fn accepts(&self, url: &str) -> anyhow::Result<bool> {
    self(url)
  }
}

/// Rule describing which attributes of a tag may reference local assets.
#[derive(Clone)]
pub struct AssetSource {
  /// Element name the rule applies to.
  pub tag: String,
  /// Attributes holding a single URL.
  pub src_attributes: Vec<String>,
  /// Attributes holding a comma separated `srcset` candidate list.
  pub srcset_attributes: Vec<String>,
  /// Optional predicate consulted before rewriting each attribute.
  pub filter: Option<Arc<dyn SourceFilter>>,
}

impl AssetSource {
  /// Rule for `tag` with no attributes yet.
  pub fn new(tag: impl Into<String>) -> Self {
    Self {
      tag: tag.into(),
      src_attributes: Vec::new(),
      srcset_attributes: Vec::new(),
      filter: None,
    }
  }

  /// Set the single-URL attributes.
  pub fn src_attributes<I, S>(mut self, attributes: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.src_attributes = attributes.into_iter().map(Into::into).collect();
    self
  }

  /// Set the `srcset`-style attributes.
  pub fn srcset_attributes<I, S>(mut self, attributes: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.srcset_attributes = attributes.into_iter().map(Into::into).collect();
    self
  }

  /// Attach a closure filter.
  pub fn with_filter<F>(self, filter: F) -> Self
  where
    F: Fn(&FilterMetadata<'_>) -> anyhow::Result<bool> + Send + Sync + 'static,
  {
    self.with_source_filter(Arc::new(filter))
  }

  /// Attach an already shared filter.
  pub fn with_source_filter(mut self, filter: Arc<dyn SourceFilter>) -> Self {
    self.filter = Some(filter);
    self
  }
}

impl fmt::Debug for AssetSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AssetSource")
      .field("tag", &self.tag)
      .field("src_attributes", &self.src_attributes)
      .field("srcset_attributes", &self.srcset_attributes)
      .field("filter", &self.filter.as_ref().map(|_| "<filter>"))
      .finish()
  }
}

/// Output of processing one component.
#[derive(Debug)]
pub struct Processed {
  /// Rewritten component source.
  pub code: String,
  /// Mapping from `code` positions back to the original source.
  pub map: SourceMap,
}

impl Processed {
  /// Serialise the source map as JSON.
  pub fn map_json(&self) -> Result<String, sourcemap::Error> {
    let mut buffer = Vec::new();
    self.map.to_writer(&mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
  }
}

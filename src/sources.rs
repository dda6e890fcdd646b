//! Built-in asset rules and the resolved rule set used during traversal.

use std::fmt;
use std::sync::Arc;

use crate::asset_paths::{UrlVerdict, check_candidate_url};
use crate::models::{AssetSource, FilterMetadata, SourceFilter, UrlFilter};

/// Prefix of generated import identifiers unless configured otherwise.
pub const DEFAULT_IMPORT_PREFIX: &str = "___ASSET___";

/// Comment text that suppresses rewriting of the next element.
pub const IGNORE_DIRECTIVE: &str = "svelte-preprocess-import-assets:ignore";

const ALLOWED_REL: &[&str] = &[
  "stylesheet",
  "icon",
  "shortcut icon",
  "mask-icon",
  "apple-touch-icon",
  "apple-touch-icon-precomposed",
  "apple-touch-startup-image",
  "manifest",
  "prefetch",
  "preload",
];

const ALLOWED_ITEMPROP: &[&str] = &[
  "image",
  "logo",
  "screenshot",
  "thumbnailurl",
  "contenturl",
  "downloadurl",
  "duplicateddata",
];

const ALLOWED_META_NAME: &[&str] = &[
  "msapplication-tileimage",
  "msapplication-square70x70logo",
  "msapplication-square150x150logo",
  "msapplication-wide310x150logo",
  "msapplication-square310x310logo",
  "msapplication-config",
  "twitter:image",
];

const ALLOWED_META_PROPERTY: &[&str] = &[
  "og:image",
  "og:image:url",
  "og:image:secure_url",
  "og:audio",
  "og:audio:secure_url",
  "og:video",
  "og:video:secure_url",
];

/// Filter accepting an element when any listed attribute holds an allowed value.
///
/// Values are compared after trimming and lowercasing.
#[derive(Debug, Clone, Default)]
pub struct AttributeAllowList {
  entries: Vec<(String, Vec<String>)>,
}

impl AttributeAllowList {
  /// Empty allow list, which rejects everything.
  pub fn new() -> Self {
    Self::default()
  }

  /// Allow elements whose `attribute` equals one of `values`.
  pub fn allow<I, S>(mut self, attribute: impl Into<String>, values: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let values = values
      .into_iter()
      .map(|value| value.as_ref().trim().to_lowercase())
      .collect();
    self.entries.push((attribute.into(), values));
    self
  }

  fn matches(&self, metadata: &FilterMetadata<'_>) -> bool {
    self.entries.iter().any(|(attribute, allowed)| {
      metadata.attributes.get(attribute).is_some_and(|value| {
        let value = value.trim().to_lowercase();
        allowed.iter().any(|candidate| *candidate == value)
      })
    })
  }
}

impl SourceFilter for AttributeAllowList {
  fn accepts(&self, metadata: &FilterMetadata<'_>) -> anyhow::Result<bool> {
    Ok(self.matches(metadata))
  }
}

/// The built-in rule list.
pub fn default_sources() -> Vec<AssetSource> {
  let link_filter = AttributeAllowList::new()
    .allow("rel", ALLOWED_REL)
    .allow("itemprop", ALLOWED_ITEMPROP);
  let meta_filter = AttributeAllowList::new()
    .allow("name", ALLOWED_META_NAME)
    .allow("property", ALLOWED_META_PROPERTY)
    .allow("itemprop", ALLOWED_ITEMPROP);

  vec![
    AssetSource::new("audio").src_attributes(["src"]),
    AssetSource::new("embed").src_attributes(["src"]),
    AssetSource::new("img")
      .src_attributes(["src"])
      .srcset_attributes(["srcset"]),
    AssetSource::new("input").src_attributes(["src"]),
    AssetSource::new("object").src_attributes(["data"]),
    AssetSource::new("source")
      .src_attributes(["src"])
      .srcset_attributes(["srcset"]),
    AssetSource::new("track").src_attributes(["src"]),
    AssetSource::new("video").src_attributes(["poster", "src"]),
    AssetSource::new("image").src_attributes(["href", "xlink:href"]),
    AssetSource::new("use").src_attributes(["href", "xlink:href"]),
    AssetSource::new("link")
      .src_attributes(["href"])
      .srcset_attributes(["imagesrcset"])
      .with_source_filter(Arc::new(link_filter)),
    AssetSource::new("meta")
      .src_attributes(["content"])
      .with_source_filter(Arc::new(meta_filter)),
  ]
}

/// Function deriving a rule list from the built-in defaults.
pub type DeriveSources = Arc<dyn Fn(Vec<AssetSource>) -> Vec<AssetSource> + Send + Sync>;

/// How the rule list is obtained.
#[derive(Clone, Default)]
pub enum Sources {
  /// Use [`default_sources`] unchanged.
  #[default]
  Defaults,
  /// Replace the defaults with a fixed list.
  List(Vec<AssetSource>),
  /// Receive the defaults and return the list to use.
  Derived(DeriveSources),
}

impl Sources {
  /// Produce the concrete rule list.
  pub fn resolve(self) -> Vec<AssetSource> {
    match self {
      Self::Defaults => default_sources(),
      Self::List(list) => list,
      Self::Derived(derive) => derive(default_sources()),
    }
  }
}

impl fmt::Debug for Sources {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Defaults => f.write_str("Defaults"),
      Self::List(list) => f.debug_tuple("List").field(list).finish(),
      Self::Derived(_) => f.write_str("Derived(<fn>)"),
    }
  }
}

/// Rules plus URL gating consulted for every element during traversal.
#[derive(Clone)]
pub struct RuleSet {
  sources: Vec<AssetSource>,
  allow_remote: bool,
  url_filter: Option<Arc<dyn UrlFilter>>,
}

impl RuleSet {
  /// Assemble a rule set.
  pub fn new(
    sources: Vec<AssetSource>,
    allow_remote: bool,
    url_filter: Option<Arc<dyn UrlFilter>>,
  ) -> Self {
    Self {
      sources,
      allow_remote,
      url_filter,
    }
  }

  /// All configured rules in order.
  pub fn sources(&self) -> &[AssetSource] {
    &self.sources
  }

  /// Rules whose tag equals `tag`. Several rules may match the same tag.
  pub fn matching<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a AssetSource> + 'a {
    self.sources.iter().filter(move |source| source.tag == tag)
  }

  /// Run the acceptance gate for one trimmed candidate URL.
  pub fn check_url(&self, url: &str) -> anyhow::Result<UrlVerdict> {
    check_candidate_url(url, self.allow_remote, self.url_filter.as_deref())
  }
}

impl fmt::Debug for RuleSet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RuleSet")
      .field("sources", &self.sources)
      .field("allow_remote", &self.allow_remote)
      .field("url_filter", &self.url_filter.as_ref().map(|_| "<filter>"))
      .finish()
  }
}

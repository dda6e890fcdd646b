//! File based configuration for the command line preprocessor.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;

use crate::builder::ImportAssetsOptions;
use crate::models::AssetSource;
use crate::selection::{UrlSelection, UrlSelectionFile};
use crate::sources::{AttributeAllowList, Sources};

/// File name looked up by [`ImportAssetsConfig::discover`].
pub const DEFAULT_CONFIG_FILE: &str = "import-assets.json";

/// Discoverable configuration mirroring [`ImportAssetsOptions`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImportAssetsConfig {
  /// Prefix of generated import identifiers.
  pub import_prefix: Option<String>,
  /// Whether absolute `http(s)://` URLs are rewritten.
  pub http: bool,
  /// Additional rules appended to the defaults.
  pub sources: Vec<SourceConfig>,
  /// Use only `sources`, dropping the built-in rules.
  pub replace_default_sources: bool,
  /// URL scopes forming the global URL filter.
  pub urls: UrlSelectionFile,
}

/// Declarative form of an [`AssetSource`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
  /// Element name the rule applies to.
  pub tag: String,
  /// Attributes holding a single URL.
  #[serde(default)]
  pub src_attributes: Vec<String>,
  /// Attributes holding a `srcset` candidate list.
  #[serde(default)]
  pub srcset_attributes: Vec<String>,
  /// Attribute name to accepted values. When non-empty the rule only applies to elements
  /// where at least one listed attribute has an accepted value.
  #[serde(default)]
  pub allow: BTreeMap<String, Vec<String>>,
}

impl SourceConfig {
  /// Convert into a runtime rule.
  pub fn into_source(self) -> AssetSource {
    let source = AssetSource::new(self.tag)
      .src_attributes(self.src_attributes)
      .srcset_attributes(self.srcset_attributes);

    if self.allow.is_empty() {
      return source;
    }

    let filter = self
      .allow
      .into_iter()
      .fold(AttributeAllowList::new(), |list, (attribute, values)| {
        list.allow(attribute, values)
      });
    source.with_source_filter(Arc::new(filter))
  }
}

impl ImportAssetsConfig {
  /// Load `import-assets.json` from `dir`, falling back to defaults when it does not exist.
  pub fn discover(dir: &Path) -> anyhow::Result<Self> {
    let candidate = dir.join(DEFAULT_CONFIG_FILE);
    match fs::read_to_string(&candidate) {
      Ok(content) => Self::parse(&content, &candidate),
      Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
      Err(err) => {
        Err(err).with_context(|| format!("failed to read config {}", candidate.display()))
      }
    }
  }

  /// Read configuration from a specific JSON file.
  pub fn from_path(path: &Path) -> anyhow::Result<Self> {
    let content = fs::read_to_string(path)
      .with_context(|| format!("failed to read config {}", path.display()))?;
    Self::parse(&content, path)
  }

  fn parse(content: &str, path: &Path) -> anyhow::Result<Self> {
    serde_json::from_str(content)
      .with_context(|| format!("failed to parse config {}", path.display()))
  }

  /// Convert the configuration into preprocessor options.
  pub fn into_options(self) -> anyhow::Result<ImportAssetsOptions> {
    let extra: Vec<AssetSource> = self
      .sources
      .into_iter()
      .map(SourceConfig::into_source)
      .collect();

    let sources = if self.replace_default_sources {
      Sources::List(extra)
    } else if extra.is_empty() {
      Sources::Defaults
    } else {
      Sources::Derived(Arc::new(move |mut defaults: Vec<AssetSource>| {
        defaults.extend(extra.iter().cloned());
        defaults
      }))
    };

    let mut options = ImportAssetsOptions::default()
      .sources(sources)
      .http(self.http);
    if let Some(prefix) = self.import_prefix {
      options = options.import_prefix(prefix);
    }

    let selection = UrlSelection::try_from(self.urls).context("invalid `urls` configuration")?;
    if !selection.is_unfiltered() {
      options = options.with_url_filter(Arc::new(selection));
    }

    Ok(options)
  }
}

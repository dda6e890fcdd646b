//! Per-file preprocessor that rewrites asset references in component markup.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::edit::EditBuffer;
use crate::error::PreprocessError;
use crate::markup::parse;
use crate::models::{Processed, UrlFilter};
use crate::rewrite::{Traversal, insert_imports};
use crate::sources::{DEFAULT_IMPORT_PREFIX, RuleSet, Sources};

/// Options accepted by [`ImportAssets::new`].
#[derive(Clone)]
pub struct ImportAssetsOptions {
  /// Rule list, or how to derive it from the defaults.
  pub sources: Sources,
  /// Prefix of generated import identifiers.
  pub import_prefix: String,
  /// Whether absolute `http(s)://` URLs are rewritten.
  pub http: bool,
  /// Global predicate consulted after the built-in URL checks.
  pub url_filter: Option<Arc<dyn UrlFilter>>,
}

impl Default for ImportAssetsOptions {
  fn default() -> Self {
    Self {
      sources: Sources::Defaults,
      import_prefix: DEFAULT_IMPORT_PREFIX.to_string(),
      http: false,
      url_filter: None,
    }
  }
}

impl ImportAssetsOptions {
  /// Replace the rule configuration.
  pub fn sources(mut self, sources: Sources) -> Self {
    self.sources = sources;
    self
  }

  /// Set the identifier prefix.
  pub fn import_prefix(mut self, prefix: impl Into<String>) -> Self {
    self.import_prefix = prefix.into();
    self
  }

  /// Allow or forbid rewriting of remote URLs.
  pub fn http(mut self, http: bool) -> Self {
    self.http = http;
    self
  }

  /// Install a closure as the global URL filter.
  pub fn url_filter<F>(self, filter: F) -> Self
  where
    F: Fn(&str) -> anyhow::Result<bool> + Send + Sync + 'static,
  {
    self.with_url_filter(Arc::new(filter))
  }

  /// Install an already shared global URL filter.
  pub fn with_url_filter(mut self, filter: Arc<dyn UrlFilter>) -> Self {
    self.url_filter = Some(filter);
    self
  }
}

impl fmt::Debug for ImportAssetsOptions {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ImportAssetsOptions")
      .field("sources", &self.sources)
      .field("import_prefix", &self.import_prefix)
      .field("http", &self.http)
      .field("url_filter", &self.url_filter.as_ref().map(|_| "<filter>"))
      .finish()
  }
}

/// Markup preprocessor turning local asset references into imports.
///
/// The rule set is resolved once at construction. Each [`ImportAssets::markup`] call
/// owns its own traversal state, so one instance can serve many files, including from
/// several threads at once.
#[derive(Debug, Clone)]
pub struct ImportAssets {
  rules: RuleSet,
  import_prefix: String,
}

impl ImportAssets {
  /// Resolve `options` into a ready preprocessor.
  pub fn new(options: ImportAssetsOptions) -> Self {
    let ImportAssetsOptions {
      sources,
      import_prefix,
      http,
      url_filter,
    } = options;

    Self {
      rules: RuleSet::new(sources.resolve(), http, url_filter),
      import_prefix,
    }
  }

  /// Resolved rules in use.
  pub fn rules(&self) -> &RuleSet {
    &self.rules
  }

  /// Rewrite the markup of one component.
  ///
  /// Returns the edited source and a source map pointing back at `content`. Parse errors
  /// and filter failures abort the file without partial output.
  pub fn markup(&self, content: &str, filename: Option<&str>) -> Result<Processed, PreprocessError> {
    let document = parse(content, filename)?;
    let mut edits = EditBuffer::new(content);

    let mut traversal = Traversal::new(&self.rules, content, &mut edits, &self.import_prefix);
    traversal.walk(&document.html)?;
    let registry = traversal.finish();

    let placement = insert_imports(&document, &registry, &mut edits)?;
    debug!(?filename, imports = registry.len(), ?placement, "processed markup");

    let (code, map) = edits.finish(filename);
    Ok(Processed { code, map })
  }
}

impl Default for ImportAssets {
  fn default() -> Self {
    Self::new(ImportAssetsOptions::default())
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;
  use crate::models::AssetSource;

  fn process(source: &str) -> String {
    ImportAssets::default().markup(source, None).unwrap().code
  }

  fn process_with(options: ImportAssetsOptions, source: &str) -> String {
    ImportAssets::new(options).markup(source, None).unwrap().code
  }

  fn assert_send_sync<T: Send + Sync>() {}

  #[test]
  fn preprocessor_can_be_shared_across_threads() {
    assert_send_sync::<ImportAssets>();
    assert_send_sync::<ImportAssetsOptions>();
  }

  #[test]
  fn rewrites_src_and_appends_a_script() {
    assert_eq!(
      process(r#"<img src="./logo.png" alt="logo">"#),
      r#"<img src="{___ASSET___0}" alt="logo"><script>import ___ASSET___0 from "./logo.png";</script>"#
    );
  }

  #[test]
  fn deduplicates_across_src_and_srcset() {
    assert_eq!(
      process(r#"<img src="./a.png"><img srcset="./a.png 1x, ./b.png 2x">"#),
      concat!(
        r#"<img src="{___ASSET___0}"><img srcset="{___ASSET___0} 1x, {___ASSET___1} 2x">"#,
        r#"<script>import ___ASSET___0 from "./a.png";import ___ASSET___1 from "./b.png";</script>"#
      )
    );
  }

  #[test]
  fn names_follow_document_order() {
    let code = process(
      r#"<div><video poster="./p.jpg" src="./v.mp4"></video></div><audio src="./s.mp3"></audio><img src="./v.mp4">"#,
    );
    assert!(code.contains(r#"poster="{___ASSET___0}" src="{___ASSET___1}""#));
    assert!(code.contains(r#"<audio src="{___ASSET___2}">"#));
    assert!(code.contains(r#"<img src="{___ASSET___1}">"#));
    assert!(code.ends_with(
      r#"<script>import ___ASSET___0 from "./p.jpg";import ___ASSET___1 from "./v.mp4";import ___ASSET___2 from "./s.mp3";</script>"#
    ));
  }

  #[test]
  fn trims_values_before_registering() {
    assert_eq!(
      process(r#"<img src=" ./a.png "><img src="./a.png">"#),
      r#"<img src="{___ASSET___0}"><img src="{___ASSET___0}"><script>import ___ASSET___0 from "./a.png";</script>"#
    );
  }

  #[test]
  fn whitespace_only_value_imports_empty_path() {
    assert_eq!(
      process(r#"<img src="  ">"#),
      r#"<img src="{___ASSET___0}"><script>import ___ASSET___0 from "";</script>"#
    );
  }

  #[test]
  fn ignore_directive_skips_only_the_next_element() {
    let code = process(
      r#"<!-- svelte-preprocess-import-assets:ignore --><img src="./a.png"><img src="./a.png">"#,
    );
    assert_eq!(
      code,
      r#"<!-- svelte-preprocess-import-assets:ignore --><img src="./a.png"><img src="{___ASSET___0}"><script>import ___ASSET___0 from "./a.png";</script>"#
    );
  }

  #[test]
  fn ignored_element_still_has_its_descendants_processed() {
    let code = process(
      "<!--svelte-preprocess-import-assets:ignore-->\n<picture><img src=\"./a.png\"></picture>",
    );
    assert!(code.contains(r#"<picture><img src="{___ASSET___0}"></picture>"#));

    let code = process(
      "<!-- svelte-preprocess-import-assets:ignore --><video poster=\"./p.jpg\"><source src=\"./v.mp4\"></video>",
    );
    assert!(code.contains(r#"<video poster="./p.jpg"><source src="{___ASSET___0}"></video>"#));
  }

  #[test]
  fn repeated_directive_does_not_accumulate() {
    let code = process(concat!(
      "<!-- svelte-preprocess-import-assets:ignore -->",
      "<!-- svelte-preprocess-import-assets:ignore -->",
      r#"<img src="./a.png"><img src="./b.png">"#,
    ));
    assert!(code.contains(r#"<img src="./a.png"><img src="{___ASSET___0}">"#));
    assert!(code.ends_with(r#"import ___ASSET___0 from "./b.png";</script>"#));
  }

  #[test]
  fn directive_inside_blocks_applies_to_next_element_in_document_order() {
    let code = process(concat!(
      "{#if ok}<!-- svelte-preprocess-import-assets:ignore -->{/if}",
      r#"<img src="./a.png">"#,
    ));
    assert_eq!(code, r#"{#if ok}<!-- svelte-preprocess-import-assets:ignore -->{/if}<img src="./a.png">"#);
  }

  #[test]
  fn top_level_style_does_not_consume_the_directive() {
    let source = r#"<!-- svelte-preprocess-import-assets:ignore --><style>p{}</style><img src="./a.png">"#;
    assert_eq!(process(source), source);
  }

  #[test]
  fn head_title_does_not_consume_the_directive() {
    let source = concat!(
      "<!-- svelte-preprocess-import-assets:ignore -->",
      r#"<svelte:head><title>Home</title><link rel="icon" href="./icon.png"></svelte:head>"#,
    );
    assert_eq!(process(source), source);

    let code = process(concat!(
      "<!-- svelte-preprocess-import-assets:ignore -->",
      r#"<title>Home</title><img src="./a.png">"#,
    ));
    assert!(code.contains(r#"<title>Home</title><img src="{___ASSET___0}">"#));
  }

  #[test]
  fn components_do_not_consume_the_directive() {
    let code = process(concat!(
      "<!-- svelte-preprocess-import-assets:ignore -->",
      r#"<Card><img src="./a.png"></Card><img src="./b.png">"#,
    ));
    assert!(code.contains(r#"<Card><img src="./a.png"></Card><img src="{___ASSET___0}">"#));
  }

  #[test]
  fn leaves_anchor_references_alone() {
    let source = r##"<svg><use href="#icon"/><image href="#pic"></image></svg>"##;
    assert_eq!(process(source), source);
  }

  #[test]
  fn gates_remote_urls_on_http_option() {
    let source = r#"<img src="https://example.com/a.png">"#;
    assert_eq!(process(source), source);
    assert_eq!(
      process_with(ImportAssetsOptions::default().http(true), source),
      r#"<img src="{___ASSET___0}"><script>import ___ASSET___0 from "https://example.com/a.png";</script>"#
    );
  }

  #[test]
  fn srcset_keeps_descriptors_and_commas() {
    assert_eq!(
      process(r#"<source srcset="./a.png 1x, ./b.png 2x">"#),
      concat!(
        r#"<source srcset="{___ASSET___0} 1x, {___ASSET___1} 2x">"#,
        r#"<script>import ___ASSET___0 from "./a.png";import ___ASSET___1 from "./b.png";</script>"#
      )
    );
  }

  #[test]
  fn srcset_candidates_pass_through_the_url_gate_individually() {
    assert_eq!(
      process(r##"<img srcset="https://cdn.dev/a.png 1x, ./b.png 2x, #c 3x">"##),
      concat!(
        r##"<img srcset="https://cdn.dev/a.png 1x, {___ASSET___0} 2x, #c 3x">"##,
        r#"<script>import ___ASSET___0 from "./b.png";</script>"#
      )
    );
  }

  #[test]
  fn rule_filter_runs_once_per_srcset_attribute() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let options = ImportAssetsOptions::default().sources(Sources::List(vec![
      AssetSource::new("img")
        .srcset_attributes(["srcset"])
        .with_filter(move |_| {
          counter.fetch_add(1, Ordering::SeqCst);
          Ok(true)
        }),
    ]));

    let code = process_with(options, r#"<img srcset="./a.png 1x, ./b.png 2x, ./c.png 3x">"#);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(code.starts_with(
      r#"<img srcset="{___ASSET___0} 1x, {___ASSET___1} 2x, {___ASSET___2} 3x">"#
    ));
    assert_eq!(code.matches("import ___ASSET___").count(), 3);
  }

  #[test]
  fn link_imagesrcset_follows_the_rel_allow_list() {
    let code = process(concat!(
      r#"<link rel="preload" as="image" imagesrcset="./a.png 1x, ./b.png 2x">"#,
      r#"<link rel="canonical" imagesrcset="./c.png 1x">"#,
    ));
    assert_eq!(
      code,
      concat!(
        r#"<link rel="preload" as="image" imagesrcset="{___ASSET___0} 1x, {___ASSET___1} 2x">"#,
        r#"<link rel="canonical" imagesrcset="./c.png 1x">"#,
        r#"<script>import ___ASSET___0 from "./a.png";import ___ASSET___1 from "./b.png";</script>"#,
      )
    );
  }

  #[test]
  fn untouched_file_is_returned_verbatim() {
    let source = "<script>let name = 'x';</script>\n<h1 class=\"title\">Hello {name}</h1>\n";
    let processed = ImportAssets::default().markup(source, Some("App.svelte")).unwrap();
    assert_eq!(processed.code, source);
    assert!(!processed.code.contains("import"));
  }

  #[test]
  fn prefers_module_script_for_imports() {
    let code = process(concat!(
      "<script>let a;</script>",
      "<script context=\"module\">export const b = 1;</script>",
      r#"<img src="./a.png">"#,
    ));
    assert_eq!(
      code,
      concat!(
        "<script>let a;</script>",
        "<script context=\"module\">import ___ASSET___0 from \"./a.png\";export const b = 1;</script>",
        r#"<img src="{___ASSET___0}">"#,
      )
    );
  }

  #[test]
  fn prepends_to_instance_script() {
    assert_eq!(
      process("<script>\n  let a;\n</script>\n<img src=\"./a.png\">"),
      "<script>import ___ASSET___0 from \"./a.png\";\n  let a;\n</script>\n<img src=\"{___ASSET___0}\">"
    );
  }

  #[test]
  fn dynamic_and_boolean_values_are_not_eligible() {
    let source = r#"<img src="./{name}.png"><img src={src}><img src><img src="">"#;
    assert_eq!(process(source), source);
  }

  #[test]
  fn link_and_meta_rules_use_allow_lists() {
    let code = process(concat!(
      r#"<link rel="stylesheet" href="./a.css">"#,
      r#"<link rel="canonical" href="./b.html">"#,
      r#"<meta property="og:image" content="./og.png">"#,
      r#"<meta name="description" content="./not-an-asset">"#,
    ));
    assert!(code.contains(r#"<link rel="stylesheet" href="{___ASSET___0}">"#));
    assert!(code.contains(r#"<link rel="canonical" href="./b.html">"#));
    assert!(code.contains(r#"<meta property="og:image" content="{___ASSET___1}">"#));
    assert!(code.contains(r#"<meta name="description" content="./not-an-asset">"#));
  }

  #[test]
  fn filter_receives_attribute_source_and_static_attributes() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let options = ImportAssetsOptions::default().sources(Sources::List(vec![
      AssetSource::new("img")
        .src_attributes(["src"])
        .with_filter(move |meta| {
          recorder.lock().unwrap().push((
            meta.tag.to_string(),
            meta.attribute.to_string(),
            meta.value.to_string(),
            meta.attributes.get("alt").cloned(),
          ));
          Ok(meta.attributes.get("data-skip").is_none())
        }),
    ]));

    let code = process_with(
      options,
      r#"<img alt="a" src="./a.png" title={t}><img src="./b.png" data-skip="1">"#,
    );
    assert_eq!(
      code,
      r#"<img alt="a" src="{___ASSET___0}" title={t}><img src="./b.png" data-skip="1"><script>import ___ASSET___0 from "./a.png";</script>"#
    );
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(
      seen[0],
      (
        "img".to_string(),
        "src".to_string(),
        r#"src="./a.png""#.to_string(),
        Some("a".to_string())
      )
    );
  }

  #[test]
  fn url_filter_can_reject_candidates() {
    let options = ImportAssetsOptions::default().url_filter(|url| Ok(!url.ends_with(".svg")));
    let code = process_with(options, r#"<img src="./a.svg"><img src="./b.png">"#);
    assert!(code.contains(r#"<img src="./a.svg"><img src="{___ASSET___0}">"#));
  }

  #[test]
  fn derived_sources_extend_the_defaults() {
    let options = ImportAssetsOptions::default()
      .import_prefix("__img")
      .sources(Sources::Derived(Arc::new(|mut defaults: Vec<AssetSource>| {
        defaults.push(AssetSource::new("lazy-img").src_attributes(["data-src"]));
        defaults
      })));
    let code = process_with(options, r#"<lazy-img data-src="./a.png"></lazy-img><img src="./b.png">"#);
    assert!(code.contains(r#"<lazy-img data-src="{__img0}"></lazy-img><img src="{__img1}">"#));
  }

  #[test]
  fn duplicate_rules_apply_cumulatively_without_conflict() {
    let options = ImportAssetsOptions::default().sources(Sources::List(vec![
      AssetSource::new("img").src_attributes(["src"]),
      AssetSource::new("img").src_attributes(["src"]).srcset_attributes(["srcset"]),
    ]));
    assert_eq!(
      process_with(options, r#"<img src="./a.png" srcset="./b.png 2x">"#),
      concat!(
        r#"<img src="{___ASSET___0}" srcset="{___ASSET___1} 2x">"#,
        r#"<script>import ___ASSET___0 from "./a.png";import ___ASSET___1 from "./b.png";</script>"#
      )
    );
  }

  #[test]
  fn filter_errors_abort_the_file() {
    let options = ImportAssetsOptions::default().sources(Sources::List(vec![
      AssetSource::new("img")
        .src_attributes(["src"])
        .with_filter(|_| anyhow::bail!("filter exploded")),
    ]));
    let err = ImportAssets::new(options)
      .markup(r#"<img src="./a.png">"#, None)
      .unwrap_err();
    assert!(matches!(
      &err,
      PreprocessError::Filter { tag, attribute, .. } if tag == "img" && attribute == "src"
    ));
    assert_eq!(
      std::error::Error::source(&err).map(|source| source.to_string()),
      Some("filter exploded".to_string())
    );
  }

  #[test]
  fn url_filter_errors_abort_the_file() {
    let options = ImportAssetsOptions::default().url_filter(|_| anyhow::bail!("nope"));
    let err = ImportAssets::new(options)
      .markup(r#"<img src="./a.png">"#, None)
      .unwrap_err();
    assert!(matches!(err, PreprocessError::UrlFilter { ref url, .. } if url == "./a.png"));
  }

  #[test]
  fn parse_errors_are_propagated() {
    let err = ImportAssets::default()
      .markup("<div><img src=\"./a.png\">", Some("Broken.svelte"))
      .unwrap_err();
    match err {
      PreprocessError::Parse(parse) => assert_eq!(parse.filename.as_deref(), Some("Broken.svelte")),
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[test]
  fn source_map_points_back_to_original_lines() {
    let source = "<img src=\"./a.png\">\n<p>after</p>";
    let processed = ImportAssets::default().markup(source, Some("App.svelte")).unwrap();
    let map = &processed.map;

    assert_eq!(map.get_source(0), Some("App.svelte"));
    let token = map.lookup_token(1, 0).unwrap();
    assert_eq!((token.get_src_line(), token.get_src_col()), (1, 0));

    let json = processed.map_json().unwrap();
    assert!(json.contains("\"version\":3"));
  }

  #[test]
  fn instances_do_not_share_ignore_state_between_files() {
    let assets = ImportAssets::default();
    assets
      .markup("<!-- svelte-preprocess-import-assets:ignore -->", None)
      .unwrap();
    let code = assets.markup(r#"<img src="./a.png">"#, None).unwrap().code;
    assert!(code.contains("{___ASSET___0}"));
  }
}

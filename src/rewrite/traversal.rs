//! Single pre-order walk over the markup that records asset rewrites.

use tracing::{debug, trace};

use crate::asset_paths::{UrlVerdict, split_srcset};
use crate::edit::EditBuffer;
use crate::error::PreprocessError;
use crate::markup::{AttributeMap, Element, Node, TextPart, literal_value};
use crate::models::{AssetSource, FilterMetadata};
use crate::rewrite::registry::ImportRegistry;
use crate::sources::{IGNORE_DIRECTIVE, RuleSet};

/// Walks markup nodes in document order, registering imports and recording splices.
///
/// The ignore flag is owned by the traversal, so separate files never share it.
pub struct Traversal<'a, 's> {
  rules: &'a RuleSet,
  source: &'s str,
  edits: &'a mut EditBuffer<'s>,
  registry: ImportRegistry,
  ignore_next_element: bool,
}

impl<'a, 's> Traversal<'a, 's> {
  /// Prepare a traversal over `source`, writing splices into `edits`.
  pub fn new(
    rules: &'a RuleSet,
    source: &'s str,
    edits: &'a mut EditBuffer<'s>,
    import_prefix: &str,
  ) -> Self {
    Self {
      rules,
      source,
      edits,
      registry: ImportRegistry::new(import_prefix),
      ignore_next_element: false,
    }
  }

  /// Visit `nodes` and all of their descendants.
  pub fn walk(&mut self, nodes: &[Node]) -> Result<(), PreprocessError> {
    self.walk_within(nodes, None)
  }

  /// Hand back the registry once the walk is complete.
  pub fn finish(self) -> ImportRegistry {
    self.registry
  }

  fn walk_within(&mut self, nodes: &[Node], parent: Option<&Element>) -> Result<(), PreprocessError> {
    for node in nodes {
      self.visit(node, parent)?;
    }
    Ok(())
  }

  /// `parent` is the directly enclosing element. Block branches have none.
  fn visit(&mut self, node: &Node, parent: Option<&Element>) -> Result<(), PreprocessError> {
    match node {
      Node::Comment(comment) => {
        if comment.data.trim() == IGNORE_DIRECTIVE {
          self.ignore_next_element = true;
        }
      }
      Node::Element(element) => {
        if element.is_regular(parent) {
          if self.ignore_next_element {
            self.ignore_next_element = false;
            debug!(tag = %element.name, offset = element.span.start, "skipping ignored element");
          } else {
            self.rewrite_element(element)?;
          }
        }
        self.walk_within(&element.children, Some(element))?;
      }
      Node::Block(block) => {
        for branch in &block.branches {
          self.walk_within(branch, None)?;
        }
      }
      Node::Text(_) | Node::Tag(_) => {}
    }
    Ok(())
  }

  fn rewrite_element(&mut self, element: &Element) -> Result<(), PreprocessError> {
    let attributes = AttributeMap::new(element);
    let rules = self.rules;

    for source in rules.matching(&element.name) {
      for name in &source.src_attributes {
        if let Some(value) = self.eligible_value(source, element, name, &attributes)? {
          self.add_import(value)?;
        }
      }

      for name in &source.srcset_attributes {
        if let Some(value) = self.eligible_value(source, element, name, &attributes)? {
          for candidate in split_srcset(value) {
            self.add_import(&candidate)?;
          }
        }
      }
    }

    Ok(())
  }

  /// Static value of `name` on `element`, if present and accepted by the rule's filter.
  fn eligible_value<'e>(
    &self,
    source: &AssetSource,
    element: &'e Element,
    name: &str,
    attributes: &AttributeMap<'_>,
  ) -> Result<Option<&'e TextPart>, PreprocessError> {
    let Some(value) = literal_value(element, name) else {
      return Ok(None);
    };

    if let (Some(filter), Some(attribute)) = (&source.filter, element.attribute(name)) {
      let metadata = FilterMetadata {
        tag: &source.tag,
        attribute: name,
        value: attribute.span.slice(self.source),
        attributes: attributes.get(),
      };
      let accepted = filter
        .accepts(&metadata)
        .map_err(|err| PreprocessError::Filter {
          tag: source.tag.clone(),
          attribute: name.to_string(),
          source: err.into(),
        })?;
      if !accepted {
        trace!(tag = %source.tag, attribute = name, "rule filter rejected attribute");
        return Ok(None);
      }
    }

    Ok(Some(value))
  }

  fn add_import(&mut self, value: &TextPart) -> Result<(), PreprocessError> {
    let url = value.raw.trim();
    let verdict = self
      .rules
      .check_url(url)
      .map_err(|err| PreprocessError::UrlFilter {
        url: url.to_string(),
        source: err.into(),
      })?;
    if verdict != UrlVerdict::Accept {
      trace!(url, ?verdict, "leaving reference untouched");
      return Ok(());
    }

    let name = self.registry.register(url);
    debug!(url, import = name, start = value.start, "rewriting asset reference");
    let replacement = format!("{{{name}}}");
    self.edits.overwrite(value.start, value.end, &replacement)?;
    Ok(())
  }
}

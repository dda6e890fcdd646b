use std::cell::OnceCell;
use std::collections::BTreeMap;

use super::node::{AttributeValue, Element, TextPart, ValuePart};

/// Return the literal value of `name` when it is a single static text part.
///
/// Absent attributes, boolean attributes, empty values and values containing any
/// `{expression}` interpolation are never eligible for rewriting.
pub fn literal_value<'a>(element: &'a Element, name: &str) -> Option<&'a TextPart> {
  single_literal(&element.attribute(name)?.value)
}

fn single_literal(value: &AttributeValue) -> Option<&TextPart> {
  match value {
    AttributeValue::Parts(parts) => match parts.as_slice() {
      [ValuePart::Text(text)] => Some(text),
      _ => None,
    },
    AttributeValue::Boolean => None,
  }
}

/// Lazily built `name -> raw text` view of an element's static attributes.
///
/// The map is computed on first access and reused for every later filter call on the
/// same element.
pub struct AttributeMap<'a> {
  element: &'a Element,
  cache: OnceCell<BTreeMap<String, String>>,
}

impl<'a> AttributeMap<'a> {
  /// Create an unresolved cache for `element`.
  pub fn new(element: &'a Element) -> Self {
    Self {
      element,
      cache: OnceCell::new(),
    }
  }

  /// Static attributes of the element, building the map if needed.
  pub fn get(&self) -> &BTreeMap<String, String> {
    self.cache.get_or_init(|| {
      self.element
        .attributes
        .iter()
        .filter_map(|attr| {
          single_literal(&attr.value).map(|text| (attr.name.clone(), text.raw.clone()))
        })
        .collect()
    })
  }

  /// Whether the map has been built yet.
  #[cfg(test)]
  fn is_resolved(&self) -> bool {
    self.cache.get().is_some()
  }
}

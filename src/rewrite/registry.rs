use std::collections::BTreeMap;

/// One registered import: asset path and the identifier bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
  /// Trimmed asset path as written in the markup.
  pub path: String,
  /// Generated identifier, `prefix + index`.
  pub name: String,
}

/// Deduplicating map from asset path to generated identifier.
///
/// Identifiers are assigned in first-seen order, so the Nth distinct path is always
/// named `prefix + N`.
#[derive(Debug, Clone)]
pub struct ImportRegistry {
  prefix: String,
  entries: Vec<ImportEntry>,
  index: BTreeMap<String, usize>,
}

impl ImportRegistry {
  /// Empty registry generating identifiers with `prefix`.
  pub fn new(prefix: impl Into<String>) -> Self {
    Self {
      prefix: prefix.into(),
      entries: Vec::new(),
      index: BTreeMap::new(),
    }
  }

  /// Return the identifier for `path`, allocating the next one on first sight.
  pub fn register(&mut self, path: &str) -> &str {
    let path = path.trim();
    let position = match self.index.get(path) {
      Some(&position) => position,
      None => {
        let position = self.entries.len();
        self.entries.push(ImportEntry {
          path: path.to_string(),
          name: format!("{}{}", self.prefix, position),
        });
        self.index.insert(path.to_string(), position);
        position
      }
    };
    &self.entries[position].name
  }

  /// Identifier previously assigned to `path`, if any.
  #[cfg(test)]
  fn get(&self, path: &str) -> Option<&str> {
    self
      .index
      .get(path.trim())
      .map(|&position| self.entries[position].name.as_str())
  }

  /// Registered imports in registration order.
  pub fn entries(&self) -> &[ImportEntry] {
    &self.entries
  }

  /// Number of distinct paths.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Whether nothing has been registered.
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

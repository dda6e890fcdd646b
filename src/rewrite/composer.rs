//! Turn the registry into import statements and place them in the component.

use tracing::debug;

use crate::edit::EditBuffer;
use crate::error::PreprocessError;
use crate::markup::Document;
use crate::rewrite::registry::ImportRegistry;

/// Where the generated imports ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPlacement {
  /// Nothing was registered, so no script changed.
  Unchanged,
  /// Prepended to the module-scope script.
  ModuleScript,
  /// Prepended to the instance script.
  InstanceScript,
  /// Appended as a new `<script>` element.
  NewScript,
}

/// Render one `import name from "path";` statement per registered path.
pub fn render_imports(registry: &ImportRegistry) -> Result<String, PreprocessError> {
  let mut text = String::new();
  for entry in registry.entries() {
    let literal = serde_json::to_string(&entry.path).map_err(|source| PreprocessError::Render {
      path: entry.path.clone(),
      source,
    })?;
    text.push_str(&format!("import {} from {};", entry.name, literal));
  }
  Ok(text)
}

/// Insert the imports into the module script, else the instance script, else a new script.
pub fn insert_imports(
  document: &Document,
  registry: &ImportRegistry,
  edits: &mut EditBuffer<'_>,
) -> Result<ImportPlacement, PreprocessError> {
  if registry.is_empty() {
    return Ok(ImportPlacement::Unchanged);
  }

  let imports = render_imports(registry)?;
  let placement = if let Some(module) = &document.module {
    edits.append_left(module.content.start, &imports)?;
    ImportPlacement::ModuleScript
  } else if let Some(instance) = &document.instance {
    edits.append_left(instance.content.start, &imports)?;
    ImportPlacement::InstanceScript
  } else {
    edits.append(&format!("<script>{imports}</script>"));
    ImportPlacement::NewScript
  };

  debug!(count = registry.len(), ?placement, "inserted asset imports");
  Ok(placement)
}

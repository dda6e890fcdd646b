//! Offset-preserving text splicing over an immutable original source.
//!
//! Edits are recorded against original byte offsets and only applied when the buffer is
//! rendered, so every recorded offset stays valid no matter how many edits precede it.
//! Rendering also produces a v3 source map from the edited text back to the original.

use std::collections::BTreeMap;

use sourcemap::{SourceMap, SourceMapBuilder};

/// Rejected edit requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
  /// The range lies outside the source or is empty.
  #[error("invalid edit range [{start},{end}) for source of length {len}")]
  InvalidRange {
    /// Requested start offset.
    start: usize,
    /// Requested end offset.
    end: usize,
    /// Length of the original source.
    len: usize,
  },

  /// The offset splits a multi-byte character.
  #[error("edit offset {0} is not on a character boundary")]
  NotCharBoundary(usize),

  /// Two overwrites cover partially overlapping ranges.
  #[error("overlapping edits: [{a_start},{a_end}) overlaps [{b_start},{b_end})")]
  Overlapping {
    /// Start of the existing overwrite.
    a_start: usize,
    /// End of the existing overwrite.
    a_end: usize,
    /// Start of the rejected overwrite.
    b_start: usize,
    /// End of the rejected overwrite.
    b_end: usize,
  },

  /// An insertion point lies strictly inside an overwritten range.
  #[error("insertion at {offset} falls inside overwritten range [{start},{end})")]
  InsideOverwrite {
    /// Requested insertion offset.
    offset: usize,
    /// Start of the overwrite.
    start: usize,
    /// End of the overwrite.
    end: usize,
  },
}

#[derive(Debug, Clone)]
struct Overwrite {
  end: usize,
  content: String,
}

/// One generated-to-original position pair, 0-based with UTF-16 columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Mapping {
  generated_line: u32,
  generated_column: u32,
  original_line: u32,
  original_column: u32,
}

/// Recorded splices against an original source.
#[derive(Debug, Clone)]
pub struct EditBuffer<'s> {
  original: &'s str,
  overwrites: BTreeMap<usize, Overwrite>,
  insertions: BTreeMap<usize, String>,
  outro: String,
}

impl<'s> EditBuffer<'s> {
  /// Start an empty edit buffer over `original`.
  pub fn new(original: &'s str) -> Self {
    Self {
      original,
      overwrites: BTreeMap::new(),
      insertions: BTreeMap::new(),
      outro: String::new(),
    }
  }

  /// Replace the original range `[start, end)` with `content`.
  ///
  /// Overwriting exactly the same range again replaces the earlier content.
  pub fn overwrite(&mut self, start: usize, end: usize, content: &str) -> Result<(), EditError> {
    let len = self.original.len();
    if start >= end || end > len {
      return Err(EditError::InvalidRange { start, end, len });
    }
    self.check_boundary(start)?;
    self.check_boundary(end)?;

    if let Some((&prev_start, prev)) = self.overwrites.range(..=start).next_back() {
      let same_range = prev_start == start && prev.end == end;
      if !same_range && prev.end > start {
        return Err(EditError::Overlapping {
          a_start: prev_start,
          a_end: prev.end,
          b_start: start,
          b_end: end,
        });
      }
    }
    if let Some((&next_start, next)) = self.overwrites.range(start + 1..).next()
      && next_start < end
    {
      return Err(EditError::Overlapping {
        a_start: next_start,
        a_end: next.end,
        b_start: start,
        b_end: end,
      });
    }
    if let Some((&offset, _)) = self.insertions.range(start + 1..end).next() {
      return Err(EditError::InsideOverwrite { offset, start, end });
    }

    self.overwrites.insert(start, Overwrite {
      end,
      content: content.to_string(),
    });
    Ok(())
  }

  /// Insert `content` at `offset`, after anything already inserted there.
  pub fn append_left(&mut self, offset: usize, content: &str) -> Result<(), EditError> {
    let len = self.original.len();
    if offset > len {
      return Err(EditError::InvalidRange {
        start: offset,
        end: offset,
        len,
      });
    }
    self.check_boundary(offset)?;

    if let Some((&start, overwrite)) = self.overwrites.range(..offset).next_back()
      && overwrite.end > offset
    {
      return Err(EditError::InsideOverwrite {
        offset,
        start,
        end: overwrite.end,
      });
    }

    self.insertions.entry(offset).or_default().push_str(content);
    Ok(())
  }

  /// Append `content` to the end of the output.
  pub fn append(&mut self, content: &str) {
    self.outro.push_str(content);
  }

  /// Whether any edit has been recorded.
  #[cfg(test)]
  fn has_changed(&self) -> bool {
    !(self.overwrites.is_empty() && self.insertions.is_empty() && self.outro.is_empty())
  }

  /// Render the edited text.
  pub fn to_code(&self) -> String {
    self.render().code
  }

  /// Render the edited text together with a source map pointing back to `source_name`.
  pub fn finish(&self, source_name: Option<&str>) -> (String, SourceMap) {
    let Rendered { code, mappings } = self.render();

    let mut builder = SourceMapBuilder::new(source_name);
    let source_id = builder.add_source(source_name.unwrap_or("<anonymous>"));
    builder.set_source_contents(source_id, Some(self.original));
    for mapping in mappings {
      builder.add_raw(
        mapping.generated_line,
        mapping.generated_column,
        mapping.original_line,
        mapping.original_column,
        Some(source_id),
        None,
        false,
      );
    }

    (code, builder.into_sourcemap())
  }

  fn check_boundary(&self, offset: usize) -> Result<(), EditError> {
    if self.original.is_char_boundary(offset) {
      Ok(())
    } else {
      Err(EditError::NotCharBoundary(offset))
    }
  }

  fn render(&self) -> Rendered {
    let mut emitter = Emitter::new(self.original);
    let mut cursor = 0;

    for (&start, overwrite) in &self.overwrites {
      self.emit_original(&mut emitter, cursor, start);
      if let Some(text) = self.insertions.get(&start) {
        emitter.unmapped(text);
      }
      emitter.edited(&overwrite.content, start);
      cursor = overwrite.end;
    }

    let len = self.original.len();
    self.emit_original(&mut emitter, cursor, len);
    if let Some(text) = self.insertions.get(&len) {
      emitter.unmapped(text);
    }
    emitter.unmapped(&self.outro);

    Rendered {
      code: emitter.code,
      mappings: emitter.mappings,
    }
  }

  /// Emit original text in `[from, to)`, splicing in insertions at offsets inside it.
  fn emit_original(&self, emitter: &mut Emitter<'_>, from: usize, to: usize) {
    let mut chunk_start = from;
    for (&offset, text) in self.insertions.range(from..to) {
      emitter.original(chunk_start, offset);
      emitter.unmapped(text);
      chunk_start = offset;
    }
    emitter.original(chunk_start, to);
  }
}

struct Rendered {
  code: String,
  mappings: Vec<Mapping>,
}

struct Emitter<'s> {
  original: &'s str,
  line_starts: Vec<usize>,
  code: String,
  line: u32,
  column: u32,
  mappings: Vec<Mapping>,
}

impl<'s> Emitter<'s> {
  fn new(original: &'s str) -> Self {
    let line_starts = std::iter::once(0)
      .chain(original.match_indices('\n').map(|(index, _)| index + 1))
      .collect();

    Self {
      original,
      line_starts,
      code: String::with_capacity(original.len()),
      line: 0,
      column: 0,
      mappings: Vec::new(),
    }
  }

  fn original(&mut self, start: usize, end: usize) {
    if start >= end {
      return;
    }

    let (mut original_line, original_column) = self.locate(start);
    self.mark(original_line, original_column);

    let original = self.original;
    let mut at_line_start = false;
    for c in original[start..end].chars() {
      if at_line_start {
        self.mark(original_line, 0);
        at_line_start = false;
      }
      self.push(c);
      if c == '\n' {
        original_line += 1;
        at_line_start = true;
      }
    }
  }

  fn edited(&mut self, content: &str, original_start: usize) {
    let (line, column) = self.locate(original_start);
    self.mark(line, column);
    self.unmapped(content);
  }

  fn unmapped(&mut self, content: &str) {
    for c in content.chars() {
      self.push(c);
    }
  }

  fn push(&mut self, c: char) {
    self.code.push(c);
    if c == '\n' {
      self.line += 1;
      self.column = 0;
    } else {
      self.column += c.len_utf16() as u32;
    }
  }

  fn mark(&mut self, original_line: u32, original_column: u32) {
    let mapping = Mapping {
      generated_line: self.line,
      generated_column: self.column,
      original_line,
      original_column,
    };
    match self.mappings.last_mut() {
      Some(last)
        if last.generated_line == mapping.generated_line
          && last.generated_column == mapping.generated_column =>
      {
        *last = mapping;
      }
      _ => self.mappings.push(mapping),
    }
  }

  fn locate(&self, offset: usize) -> (u32, u32) {
    let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
    let line_start = self.line_starts[line];
    let column = self.original[line_start..offset].encode_utf16().count();
    (line as u32, column as u32)
  }
}

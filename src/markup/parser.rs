//! Recursive-descent parser for component markup.
//!
//! The parser is purely syntactic: expressions inside `{...}` are scanned for balanced
//! braces and string literals but never interpreted, and `<script>`/`<style>` bodies are
//! kept as raw text. Top-level `<script>` elements are lifted out of the markup fragment
//! into [`Document::instance`] and [`Document::module`].

use std::fmt;

use super::node::{
  Attribute, AttributeValue, Block, Comment, Document, Element, Node, Script, Span, Style,
  Text, TextPart, ValuePart,
};

const COMMENT_START: &str = "<!--";
const COMMENT_END: &str = "-->";

/// Fatal markup syntax error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
  /// File the markup came from, when known.
  pub filename: Option<String>,
  /// Byte offset of the offending input.
  pub offset: usize,
  /// 1-based line of `offset`.
  pub line: usize,
  /// 1-based column of `offset`, counted in characters.
  pub column: usize,
  /// Human readable description.
  pub message: String,
}

impl fmt::Display for ParseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.filename {
      Some(filename) => write!(
        f,
        "{}:{}:{}: {}",
        filename, self.line, self.column, self.message
      ),
      None => write!(f, "{}:{}: {}", self.line, self.column, self.message),
    }
  }
}

impl std::error::Error for ParseError {}

/// Parse component markup into a [`Document`].
pub fn parse(source: &str, filename: Option<&str>) -> Result<Document, ParseError> {
  Parser::new(source, filename).parse_document()
}

fn is_void_element(name: &str) -> bool {
  matches!(
    name,
    "area"
      | "base"
      | "br"
      | "col"
      | "command"
      | "embed"
      | "hr"
      | "img"
      | "input"
      | "keygen"
      | "link"
      | "meta"
      | "param"
      | "source"
      | "track"
      | "wbr"
  )
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
  let hay = haystack.as_bytes();
  let needle = needle.as_bytes();
  if hay.len() < needle.len() {
    return None;
  }
  (0..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

struct Parser<'s> {
  source: &'s str,
  filename: Option<&'s str>,
  pos: usize,
  open_elements: Vec<String>,
  open_blocks: Vec<String>,
  instance: Option<Script>,
  module: Option<Script>,
  css: Option<Style>,
}

impl<'s> Parser<'s> {
  fn new(source: &'s str, filename: Option<&'s str>) -> Self {
    Self {
      source,
      filename,
      pos: 0,
      open_elements: Vec::new(),
      open_blocks: Vec::new(),
      instance: None,
      module: None,
      css: None,
    }
  }

  fn parse_document(mut self) -> Result<Document, ParseError> {
    let html = self.parse_fragment()?;

    if !self.at_end() {
      if self.rest().starts_with("</") {
        let name = self.peek_closing_name();
        return Err(self.error_at(
          self.pos,
          format!("`</{name}>` attempted to close an element that was not open"),
        ));
      }
      return Err(self.error_at(self.pos, "block tag found with no open block"));
    }

    Ok(Document {
      html,
      instance: self.instance,
      module: self.module,
      css: self.css,
    })
  }

  /// Parse nodes until end of input, a closing tag, or a block branch/close tag.
  fn parse_fragment(&mut self) -> Result<Vec<Node>, ParseError> {
    let mut nodes = Vec::new();

    while !self.at_end() {
      let rest = self.rest();
      if rest.starts_with("</") || rest.starts_with("{:") || rest.starts_with("{/") {
        break;
      }

      if rest.starts_with(COMMENT_START) {
        nodes.push(self.parse_comment()?);
      } else if self.at_tag_open() {
        if let Some(node) = self.parse_element()? {
          nodes.push(node);
        }
      } else if rest.starts_with("{#") {
        nodes.push(self.parse_block()?);
      } else if rest.starts_with('{') {
        nodes.push(Node::Tag(self.parse_expression()?));
      } else {
        nodes.push(self.parse_text());
      }
    }

    Ok(nodes)
  }

  fn parse_text(&mut self) -> Node {
    let start = self.pos;
    // Always consume the current character so a stray `<` makes progress.
    self.advance_char();
    while !self.at_end() {
      let rest = self.rest();
      if rest.starts_with('{') || rest.starts_with("</") || rest.starts_with(COMMENT_START) {
        break;
      }
      if self.at_tag_open() {
        break;
      }
      self.advance_char();
    }

    let span = Span::new(start, self.pos);
    Node::Text(Text {
      span,
      raw: span.slice(self.source).to_string(),
    })
  }

  fn parse_comment(&mut self) -> Result<Node, ParseError> {
    let start = self.pos;
    let body_start = start + COMMENT_START.len();
    let Some(length) = self.source[body_start..].find(COMMENT_END) else {
      return Err(self.error_at(start, "comment was left open"));
    };
    let body_end = body_start + length;
    self.pos = body_end + COMMENT_END.len();

    Ok(Node::Comment(Comment {
      span: Span::new(start, self.pos),
      data: self.source[body_start..body_end].to_string(),
    }))
  }

  /// Returns `None` when the element was a top-level script or style lifted into the
  /// document.
  fn parse_element(&mut self) -> Result<Option<Node>, ParseError> {
    let start = self.pos;
    self.pos += 1;
    let name = self.read_while(|c| !(c.is_whitespace() || c == '/' || c == '>'));
    let (attributes, spreads, self_closing) = self.parse_attributes(start)?;
    let lowered = name.to_ascii_lowercase();

    if lowered == "script" || lowered == "style" {
      let content_start = self.pos;
      let content_end = if self_closing {
        content_start
      } else {
        self.skip_raw_text(start, &name, &lowered)?
      };
      let span = Span::new(start, self.pos);
      let content = Span::new(content_start, content_end);

      let top_level = self.open_elements.is_empty() && self.open_blocks.is_empty();
      if top_level && lowered == "script" {
        self.lift_script(Script {
          span,
          content,
          attributes,
        })?;
        return Ok(None);
      }
      if top_level {
        if self.css.is_some() {
          return Err(self.error_at(
            start,
            "a component can only have one top-level `<style>` element",
          ));
        }
        self.css = Some(Style {
          span,
          content,
          attributes,
        });
        return Ok(None);
      }

      let mut children = Vec::new();
      if content.end > content.start {
        children.push(Node::Text(Text {
          span: content,
          raw: content.slice(self.source).to_string(),
        }));
      }
      return Ok(Some(Node::Element(Element {
        name,
        span,
        attributes,
        spreads,
        children,
      })));
    }

    if self_closing || is_void_element(&lowered) {
      return Ok(Some(Node::Element(Element {
        name,
        span: Span::new(start, self.pos),
        attributes,
        spreads,
        children: Vec::new(),
      })));
    }

    self.open_elements.push(name.clone());
    let children = self.parse_fragment()?;

    if !self.rest().starts_with("</") {
      return Err(self.error_at(start, format!("`<{name}>` was left open")));
    }

    let close_name = self.peek_closing_name();
    if close_name == name {
      self.consume_closing_tag()?;
    } else if !self
      .open_elements
      .iter()
      .rev()
      .skip(1)
      .any(|open| *open == close_name)
    {
      return Err(self.error_at(
        self.pos,
        format!("`</{close_name}>` attempted to close an element that was not open"),
      ));
    }
    // Otherwise an ancestor's closing tag implicitly closes this element.
    self.open_elements.pop();

    Ok(Some(Node::Element(Element {
      name,
      span: Span::new(start, self.pos),
      attributes,
      spreads,
      children,
    })))
  }

  fn lift_script(&mut self, script: Script) -> Result<(), ParseError> {
    let is_module = script.attributes.iter().any(|attr| match &attr.value {
      AttributeValue::Boolean => attr.name == "module",
      AttributeValue::Parts(parts) => {
        attr.name == "context"
          && matches!(parts.as_slice(), [ValuePart::Text(text)] if text.raw == "module")
      }
    });

    if is_module {
      if self.module.is_some() {
        return Err(self.error_at(
          script.span.start,
          "a component can only have one module-level `<script>` element",
        ));
      }
      self.module = Some(script);
    } else {
      if self.instance.is_some() {
        return Err(self.error_at(
          script.span.start,
          "a component can only have one instance-level `<script>` element",
        ));
      }
      self.instance = Some(script);
    }
    Ok(())
  }

  /// Skip a raw text body and its closing tag, returning the offset where the body ends.
  fn skip_raw_text(&mut self, start: usize, name: &str, lowered: &str) -> Result<usize, ParseError> {
    let close = format!("</{lowered}");
    let Some(length) = find_ignore_ascii_case(self.rest(), &close) else {
      return Err(self.error_at(start, format!("`<{name}>` was left open")));
    };
    let content_end = self.pos + length;
    self.pos = content_end + close.len();
    self.skip_whitespace();
    self.expect('>')?;
    Ok(content_end)
  }

  fn parse_attributes(
    &mut self,
    tag_start: usize,
  ) -> Result<(Vec<Attribute>, Vec<Span>, bool), ParseError> {
    let mut attributes = Vec::new();
    let mut spreads = Vec::new();

    loop {
      self.skip_whitespace();
      if self.at_end() {
        return Err(self.error_at(tag_start, "tag was left open"));
      }

      let rest = self.rest();
      if rest.starts_with("/>") {
        self.pos += 2;
        return Ok((attributes, spreads, true));
      }
      if rest.starts_with('>') {
        self.pos += 1;
        return Ok((attributes, spreads, false));
      }

      if rest.starts_with('{') {
        let span = self.parse_expression()?;
        let inner = self.source[span.start + 1..span.end - 1].trim();
        if inner.starts_with("...") {
          spreads.push(span);
        } else {
          attributes.push(Attribute {
            name: inner.to_string(),
            span,
            value: AttributeValue::Parts(vec![ValuePart::Expression(span)]),
          });
        }
        continue;
      }

      let name_start = self.pos;
      let name = self.read_while(|c| {
        !(c.is_whitespace() || matches!(c, '=' | '>' | '/' | '"' | '\''))
      });
      if name.is_empty() {
        return Err(self.error_at(self.pos, "expected attribute name"));
      }
      let name_end = self.pos;

      self.skip_whitespace();
      if self.rest().starts_with('=') {
        self.pos += 1;
        self.skip_whitespace();
        let value = self.parse_attribute_value()?;
        attributes.push(Attribute {
          name,
          span: Span::new(name_start, self.pos),
          value: AttributeValue::Parts(value),
        });
      } else {
        attributes.push(Attribute {
          name,
          span: Span::new(name_start, name_end),
          value: AttributeValue::Boolean,
        });
      }
    }
  }

  fn parse_attribute_value(&mut self) -> Result<Vec<ValuePart>, ParseError> {
    let quote = match self.rest().chars().next() {
      Some(c @ ('"' | '\'')) => c,
      _ => {
        let parts = self.read_value_parts(|rest| {
          rest.starts_with(char::is_whitespace)
            || rest.starts_with('>')
            || rest.starts_with("/>")
        })?;
        if parts.is_empty() {
          return Err(self.error_at(self.pos, "expected attribute value"));
        }
        return Ok(parts);
      }
    };

    let open = self.pos;
    self.pos += 1;
    let parts = self.read_value_parts(|rest| rest.starts_with(quote))?;
    if self.at_end() {
      return Err(self.error_at(open, "attribute value was left open"));
    }
    self.pos += 1;
    Ok(parts)
  }

  fn read_value_parts(
    &mut self,
    is_terminator: impl Fn(&str) -> bool,
  ) -> Result<Vec<ValuePart>, ParseError> {
    let mut parts = Vec::new();
    let mut text_start = self.pos;

    while !self.at_end() && !is_terminator(self.rest()) {
      if self.rest().starts_with('{') {
        self.push_text_part(&mut parts, text_start);
        let span = self.parse_expression()?;
        parts.push(ValuePart::Expression(span));
        text_start = self.pos;
        continue;
      }
      self.advance_char();
    }

    self.push_text_part(&mut parts, text_start);
    Ok(parts)
  }

  fn push_text_part(&self, parts: &mut Vec<ValuePart>, start: usize) {
    if self.pos > start {
      parts.push(ValuePart::Text(TextPart {
        raw: self.source[start..self.pos].to_string(),
        start,
        end: self.pos,
      }));
    }
  }

  /// Scan a `{...}` expression with balanced braces, skipping string literals and comments.
  fn parse_expression(&mut self) -> Result<Span, ParseError> {
    let start = self.pos;
    let bytes = self.source.as_bytes();
    let mut depth = 0usize;
    let mut i = start;

    while i < bytes.len() {
      match bytes[i] {
        b'{' => depth += 1,
        b'}' => {
          depth -= 1;
          if depth == 0 {
            self.pos = i + 1;
            return Ok(Span::new(start, self.pos));
          }
        }
        quote @ (b'"' | b'\'' | b'`') => {
          i = self.skip_string(i, quote)?;
          continue;
        }
        b'/' if bytes.get(i + 1) == Some(&b'*') => {
          let Some(length) = self.source[i + 2..].find("*/") else {
            return Err(self.error_at(i, "comment was left open"));
          };
          i += 2 + length + 2;
          continue;
        }
        _ => {}
      }
      i += 1;
    }

    Err(self.error_at(start, "expression was left open"))
  }

  fn skip_string(&self, open: usize, quote: u8) -> Result<usize, ParseError> {
    let bytes = self.source.as_bytes();
    let mut i = open + 1;
    while i < bytes.len() {
      match bytes[i] {
        b'\\' => i += 2,
        b if b == quote => return Ok(i + 1),
        _ => i += 1,
      }
    }
    Err(self.error_at(open, "string literal was left open"))
  }

  fn parse_block(&mut self) -> Result<Node, ParseError> {
    let start = self.pos;
    let open = self.parse_expression()?;
    let name = self.source[start + 2..open.end - 1]
      .split(|c: char| c.is_whitespace() || c == '}')
      .next()
      .unwrap_or_default()
      .to_string();

    self.open_blocks.push(name.clone());
    let mut branches = Vec::new();

    loop {
      branches.push(self.parse_fragment()?);

      let rest = self.rest();
      if rest.starts_with("{:") {
        self.parse_expression()?;
        continue;
      }
      if rest.starts_with("{/") {
        let close_start = self.pos;
        let close = self.parse_expression()?;
        let close_name = self.source[close_start + 2..close.end - 1].trim();
        if close_name != name {
          return Err(self.error_at(
            close_start,
            format!("expected `{{/{name}}}`, found `{{/{close_name}}}`"),
          ));
        }
        break;
      }
      return Err(self.error_at(start, format!("`{{#{name}}}` block was left open")));
    }

    self.open_blocks.pop();
    Ok(Node::Block(Block {
      name,
      span: Span::new(start, self.pos),
      branches,
    }))
  }

  fn peek_closing_name(&self) -> String {
    self.source[self.pos + 2..]
      .chars()
      .take_while(|c| !(c.is_whitespace() || *c == '>'))
      .collect()
  }

  fn consume_closing_tag(&mut self) -> Result<(), ParseError> {
    self.pos += 2;
    self.read_while(|c| !(c.is_whitespace() || c == '>'));
    self.skip_whitespace();
    self.expect('>')
  }

  fn expect(&mut self, expected: char) -> Result<(), ParseError> {
    if self.rest().starts_with(expected) {
      self.pos += expected.len_utf8();
      Ok(())
    } else {
      Err(self.error_at(self.pos, format!("expected `{expected}`")))
    }
  }

  fn at_tag_open(&self) -> bool {
    let rest = self.rest();
    rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic())
  }

  fn read_while(&mut self, keep: impl Fn(char) -> bool) -> String {
    let start = self.pos;
    while let Some(c) = self.rest().chars().next() {
      if !keep(c) {
        break;
      }
      self.pos += c.len_utf8();
    }
    self.source[start..self.pos].to_string()
  }

  fn skip_whitespace(&mut self) {
    self.read_while(char::is_whitespace);
  }

  fn advance_char(&mut self) {
    if let Some(c) = self.rest().chars().next() {
      self.pos += c.len_utf8();
    }
  }

  fn rest(&self) -> &'s str {
    &self.source[self.pos..]
  }

  fn at_end(&self) -> bool {
    self.pos >= self.source.len()
  }

  fn error_at(&self, offset: usize, message: impl Into<String>) -> ParseError {
    let before = &self.source[..offset.min(self.source.len())];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |index| index + 1);
    let column = before[line_start..].chars().count() + 1;

    ParseError {
      filename: self.filename.map(str::to_string),
      offset,
      line,
      column,
      message: message.into(),
    }
  }
}

//! Syntax tree produced by the markup parser.
//!
//! Every node records byte offsets into the original source so that rewrites can be
//! spliced back in place without re-serialising the tree.

/// Half-open byte range `[start, end)` in the original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
  /// Offset of the first byte.
  pub start: usize,
  /// Offset one past the last byte.
  pub end: usize,
}

impl Span {
  /// Construct a span from its bounds.
  pub fn new(start: usize, end: usize) -> Self {
    Self { start, end }
  }

  /// Slice the span out of `source`.
  pub fn slice<'s>(&self, source: &'s str) -> &'s str {
    &source[self.start..self.end]
  }
}

/// Parsed component: the markup fragment plus the lifted top-level script blocks.
#[derive(Debug, Clone, Default)]
pub struct Document {
  /// Markup nodes in document order, excluding top-level scripts and the top-level style.
  pub html: Vec<Node>,
  /// Per-instance `<script>` block.
  pub instance: Option<Script>,
  /// Module-scope `<script context="module">` block.
  pub module: Option<Script>,
  /// Top-level `<style>` block.
  pub css: Option<Style>,
}

/// A top-level `<script>` element.
#[derive(Debug, Clone)]
pub struct Script {
  /// Span of the whole element including its tags.
  pub span: Span,
  /// Span of the raw script body between the tags.
  pub content: Span,
  /// Attributes on the opening tag.
  pub attributes: Vec<Attribute>,
}

/// The top-level `<style>` element. Never visited as markup.
#[derive(Debug, Clone)]
pub struct Style {
  /// Span of the whole element including its tags.
  pub span: Span,
  /// Span of the raw stylesheet between the tags.
  pub content: Span,
  /// Attributes on the opening tag.
  pub attributes: Vec<Attribute>,
}

/// Markup node variants.
#[derive(Debug, Clone)]
pub enum Node {
  /// `<tag ...>...</tag>`
  Element(Element),
  /// `<!-- ... -->`
  Comment(Comment),
  /// Literal text between tags.
  Text(Text),
  /// `{expression}`, `{@html ...}` and the other single tags.
  Tag(Span),
  /// `{#if}`, `{#each}` and friends.
  Block(Block),
}

/// Element node.
#[derive(Debug, Clone)]
pub struct Element {
  /// Tag name as written.
  pub name: String,
  /// Span from `<` of the opening tag to the end of the closing tag.
  pub span: Span,
  /// Named attributes in source order.
  pub attributes: Vec<Attribute>,
  /// `{...spread}` attribute spans.
  pub spreads: Vec<Span>,
  /// Child nodes.
  pub children: Vec<Node>,
}

impl Element {
  /// Find the first attribute with the given name.
  pub fn attribute(&self, name: &str) -> Option<&Attribute> {
    self.attributes.iter().find(|attr| attr.name == name)
  }

  /// Whether this is a plain element rather than a component, `<slot>` or a
  /// `svelte:*` special element. `<svelte:element>` counts as plain.
  ///
  /// `parent` is the directly enclosing element, if any. A `<title>` directly inside
  /// `<svelte:head>` is special.
  pub fn is_regular(&self, parent: Option<&Element>) -> bool {
    let component = self.name.starts_with(|c: char| c.is_ascii_uppercase()) || self.name.contains('.');
    let special = (self.name.starts_with("svelte:") && self.name != "svelte:element") || self.name == "slot";
    let head_title = self.name == "title" && parent.is_some_and(|p| p.name == "svelte:head");
    !(component || special || head_title)
  }
}

/// Comment node.
#[derive(Debug, Clone)]
pub struct Comment {
  /// Span including the `<!--` and `-->` delimiters.
  pub span: Span,
  /// Text between the delimiters.
  pub data: String,
}

/// Text node.
#[derive(Debug, Clone)]
pub struct Text {
  /// Location in source.
  pub span: Span,
  /// Raw text.
  pub raw: String,
}

/// Control-flow block with one child fragment per branch.
#[derive(Debug, Clone)]
pub struct Block {
  /// Block keyword, e.g. `if` or `each`.
  pub name: String,
  /// Span from `{#` to the end of the closing `{/...}` tag.
  pub span: Span,
  /// The opening fragment followed by one fragment per `{:...}` branch.
  pub branches: Vec<Vec<Node>>,
}

/// Attribute on an element or script tag.
#[derive(Debug, Clone)]
pub struct Attribute {
  /// Attribute name, including any directive prefix.
  pub name: String,
  /// Span of the whole attribute, `name="value"`.
  pub span: Span,
  /// Parsed value.
  pub value: AttributeValue,
}

/// Attribute value shapes.
#[derive(Debug, Clone)]
pub enum AttributeValue {
  /// Attribute without `=`.
  Boolean,
  /// Ordered value parts. Empty for `name=""`.
  Parts(Vec<ValuePart>),
}

/// Part of an attribute value.
#[derive(Debug, Clone)]
pub enum ValuePart {
  /// Literal text.
  Text(TextPart),
  /// `{expression}` interpolation.
  Expression(Span),
}

/// Literal span of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPart {
  /// Raw text as written in source.
  pub raw: String,
  /// Offset of the first byte.
  pub start: usize,
  /// Offset one past the last byte.
  pub end: usize,
}

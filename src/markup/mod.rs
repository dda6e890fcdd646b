//! Component markup syntax tree, parser and attribute access helpers.
//!
//! The parser only understands enough of the component syntax to locate elements,
//! comments and attribute values with exact byte offsets. Expressions are opaque.

mod attributes;
mod node;
mod parser;

pub use attributes::{AttributeMap, literal_value};
pub use node::{
  Attribute, AttributeValue, Block, Comment, Document, Element, Node, Script, Span, Style,
  Text, TextPart, ValuePart,
};
pub use parser::{ParseError, parse};

//! Owned content model for the structuring pipeline.
//!
//! Classifier passes rewrite a flat `Vec<ContentNode>` lifted from the DOM,
//! replacing recognized shapes with typed markers ([`Heading`], [`StatBlock`],
//! [`TableValue`]). Every pass is a total function from one node list to
//! another; nothing here touches the DOM.

use crate::html::{escape_attr, escape_text};
use crate::table::TableValue;

/// An element lifted out of the DOM into an owned tree.
///
/// Attribute order is preserved so re-serialization stays close to the
/// source markup.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<ContentNode>,
}

/// Elements that never carry children and serialize without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
    "source", "track", "wbr",
];

impl Element {
    /// Name test against a local element name.
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// First attribute with the given name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// The `class` attribute, or `""` when absent.
    pub fn class(&self) -> &str {
        self.attr("class").unwrap_or("")
    }

    /// Concatenated descendant text, tags ignored.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                ContentNode::Text(value) => out.push_str(value),
                ContentNode::Markup(el) => el.collect_text(out),
                _ => {}
            }
        }
    }

    /// Serialize back to markup text.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    fn write_markup(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
        out.push('>');
        if self.children.is_empty() && VOID_ELEMENTS.contains(&self.name.as_str()) {
            return;
        }
        for child in &self.children {
            match child {
                ContentNode::Text(value) => out.push_str(&escape_text(value)),
                ContentNode::Markup(el) => el.write_markup(out),
                _ => {}
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// A single node in the flat content sequence the pipeline rewrites.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentNode {
    /// A generic element not (yet) classified by any pass.
    Markup(Element),
    /// A raw text run.
    Text(String),
    /// An explicit or implicit section title.
    Heading(Heading),
    /// The head of a stat-block record, or a labeled sub-region inside one.
    StatBlock(StatBlock),
    /// An extracted table.
    Table(TableValue),
}

/// A section title with the content collapsed under it.
///
/// `details` is populated by the collapse passes; until then a heading is a
/// bare marker in the flat list.
#[derive(Debug, Clone, PartialEq)]
pub struct Heading {
    /// Heading level (1-5).
    pub level: u8,
    /// Title text, trimmed.
    pub name: String,
    pub details: Vec<ContentNode>,
}

impl Heading {
    pub fn new(level: u8, name: &str) -> Self {
        Heading {
            level,
            name: name.trim().to_string(),
            details: Vec::new(),
        }
    }
}

/// Whether a stat block opens a record or labels a sub-region inside one.
///
/// A `Section` (a "breaker" paragraph, e.g. splitting Offense from
/// Statistics) never terminates the enclosing record's scope; only a true
/// [`Heading`] does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatBlockKind {
    Heading,
    Section,
}

/// A stat-block record under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct StatBlock {
    pub kind: StatBlockKind,
    /// Record name, trimmed.
    pub name: String,
    /// Extracted attributes, in insertion order. Duplicate keys are allowed
    /// and order is significant.
    pub keys: Vec<(String, String)>,
    /// Interior nodes not yet consumed by the key scan.
    pub details: Vec<ContentNode>,
    /// Every node absorbed into this record, in order. Provenance only;
    /// never used for structuring.
    pub source: Vec<ContentNode>,
}

impl StatBlock {
    pub fn new(kind: StatBlockKind, name: &str, origin: Element) -> Self {
        StatBlock {
            kind,
            name: name.trim().to_string(),
            keys: Vec::new(),
            details: Vec::new(),
            source: vec![ContentNode::Markup(origin)],
        }
    }
}

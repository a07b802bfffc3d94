//! HTML parsing and manipulation using html5ever.
//!
//! All DOM contact lives here: parsing into `RcDom`, node serialization,
//! text/attribute access, the inline normalization filters (link unwrap,
//! `<br>` removal), body-container lookup, nested-container flattening, and
//! the lift from DOM handles into the owned [`ContentNode`] model.

use std::default::Default;

use html5ever::parse_document;
use html5ever::serialize::{SerializeOpts, TraversalScope, serialize};
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::ParseOpts;
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};

use crate::node::{ContentNode, Element};

/// Parse HTML content into a DOM tree.
pub fn parse_html(html: &str) -> RcDom {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            drop_doctype: false,
            ..Default::default()
        },
        ..Default::default()
    };

    parse_document(RcDom::default(), opts)
        .from_utf8()
        .one(html.as_bytes())
}

/// Parse a fragment of HTML (not a full document).
pub fn parse_fragment(html: &str) -> RcDom {
    // Wrap in a minimal document structure for parsing.
    let wrapped = format!(
        "<!DOCTYPE html><html><head></head><body>{}</body></html>",
        html
    );
    parse_html(&wrapped)
}

/// Serialize a node and its children to an HTML string.
pub fn serialize_node(handle: &Handle) -> String {
    let mut bytes = Vec::new();
    let serializable: SerializableHandle = handle.clone().into();

    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };

    serialize(&mut bytes, &serializable, opts).expect("serialization failed");

    String::from_utf8(bytes).unwrap_or_default()
}

/// Check whether a handle is an element with the given local name.
pub fn is_element(handle: &Handle, name: &str) -> bool {
    if let NodeData::Element { name: ref qname, .. } = handle.data {
        qname.local.as_ref() == name
    } else {
        false
    }
}

/// Get the first element with the given local name.
pub fn find_first_element(handle: &Handle, name: &str) -> Option<Handle> {
    if is_element(handle, name) {
        return Some(handle.clone());
    }

    for child in handle.children.borrow().iter() {
        if let Some(found) = find_first_element(child, name) {
            return Some(found);
        }
    }

    None
}

/// Get text content from a node (ignoring tags).
pub fn get_text_content(handle: &Handle) -> String {
    let mut text = String::new();
    get_text_recursive(handle, &mut text);
    text
}

fn get_text_recursive(handle: &Handle, text: &mut String) {
    match handle.data {
        NodeData::Text { ref contents } => {
            text.push_str(&contents.borrow());
        }
        NodeData::Element { .. } => {
            for child in handle.children.borrow().iter() {
                get_text_recursive(child, text);
            }
        }
        _ => {}
    }
}

/// Get an attribute value from an element.
pub fn get_attribute(handle: &Handle, attr_name: &str) -> Option<String> {
    if let NodeData::Element { ref attrs, .. } = handle.data {
        for attr in attrs.borrow().iter() {
            if attr.name.local.as_ref() == attr_name {
                return Some(attr.value.to_string());
            }
        }
    }
    None
}

/// Replace every `<a>` element with its children, in place.
///
/// Link markup carries no structure the pipeline cares about; the rendered
/// text must read as if the anchor were never there.
pub fn unwrap_links(handle: &Handle) {
    for child in handle.children.borrow().iter() {
        unwrap_links(child);
    }

    let has_anchor = handle.children.borrow().iter().any(|c| is_element(c, "a"));
    if !has_anchor {
        return;
    }

    let old_children = handle.children.borrow().clone();
    let mut new_children = Vec::with_capacity(old_children.len());
    for child in old_children {
        if is_element(&child, "a") {
            new_children.extend(child.children.borrow().iter().cloned());
        } else {
            new_children.push(child);
        }
    }
    *handle.children.borrow_mut() = new_children;
}

/// Remove every `<br>` element from the tree.
pub fn strip_breaks(handle: &Handle) {
    handle.children.borrow_mut().retain(|c| !is_element(c, "br"));
    for child in handle.children.borrow().iter() {
        strip_breaks(child);
    }
}

/// Find the page body: the first `<div id="body">` in the document.
pub fn find_body_container(handle: &Handle) -> Option<Handle> {
    if is_element(handle, "div") && get_attribute(handle, "id").as_deref() == Some("body") {
        return Some(handle.clone());
    }

    for child in handle.children.borrow().iter() {
        if let Some(found) = find_body_container(child) {
            return Some(found);
        }
    }

    None
}

fn has_container_child(handle: &Handle) -> bool {
    handle.children.borrow().iter().any(|c| is_element(c, "div"))
}

/// Flatten nested container divs into a single flat child list.
///
/// While the node has a direct `<div>` child, every direct child is rendered
/// back to markup text (a div contributes its inner content, anything else is
/// rendered whole), the concatenation is re-parsed as a fragment, and the
/// result is flattened again. Depth shrinks by one level per round.
pub fn flatten_containers(body: Handle) -> Handle {
    if !has_container_child(&body) {
        return body;
    }

    let mut markup = String::new();
    for child in body.children.borrow().iter() {
        if is_element(child, "div") {
            for inner in child.children.borrow().iter() {
                markup.push_str(&serialize_node(inner));
            }
        } else {
            markup.push_str(&serialize_node(child));
        }
    }

    let dom = parse_fragment(&markup);
    match find_first_element(&dom.document, "body") {
        Some(reparsed) => flatten_containers(reparsed),
        None => body,
    }
}

/// Lift a handle's children out of the DOM into owned content nodes.
///
/// Comments, doctypes and processing instructions are dropped.
pub fn lift_nodes(handle: &Handle) -> Vec<ContentNode> {
    handle.children.borrow().iter().filter_map(lift_node).collect()
}

fn lift_node(handle: &Handle) -> Option<ContentNode> {
    match handle.data {
        NodeData::Text { ref contents } => Some(ContentNode::Text(contents.borrow().to_string())),
        NodeData::Element {
            ref name,
            ref attrs,
            ..
        } => {
            let element = Element {
                name: name.local.to_string(),
                attrs: attrs
                    .borrow()
                    .iter()
                    .map(|a| (a.name.local.to_string(), a.value.to_string()))
                    .collect(),
                children: lift_nodes(handle),
            };
            Some(ContentNode::Markup(element))
        }
        _ => None,
    }
}

/// Escape text content for markup re-serialization.
pub(crate) fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Escape an attribute value for markup re-serialization.
pub(crate) fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

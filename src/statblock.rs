//! Stat-block scope collapse and key/value extraction.
//!
//! A stat block's scope runs from its title marker to the next true heading.
//! When a block leaves scope its interior is parsed: breaker paragraphs split
//! it into labeled sub-regions, then a line-oriented scan extracts key/value
//! attributes from the leading portion. Whatever the scan does not consume
//! stays in `details` for the section builder.

use crate::node::{ContentNode, Element, StatBlock, StatBlockKind};

/// Group nodes following a stat-block marker into that marker's interior.
///
/// Any heading-like node flushes the current block (parsing its interior);
/// only stat-block markers become the new absorber. Plain nodes outside any
/// block's scope stay at the top level.
pub fn collapse_stat_blocks(details: Vec<ContentNode>) -> Vec<ContentNode> {
    let mut out = Vec::with_capacity(details.len());
    let mut curr: Option<StatBlock> = None;

    for d in details {
        match d {
            ContentNode::Heading(h) => {
                if let Some(mut sb) = curr.take() {
                    parse_interior(&mut sb);
                    out.push(ContentNode::StatBlock(sb));
                }
                out.push(ContentNode::Heading(h));
            }
            ContentNode::StatBlock(next) => {
                if let Some(mut sb) = curr.take() {
                    parse_interior(&mut sb);
                    out.push(ContentNode::StatBlock(sb));
                }
                curr = Some(next);
            }
            other => match curr.as_mut() {
                Some(sb) => sb.details.push(other),
                None => out.push(other),
            },
        }
    }

    if let Some(mut sb) = curr.take() {
        parse_interior(&mut sb);
        out.push(ContentNode::StatBlock(sb));
    }

    out
}

/// Parse a collapsed stat-block interior: split on breakers, group each
/// sub-region, then run the key scan on the leading portion.
pub(crate) fn parse_interior(sb: &mut StatBlock) {
    let details = std::mem::take(&mut sb.details);
    let details = split_breakers(sb, details);
    sb.details = collapse_stat_blocks(details);
    scan_marked_key_lines(sb);
}

/// Turn each `p.stat-block-breaker` into a [`StatBlockKind::Section`] marker,
/// recording every interior node in the block's provenance snapshot.
fn split_breakers(sb: &mut StatBlock, details: Vec<ContentNode>) -> Vec<ContentNode> {
    let mut out = Vec::with_capacity(details.len());
    for d in details {
        sb.source.push(d.clone());
        match d {
            ContentNode::Markup(el) if el.is("p") && el.class() == "stat-block-breaker" => {
                let name = el.text();
                out.push(ContentNode::StatBlock(StatBlock::new(
                    StatBlockKind::Section,
                    &name,
                    el,
                )));
            }
            other => out.push(other),
        }
    }
    out
}

/// First-tier key scan, driven by `stat-block-1`/`stat-block-2`/
/// `stat-block-xp` style markers on the leading paragraphs. Falls back to the
/// bold-first-child scan when no marked line is found.
fn scan_marked_key_lines(sb: &mut StatBlock) {
    let details = std::mem::take(&mut sb.details);
    let mut rest = Vec::with_capacity(details.len());
    let mut key: Option<String> = None;
    let mut fragments: Vec<String> = Vec::new();
    let mut top = true;
    let mut started = false;

    for d in details {
        let handled = if top
            && let ContentNode::Markup(el) = &d
            && el.is("p")
        {
            let class = el.class();
            if class.contains("stat-block-1") {
                started = true;
                // A pending key of the form "XP 600" is a line of its own,
                // not a label for the next value.
                if let Some(k) = key.as_deref()
                    && k.starts_with("XP ")
                {
                    let xp = k.replace("XP", "").trim().to_string();
                    store_key(sb, "XP", std::slice::from_ref(&xp));
                    key = None;
                }
                parse_key_line(sb, el, &mut key, &mut fragments);
                true
            } else if class.contains("stat-block-2") {
                // Continuation line, kept verbatim as part of the pending value.
                fragments.push(el.to_markup());
                true
            } else if class.contains("stat-block-xp") {
                let xp = el.text().replace("XP", "").trim().to_string();
                store_key(sb, "XP", std::slice::from_ref(&xp));
                true
            } else {
                false
            }
        } else {
            false
        };

        if !handled {
            if started {
                top = false;
            }
            rest.push(d);
        }
    }

    sb.details = rest;
    if started {
        if key.is_some() || !fragments.is_empty() {
            let k = key.unwrap_or_else(|| "descriptor".to_string());
            store_key(sb, &k, &fragments);
        }
    } else {
        scan_bold_key_lines(sb);
    }
}

/// Second-tier key scan: leading paragraphs whose first child is bold, the
/// bold run as key and the remainder as value. Used only when the first tier
/// matched nothing.
fn scan_bold_key_lines(sb: &mut StatBlock) {
    let details = std::mem::take(&mut sb.details);
    let mut rest = Vec::with_capacity(details.len());
    let mut key: Option<String> = None;
    let mut fragments: Vec<String> = Vec::new();
    let mut top = true;
    let mut started = false;

    for d in details {
        let bold_lead = top
            && matches!(&d, ContentNode::Markup(el) if el.is("p")
                && matches!(el.children.first(), Some(ContentNode::Markup(b)) if b.is("b")));

        if bold_lead && let ContentNode::Markup(el) = &d {
            started = true;
            parse_key_line(sb, el, &mut key, &mut fragments);
        } else {
            if started {
                top = false;
            }
            rest.push(d);
        }
    }

    sb.details = rest;
    if started && let Some(k) = key {
        store_key(sb, &k, &fragments);
    }
}

/// Scan one key line: each bold child starts a new key, everything else
/// accumulates as the pending value. A line that ends with no key ever found,
/// while the record holds at most one stored key, falls back to the synthetic
/// `descriptor` key.
fn parse_key_line(
    sb: &mut StatBlock,
    el: &Element,
    key: &mut Option<String>,
    fragments: &mut Vec<String>,
) {
    let mut stored = false;
    for child in &el.children {
        match child {
            ContentNode::Markup(b) if b.is("b") => {
                stored = true;
                if let Some(k) = key.take() {
                    store_key(sb, &k, fragments);
                    fragments.clear();
                } else if !fragments.is_empty() {
                    if fragments.len() == 2 {
                        for fragment in fragments.iter() {
                            store_key(sb, "descriptor", std::slice::from_ref(fragment));
                        }
                    } else {
                        store_key(sb, "descriptor", fragments);
                    }
                    fragments.clear();
                }
                *key = Some(b.text());
            }
            ContentNode::Markup(other) => fragments.push(other.text()),
            ContentNode::Text(value) => fragments.push(value.clone()),
            _ => {}
        }
    }

    if sb.keys.len() <= 1 && !stored {
        store_key(sb, "descriptor", fragments);
        fragments.clear();
    }
}

/// Store a key/value pair: concatenate the value fragments, trim, strip one
/// trailing `;` or `,`, trim again.
pub(crate) fn store_key(sb: &mut StatBlock, key: &str, fragments: &[String]) {
    let joined = fragments.concat();
    let mut value = joined.trim().to_string();
    if value.ends_with(';') || value.ends_with(',') {
        value.pop();
    }
    sb.keys.push((key.trim().to_string(), value.trim().to_string()));
}

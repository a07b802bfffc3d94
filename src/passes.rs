//! Classification and collapse passes over the flat node list.
//!
//! Each pass is a pure, order-preserving rewrite of a `Vec<ContentNode>`.
//! The driver runs them in a fixed order (see [`crate::page`]); several are
//! level-gated by the configured maximum title level.

use crate::node::{ContentNode, Element, Heading, StatBlock, StatBlockKind};
use crate::statblock::store_key;
use crate::table;

/// Drop text runs that are entirely whitespace.
pub fn strip_blank_nodes(details: Vec<ContentNode>) -> Vec<ContentNode> {
    details
        .into_iter()
        .filter(|d| match d {
            ContentNode::Text(value) => !value.trim().is_empty(),
            _ => true,
        })
        .collect()
}

/// Replace `<h1>`/`<h2>` elements with heading markers, gated by `max_title`.
pub fn mark_titles(details: Vec<ContentNode>, max_title: u8) -> Vec<ContentNode> {
    details
        .into_iter()
        .map(|d| match d {
            ContentNode::Markup(el) if el.is("h1") && max_title >= 1 => {
                ContentNode::Heading(Heading::new(1, &el.text()))
            }
            ContentNode::Markup(el) if el.is("h2") && max_title >= 2 => {
                ContentNode::Heading(Heading::new(2, &el.text()))
            }
            other => other,
        })
        .collect()
}

/// Replace table-shaped elements with the table parser's result.
pub fn extract_tables(details: Vec<ContentNode>, book: &str) -> Vec<ContentNode> {
    details
        .into_iter()
        .map(|d| match d {
            ContentNode::Markup(el) if table::is_table(&el) => {
                ContentNode::Table(table::parse_table(&el, book))
            }
            other => other,
        })
        .collect()
}

/// Replace stat-block title paragraphs with [`StatBlock`] markers.
///
/// A `p.stat-block-title` opens a record; when its second child is a
/// `span.stat-block-cr`, the span's text is stored under `"CR"` immediately
/// and the record name comes from the first child alone. An `<h3>` whose id
/// contains `"companion"` is the alternate layout for the same thing.
pub fn mark_stat_block_titles(details: Vec<ContentNode>) -> Vec<ContentNode> {
    let mut out = Vec::with_capacity(details.len());
    for d in details {
        match d {
            ContentNode::Markup(el) if el.is("p") && el.class().contains("stat-block-title") => {
                let cr = match el.children.get(1) {
                    Some(ContentNode::Markup(span))
                        if span.is("span") && span.class() == "stat-block-cr" =>
                    {
                        Some(span.text())
                    }
                    _ => None,
                };
                if let Some(cr) = cr {
                    let name = match el.children.first() {
                        Some(ContentNode::Text(value)) => value.clone(),
                        Some(ContentNode::Markup(child)) => child.text(),
                        _ => String::new(),
                    };
                    let mut sb = StatBlock::new(StatBlockKind::Heading, &name, el);
                    store_key(&mut sb, "CR", std::slice::from_ref(&cr));
                    out.push(ContentNode::StatBlock(sb));
                } else {
                    let name = el.text();
                    out.push(ContentNode::StatBlock(StatBlock::new(
                        StatBlockKind::Heading,
                        &name,
                        el,
                    )));
                }
            }
            ContentNode::Markup(el)
                if el.is("h3") && el.attr("id").unwrap_or("").contains("companion") =>
            {
                let name = el.text();
                out.push(ContentNode::StatBlock(StatBlock::new(
                    StatBlockKind::Heading,
                    &name,
                    el,
                )));
            }
            other => out.push(other),
        }
    }
    out
}

enum Lead {
    Bold(String),
    Italic(String),
    Other,
}

fn leading_style(el: &Element) -> Lead {
    match el.children.first() {
        Some(ContentNode::Markup(child)) if child.is("b") => Lead::Bold(child.text()),
        Some(ContentNode::Markup(child)) if child.is("i") => Lead::Italic(child.text()),
        _ => Lead::Other,
    }
}

/// Detect implicit subtitles, recursing into already-collapsed details.
///
/// An `<h3>` becomes a level-3 heading. An element whose first child is bold
/// (and which is not center-aligned) yields a synthetic level-4 heading named
/// from the bold text, with the bold child removed and the remainder kept as
/// a sibling. A leading italic yields a level-5 heading the same way.
pub fn mark_subtitles(details: Vec<ContentNode>, max_title: u8) -> Vec<ContentNode> {
    let mut out = Vec::with_capacity(details.len());
    for d in details {
        match d {
            ContentNode::Heading(mut h) => {
                h.details = mark_subtitles(h.details, max_title);
                out.push(ContentNode::Heading(h));
            }
            ContentNode::StatBlock(mut sb) => {
                sb.details = mark_subtitles(sb.details, max_title);
                out.push(ContentNode::StatBlock(sb));
            }
            ContentNode::Markup(el) if el.is("h3") && max_title >= 3 => {
                out.push(ContentNode::Heading(Heading::new(3, &el.text())));
            }
            ContentNode::Markup(mut el) => {
                match leading_style(&el) {
                    Lead::Bold(name) if max_title >= 2 => {
                        if el.attr("align") != Some("center") {
                            out.push(ContentNode::Heading(Heading::new(4, &name)));
                            el.children.remove(0);
                        }
                    }
                    Lead::Italic(name) if max_title >= 5 => {
                        out.push(ContentNode::Heading(Heading::new(5, &name)));
                        el.children.remove(0);
                    }
                    _ => {}
                }
                out.push(ContentNode::Markup(el));
            }
            other => out.push(other),
        }
    }
    out
}

/// Nest trailing nodes under the nearest preceding heading of `level`.
///
/// A heading of level <= `level` resets the current absorber (and becomes it
/// when the level matches exactly). Stat blocks are absorbed like any other
/// node only when `collect_stat_blocks` is set; otherwise they stay at the
/// top level so finer-grained subtitles cannot swallow them.
pub fn collapse_titles(
    details: Vec<ContentNode>,
    level: u8,
    collect_stat_blocks: bool,
) -> Vec<ContentNode> {
    let mut out: Vec<ContentNode> = Vec::new();
    let mut curr: Option<usize> = None;

    for d in details {
        if let ContentNode::Heading(h) = &d
            && h.level <= level
        {
            let takes_over = h.level == level;
            out.push(d);
            curr = if takes_over { Some(out.len() - 1) } else { None };
            continue;
        }

        let absorber = match (&d, curr) {
            (ContentNode::StatBlock(_), Some(_)) if !collect_stat_blocks => None,
            (_, ci) => ci,
        };
        match absorber {
            Some(ci) => {
                if let ContentNode::Heading(h) = &mut out[ci] {
                    h.details.push(d);
                    continue;
                }
                out.push(d);
            }
            None => out.push(d),
        }
    }

    out
}

/// Strip the leading `": "` artifact from the first text run under each
/// element, recursing into heading and stat-block details. Idempotent: only
/// the first text run is examined, and the prefix is removed to a fixpoint.
pub fn strip_leading_colons(details: &mut [ContentNode]) {
    for d in details {
        match d {
            ContentNode::Markup(el) => {
                strip_colon_in_element(el);
            }
            ContentNode::Heading(h) => strip_leading_colons(&mut h.details),
            ContentNode::StatBlock(sb) => strip_leading_colons(&mut sb.details),
            _ => {}
        }
    }
}

fn strip_colon_in_element(el: &mut Element) -> bool {
    for child in &mut el.children {
        match child {
            ContentNode::Text(value) => {
                if value.starts_with(": ") {
                    let mut rest = value.as_str();
                    while let Some(more) = rest.strip_prefix(": ") {
                        rest = more;
                    }
                    let stripped = rest.to_string();
                    *value = stripped;
                }
                return true;
            }
            ContentNode::Markup(inner) => {
                if strip_colon_in_element(inner) {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text(value: &str) -> ContentNode {
        ContentNode::Text(value.to_string())
    }

    fn el(name: &str, attrs: &[(&str, &str)], children: Vec<ContentNode>) -> Element {
        Element {
            name: name.to_string(),
            attrs: attrs
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            children,
        }
    }

    fn markup(name: &str, attrs: &[(&str, &str)], children: Vec<ContentNode>) -> ContentNode {
        ContentNode::Markup(el(name, attrs, children))
    }

    #[test]
    fn blank_nodes_dropped() {
        let details = vec![
            text("  \n\t"),
            markup("p", &[], vec![text("kept")]),
            text("also kept"),
        ];
        let out = strip_blank_nodes(details);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn titles_marked_and_gated() {
        let details = vec![
            markup("h1", &[], vec![text(" Bestiary ")]),
            markup("h2", &[], vec![text("Goblins")]),
        ];
        let out = mark_titles(details.clone(), 5);
        assert!(matches!(&out[0], ContentNode::Heading(h) if h.level == 1 && h.name == "Bestiary"));
        assert!(matches!(&out[1], ContentNode::Heading(h) if h.level == 2));

        let out = mark_titles(details, 1);
        assert!(matches!(&out[0], ContentNode::Heading(h) if h.level == 1));
        assert!(matches!(&out[1], ContentNode::Markup(el) if el.is("h2")));
    }

    #[test]
    fn stat_block_title_with_cr_span() {
        let details = vec![markup(
            "p",
            &[("class", "stat-block-title")],
            vec![
                text("Goblin"),
                markup("span", &[("class", "stat-block-cr")], vec![text("CR 1/3")]),
            ],
        )];
        let out = mark_stat_block_titles(details);
        match &out[0] {
            ContentNode::StatBlock(sb) => {
                assert_eq!(sb.name, "Goblin");
                assert_eq!(sb.keys, vec![("CR".to_string(), "CR 1/3".to_string())]);
            }
            other => panic!("expected stat block, got {other:?}"),
        }
    }

    #[test]
    fn companion_h3_is_a_stat_block() {
        let details = vec![markup(
            "h3",
            &[("id", "wolf-companion")],
            vec![text("Wolf Companion")],
        )];
        let out = mark_stat_block_titles(details);
        assert!(matches!(&out[0], ContentNode::StatBlock(sb) if sb.name == "Wolf Companion"));
    }

    #[test]
    fn bold_lead_becomes_level_four() {
        let details = vec![markup(
            "p",
            &[],
            vec![markup("b", &[], vec![text("Aura")]), text(" faint evil")],
        )];
        let out = mark_subtitles(details, 5);
        assert_eq!(out.len(), 2);
        assert!(matches!(&out[0], ContentNode::Heading(h) if h.level == 4 && h.name == "Aura"));
        match &out[1] {
            ContentNode::Markup(el) => assert_eq!(el.children, vec![text(" faint evil")]),
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn centered_bold_lead_is_not_a_subtitle() {
        let details = vec![markup(
            "p",
            &[("align", "center")],
            vec![markup("b", &[], vec![text("Table: Skills")])],
        )];
        let out = mark_subtitles(details, 5);
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], ContentNode::Markup(_)));
    }

    #[test]
    fn italic_lead_gated_by_level_five() {
        let details = vec![markup(
            "p",
            &[],
            vec![markup("i", &[], vec![text("Special")]), text(" rules")],
        )];
        let out = mark_subtitles(details.clone(), 5);
        assert!(matches!(&out[0], ContentNode::Heading(h) if h.level == 5));

        let out = mark_subtitles(details, 4);
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], ContentNode::Markup(_)));
    }

    #[test]
    fn collapse_absorbs_until_same_level() {
        let details = vec![
            ContentNode::Heading(Heading::new(1, "A")),
            text("a1"),
            ContentNode::Heading(Heading::new(1, "B")),
            text("b1"),
            text("b2"),
        ];
        let out = collapse_titles(details, 1, true);
        assert_eq!(out.len(), 2);
        match (&out[0], &out[1]) {
            (ContentNode::Heading(a), ContentNode::Heading(b)) => {
                assert_eq!(a.details, vec![text("a1")]);
                assert_eq!(b.details, vec![text("b1"), text("b2")]);
            }
            other => panic!("expected two headings, got {other:?}"),
        }
    }

    #[test]
    fn collapse_containment_across_levels() {
        // Nothing may cross a heading of level <= L.
        let details = vec![
            text("preamble"),
            ContentNode::Heading(Heading::new(2, "Sub")),
            text("inner"),
            ContentNode::Heading(Heading::new(1, "Top")),
            text("after"),
        ];
        let out = collapse_titles(details, 2, true);
        assert_eq!(out.len(), 4);
        match &out[1] {
            ContentNode::Heading(h) => assert_eq!(h.details, vec![text("inner")]),
            other => panic!("expected heading, got {other:?}"),
        }
        // The level-1 heading reset absorption; "after" stays at top level.
        assert_eq!(out[3], text("after"));
    }

    #[test]
    fn stat_blocks_skip_fine_collapse() {
        let sb = StatBlock::new(StatBlockKind::Heading, "Goblin", el("p", &[], vec![]));
        let details = vec![
            ContentNode::Heading(Heading::new(4, "Aura")),
            ContentNode::StatBlock(sb.clone()),
            text("tail"),
        ];
        let out = collapse_titles(details.clone(), 4, false);
        assert_eq!(out.len(), 2);
        assert!(matches!(&out[1], ContentNode::StatBlock(_)));

        let out = collapse_titles(details, 4, true);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn colon_stripped_once() {
        let mut details = vec![markup("p", &[], vec![text(": foo")])];
        strip_leading_colons(&mut details);
        assert_eq!(details, vec![markup("p", &[], vec![text("foo")])]);
    }

    #[test]
    fn doubled_colon_prefix_strips_to_fixpoint() {
        let mut details = vec![markup("p", &[], vec![text(": : a")])];
        strip_leading_colons(&mut details);
        assert_eq!(details, vec![markup("p", &[], vec![text("a")])]);
    }

    #[test]
    fn colon_strips_first_text_run_only() {
        let mut details = vec![markup(
            "p",
            &[],
            vec![
                markup("b", &[], vec![text(": inner")]),
                text(": outer"),
            ],
        )];
        strip_leading_colons(&mut details);
        assert_eq!(
            details,
            vec![markup(
                "p",
                &[],
                vec![markup("b", &[], vec![text("inner")]), text(": outer")],
            )]
        );
    }

    proptest! {
        #[test]
        fn colon_pass_is_idempotent(value in ".{0,40}") {
            let mut once = vec![markup("p", &[], vec![text(&value)])];
            strip_leading_colons(&mut once);
            let mut twice = once.clone();
            strip_leading_colons(&mut twice);
            prop_assert_eq!(once, twice);
        }
    }
}

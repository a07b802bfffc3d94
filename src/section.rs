//! Output section model and the section/text fold.
//!
//! Folds the collapsed heading tree into the generic output tree. Text runs
//! are assigned to the owning section when they lead it; once a structured
//! child has been seen, later runs become anonymous child sections inserted
//! in positional order, so the original interleaving survives without any
//! reordering.

use crate::error::{Error, Result};
use crate::node::{ContentNode, Heading, StatBlock, StatBlockKind};
use crate::page::Context;
use crate::table::TableValue;

/// One element of a section's ordered content list.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(tag = "type", rename_all = "snake_case"))]
pub enum SectionItem {
    Section(OutputSection),
    StatBlock(StatBlockRecord),
    Table(TableValue),
}

/// A named (or anonymous) section of the output tree.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct OutputSection {
    /// Absent on anonymous sections introduced only to preserve ordering.
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
    /// Book identifier, attached to every section as provenance.
    pub source: String,
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Option::is_none"))]
    pub text: Option<String>,
    /// Absent rather than empty when the section has no children.
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Option::is_none"))]
    pub sections: Option<Vec<SectionItem>>,
}

/// A folded stat-block record: name, ordered attributes, and any interior
/// sub-regions that stayed inside the block.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct StatBlockRecord {
    pub name: String,
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Vec::is_empty"))]
    pub keys: Vec<(String, String)>,
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Option::is_none"))]
    pub sections: Option<Vec<SectionItem>>,
}

/// Trim a section name and strip one trailing colon.
pub(crate) fn filter_name(name: &str) -> String {
    let name = name.trim();
    let name = name.strip_suffix(':').unwrap_or(name);
    name.trim().to_string()
}

fn none_if_empty(items: Vec<SectionItem>) -> Option<Vec<SectionItem>> {
    if items.is_empty() { None } else { Some(items) }
}

fn text_section(ctx: &Context, text: String) -> SectionItem {
    SectionItem::Section(OutputSection {
        name: None,
        source: ctx.book.clone(),
        text: Some(text),
        sections: None,
    })
}

/// Fold the fully collapsed top-level node list into the final output value.
///
/// A single remaining node passes through transparently; anything else is
/// wrapped in a synthesized top section named from the context's title.
pub(crate) fn finish(mut lines: Vec<ContentNode>, ctx: &Context) -> Result<SectionItem> {
    if lines.len() == 1
        && let Some(node) = lines.pop()
    {
        return build_single(node, ctx);
    }

    let (text, items) = assign_text(lines, ctx)?;
    Ok(SectionItem::Section(OutputSection {
        name: ctx.title.as_deref().map(filter_name),
        source: ctx.book.clone(),
        text,
        sections: none_if_empty(items),
    }))
}

fn build_single(node: ContentNode, ctx: &Context) -> Result<SectionItem> {
    match node {
        ContentNode::Heading(h) => Ok(SectionItem::Section(fold_heading(h, ctx)?)),
        ContentNode::StatBlock(sb) => {
            let (mut record, trailing) = fold_stat_block(sb, ctx)?;
            // No sibling stream exists for a lone stat block; its folded
            // leftovers stay inside the record.
            if !trailing.is_empty() {
                let mut sections = record.sections.take().unwrap_or_default();
                sections.extend(trailing);
                record.sections = Some(sections);
            }
            Ok(SectionItem::StatBlock(record))
        }
        ContentNode::Table(table) => Ok(SectionItem::Table(table)),
        ContentNode::Markup(el) => Ok(text_section(ctx, el.to_markup())),
        ContentNode::Text(value) => Ok(text_section(ctx, value)),
    }
}

fn fold_heading(h: Heading, ctx: &Context) -> Result<OutputSection> {
    let name = filter_name(&h.name);
    let (text, items) = assign_text(h.details, ctx)?;
    Ok(OutputSection {
        name: Some(name),
        source: ctx.book.clone(),
        text,
        sections: none_if_empty(items),
    })
}

/// Walk a detail list, buffering consecutive text/markup runs. The first
/// buffered run becomes the owning section's `text`; later runs become
/// anonymous child sections in positional order.
fn assign_text(
    details: Vec<ContentNode>,
    ctx: &Context,
) -> Result<(Option<String>, Vec<SectionItem>)> {
    let mut own_text: Option<String> = None;
    let mut done = false;
    let mut buf: Vec<String> = Vec::new();
    let mut items: Vec<SectionItem> = Vec::new();

    fn flush(
        buf: &mut Vec<String>,
        own_text: &mut Option<String>,
        done: &mut bool,
        items: &mut Vec<SectionItem>,
        ctx: &Context,
    ) {
        if !*done {
            *done = true;
            if !buf.is_empty() {
                *own_text = Some(buf.concat());
                buf.clear();
            }
        } else if !buf.is_empty() {
            items.push(text_section(ctx, buf.concat()));
            buf.clear();
        }
    }

    for d in details {
        match d {
            ContentNode::Text(value) => buf.push(value),
            ContentNode::Markup(el) => buf.push(el.to_markup()),
            ContentNode::Heading(h) => {
                flush(&mut buf, &mut own_text, &mut done, &mut items, ctx);
                items.push(SectionItem::Section(fold_heading(h, ctx)?));
            }
            ContentNode::StatBlock(sb) => {
                flush(&mut buf, &mut own_text, &mut done, &mut items, ctx);
                let (record, trailing) = fold_stat_block(sb, ctx)?;
                items.push(SectionItem::StatBlock(record));
                items.extend(trailing);
            }
            ContentNode::Table(table) => {
                flush(&mut buf, &mut own_text, &mut done, &mut items, ctx);
                items.push(SectionItem::Table(table));
            }
        }
    }

    if !buf.is_empty() {
        let joined = buf.concat();
        if own_text.is_some() {
            items.push(text_section(ctx, joined));
        } else {
            own_text = Some(joined);
        }
    }

    Ok((own_text, items))
}

/// Fold a stat block into its output record.
///
/// Interior sub-regions stay inside the record's `sections`, each followed by
/// its own folded leftovers; the block's remaining plain prose folds into
/// anonymous sections returned separately, to be emitted as siblings right
/// after the record.
fn fold_stat_block(sb: StatBlock, ctx: &Context) -> Result<(StatBlockRecord, Vec<SectionItem>)> {
    let mut sections: Vec<SectionItem> = Vec::new();
    let mut trailing: Vec<SectionItem> = Vec::new();
    let mut buf: Vec<String> = Vec::new();
    let name = sb.name;

    for d in sb.details {
        match d {
            ContentNode::Text(value) => buf.push(value),
            ContentNode::Markup(el) => buf.push(el.to_markup()),
            ContentNode::StatBlock(inner) => match inner.kind {
                StatBlockKind::Section => {
                    flush_prose(&mut buf, &mut trailing, ctx);
                    let (record, inner_trailing) = fold_stat_block(inner, ctx)?;
                    sections.push(SectionItem::StatBlock(record));
                    sections.extend(inner_trailing);
                }
                StatBlockKind::Heading => {
                    return Err(Error::InvalidStructure(format!(
                        "stat block heading '{}' nested inside stat block '{}'",
                        inner.name, name
                    )));
                }
            },
            ContentNode::Heading(h) => {
                flush_prose(&mut buf, &mut trailing, ctx);
                trailing.push(SectionItem::Section(fold_heading(h, ctx)?));
            }
            ContentNode::Table(table) => {
                flush_prose(&mut buf, &mut trailing, ctx);
                sections.push(SectionItem::Table(table));
            }
        }
    }
    flush_prose(&mut buf, &mut trailing, ctx);

    let record = StatBlockRecord {
        name,
        keys: sb.keys,
        sections: none_if_empty(sections),
    };
    Ok((record, trailing))
}

fn flush_prose(buf: &mut Vec<String>, items: &mut Vec<SectionItem>, ctx: &Context) {
    if !buf.is_empty() {
        items.push(text_section(ctx, buf.concat()));
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Element;

    fn ctx() -> Context {
        Context::new("core")
    }

    fn text(value: &str) -> ContentNode {
        ContentNode::Text(value.to_string())
    }

    fn heading(level: u8, name: &str, details: Vec<ContentNode>) -> ContentNode {
        let mut h = Heading::new(level, name);
        h.details = details;
        ContentNode::Heading(h)
    }

    #[test]
    fn name_filtering() {
        assert_eq!(filter_name(" Foo: "), "Foo");
        assert_eq!(filter_name("Foo"), "Foo");
        assert_eq!(filter_name("A: B"), "A: B");
    }

    #[test]
    fn leading_text_belongs_to_the_section() {
        let top = heading(1, "Top", vec![text("intro"), heading(2, "Sub", vec![])]);
        let out = finish(vec![top], &ctx()).unwrap();
        match out {
            SectionItem::Section(section) => {
                assert_eq!(section.name.as_deref(), Some("Top"));
                assert_eq!(section.text.as_deref(), Some("intro"));
                assert_eq!(section.sections.unwrap().len(), 1);
            }
            other => panic!("expected section, got {other:?}"),
        }
    }

    #[test]
    fn interleaved_text_becomes_anonymous_sections() {
        let top = heading(
            1,
            "Top",
            vec![
                text("a"),
                heading(2, "B", vec![]),
                text("c"),
                heading(2, "D", vec![]),
                text("e"),
            ],
        );
        let out = finish(vec![top], &ctx()).unwrap();
        let SectionItem::Section(section) = out else {
            panic!("expected section");
        };
        assert_eq!(section.text.as_deref(), Some("a"));
        let children = section.sections.unwrap();
        assert_eq!(children.len(), 4);
        let names: Vec<Option<&str>> = children
            .iter()
            .map(|item| match item {
                SectionItem::Section(s) => s.name.as_deref(),
                other => panic!("unexpected item {other:?}"),
            })
            .collect();
        assert_eq!(names, vec![Some("B"), None, Some("D"), None]);
        match &children[1] {
            SectionItem::Section(s) => assert_eq!(s.text.as_deref(), Some("c")),
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[test]
    fn empty_sections_are_omitted() {
        let out = finish(vec![heading(1, "Lonely", vec![])], &ctx()).unwrap();
        let SectionItem::Section(section) = out else {
            panic!("expected section");
        };
        assert!(section.text.is_none());
        assert!(section.sections.is_none());
    }

    #[test]
    fn multiple_top_level_nodes_get_a_wrapper() {
        let lines = vec![heading(1, "A", vec![]), heading(1, "B", vec![])];
        let context = Context::new("core").with_title("Whole Page:");
        let out = finish(lines, &context).unwrap();
        let SectionItem::Section(section) = out else {
            panic!("expected section");
        };
        assert_eq!(section.name.as_deref(), Some("Whole Page"));
        assert_eq!(section.source, "core");
        assert_eq!(section.sections.unwrap().len(), 2);
    }

    #[test]
    fn untitled_wrapper_is_anonymous() {
        let lines = vec![heading(1, "A", vec![]), heading(1, "B", vec![])];
        let out = finish(lines, &ctx()).unwrap();
        let SectionItem::Section(section) = out else {
            panic!("expected section");
        };
        assert!(section.name.is_none());
    }

    #[test]
    fn stat_block_prose_lifts_to_siblings() {
        let mut sb = StatBlock::new(
            StatBlockKind::Heading,
            "Goblin",
            Element {
                name: "p".to_string(),
                attrs: vec![],
                children: vec![],
            },
        );
        sb.keys.push(("CR".to_string(), "1/3".to_string()));
        sb.details.push(text("A small, cruel humanoid."));
        let top = heading(1, "Monsters", vec![ContentNode::StatBlock(sb)]);

        let out = finish(vec![top], &ctx()).unwrap();
        let SectionItem::Section(section) = out else {
            panic!("expected section");
        };
        let children = section.sections.unwrap();
        assert_eq!(children.len(), 2);
        match &children[0] {
            SectionItem::StatBlock(record) => {
                assert_eq!(record.name, "Goblin");
                assert_eq!(record.keys, vec![("CR".to_string(), "1/3".to_string())]);
                assert!(record.sections.is_none());
            }
            other => panic!("expected stat block, got {other:?}"),
        }
        match &children[1] {
            SectionItem::Section(s) => {
                assert!(s.name.is_none());
                assert_eq!(s.text.as_deref(), Some("A small, cruel humanoid."));
            }
            other => panic!("expected anonymous section, got {other:?}"),
        }
    }

    #[test]
    fn breaker_sections_stay_inside_the_record() {
        let origin = Element {
            name: "p".to_string(),
            attrs: vec![],
            children: vec![],
        };
        let mut defense = StatBlock::new(StatBlockKind::Section, "DEFENSE", origin.clone());
        defense.keys.push(("AC".to_string(), "15".to_string()));
        let mut sb = StatBlock::new(StatBlockKind::Heading, "Goblin", origin);
        sb.details.push(ContentNode::StatBlock(defense));

        let out = finish(vec![ContentNode::StatBlock(sb)], &ctx()).unwrap();
        let SectionItem::StatBlock(record) = out else {
            panic!("expected stat block");
        };
        let inner = record.sections.unwrap();
        assert_eq!(inner.len(), 1);
        assert!(
            matches!(&inner[0], SectionItem::StatBlock(section) if section.name == "DEFENSE")
        );
    }

    #[test]
    fn nested_stat_block_heading_is_rejected() {
        let origin = Element {
            name: "p".to_string(),
            attrs: vec![],
            children: vec![],
        };
        let inner = StatBlock::new(StatBlockKind::Heading, "Inner", origin.clone());
        let mut sb = StatBlock::new(StatBlockKind::Heading, "Outer", origin);
        sb.details.push(ContentNode::StatBlock(inner));

        let err = finish(vec![ContentNode::StatBlock(sb)], &ctx()).unwrap_err();
        assert!(matches!(err, Error::InvalidStructure(_)));
    }
}

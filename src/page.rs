//! Page-level driver: locate the body container, flatten it, and run the
//! structuring pipeline over the lifted node sequence.

use std::path::Path;

use crate::error::Result;
use crate::html;
use crate::node::ContentNode;
use crate::passes;
use crate::section::{self, SectionItem};
use crate::statblock;
use crate::util::decode_text;

/// Parse configuration, threaded through the whole pipeline.
#[derive(Debug, Clone)]
pub struct Context {
    /// Book identifier attached to every produced section as provenance.
    pub book: String,
    /// Override name for the synthesized top-level section when the document
    /// yields more than one top-level node.
    pub title: Option<String>,
    /// How many heading levels are recognized or synthesized (1-5).
    pub max_title_level: u8,
}

impl Context {
    pub fn new(book: impl Into<String>) -> Self {
        Context {
            book: book.into(),
            title: None,
            max_title_level: 5,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_max_title_level(mut self, level: u8) -> Self {
        self.max_title_level = level.clamp(1, 5);
        self
    }
}

/// Read and structure a reference page from disk.
///
/// The file is decoded as UTF-8 with a Windows-1252 fallback. Returns
/// `Ok(None)` when the document has no body container.
pub fn parse_file(path: impl AsRef<Path>, ctx: &Context) -> Result<Option<SectionItem>> {
    let bytes = std::fs::read(path)?;
    let text = decode_text(&bytes);
    parse_page(&text, ctx)
}

/// Structure one reference page.
///
/// Returns `Ok(None)` when the document has no body container; callers must
/// check for absence explicitly.
pub fn parse_page(html_text: &str, ctx: &Context) -> Result<Option<SectionItem>> {
    let dom = html::parse_html(html_text);
    html::unwrap_links(&dom.document);
    html::strip_breaks(&dom.document);

    let Some(body) = html::find_body_container(&dom.document) else {
        log::debug!("no body container in document");
        return Ok(None);
    };

    let body = html::flatten_containers(body);
    let lines = html::lift_nodes(&body);
    log::debug!("lifted {} top-level nodes", lines.len());
    structure_nodes(lines, ctx).map(Some)
}

/// Run the structuring pipeline over an already-lifted flat node sequence.
///
/// Classifier passes run in fixed order, then the collapse engine nests the
/// sequence one heading level at a time from finest to coarsest. Stat blocks
/// escape the fine-grained subtitle levels and are absorbed only by true
/// section-level headings.
pub fn structure_nodes(lines: Vec<ContentNode>, ctx: &Context) -> Result<SectionItem> {
    let max_title = ctx.max_title_level;

    let lines = passes::strip_blank_nodes(lines);
    let lines = passes::mark_titles(lines, max_title);
    let lines = passes::extract_tables(lines, &ctx.book);
    let lines = passes::mark_stat_block_titles(lines);
    let lines = statblock::collapse_stat_blocks(lines);
    let mut lines = passes::mark_subtitles(lines, max_title);

    for level in (1..=5u8).rev() {
        if max_title >= level {
            lines = passes::collapse_titles(lines, level, level <= 2);
        }
    }

    passes::strip_leading_colons(&mut lines);
    section::finish(lines, ctx)
}

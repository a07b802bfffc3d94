//! Table extraction.
//!
//! Tables are opaque to the structuring passes: detection swaps the element
//! for a [`TableValue`] and nothing downstream looks inside it again.

use crate::node::{ContentNode, Element};

/// An extracted table: caption, header row, and body rows of cell text.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct TableValue {
    /// Caption text, when the table carries one.
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
    /// Book identifier this table was extracted from.
    pub source: String,
    /// Header cells (the first row made of `<th>` cells).
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Vec::is_empty"))]
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Whether an element should be handed to the table parser.
pub fn is_table(el: &Element) -> bool {
    el.is("table")
}

/// Parse a table-shaped element into a [`TableValue`].
///
/// `thead`/`tbody` wrappers are transparent; a row whose cells are `<th>`
/// becomes the header if none has been seen yet, otherwise a data row.
pub fn parse_table(el: &Element, book: &str) -> TableValue {
    let mut table = TableValue {
        name: None,
        source: book.to_string(),
        header: Vec::new(),
        rows: Vec::new(),
    };

    for child in &el.children {
        let ContentNode::Markup(section) = child else {
            continue;
        };
        match section.name.as_str() {
            "caption" => {
                let caption = section.text().trim().to_string();
                if !caption.is_empty() {
                    table.name = Some(caption);
                }
            }
            "tr" => collect_row(section, &mut table),
            "thead" | "tbody" | "tfoot" => {
                for row in &section.children {
                    if let ContentNode::Markup(row) = row
                        && row.is("tr")
                    {
                        collect_row(row, &mut table);
                    }
                }
            }
            _ => {}
        }
    }

    table
}

fn collect_row(row: &Element, table: &mut TableValue) {
    let mut cells = Vec::new();
    let mut is_header = false;
    for cell in &row.children {
        if let ContentNode::Markup(cell) = cell {
            match cell.name.as_str() {
                "th" => {
                    is_header = true;
                    cells.push(cell.text().trim().to_string());
                }
                "td" => cells.push(cell.text().trim().to_string()),
                _ => {}
            }
        }
    }
    if cells.is_empty() {
        return;
    }
    if is_header && table.header.is_empty() {
        table.header = cells;
    } else {
        table.rows.push(cells);
    }
}

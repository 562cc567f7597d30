//! Merchandising type table.
//!
//! Operators maintain a small CSV mapping item sub-classes to a display
//! name and a default shipping level. The table is loaded once at startup
//! and passed by reference wherever it is needed. Loading is deliberately
//! forgiving: a malformed row or a missing file costs a warning, never a
//! failed sync - though every unmapped sub-class will fall back to the
//! emergency shipping level at translation time.

use std::path::Path;

use tracing::warn;

use skubridge_core::ProductType;

/// The loaded sub-class → type mapping.
#[derive(Debug, Default, Clone)]
pub struct TypeTable {
    rows: Vec<ProductType>,
}

impl TypeTable {
    /// Load from a CSV file of `sub_class,name,shipping_level` rows.
    ///
    /// A missing or unreadable file yields an empty table with a warning:
    /// items will still sync, but type tags will be omitted and defaults
    /// will fall back to the emergency shipping level.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(error) => {
                warn!(path = %path.display(), %error, "could not read type table");
                warn!("items will be tagged without a type and shipping defaults will be missing");
                Self::default()
            }
        }
    }

    /// Parse CSV contents. The first line is a header; malformed rows are
    /// skipped with a warning.
    #[must_use]
    pub fn parse(contents: &str) -> Self {
        let mut rows = Vec::new();

        for (line_no, line) in contents.lines().enumerate().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            match parse_row(line) {
                Some(row) => rows.push(row),
                None => {
                    warn!(line_no = line_no + 1, line, "skipping malformed type table row");
                }
            }
        }

        Self { rows }
    }

    /// Look up the type for an item sub-class.
    #[must_use]
    pub fn lookup(&self, sub_class: &str) -> Option<&ProductType> {
        self.rows.iter().find(|row| row.sub_class == sub_class)
    }

    /// Number of loaded rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn parse_row(line: &str) -> Option<ProductType> {
    let mut cells = line.split(',');
    let sub_class = cells.next()?.trim();
    let name = cells.next()?.trim();
    let shipping_level = cells.next()?.trim().parse::<i32>().ok()?;

    if sub_class.is_empty() || name.is_empty() {
        return None;
    }

    Some(ProductType {
        sub_class: sub_class.to_string(),
        name: name.to_string(),
        shipping_level,
    })
}

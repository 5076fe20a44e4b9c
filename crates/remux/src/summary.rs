//! Aggregate counts and byte totals for a catalog.

use crate::catalog::Catalog;
use std::fmt;

/// Snapshot of where a batch stands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSummary {
    pub discs: usize,
    pub processed: usize,
    /// Not yet processed but with a main feature to remux
    pub pending: usize,
    /// Not yet processed and without any candidate title
    pub unprocessable: usize,
    /// Discs with more than one qualifying title
    pub multi_candidate: usize,
    /// Sum of image sizes, ignoring unset sizes
    pub source_bytes: u64,
    /// Sum of main-feature sizes, ignoring unset sizes
    pub selected_bytes: u64,
}

impl CatalogSummary {
    /// Bytes saved by keeping only the main features.
    pub fn reclaimable_bytes(&self) -> u64 {
        self.source_bytes.saturating_sub(self.selected_bytes)
    }
}

fn known_size(size: i64) -> u64 {
    u64::try_from(size).unwrap_or(0)
}

pub fn summarize(catalog: &Catalog) -> CatalogSummary {
    let mut summary = CatalogSummary {
        discs: catalog.len(),
        ..CatalogSummary::default()
    };

    for disc in catalog {
        if disc.processed {
            summary.processed += 1;
        } else if disc.is_unprocessable() {
            summary.unprocessable += 1;
        } else {
            summary.pending += 1;
        }
        if disc.titles.len() > 1 {
            summary.multi_candidate += 1;
        }
        summary.source_bytes = summary.source_bytes.saturating_add(known_size(disc.size));
        if let Some(title) = disc.main_feature() {
            summary.selected_bytes = summary
                .selected_bytes
                .saturating_add(known_size(title.size));
        }
    }

    summary
}

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

impl fmt::Display for CatalogSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Discs:           {}", self.discs)?;
        writeln!(f, "Processed:       {}", self.processed)?;
        writeln!(f, "Pending:         {}", self.pending)?;
        writeln!(f, "Unprocessable:   {}", self.unprocessable)?;
        writeln!(f, "Multi-candidate: {}", self.multi_candidate)?;
        writeln!(f, "Source size:     {:.2} GiB", self.source_bytes as f64 / GIB)?;
        writeln!(f, "Selected size:   {:.2} GiB", self.selected_bytes as f64 / GIB)?;
        write!(f, "Reclaimable:     {:.2} GiB", self.reclaimable_bytes() as f64 / GIB)
    }
}

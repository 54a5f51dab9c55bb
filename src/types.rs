//! The Interval Table: the in-memory row-store shared by peaks, genes, and
//! reference features, plus chromosome-key normalization.
//!
//! Columns are stored contiguously (`start`/`end` as `Vec<i64>`) so the
//! nearest-feature search can binary-search them directly without per-row
//! indirection. Caller-specific pass-through columns live in a sparse,
//! order-preserving `extra` map since different peak callers and GTF
//! attribute sets emit different column names.

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::error::{Error, Result};

/// Columnar row-store for peaks, genes, or decomposed reference features.
///
/// `extra` holds pass-through columns keyed by name, one `Vec<Option<String>>`
/// per column, always the same length as `chr`/`start`/`end`.
#[derive(Debug, Clone, Default)]
pub struct IntervalTable {
    pub chr: Vec<String>,
    pub start: Vec<i64>,
    pub end: Vec<i64>,
    pub name: Vec<Option<String>>,
    pub extra: IndexMap<String, Vec<Option<String>>>,
}

impl IntervalTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chr.is_empty()
    }

    /// Column names carried in `extra`, in first-seen order.
    pub fn extra_columns(&self) -> impl Iterator<Item = &str> {
        self.extra.keys().map(|k| k.as_str())
    }

    pub fn get_extra(&self, column: &str, row: usize) -> Option<&str> {
        self.extra.get(column)?.get(row)?.as_deref()
    }

    /// Append a row, tracking any column present in `row_extra` but not yet
    /// seen, and backfilling `None` for columns this row omits.
    pub fn push_row(
        &mut self,
        chr: String,
        start: i64,
        end: i64,
        name: Option<String>,
        row_extra: IndexMap<String, String>,
    ) -> Result<()> {
        if end < start {
            return Err(Error::Input(format!(
                "interval end ({end}) is before start ({start}) on {chr}"
            )));
        }
        for key in row_extra.keys() {
            self.extra
                .entry(key.clone())
                .or_insert_with(|| vec![None; self.chr.len()]);
        }
        for (key, column) in self.extra.iter_mut() {
            column.push(row_extra.get(key).cloned());
        }
        self.chr.push(chr);
        self.start.push(start);
        self.end.push(end);
        self.name.push(name);
        Ok(())
    }

    /// Reorders every column in place according to a permutation of row
    /// indices (e.g. an ascending-`start` sort).
    fn apply_permutation(&mut self, order: &[usize]) {
        self.chr = order.iter().map(|&i| self.chr[i].clone()).collect();
        self.start = order.iter().map(|&i| self.start[i]).collect();
        self.end = order.iter().map(|&i| self.end[i]).collect();
        self.name = order.iter().map(|&i| self.name[i].clone()).collect();
        for column in self.extra.values_mut() {
            *column = order.iter().map(|&i| column[i].clone()).collect();
        }
    }

    /// Sorts rows ascending by `start`, breaking ties by original row order
    /// (a stable sort), matching the query ordering the search requires.
    pub fn sort_by_start(&mut self) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by_key(|&i| self.start[i]);
        self.apply_permutation(&order);
    }
}

/// Normalizes a chromosome key by prefixing `chr` (case-insensitively
/// stripping any existing prefix first). Rejects keys containing whitespace.
pub fn normalize_chromosome(raw: &str) -> Result<String> {
    if raw.is_empty() {
        return Err(Error::Input("chromosome key is empty".to_string()));
    }
    if raw.chars().any(|c| c.is_whitespace()) {
        return Err(Error::Input(format!(
            "chromosome key '{raw}' contains whitespace"
        )));
    }
    let rest = if raw.len() >= 3 && raw[..3].eq_ignore_ascii_case("chr") {
        &raw[3..]
    } else {
        raw
    };
    Ok(format!("chr{rest}"))
}

/// Groups an Interval Table by canonical chromosome, returning per-chromosome
/// tables sorted ascending by `start`. Two raw keys that normalize to the
/// same chromosome but differ in case (e.g. `chrX` and `chrx`) are rejected
/// as ambiguous rather than silently merged.
pub fn partition_by_chromosome(table: &IntervalTable) -> Result<IndexMap<String, IntervalTable>> {
    let mut canonical_lower: AHashMap<String, String> = AHashMap::new();
    let mut partitions: IndexMap<String, IntervalTable> = IndexMap::new();

    for i in 0..table.len() {
        let normalized = normalize_chromosome(&table.chr[i])?;
        let lower = normalized.to_ascii_lowercase();
        match canonical_lower.get(&lower) {
            Some(existing) if existing != &normalized => {
                return Err(Error::Input(format!(
                    "chromosome key '{normalized}' differs only in case from '{existing}'"
                )));
            }
            Some(_) => {}
            None => {
                canonical_lower.insert(lower, normalized.clone());
            }
        }

        let row_extra: IndexMap<String, String> = table
            .extra
            .iter()
            .filter_map(|(k, v)| v[i].clone().map(|value| (k.clone(), value)))
            .collect();

        partitions
            .entry(normalized.clone())
            .or_default()
            .push_row(
                normalized,
                table.start[i],
                table.end[i],
                table.name[i].clone(),
                row_extra,
            )?;
    }

    for partition in partitions.values_mut() {
        partition.sort_by_start();
    }

    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_missing_prefix() {
        assert_eq!(normalize_chromosome("1").unwrap(), "chr1");
        assert_eq!(normalize_chromosome("X").unwrap(), "chrX");
    }

    #[test]
    fn normalizes_existing_prefix_case_insensitively() {
        assert_eq!(normalize_chromosome("chr1").unwrap(), "chr1");
        assert_eq!(normalize_chromosome("CHR1").unwrap(), "chr1");
        assert_eq!(normalize_chromosome("Chr1").unwrap(), "chr1");
    }

    #[test]
    fn rejects_whitespace() {
        assert!(normalize_chromosome("chr 1").is_err());
    }

    #[test]
    fn partition_sorts_by_start_and_groups_by_chromosome() {
        let mut table = IntervalTable::new();
        table
            .push_row("chr1".into(), 300, 400, None, IndexMap::new())
            .unwrap();
        table
            .push_row("2".into(), 10, 20, None, IndexMap::new())
            .unwrap();
        table
            .push_row("chr1".into(), 100, 200, None, IndexMap::new())
            .unwrap();

        let partitions = partition_by_chromosome(&table).unwrap();
        assert_eq!(partitions.len(), 2);
        let chr1 = &partitions["chr1"];
        assert_eq!(chr1.start, vec![100, 300]);
        let chr2 = &partitions["chr2"];
        assert_eq!(chr2.start, vec![10]);
    }

    #[test]
    fn rejects_case_collision() {
        let mut table = IntervalTable::new();
        table
            .push_row("chrX".into(), 1, 2, None, IndexMap::new())
            .unwrap();
        table
            .push_row("chrx".into(), 3, 4, None, IndexMap::new())
            .unwrap();
        assert!(partition_by_chromosome(&table).is_err());
    }

    #[test]
    fn rejects_end_before_start() {
        let mut table = IntervalTable::new();
        assert!(table
            .push_row("chr1".into(), 10, 5, None, IndexMap::new())
            .is_err());
    }
}

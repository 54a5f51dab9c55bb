//! Reference Pair loading: reads the decomposer's `<chr>_start.csv` /
//! `<chr>_end.csv` outputs for one (species, feature, chromosome) into the
//! contiguous arrays the nearest-feature search binary-searches over.
//!
//! Each load is an owned buffer, released once its chromosome's search
//! completes — the search never retains a reference into these arrays
//! across chromosomes.

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;

use crate::error::{Error, Result};
use crate::types::IntervalTable;

/// One side (start-sorted or end-sorted) of a Reference Pair.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSide {
    pub start: Vec<i64>,
    pub end: Vec<i64>,
    pub feature: Vec<String>,
    pub gene_id: Option<Vec<String>>,
    pub gene_type: Option<Vec<String>>,
}

impl ReferenceSide {
    pub fn len(&self) -> usize {
        self.start.len()
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_empty()
    }
}

/// The two parallel views over one (species, feature, chromosome)'s
/// reference rows: sorted by `start` and sorted by `end`.
#[derive(Debug, Clone, Default)]
pub struct ReferencePair {
    pub starts: ReferenceSide,
    pub ends: ReferenceSide,
}

fn side_path(ref_dir: &Path, species: &str, feature: &str, chr: &str, suffix: &str) -> PathBuf {
    ref_dir
        .join(species)
        .join(feature)
        .join(format!("{chr}_{suffix}.csv"))
}

fn read_side(path: &Path, chr: &str, feature_col: &str, is_gene: bool) -> Result<ReferenceSide> {
    let file = File::open(path).map_err(|_| Error::ReferenceMissing {
        chr: chr.to_string(),
        path: path.to_path_buf(),
    })?;
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

    let headers = reader.headers()?.clone();
    let index_of = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::Input(format!("reference file {} missing column '{name}'", path.display())))
    };

    let start_idx = index_of("start")?;
    let end_idx = index_of("end")?;
    let feature_idx = index_of(feature_col)?;
    let (gene_id_idx, gene_type_idx) = if is_gene {
        (Some(index_of("gene_id")?), Some(index_of("gene_type")?))
    } else {
        (None, None)
    };

    let mut side = ReferenceSide::default();
    if is_gene {
        side.gene_id = Some(Vec::new());
        side.gene_type = Some(Vec::new());
    }

    for record in reader.records() {
        let record = record?;
        let start: i64 = record
            .get(start_idx)
            .ok_or_else(|| Error::Input(format!("{} missing start field", path.display())))?
            .parse()
            .map_err(|_| Error::Input(format!("{} has a non-integer start", path.display())))?;
        let end: i64 = record
            .get(end_idx)
            .ok_or_else(|| Error::Input(format!("{} missing end field", path.display())))?
            .parse()
            .map_err(|_| Error::Input(format!("{} has a non-integer end", path.display())))?;
        if end < start {
            return Err(Error::Input(format!(
                "{}: end ({end}) before start ({start})",
                path.display()
            )));
        }
        side.start.push(start);
        side.end.push(end);
        side.feature
            .push(record.get(feature_idx).unwrap_or("").to_string());

        if let (Some(gi), Some(gt)) = (gene_id_idx, gene_type_idx) {
            side.gene_id
                .as_mut()
                .unwrap()
                .push(record.get(gi).unwrap_or("").to_string());
            side.gene_type
                .as_mut()
                .unwrap()
                .push(record.get(gt).unwrap_or("").to_string());
        }
    }

    Ok(side)
}

/// Loads the start-sorted and end-sorted reference files for one
/// (species, feature, chromosome). `feature_col` is the identifier column
/// to read (`gene_name` for genes, `name` for peaks queried by gene2peak).
/// `gene_id`/`gene_type` are additionally required when `feature == "gene"`.
pub fn load_reference_pair(
    ref_dir: &Path,
    species: &str,
    feature: &str,
    chr: &str,
    feature_col: &str,
) -> Result<ReferencePair> {
    let is_gene = feature == "gene";
    let starts = read_side(
        &side_path(ref_dir, species, feature, chr, "start"),
        chr,
        feature_col,
        is_gene,
    )?;
    let ends = read_side(
        &side_path(ref_dir, species, feature, chr, "end"),
        chr,
        feature_col,
        is_gene,
    )?;
    Ok(ReferencePair { starts, ends })
}

/// Builds an in-memory Reference Pair from a peak table's `name` column,
/// for the gene2peak path: peaks on a gene's chromosome act as the
/// "reference" the gene's nearest-peak search is run against, rather than
/// being loaded from a decomposed GTF.
impl ReferencePair {
    pub fn from_peaks(peaks: &IntervalTable) -> ReferencePair {
        let mut order: Vec<usize> = (0..peaks.len()).collect();
        order.sort_by_key(|&i| peaks.start[i]);
        let starts = ReferenceSide {
            start: order.iter().map(|&i| peaks.start[i]).collect(),
            end: order.iter().map(|&i| peaks.end[i]).collect(),
            feature: order
                .iter()
                .map(|&i| peaks.name[i].clone().unwrap_or_default())
                .collect(),
            gene_id: None,
            gene_type: None,
        };

        let mut end_order: Vec<usize> = (0..peaks.len()).collect();
        end_order.sort_by_key(|&i| peaks.end[i]);
        let ends = ReferenceSide {
            start: end_order.iter().map(|&i| peaks.start[i]).collect(),
            end: end_order.iter().map(|&i| peaks.end[i]).collect(),
            feature: end_order
                .iter()
                .map(|&i| peaks.name[i].clone().unwrap_or_default())
                .collect(),
            gene_id: None,
            gene_type: None,
        };

        ReferencePair { starts, ends }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(path: &Path, contents: &str) {
        let mut f = File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn loads_gene_reference_pair() {
        let dir = tempfile::tempdir().unwrap();
        let gene_dir = dir.path().join("human").join("gene");
        std::fs::create_dir_all(&gene_dir).unwrap();
        write_csv(
            &gene_dir.join("chr1_start.csv"),
            "chr,start,end,gene_name,gene_id,gene_type\nchr1,100,200,geneA,ENSG1,protein_coding\n",
        );
        write_csv(
            &gene_dir.join("chr1_end.csv"),
            "chr,start,end,gene_name,gene_id,gene_type\nchr1,100,200,geneA,ENSG1,protein_coding\n",
        );

        let pair =
            load_reference_pair(dir.path(), "human", "gene", "chr1", "gene_name").unwrap();
        assert_eq!(pair.starts.feature, vec!["geneA"]);
        assert_eq!(pair.starts.gene_id.unwrap(), vec!["ENSG1"]);
    }

    #[test]
    fn from_peaks_sorts_both_sides_independently() {
        use indexmap::IndexMap;

        let mut peaks = IntervalTable::new();
        peaks
            .push_row("chr1".into(), 500, 800, Some("P1".into()), IndexMap::new())
            .unwrap();
        peaks
            .push_row("chr1".into(), 100, 900, Some("P2".into()), IndexMap::new())
            .unwrap();

        let pair = ReferencePair::from_peaks(&peaks);
        assert_eq!(pair.starts.start, vec![100, 500]);
        assert_eq!(pair.starts.feature, vec!["P2", "P1"]);
        assert_eq!(pair.ends.end, vec![800, 900]);
        assert_eq!(pair.ends.feature, vec!["P1", "P2"]);
    }

    #[test]
    fn missing_file_is_reference_missing_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_reference_pair(dir.path(), "human", "gene", "chrZ", "gene_name")
            .expect_err("should fail");
        assert!(matches!(err, Error::ReferenceMissing { .. }));
    }
}

//! The Peak↔Gene Driver: the two process-level operations, `peak2gene` and
//! `gene2peak`, that partition queries by chromosome, invoke the
//! nearest-feature search per chromosome, and concatenate + globally sort
//! the results.
//!
//! Per-chromosome searches are independent (disjoint reference reads,
//! disjoint output slices), so they run concurrently over a `rayon` thread
//! pool; only the final sort is sequential.

use std::fs::{self, File};
use std::path::Path;

use csv::ReaderBuilder;
use indexmap::IndexMap;
use rayon::prelude::*;

use crate::config::{Gene2PeakOptions, Peak2GeneOptions};
use crate::error::{Error, Result};
use crate::nearest::{search_chromosome, ucsc_browser_url, SearchParams, Slot};
use crate::output::ResultTable;
use crate::parser::read_peaks;
use crate::reference::{load_reference_pair, ReferencePair};
use crate::types::{partition_by_chromosome, IntervalTable};

/// Builds the output header: query columns (reduced or full), then the k
/// result-slot columns, then an optional genome-browser-URL column.
fn build_headers(extra_columns: &[String], params: &SearchParams, drop_columns: bool) -> Vec<String> {
    let mut headers = Vec::new();
    if drop_columns {
        headers.extend(["name", "chr", "start", "end"].map(String::from));
    } else {
        headers.extend(["chr", "start", "end", "name"].map(String::from));
        headers.extend(extra_columns.iter().cloned());
    }

    let feature_col = &params.feature_col;
    for i in 1..=params.k {
        headers.push(format!("closest_{feature_col}_{i}"));
        headers.push(format!("closest_{feature_col}_{i}_dist"));
        if params.is_gene_search() {
            headers.push(format!("closest_{feature_col}_{i}_gene_id"));
            headers.push(format!("closest_{feature_col}_{i}_gene_type"));
        }
    }

    if params.species_genome.is_some() {
        headers.push("ucsc_genome_browser_urls".to_string());
    }

    headers
}

/// Renders one query row plus its k result slots into the final string
/// cells, in the same column order [`build_headers`] produced.
fn format_row(
    roi: &IntervalTable,
    row: usize,
    slots: &[Slot],
    extra_columns: &[String],
    params: &SearchParams,
    drop_columns: bool,
) -> Vec<String> {
    let name = roi.name[row].clone().unwrap_or_default();
    let chr = roi.chr[row].clone();
    let start = roi.start[row].to_string();
    let end = roi.end[row].to_string();

    let mut cells = Vec::new();
    if drop_columns {
        cells.extend([name, chr.clone(), start.clone(), end.clone()]);
    } else {
        cells.extend([chr.clone(), start.clone(), end.clone(), name]);
        for column in extra_columns {
            cells.push(roi.get_extra(column, row).unwrap_or_default().to_string());
        }
    }

    for slot in slots {
        match slot {
            Slot::Found {
                feature,
                dist,
                gene_id,
                gene_type,
            } => {
                cells.push(feature.clone());
                cells.push(dist.to_string());
                if params.is_gene_search() {
                    cells.push(gene_id.clone().unwrap_or_default());
                    cells.push(gene_type.clone().unwrap_or_default());
                }
            }
            Slot::NotAvailable => {
                cells.push("N/A".to_string());
                cells.push("N/A".to_string());
                if params.is_gene_search() {
                    cells.push("N/A".to_string());
                    cells.push("N/A".to_string());
                }
            }
        }
    }

    if let Some(species_genome) = &params.species_genome {
        let qs: i64 = roi.start[row];
        let qe: i64 = roi.end[row];
        cells.push(ucsc_browser_url(species_genome, &chr, qs, qe, params.view_window));
    }

    cells
}

/// A secondary sort key distinguishing peak2gene's `(chr, start)` ordering
/// from gene2peak's `(chr, name)` ordering; `chr` is handled by iterating
/// chromosomes in sorted order before this key is applied.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Start(i64),
    Name(String),
}

/// Runs the search for every chromosome present in `queries_by_chr`,
/// resolving that chromosome's Reference Pair via `load_ref`. A `load_ref`
/// returning `Ok(None)` means the reference is missing for that chromosome;
/// the driver logs a warning and omits those queries rather than failing.
fn search_all_chromosomes(
    queries_by_chr: &IndexMap<String, IntervalTable>,
    load_ref: impl Fn(&str) -> Result<Option<ReferencePair>> + Sync,
    params: &SearchParams,
    extra_columns: &[String],
    drop_columns: bool,
    sort_key_of: impl Fn(&IntervalTable, usize) -> SortKey + Sync,
) -> Result<Vec<(String, SortKey, Vec<String>)>> {
    let chunks: Vec<Result<Vec<(String, SortKey, Vec<String>)>>> = queries_by_chr
        .par_iter()
        .map(|(chr, roi)| -> Result<Vec<(String, SortKey, Vec<String>)>> {
            let ref_pair = match load_ref(chr)? {
                Some(pair) => pair,
                None => {
                    log::warn!("no reference found for chromosome {chr}; skipping its queries");
                    return Ok(Vec::new());
                }
            };

            let slots = search_chromosome(roi, &ref_pair, params);
            let mut rows = Vec::with_capacity(roi.len());
            for (i, row_slots) in slots.iter().enumerate() {
                let cells = format_row(roi, i, row_slots, extra_columns, params, drop_columns);
                rows.push((chr.clone(), sort_key_of(roi, i), cells));
            }
            Ok(rows)
        })
        .collect();

    let mut all_rows = Vec::new();
    for chunk in chunks {
        all_rows.extend(chunk?);
    }
    Ok(all_rows)
}

fn finish(
    mut rows: Vec<(String, SortKey, Vec<String>)>,
    headers: Vec<String>,
) -> ResultTable {
    rows.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    let mut table = ResultTable::new(headers);
    for (_, _, cells) in rows {
        table.push_row(cells);
    }
    table
}

/// Annotates each peak with its k nearest genes.
pub fn peak2gene(options: &Peak2GeneOptions) -> Result<ResultTable> {
    options.validate()?;
    log::info!("peak2gene: reading {}", options.source.peak_file.display());

    let peaks = read_peaks(&options.source)?;
    let extra_columns: Vec<String> = peaks.extra_columns().map(String::from).collect();
    let queries_by_chr = partition_by_chromosome(&peaks)?;

    let params = SearchParams {
        feature_col: "gene_name".to_string(),
        up_bound: options.up_bound,
        down_bound: options.down_bound,
        k: options.k,
        species_genome: options.species_genome.clone(),
        view_window: options.view_window,
    };

    let ref_dir = options.ref_dir.clone();
    let species = options.species.clone();
    let rows = search_all_chromosomes(
        &queries_by_chr,
        |chr| match load_reference_pair(&ref_dir, &species, "gene", chr, "gene_name") {
            Ok(pair) => Ok(Some(pair)),
            Err(Error::ReferenceMissing { .. }) => Ok(None),
            Err(e) => Err(e),
        },
        &params,
        &extra_columns,
        options.drop_columns,
        |roi, i| SortKey::Start(roi.start[i]),
    )?;

    let headers = build_headers(&extra_columns, &params, options.drop_columns);
    log::info!("peak2gene: annotated {} peaks", rows.len());
    Ok(finish(rows, headers))
}

/// Annotates each requested gene with its k nearest peaks.
pub fn gene2peak(options: &Gene2PeakOptions) -> Result<ResultTable> {
    options.validate()?;
    log::info!("gene2peak: reading gene list {}", options.genes_path.display());

    let gene_names = read_gene_names(&options.genes_path)?;
    let genes = load_genes(&options.ref_dir, &options.species, &gene_names)?;
    let gene_extra_columns: Vec<String> = genes.extra_columns().map(String::from).collect();
    let genes_by_chr = partition_by_chromosome(&genes)?;

    let peaks = read_peaks(&options.source)?;
    let peaks_by_chr = partition_by_chromosome(&peaks)?;

    let params = SearchParams {
        feature_col: "name".to_string(),
        up_bound: None,
        down_bound: None,
        k: options.k,
        species_genome: options.species_genome.clone(),
        view_window: options.view_window,
    };

    let rows = search_all_chromosomes(
        &genes_by_chr,
        |chr| {
            let empty = IntervalTable::new();
            let peaks_for_chr = peaks_by_chr.get(chr).unwrap_or(&empty);
            Ok(Some(ReferencePair::from_peaks(peaks_for_chr)))
        },
        &params,
        &gene_extra_columns,
        false,
        |roi, i| SortKey::Name(roi.name[i].clone().unwrap_or_default()),
    )?;

    let headers = build_headers(&gene_extra_columns, &params, false);
    log::info!("gene2peak: annotated {} genes", rows.len());
    Ok(finish(rows, headers))
}

/// Reads a plain list of gene names, one per line, blank lines skipped.
fn read_gene_names(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect())
}

/// Scans every chromosome's `gene` reference file for the species, looking
/// up each requested gene name by its `gene_name` column. A name absent
/// from every chromosome fails the whole run (`GeneNotFoundError`).
fn load_genes(ref_dir: &Path, species: &str, gene_names: &[String]) -> Result<IntervalTable> {
    let gene_dir = ref_dir.join(species).join("gene");
    let mut remaining: IndexMap<String, ()> = gene_names.iter().map(|n| (n.clone(), ())).collect();
    let mut table = IntervalTable::new();

    let entries = fs::read_dir(&gene_dir)?;
    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if !file_name.ends_with("_start.csv") {
            continue;
        }

        let file = File::open(entry.path())?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);
        let headers = reader.headers()?.clone();
        let chr_idx = headers.iter().position(|h| h == "chr");
        let start_idx = headers.iter().position(|h| h == "start");
        let end_idx = headers.iter().position(|h| h == "end");
        let name_idx = headers.iter().position(|h| h == "gene_name");
        let (chr_idx, start_idx, end_idx, name_idx) = match (chr_idx, start_idx, end_idx, name_idx) {
            (Some(c), Some(s), Some(e), Some(n)) => (c, s, e, n),
            _ => {
                return Err(Error::Input(format!(
                    "{}: missing required gene reference column",
                    entry.path().display()
                )))
            }
        };

        for record in reader.records() {
            let record = record?;
            let gene_name = record.get(name_idx).unwrap_or_default();
            if remaining.shift_remove(gene_name).is_none() {
                continue;
            }
            let row_extra: IndexMap<String, String> = headers
                .iter()
                .enumerate()
                .filter(|(i, h)| *i != chr_idx && *i != start_idx && *i != end_idx && *h != "gene_name")
                .filter_map(|(i, h)| record.get(i).map(|v| (h.to_string(), v.to_string())))
                .collect();

            let chr = record.get(chr_idx).unwrap_or_default().to_string();
            let start: i64 = record
                .get(start_idx)
                .unwrap_or_default()
                .parse()
                .map_err(|_| Error::Input(format!("{}: non-integer start", entry.path().display())))?;
            let end: i64 = record
                .get(end_idx)
                .unwrap_or_default()
                .parse()
                .map_err(|_| Error::Input(format!("{}: non-integer end", entry.path().display())))?;

            table.push_row(chr, start, end, Some(gene_name.to_string()), row_extra)?;
        }
    }

    if let Some((missing, _)) = remaining.iter().next() {
        return Err(Error::GeneNotFound(missing.clone()));
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OutputType, PeakBoundary, PeakSource, PeakType};
    use std::io::Write;

    fn write_file(path: &Path, contents: &str) {
        let mut f = File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    fn setup_gene_ref(dir: &Path) {
        let gene_dir = dir.join("ref").join("test").join("gene");
        fs::create_dir_all(&gene_dir).unwrap();
        write_file(
            &gene_dir.join("chr1_start.csv"),
            "chr,start,end,gene_name,gene_id,gene_type\n\
chr1,1000,2000,G1,ENSG1,protein_coding\n\
chr1,10000,11000,G2,ENSG2,protein_coding\n",
        );
        write_file(
            &gene_dir.join("chr1_end.csv"),
            "chr,start,end,gene_name,gene_id,gene_type\n\
chr1,1000,2000,G1,ENSG1,protein_coding\n\
chr1,10000,11000,G2,ENSG2,protein_coding\n",
        );
    }

    /// Scenario F — gene2peak symmetric round trip.
    #[test]
    fn scenario_f_gene2peak_symmetric() {
        let dir = tempfile::tempdir().unwrap();
        setup_gene_ref(dir.path());

        let genes_path = dir.path().join("genes.txt");
        write_file(&genes_path, "G1\nG2\n");

        let peaks_path = dir.path().join("peaks.bed");
        write_file(
            &peaks_path,
            "chr1\t499\t799\tP1\t0\t+\n\
chr1\t2499\t2699\tP2\t0\t+\n\
chr1\t11999\t12499\tP3\t0\t+\n",
        );

        let source =
            PeakSource::new(peaks_path, PeakType::Bed6, PeakBoundary::NativePeakBoundaries).unwrap();
        let options = Gene2PeakOptions {
            source,
            species: "test".to_string(),
            ref_dir: dir.path().join("ref"),
            genes_path,
            k: 2,
            species_genome: None,
            view_window: 0.2,
            output_name: "out".to_string(),
            out_dir: dir.path().join("results"),
            output_type: OutputType::Csv,
        };

        let table = gene2peak(&options).unwrap();
        let name_idx = table.headers.iter().position(|h| h == "name").unwrap();
        let g1_row = table.rows.iter().find(|r| r[name_idx] == "G1").unwrap();
        let g2_row = table.rows.iter().find(|r| r[name_idx] == "G2").unwrap();

        let feature_idx = table.headers.iter().position(|h| h == "closest_name_1").unwrap();
        let dist_idx = table.headers.iter().position(|h| h == "closest_name_1_dist").unwrap();
        assert_eq!(g1_row[feature_idx], "P1");
        assert_eq!(g1_row[dist_idx], "-200");

        let feature2_idx = table.headers.iter().position(|h| h == "closest_name_2").unwrap();
        let dist2_idx = table.headers.iter().position(|h| h == "closest_name_2_dist").unwrap();
        assert_eq!(g1_row[feature2_idx], "P2");
        assert_eq!(g1_row[dist2_idx], "500");

        assert_eq!(g2_row[feature_idx], "P3");
        assert_eq!(g2_row[dist_idx], "1000");
        assert_eq!(g2_row[feature2_idx], "P2");
        assert_eq!(g2_row[dist2_idx], "-7300");
    }

    #[test]
    fn gene2peak_unknown_gene_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        setup_gene_ref(dir.path());

        let genes_path = dir.path().join("genes.txt");
        write_file(&genes_path, "G1\nNOT_A_GENE\n");

        let peaks_path = dir.path().join("peaks.bed");
        write_file(&peaks_path, "chr1\t499\t799\tP1\t0\t+\n");

        let source =
            PeakSource::new(peaks_path, PeakType::Bed6, PeakBoundary::NativePeakBoundaries).unwrap();
        let options = Gene2PeakOptions {
            source,
            species: "test".to_string(),
            ref_dir: dir.path().join("ref"),
            genes_path,
            k: 1,
            species_genome: None,
            view_window: 0.2,
            output_name: "out".to_string(),
            out_dir: dir.path().join("results"),
            output_type: OutputType::Csv,
        };

        let err = gene2peak(&options).unwrap_err();
        assert!(matches!(err, Error::GeneNotFound(ref g) if g == "NOT_A_GENE"));
    }

    #[test]
    fn peak2gene_missing_chromosome_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        setup_gene_ref(dir.path());

        let peaks_path = dir.path().join("peaks.bed");
        write_file(
            &peaks_path,
            "chr1\t999\t1999\tP1\t0\t+\n\
chrZ\t100\t200\tP2\t0\t+\n",
        );

        let source =
            PeakSource::new(peaks_path, PeakType::Bed6, PeakBoundary::NativePeakBoundaries).unwrap();
        let options = Peak2GeneOptions {
            source,
            species: "test".to_string(),
            ref_dir: dir.path().join("ref"),
            k: 1,
            up_bound: None,
            down_bound: None,
            drop_columns: false,
            species_genome: None,
            view_window: 0.2,
            output_name: "out".to_string(),
            out_dir: dir.path().join("results"),
            output_type: OutputType::Csv,
        };

        let table = peak2gene(&options).unwrap();
        assert_eq!(table.rows.len(), 1);
        let name_idx = table.headers.iter().position(|h| h == "name").unwrap();
        assert_eq!(table.rows[0][name_idx], "P1");
    }
}

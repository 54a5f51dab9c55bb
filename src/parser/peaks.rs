//! Peak-format readers: normalize the native output of common peak-callers
//! into the shared [`IntervalTable`] shape the core consumes, then apply the
//! shared peak-boundary transform.
//!
//! Column layouts and header-skip counts are grounded in the distillation
//! source's `read_input_*` / `process_input_*` functions; see
//! [`crate::config::PeakType`] for the dispatch.

use std::fs::File;
use std::path::Path;

use csv::ReaderBuilder;
use indexmap::IndexMap;

use crate::config::{PeakBoundary, PeakSource};
use crate::error::{Error, Result};
use crate::parser::util::create_buffered_reader;
use crate::types::IntervalTable;

/// A single raw peak row before boundary editing: positional columns plus
/// whatever pass-through columns the reader captured.
struct RawPeak {
    chr: String,
    start: i64,
    end: i64,
    name: Option<String>,
    abs_summit: Option<i64>,
    extra: IndexMap<String, String>,
}

fn parse_int(field: &str, what: &str) -> Result<i64> {
    field
        .trim()
        .parse()
        .map_err(|_| Error::Input(format!("non-integer {what}: '{field}'")))
}

/// MACS2 xls: tab-separated, 22 header lines skipped (header itself is line
/// 23); `-log10(pvalue)`/`-log10(qvalue)` renamed.
fn read_macs2_xls(path: &Path) -> Result<Vec<RawPeak>> {
    let file = File::open(path)?;
    let reader = create_buffered_reader(file, path);
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = csv_reader.records();
    for _ in 0..22 {
        if records.next().is_none() {
            return Err(Error::Input(format!(
                "{}: fewer than 22 header lines before the MACS2 xls header",
                path.display()
            )));
        }
    }
    let header_record = records
        .next()
        .ok_or_else(|| Error::Input(format!("{}: missing MACS2 xls header row", path.display())))??;
    let headers: Vec<String> = header_record
        .iter()
        .map(|h| match h {
            "-log10(pvalue)" => "neg_log10_pvalue".to_string(),
            "-log10(qvalue)" => "neg_log10_qvalue".to_string(),
            other => other.to_string(),
        })
        .collect();

    let chr_idx = index_of(&headers, "chr")?;
    let start_idx = index_of(&headers, "start")?;
    let end_idx = index_of(&headers, "end")?;
    let summit_idx = headers.iter().position(|h| h == "abs_summit");
    let name_idx = headers.iter().position(|h| h == "name");

    let mut peaks = Vec::new();
    for record in records {
        let record = record?;
        let extra: IndexMap<String, String> = headers
            .iter()
            .enumerate()
            .filter(|(i, h)| {
                !matches!(h.as_str(), "chr" | "start" | "end")
                    && Some(*i) != summit_idx
                    && Some(*i) != name_idx
            })
            .filter_map(|(i, h)| record.get(i).map(|v| (h.clone(), v.to_string())))
            .collect();

        peaks.push(RawPeak {
            chr: record.get(chr_idx).unwrap_or_default().to_string(),
            start: parse_int(record.get(start_idx).unwrap_or_default(), "start")?,
            end: parse_int(record.get(end_idx).unwrap_or_default(), "end")?,
            name: name_idx.and_then(|i| record.get(i)).map(|s| s.to_string()),
            abs_summit: match summit_idx {
                Some(i) => Some(parse_int(record.get(i).unwrap_or_default(), "abs_summit")?),
                None => None,
            },
            extra,
        });
    }
    Ok(peaks)
}

fn index_of(headers: &[String], name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| Error::Input(format!("missing required column '{name}'")))
}

/// Reads a headerless tab-separated file with a fixed column list, truncated
/// to however many of those columns the file actually carries.
fn read_headerless(path: &Path, columns: &[&str]) -> Result<(Vec<Vec<String>>, usize)> {
    let file = File::open(path)?;
    let reader = create_buffered_reader(file, path);
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    let mut width = 0;
    for record in csv_reader.records() {
        let record = record?;
        width = width.max(record.len().min(columns.len()));
        rows.push(record.iter().take(columns.len()).map(|s| s.to_string()).collect());
    }
    Ok((rows, width))
}

fn headerless_to_peaks(rows: Vec<Vec<String>>, width: usize, columns: &[&str]) -> Result<Vec<RawPeak>> {
    let cols = &columns[..width];
    let chr_idx = 0;
    let start_idx = 1;
    let end_idx = 2;
    let name_idx = cols.iter().position(|c| *c == "name" || *c == "peak_names");

    let mut peaks = Vec::new();
    for row in rows {
        let extra: IndexMap<String, String> = cols
            .iter()
            .enumerate()
            .filter(|(i, c)| *i != chr_idx && *i != start_idx && *i != end_idx && Some(*i) != name_idx && **c != "name")
            .filter_map(|(i, c)| row.get(i).map(|v| (c.to_string(), v.clone())))
            .collect();

        peaks.push(RawPeak {
            chr: row[chr_idx].clone(),
            start: parse_int(&row[start_idx], "start")?,
            end: parse_int(&row[end_idx], "end")?,
            name: name_idx.and_then(|i| row.get(i)).cloned(),
            abs_summit: None,
            extra,
        });
    }
    Ok(peaks)
}

/// MACS2 BED/narrowPeak: headerless, `chr, start, end, name, score, strand,
/// signal, pvalue, qvalue, peak`, possibly truncated.
fn read_macs2_bed(path: &Path) -> Result<Vec<RawPeak>> {
    let columns = [
        "chr", "start", "end", "name", "score", "strand", "signal", "pvalue", "qvalue", "peak",
    ];
    let (rows, width) = read_headerless(path, &columns)?;
    headerless_to_peaks(rows, width, &columns)
}

/// MACS2 consensus BED: 21 columns starting `chr, start, end, peak_starts,
/// peak_ends, peak_names, ...`; `peak_names` renamed to `name`; 24 header
/// lines skipped. Remaining aggregate columns pass through opaquely.
fn read_macs2_consensus(path: &Path) -> Result<Vec<RawPeak>> {
    let file = File::open(path)?;
    let reader = create_buffered_reader(file, path);
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = csv_reader.records();
    for _ in 0..24 {
        if records.next().is_none() {
            return Err(Error::Input(format!(
                "{}: fewer than 24 header lines before MACS2 consensus data",
                path.display()
            )));
        }
    }

    let columns = [
        "chr",
        "start",
        "end",
        "peak_starts",
        "peak_ends",
        "peak_names",
        "num_peaks",
        "num_samples",
        "summit_mean",
        "summit_stdev",
        "summit_min",
        "summit_max",
        "width_mean",
        "width_stdev",
        "width_min",
        "width_max",
        "total_signal_mean",
        "total_signal_stdev",
        "total_signal_min",
        "total_signal_max",
        "sample_names",
    ];

    let mut peaks = Vec::new();
    for record in records {
        let record = record?;
        let width = record.len().min(columns.len());
        let extra: IndexMap<String, String> = columns[..width]
            .iter()
            .enumerate()
            .filter(|(i, c)| !matches!(*i, 0 | 1 | 2) && **c != "peak_names")
            .filter_map(|(i, c)| record.get(i).map(|v| (c.to_string(), v.to_string())))
            .collect();

        let name_idx = columns.iter().position(|c| *c == "peak_names");
        peaks.push(RawPeak {
            chr: record.get(0).unwrap_or_default().to_string(),
            start: parse_int(record.get(1).unwrap_or_default(), "start")?,
            end: parse_int(record.get(2).unwrap_or_default(), "end")?,
            name: name_idx.and_then(|i| record.get(i)).map(|s| s.to_string()),
            abs_summit: None,
            extra,
        });
    }
    Ok(peaks)
}

/// SEACR: headerless `chr, start, end, name, max_signal, region`.
fn read_seacr(path: &Path) -> Result<Vec<RawPeak>> {
    let columns = ["chr", "start", "end", "name", "max_signal", "region"];
    let (rows, width) = read_headerless(path, &columns)?;
    headerless_to_peaks(rows, width, &columns)
}

/// BED6: `chr, start, end, name, score, strand`.
fn read_bed6(path: &Path) -> Result<Vec<RawPeak>> {
    let columns = ["chr", "start", "end", "name", "score", "strand"];
    let (rows, width) = read_headerless(path, &columns)?;
    headerless_to_peaks(rows, width, &columns)
}

fn apply_bed_shift(peaks: &mut [RawPeak]) {
    for peak in peaks.iter_mut() {
        peak.start += 1;
        peak.end += 1;
        if let Some(summit) = peak.abs_summit.as_mut() {
            *summit += 1;
        }
    }
}

fn apply_boundary(peaks: &mut [RawPeak], boundary: PeakBoundary) -> Result<()> {
    match boundary {
        PeakBoundary::NativePeakBoundaries => Ok(()),
        PeakBoundary::PeakSummit => {
            for peak in peaks.iter_mut() {
                let summit = peak.abs_summit.ok_or_else(|| {
                    Error::Config("peak_summit requires an abs_summit column".to_string())
                })?;
                peak.start = summit;
                peak.end = summit;
            }
            Ok(())
        }
        PeakBoundary::ArtificialPeakBoundaries { boundary } => {
            for peak in peaks.iter_mut() {
                let summit = peak.abs_summit.ok_or_else(|| {
                    Error::Config(
                        "artificial_peak_boundaries requires an abs_summit column".to_string(),
                    )
                })?;
                peak.start = summit - boundary;
                peak.end = summit + boundary;
            }
            Ok(())
        }
    }
}

fn into_table(peaks: Vec<RawPeak>) -> Result<IntervalTable> {
    let mut table = IntervalTable::new();
    for peak in peaks {
        table.push_row(peak.chr, peak.start, peak.end, peak.name, peak.extra)?;
    }
    Ok(table)
}

/// Reads, BED-shifts, and boundary-edits a peak file per `source`, producing
/// the normalized [`IntervalTable`] the rest of the core consumes.
pub fn read_peaks(source: &PeakSource) -> Result<IntervalTable> {
    use crate::config::PeakType::*;

    let mut peaks = match source.peak_type {
        Macs2Xls => read_macs2_xls(&source.peak_file)?,
        Macs2Bed => read_macs2_bed(&source.peak_file)?,
        Macs2Consensus => read_macs2_consensus(&source.peak_file)?,
        Seacr => read_seacr(&source.peak_file)?,
        Bed6 => read_bed6(&source.peak_file)?,
    };

    if source.peak_type.is_bed_origin() {
        apply_bed_shift(&mut peaks);
    }
    apply_boundary(&mut peaks, source.boundary)?;

    into_table(peaks)
}

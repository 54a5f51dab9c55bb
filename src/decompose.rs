//! The GTF Decomposer: converts a raw GTF annotation into, for every
//! distinct (feature, chromosome) pair, a start-sorted and an end-sorted
//! reference CSV under `<ref_dir>/<species>/<feature>/<chr>_{start,end}.csv`.
//!
//! The GTF attribute column is exploded into one column per distinct key
//! seen across the feature's rows (missing keys hold an empty field), then
//! dropped. This is the only writer of reference files; the search (§
//! [`crate::reference`]) only ever reads them back.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::BufRead;
use std::path::Path;

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::config::DecomposeOptions;
use crate::error::{Error, Result};
use crate::parser::util::create_buffered_reader;
use crate::types::normalize_chromosome;

/// One raw GTF row, fields bound by position, attribute column already
/// exploded into a name -> value map.
struct GtfRow {
    chr: String,
    feature: String,
    start: i64,
    end: i64,
    attributes: IndexMap<String, String>,
}

/// Parses `"key \"value\"; key \"value\"; ..."` into an ordered map, matching
/// the source's `split_jumble`: split on `"; "`, key is the token before the
/// first space, value has surrounding quotes and any trailing `;` stripped.
fn parse_attributes(raw: &str) -> Result<IndexMap<String, String>> {
    let mut attrs = IndexMap::new();
    for pair in raw.trim().split("; ") {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair
            .split_once(' ')
            .ok_or_else(|| Error::Input(format!("unparseable GTF attribute token '{pair}'")))?;
        let value = value.trim().trim_end_matches(';').trim_matches('"');
        attrs.insert(key.to_string(), value.to_string());
    }
    Ok(attrs)
}

/// Reads the whole GTF, skipping the first 5 comment lines, binding columns
/// to `chr, source, feature, start, end, score, strand, frame, attribute`.
fn read_gtf_rows<R: BufRead>(reader: R) -> Result<Vec<GtfRow>> {
    let mut rows = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if lineno < 5 {
            continue;
        }
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 9 {
            return Err(Error::Input(format!(
                "GTF line {} has fewer than 9 columns",
                lineno + 1
            )));
        }
        let start: i64 = fields[3]
            .parse()
            .map_err(|_| Error::Input(format!("GTF line {}: non-integer start", lineno + 1)))?;
        let end: i64 = fields[4]
            .parse()
            .map_err(|_| Error::Input(format!("GTF line {}: non-integer end", lineno + 1)))?;
        if end < start {
            return Err(Error::Input(format!(
                "GTF line {}: end ({end}) before start ({start})",
                lineno + 1
            )));
        }
        let chr = normalize_chromosome(fields[0])?;
        rows.push(GtfRow {
            chr,
            feature: fields[2].to_string(),
            start,
            end,
            attributes: parse_attributes(fields[8])?,
        });
    }
    Ok(rows)
}

/// One exploded, position-sorted row ready to be written out.
struct ExplodedRow<'a> {
    chr: &'a str,
    start: i64,
    end: i64,
    attributes: &'a IndexMap<String, String>,
}

fn write_csv(path: &Path, keys: &[String], rows: &[ExplodedRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new().from_path(path)?;
    let mut header = vec!["chr".to_string(), "start".to_string(), "end".to_string()];
    header.extend(keys.iter().cloned());
    writer.write_record(&header)?;

    for row in rows {
        let mut fields = vec![row.chr.to_string(), row.start.to_string(), row.end.to_string()];
        for key in keys {
            fields.push(row.attributes.get(key).cloned().unwrap_or_default());
        }
        writer.write_record(&fields)?;
    }
    writer.flush()?;
    Ok(())
}

/// Runs the decomposer: reads `options.gtf_path`, groups by `feature`, then
/// by chromosome, writing the start-sorted and end-sorted CSVs for each
/// (feature, chromosome) pair under `options.ref_dir`.
pub fn decompose(options: &DecomposeOptions) -> Result<()> {
    log::info!(
        "decomposing {} for species {} into {}",
        options.gtf_path.display(),
        options.species,
        options.ref_dir.display()
    );

    let file = File::open(&options.gtf_path)?;
    let reader = create_buffered_reader(file, &options.gtf_path);
    let rows = read_gtf_rows(reader)?;

    let mut by_feature: IndexMap<String, Vec<GtfRow>> = IndexMap::new();
    for row in rows {
        by_feature.entry(row.feature.clone()).or_default().push(row);
    }

    let species_dir = options.ref_dir.join(&options.species);

    for (feature, rows) in &by_feature {
        let mut keys: BTreeSet<String> = BTreeSet::new();
        for row in rows {
            keys.extend(row.attributes.keys().cloned());
        }
        let keys: Vec<String> = keys.into_iter().collect();

        let mut by_chr: AHashMap<&str, Vec<&GtfRow>> = AHashMap::new();
        for row in rows {
            by_chr.entry(row.chr.as_str()).or_default().push(row);
        }

        for (chr, chr_rows) in &by_chr {
            // Sort ascending by start, then dedup keeping the first
            // occurrence of each start (the source's `.unique(subset='start')`
            // after an ascending sort keeps the first row for a given key).
            let mut deduped: Vec<&GtfRow> = chr_rows.to_vec();
            deduped.sort_by_key(|r| r.start);
            let mut seen_starts: BTreeSet<i64> = BTreeSet::new();
            deduped.retain(|r| seen_starts.insert(r.start));

            let to_exploded = |r: &&GtfRow| ExplodedRow {
                chr: &r.chr,
                start: r.start,
                end: r.end,
                attributes: &r.attributes,
            };
            let start_rows: Vec<ExplodedRow> = deduped.iter().map(to_exploded).collect();

            // The end-sorted file re-sorts the already-deduplicated start
            // file, not the raw chromosome group.
            let mut end_order = deduped.clone();
            end_order.sort_by_key(|r| r.end);
            let end_rows: Vec<ExplodedRow> = end_order.iter().map(to_exploded).collect();

            let feature_dir = species_dir.join(feature);
            write_csv(&feature_dir.join(format!("{chr}_start.csv")), &keys, &start_rows)?;
            write_csv(&feature_dir.join(format!("{chr}_end.csv")), &keys, &end_rows)?;
        }
    }

    log::info!("decomposition complete: {} feature kinds written", by_feature.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_attribute_pairs() {
        let attrs = parse_attributes(
            r#"gene_id "ENSG1"; gene_name "GENE1"; gene_type "protein_coding";"#,
        )
        .unwrap();
        assert_eq!(attrs.get("gene_id"), Some(&"ENSG1".to_string()));
        assert_eq!(attrs.get("gene_name"), Some(&"GENE1".to_string()));
        assert_eq!(attrs.get("gene_type"), Some(&"protein_coding".to_string()));
    }

    #[test]
    fn decompose_round_trip_sorted_and_deduped() {
        let dir = tempfile::tempdir().unwrap();
        let gtf_path = dir.path().join("test.gtf");
        let gtf = "##c1\n##c2\n##c3\n##c4\n##c5\n\
chr1\tSRC\tgene\t300\t400\t.\t+\t.\tgene_id \"G2\"; gene_name \"Gene2\";\n\
chr1\tSRC\tgene\t100\t200\t.\t+\t.\tgene_id \"G1\"; gene_name \"Gene1\";\n\
chr1\tSRC\tgene\t100\t250\t.\t+\t.\tgene_id \"G1dup\"; gene_name \"Gene1Dup\";\n";
        std::fs::write(&gtf_path, gtf).unwrap();

        let ref_dir = dir.path().join("ref");
        let options = DecomposeOptions {
            gtf_path,
            species: "test".to_string(),
            ref_dir: ref_dir.clone(),
        };
        decompose(&options).unwrap();

        let start_csv =
            std::fs::read_to_string(ref_dir.join("test/gene/chr1_start.csv")).unwrap();
        let mut lines = start_csv.lines();
        let header = lines.next().unwrap();
        assert!(header.contains("gene_id"));
        assert!(header.contains("gene_name"));
        let data: Vec<&str> = lines.collect();
        // Deduplicated on start: G1 (start=100) kept, G1dup (start=100) dropped.
        assert_eq!(data.len(), 2);
        assert!(data[0].starts_with("chr1,100,200"));
        assert!(data[1].starts_with("chr1,300,400"));

        let end_csv = std::fs::read_to_string(ref_dir.join("test/gene/chr1_end.csv")).unwrap();
        let end_data: Vec<&str> = end_csv.lines().skip(1).collect();
        assert_eq!(end_data.len(), 2);
        assert!(end_data[0].starts_with("chr1,100,200"));
        assert!(end_data[1].starts_with("chr1,300,400"));
    }

    #[test]
    fn rejects_malformed_attribute_token() {
        let err = parse_attributes("not_a_valid_pair").unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }
}

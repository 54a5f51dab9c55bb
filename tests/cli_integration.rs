//! End-to-end coverage of the CLI binary: decompose -> peak2gene -> gene2peak,
//! plus the missing-chromosome recovery path (scenario E) and the
//! gene2peak symmetric round trip (scenario F), driven as a real process
//! against temporary fixture directories.

use assert_cmd::Command;
use std::fs;
use std::path::Path;

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn sample_gtf() -> String {
    let mut gtf = String::new();
    for _ in 0..5 {
        gtf.push_str("##comment\n");
    }
    gtf.push_str("chr1\tHAVANA\tgene\t1000\t2000\t.\t+\t.\tgene_id \"ENSG1\"; gene_name \"G1\"; gene_type \"protein_coding\";\n");
    gtf.push_str("chr1\tHAVANA\tgene\t10000\t11000\t.\t+\t.\tgene_id \"ENSG2\"; gene_name \"G2\"; gene_type \"protein_coding\";\n");
    gtf
}

#[test]
fn decompose_then_peak2gene_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let gtf_path = dir.path().join("ref.gtf");
    write(&gtf_path, &sample_gtf());

    let ref_dir = dir.path().join("ref");
    Command::new(env!("CARGO_BIN_EXE_peakscout"))
        .args(["decompose", "-g"])
        .arg(&gtf_path)
        .args(["-s", "human", "-r"])
        .arg(&ref_dir)
        .assert()
        .success();

    assert!(ref_dir.join("human/gene/chr1_start.csv").exists());
    assert!(ref_dir.join("human/gene/chr1_end.csv").exists());

    // Peak P1 overlaps neither gene and sits between them: distances mirror
    // scenario A's shape (pure downstream/upstream pair).
    let peaks_path = dir.path().join("peaks.bed");
    write(&peaks_path, "chr1\t2999\t3099\tP1\t0\t+\n");

    let out_dir = dir.path().join("out");
    Command::new(env!("CARGO_BIN_EXE_peakscout"))
        .args(["peak2gene", "-p"])
        .arg(&peaks_path)
        .args(["--peak-type", "bed6", "-s", "human", "-r"])
        .arg(&ref_dir)
        .args(["-k", "2", "-o", "peak2gene", "-d"])
        .arg(&out_dir)
        .assert()
        .success();

    let csv = fs::read_to_string(out_dir.join("peak2gene.csv")).unwrap();
    let mut lines = csv.lines();
    let header = lines.next().unwrap();
    assert!(header.contains("closest_gene_name_1"));
    assert!(header.contains("closest_gene_name_1_gene_id"));
    let data_row = lines.next().unwrap();
    assert!(data_row.starts_with("chr1,3000,3100,P1"));
    assert!(data_row.contains(",G1,-1000,ENSG1,protein_coding,"));
    assert!(data_row.contains(",G2,6900,ENSG2,protein_coding"));
}

/// Scenario E: a chromosome present in the peaks but absent from the
/// reference is skipped with a warning, not a fatal error.
#[test]
fn peak2gene_skips_missing_chromosome_without_failing() {
    let dir = tempfile::tempdir().unwrap();
    let gtf_path = dir.path().join("ref.gtf");
    write(&gtf_path, &sample_gtf());

    let ref_dir = dir.path().join("ref");
    Command::new(env!("CARGO_BIN_EXE_peakscout"))
        .args(["decompose", "-g"])
        .arg(&gtf_path)
        .args(["-s", "human", "-r"])
        .arg(&ref_dir)
        .assert()
        .success();

    let peaks_path = dir.path().join("peaks.bed");
    write(
        &peaks_path,
        "chr1\t999\t1999\tP1\t0\t+\nchrZ\t99\t199\tP2\t0\t+\n",
    );

    let out_dir = dir.path().join("out");
    Command::new(env!("CARGO_BIN_EXE_peakscout"))
        .args(["peak2gene", "-p"])
        .arg(&peaks_path)
        .args(["--peak-type", "bed6", "-s", "human", "-r"])
        .arg(&ref_dir)
        .args(["-k", "1", "-o", "peak2gene", "-d"])
        .arg(&out_dir)
        .assert()
        .success();

    let csv = fs::read_to_string(out_dir.join("peak2gene.csv")).unwrap();
    let data_rows: Vec<&str> = csv.lines().skip(1).collect();
    assert_eq!(data_rows.len(), 1);
    assert!(data_rows[0].starts_with("chr1,1000,2000,P1"));
}

/// Scenario F: gene2peak's symmetric nearest-peak search.
#[test]
fn gene2peak_symmetric_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let gtf_path = dir.path().join("ref.gtf");
    write(&gtf_path, &sample_gtf());

    let ref_dir = dir.path().join("ref");
    Command::new(env!("CARGO_BIN_EXE_peakscout"))
        .args(["decompose", "-g"])
        .arg(&gtf_path)
        .args(["-s", "human", "-r"])
        .arg(&ref_dir)
        .assert()
        .success();

    let peaks_path = dir.path().join("peaks.bed");
    write(
        &peaks_path,
        "chr1\t499\t799\tP1\t0\t+\n\
chr1\t2499\t2699\tP2\t0\t+\n\
chr1\t11999\t12499\tP3\t0\t+\n",
    );
    let genes_path = dir.path().join("genes.txt");
    write(&genes_path, "G1\nG2\n");

    let out_dir = dir.path().join("out");
    Command::new(env!("CARGO_BIN_EXE_peakscout"))
        .args(["gene2peak", "-p"])
        .arg(&peaks_path)
        .args(["--peak-type", "bed6", "-s", "human", "-r"])
        .arg(&ref_dir)
        .args(["-G"])
        .arg(&genes_path)
        .args(["-k", "2", "-o", "gene2peak", "-d"])
        .arg(&out_dir)
        .assert()
        .success();

    let csv = fs::read_to_string(out_dir.join("gene2peak.csv")).unwrap();
    let mut rows = csv.lines();
    let header: Vec<&str> = rows.next().unwrap().split(',').collect();
    let name_idx = header.iter().position(|h| *h == "name").unwrap();
    let f1_idx = header.iter().position(|h| *h == "closest_name_1").unwrap();
    let d1_idx = header
        .iter()
        .position(|h| *h == "closest_name_1_dist")
        .unwrap();

    let data: Vec<Vec<&str>> = rows.map(|l| l.split(',').collect()).collect();
    let g1 = data.iter().find(|r| r[name_idx] == "G1").unwrap();
    assert_eq!(g1[f1_idx], "P1");
    assert_eq!(g1[d1_idx], "-200");

    let g2 = data.iter().find(|r| r[name_idx] == "G2").unwrap();
    assert_eq!(g2[f1_idx], "P3");
    assert_eq!(g2[d1_idx], "1000");
}

/// An unknown peak type is a fatal configuration error surfaced as a
/// non-zero exit, per the ConfigError propagation policy.
#[test]
fn unknown_peak_type_is_a_fatal_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let peaks_path = dir.path().join("peaks.bed");
    write(&peaks_path, "chr1\t1\t2\tP1\t0\t+\n");
    let ref_dir = dir.path().join("ref");
    fs::create_dir_all(&ref_dir).unwrap();

    Command::new(env!("CARGO_BIN_EXE_peakscout"))
        .args(["peak2gene", "-p"])
        .arg(&peaks_path)
        .args(["--peak-type", "bogus_format", "-s", "human", "-r"])
        .arg(&ref_dir)
        .args(["-k", "1"])
        .assert()
        .failure();
}

//! CLI entry point for peakscout.
//!
//! Three subcommands mirror the library's three operations: `decompose`
//! turns a GTF into per-chromosome reference tables, `peak2gene` annotates
//! peaks with their nearest genes, `gene2peak` annotates genes with their
//! nearest peaks.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use peakscout::config::{
    DecomposeOptions, Gene2PeakOptions, OutputType, Peak2GeneOptions, PeakBoundary, PeakSource,
    PeakType, DEFAULT_VIEW_WINDOW,
};
use peakscout::driver::{gene2peak, peak2gene};
use peakscout::output::write_result;

#[derive(Parser, Debug)]
#[command(name = "peakscout")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Explode a GTF into per-feature, per-chromosome start/end-sorted reference tables.
    Decompose {
        #[arg(short = 'g', long = "gtf")]
        gtf: PathBuf,

        #[arg(short = 's', long = "species")]
        species: String,

        #[arg(short = 'r', long = "ref-dir")]
        ref_dir: PathBuf,
    },

    /// Annotate each peak with its k nearest genes.
    Peak2Gene {
        #[arg(short = 'p', long = "peaks")]
        peaks: PathBuf,

        #[arg(long = "peak-type", default_value = "bed6")]
        peak_type: String,

        #[arg(long = "boundary", default_value = "native_peak_boundaries")]
        boundary: String,

        #[arg(long = "boundary-width")]
        boundary_width: Option<i64>,

        #[arg(short = 's', long = "species")]
        species: String,

        #[arg(short = 'r', long = "ref-dir")]
        ref_dir: PathBuf,

        #[arg(short = 'k', long = "num-neighbors", default_value = "1")]
        k: usize,

        #[arg(long = "up-bound")]
        up_bound: Option<i64>,

        #[arg(long = "down-bound")]
        down_bound: Option<i64>,

        #[arg(long = "drop-columns")]
        drop_columns: bool,

        #[arg(long = "species-genome")]
        species_genome: Option<String>,

        #[arg(long = "view-window", default_value_t = DEFAULT_VIEW_WINDOW)]
        view_window: f64,

        #[arg(short = 'o', long = "output-name", default_value = "peak2gene")]
        output_name: String,

        #[arg(short = 'd', long = "out-dir", default_value = ".")]
        out_dir: PathBuf,

        #[arg(long = "output-type", default_value = "csv")]
        output_type: String,
    },

    /// Annotate each requested gene with its k nearest peaks.
    Gene2Peak {
        #[arg(short = 'p', long = "peaks")]
        peaks: PathBuf,

        #[arg(long = "peak-type", default_value = "bed6")]
        peak_type: String,

        #[arg(long = "boundary", default_value = "native_peak_boundaries")]
        boundary: String,

        #[arg(long = "boundary-width")]
        boundary_width: Option<i64>,

        #[arg(short = 's', long = "species")]
        species: String,

        #[arg(short = 'r', long = "ref-dir")]
        ref_dir: PathBuf,

        #[arg(short = 'G', long = "genes")]
        genes: PathBuf,

        #[arg(short = 'k', long = "num-neighbors", default_value = "1")]
        k: usize,

        #[arg(long = "species-genome")]
        species_genome: Option<String>,

        #[arg(long = "view-window", default_value_t = DEFAULT_VIEW_WINDOW)]
        view_window: f64,

        #[arg(short = 'o', long = "output-name", default_value = "gene2peak")]
        output_name: String,

        #[arg(short = 'd', long = "out-dir", default_value = ".")]
        out_dir: PathBuf,

        #[arg(long = "output-type", default_value = "csv")]
        output_type: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Decompose { gtf, species, ref_dir } => {
            if !gtf.exists() {
                bail!("GTF file not found: {}", gtf.display());
            }
            let options = DecomposeOptions {
                gtf_path: gtf,
                species,
                ref_dir,
            };
            peakscout::decompose::decompose(&options).context("decomposition failed")?;
        }

        Command::Peak2Gene {
            peaks,
            peak_type,
            boundary,
            boundary_width,
            species,
            ref_dir,
            k,
            up_bound,
            down_bound,
            drop_columns,
            species_genome,
            view_window,
            output_name,
            out_dir,
            output_type,
        } => {
            if !peaks.exists() {
                bail!("peak file not found: {}", peaks.display());
            }
            let peak_type = PeakType::parse(&peak_type)?;
            let boundary = PeakBoundary::parse(&boundary, boundary_width)?;
            let source = PeakSource::new(peaks, peak_type, boundary)?;
            let output_type = OutputType::parse(&output_type)?;

            let options = Peak2GeneOptions {
                source,
                species,
                ref_dir,
                k,
                up_bound,
                down_bound,
                drop_columns,
                species_genome,
                view_window,
                output_name: output_name.clone(),
                out_dir: out_dir.clone(),
                output_type,
            };

            eprintln!("Annotating peaks in {} with their nearest genes", options.source.peak_file.display());
            let table = peak2gene(&options).context("peak2gene failed")?;
            write_result(&table, &out_dir, &output_name, output_type).context("failed to write output")?;
        }

        Command::Gene2Peak {
            peaks,
            peak_type,
            boundary,
            boundary_width,
            species,
            ref_dir,
            genes,
            k,
            species_genome,
            view_window,
            output_name,
            out_dir,
            output_type,
        } => {
            if !peaks.exists() {
                bail!("peak file not found: {}", peaks.display());
            }
            if !genes.exists() {
                bail!("gene list not found: {}", genes.display());
            }
            let peak_type = PeakType::parse(&peak_type)?;
            let boundary = PeakBoundary::parse(&boundary, boundary_width)?;
            let source = PeakSource::new(peaks, peak_type, boundary)?;
            let output_type = OutputType::parse(&output_type)?;

            let options = Gene2PeakOptions {
                source,
                species,
                ref_dir,
                genes_path: genes,
                k,
                species_genome,
                view_window,
                output_name: output_name.clone(),
                out_dir: out_dir.clone(),
                output_type,
            };

            eprintln!("Annotating genes in {} with their nearest peaks", options.genes_path.display());
            let table = gene2peak(&options).context("gene2peak failed")?;
            write_result(&table, &out_dir, &output_name, output_type).context("failed to write output")?;
        }
    }

    eprintln!("Done!");
    Ok(())
}

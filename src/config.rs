//! Options structs and enums for the three subcommands (`decompose`,
//! `peak2gene`, `gene2peak`), and the peak-format/boundary/output-type
//! vocabulary shared between the CLI and the library entry points.
//!
//! Validation that depends only on the options themselves (not on file
//! contents) happens eagerly in the `*Options::validate` methods, before
//! any I/O, so a bad combination surfaces as a [`crate::error::Error::Config`]
//! immediately rather than after partial work.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Peak-calling tool that produced the input peak file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakType {
    Macs2Xls,
    Macs2Bed,
    Macs2Consensus,
    Seacr,
    Bed6,
}

impl PeakType {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "macs2_xls" => Ok(Self::Macs2Xls),
            "macs2_bed" => Ok(Self::Macs2Bed),
            "macs2_consensus" => Ok(Self::Macs2Consensus),
            "seacr" => Ok(Self::Seacr),
            "bed6" => Ok(Self::Bed6),
            other => Err(Error::Config(format!("unknown peak type '{other}'"))),
        }
    }

    /// Whether this reader shifts BED-origin `start`/`end` by +1 at read time.
    pub fn is_bed_origin(self) -> bool {
        !matches!(self, Self::Macs2Xls)
    }

    /// Whether this reader carries an `abs_summit` column (required by
    /// `PeakBoundary::PeakSummit` / `ArtificialPeakBoundaries`).
    pub fn has_abs_summit(self) -> bool {
        matches!(self, Self::Macs2Xls)
    }
}

/// How to derive a peak's reported `start`/`end` from the raw caller output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakBoundary {
    NativePeakBoundaries,
    PeakSummit,
    ArtificialPeakBoundaries { boundary: i64 },
}

impl PeakBoundary {
    pub fn parse(raw: &str, boundary: Option<i64>) -> Result<Self> {
        match raw {
            "native_peak_boundaries" => Ok(Self::NativePeakBoundaries),
            "peak_summit" => Ok(Self::PeakSummit),
            "artificial_peak_boundaries" => match boundary {
                Some(boundary) => Ok(Self::ArtificialPeakBoundaries { boundary }),
                None => Err(Error::Config(
                    "artificial_peak_boundaries requires a boundary value".to_string(),
                )),
            },
            other => Err(Error::Config(format!("unknown boundary option '{other}'"))),
        }
    }
}

/// Output file format for the driver's result table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    Csv,
    Xlsx,
}

impl OutputType {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            other => Err(Error::Config(format!("invalid output type '{other}'"))),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }
}

/// Options for the `decompose` subcommand: convert a GTF into per-feature,
/// per-chromosome start/end-sorted reference tables.
#[derive(Debug, Clone)]
pub struct DecomposeOptions {
    pub gtf_path: PathBuf,
    pub species: String,
    pub ref_dir: PathBuf,
}

/// Options shared by both `peak2gene` and `gene2peak`: how to read the peak
/// file and where the decomposed reference lives.
#[derive(Debug, Clone)]
pub struct PeakSource {
    pub peak_file: PathBuf,
    pub peak_type: PeakType,
    pub boundary: PeakBoundary,
}

impl PeakSource {
    pub fn new(peak_file: PathBuf, peak_type: PeakType, boundary: PeakBoundary) -> Result<Self> {
        if matches!(boundary, PeakBoundary::PeakSummit | PeakBoundary::ArtificialPeakBoundaries { .. })
            && !peak_type.has_abs_summit()
        {
            return Err(Error::Config(format!(
                "boundary option requires an abs_summit column, which peak type {peak_type:?} does not have"
            )));
        }
        Ok(Self {
            peak_file,
            peak_type,
            boundary,
        })
    }
}

/// Options for the `peak2gene` subcommand.
#[derive(Debug, Clone)]
pub struct Peak2GeneOptions {
    pub source: PeakSource,
    pub species: String,
    pub ref_dir: PathBuf,
    pub k: usize,
    pub up_bound: Option<i64>,
    pub down_bound: Option<i64>,
    pub drop_columns: bool,
    pub species_genome: Option<String>,
    pub view_window: f64,
    pub output_name: String,
    pub out_dir: PathBuf,
    pub output_type: OutputType,
}

impl Peak2GeneOptions {
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(Error::Config("k must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Options for the `gene2peak` subcommand.
#[derive(Debug, Clone)]
pub struct Gene2PeakOptions {
    pub source: PeakSource,
    pub species: String,
    pub ref_dir: PathBuf,
    pub genes_path: PathBuf,
    pub k: usize,
    pub species_genome: Option<String>,
    pub view_window: f64,
    pub output_name: String,
    pub out_dir: PathBuf,
    pub output_type: OutputType,
}

impl Gene2PeakOptions {
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(Error::Config("k must be at least 1".to_string()));
        }
        Ok(())
    }
}

pub const DEFAULT_VIEW_WINDOW: f64 = 0.2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artificial_boundary_requires_value() {
        let err = PeakBoundary::parse("artificial_peak_boundaries", None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn artificial_boundary_with_value() {
        let boundary = PeakBoundary::parse("artificial_peak_boundaries", Some(100)).unwrap();
        assert_eq!(boundary, PeakBoundary::ArtificialPeakBoundaries { boundary: 100 });
    }

    #[test]
    fn peak_summit_rejected_for_readers_without_abs_summit() {
        let err = PeakSource::new(
            PathBuf::from("x.bed"),
            PeakType::Bed6,
            PeakBoundary::PeakSummit,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn unknown_peak_type_is_config_error() {
        assert!(PeakType::parse("bogus").is_err());
    }

    #[test]
    fn unknown_output_type_is_config_error() {
        assert!(OutputType::parse("json").is_err());
    }
}

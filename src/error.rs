//! Typed error taxonomy for the peak/gene nearest-feature engine.
//!
//! Every fallible boundary in the crate returns [`Error`]. The CLI binary
//! collects it through `anyhow` at the outermost call site for a single
//! formatted exit message; library callers can match on the variant.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced anywhere in the decomposer, search, or driver.
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown function name, peak type, boundary option, missing required
    /// boundary value, or invalid output type.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unparseable peak/reference file, missing required column, or a
    /// coordinate with `end < start`.
    #[error("input error: {0}")]
    Input(String),

    /// A (species, feature, chromosome) reference file could not be opened.
    #[error("reference missing for chromosome {chr}: {path}")]
    ReferenceMissing { chr: String, path: PathBuf },

    /// A requested gene name (gene2peak) was not found in any reference
    /// chromosome's gene table.
    #[error("{0} is not a valid gene")]
    GeneNotFound(String),

    /// Unclassified file system failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A malformed CSV row or header in a peak or reference file.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Failure writing the styled spreadsheet output.
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

pub type Result<T> = std::result::Result<T, Error>;

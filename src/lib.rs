//! peakscout - nearest-feature annotation of genomic peaks against
//! GTF-derived reference genes.
//!
//! This library decomposes a GTF into per-chromosome, start/end-sorted
//! reference tables, reads peak-caller output into a shared interval
//! representation, and runs a k-nearest-feature search between the two in
//! either direction (`peak2gene`, `gene2peak`).
//!
//! # Example
//!
//! ```ignore
//! use peakscout::config::{Peak2GeneOptions, PeakSource, PeakType, PeakBoundary};
//! use peakscout::driver::peak2gene;
//!
//! let source = PeakSource::new(peak_path, PeakType::Bed6, PeakBoundary::NativePeakBoundaries)?;
//! let options = Peak2GeneOptions { source, /* ... */ };
//! let table = peak2gene(&options)?;
//! ```

pub mod config;
pub mod decompose;
pub mod driver;
pub mod error;
pub mod nearest;
pub mod output;
pub mod parser;
pub mod reference;
pub mod types;

pub use error::{Error, Result};
pub use types::IntervalTable;

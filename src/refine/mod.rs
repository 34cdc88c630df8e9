//! QA/refinement pipeline for uploaded wind plant datasets.
//!
//! The pipeline is purely synchronous, in-memory computation: each refiner
//! clones its input table, applies the timestamp normalizer, duplicate
//! resolver, gap detector, and flaggers in sequence, and returns the cleaned
//! table alongside a structured QA report.

pub mod config;
pub mod duplicates;
pub mod flags;
pub mod gaps;
pub mod pipeline;
pub mod refiners;
pub mod report;
pub mod timestamp;

pub use config::RefineConfig;
pub use pipeline::{refine_all, QaReports, RefineInputs, RefineOutput, RefinedTables};
pub use report::QaReport;

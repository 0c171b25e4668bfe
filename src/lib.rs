//! Core primer-scheme design library.
//!
//! Three subsystems: MSA digestion into degenerate primer k-mers
//! ([`digestion`]), primer-pair generation with a persistent mispriming
//! index ([`pairs`], [`matchdb`], [`mismatch`]), and the tiling/panel
//! scheme solvers ([`scheme`], [`panel`]). CLI argument parsing and
//! report rendering live only as a thin demonstration binary at
//! `src/bin/main.rs`.

pub mod bed;
pub mod config;
pub mod digestion;
pub mod errs;
pub mod fasta;
pub mod kmer;
pub mod logging;
pub mod mapping;
pub mod matchdb;
pub mod mismatch;
pub mod pairs;
pub mod panel;
pub mod scheme;
pub mod seq;
pub mod thermo;

pub use config::Config;
pub use errs::{SchemeError, SchemeResult};

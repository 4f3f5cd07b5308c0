//! Runs GTDB-Tk taxonomic classification for a workspace object and saves
//! the result as a report: fetch FASTA, classify, report.

pub mod classify;
pub mod clients;
pub mod config;
pub mod domain;
pub mod error;
pub mod materialize;
pub mod output;
pub mod params;
pub mod pipeline;
pub mod report;
pub mod rpc;
pub mod staging;

//! I/O adapters (delimited ingest, CSV exports, JSON report files).

pub mod export;
pub mod ingest;
pub mod report_file;

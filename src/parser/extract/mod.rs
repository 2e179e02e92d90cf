//! Per-page extractors. Each takes raw page content and returns records;
//! none of them touch the network or the filesystem.

pub mod detail;
pub mod dhs;
pub mod links;
pub mod search;

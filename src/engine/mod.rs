//! Pipelines: the harvester pulls marketplace data into CSVs, the
//! aggregator merges the per-property order books into one.

pub mod aggregator;
pub mod allowlist;
pub mod harvester;

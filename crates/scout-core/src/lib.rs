// Library root: configuration, dataset loading, and the scoring engine
// (similarity search, preset finder, contribution breakdowns).

pub mod config;
pub mod dataset;
pub mod scoring;

// src/lib.rs
// Product reconciliation library: normalization, scoring, the four-tier match
// cascade and the batch runner used by the pipeline binary.

pub mod catalog;
pub mod config;
pub mod db;
pub mod matching;
pub mod models;
pub mod normalize;
pub mod results;
pub mod runner;
pub mod scoring;
pub mod semantic;

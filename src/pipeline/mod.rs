pub mod artifact;
pub mod collector;
pub mod dataset;
pub mod details;
pub mod geometry;
pub mod normalizer;
pub mod orchestrator;
pub mod projection;
pub mod timestamp;

pub use orchestrator::{Pipeline, PipelineConfig, RunReport};

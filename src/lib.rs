//! stressgen - Monte-Carlo stress test-vector synthesis
//!
//! Combines a deterministic baseline profile with seeded, rate and dwell
//! limited perturbation processes, then splits the composite timeline into
//! segments small enough for a fixed-capacity playback rig.

pub mod baseline;
pub mod composite;
pub mod config;
pub mod curve;
pub mod output;
pub mod process;
pub mod source;
pub mod spec_set;
pub mod variable;

use thiserror::Error;

// Re-export main types
pub use baseline::BaselineProfile;
pub use composite::{CompositeSynthesizer, Segment};
pub use config::SynthConfig;
pub use curve::{Curve, SegmentCurve};
pub use output::{write_segments, RunManifest, SegmentArtifacts};
pub use process::{PerturbationProcess, ProcessKind};
pub use source::{DefinitionSource, SourceLine};
pub use spec_set::PerturbationSpecSet;
pub use variable::{RandomVariable, SeedAllocator, VariableKind};

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("improper format in {source_name} at line {line}: '{text}' ({reason})")]
    Format {
        source_name: String,
        line: usize,
        text: String,
        reason: String,
    },
    #[error("{section} section not found in {source_name}")]
    MissingSection {
        source_name: String,
        section: &'static str,
    },
    #[error("perturbed variable {name} not found in baseline")]
    NameMismatch { name: String },
    #[error("too many {what} in {name} (limit {limit})")]
    Capacity {
        what: &'static str,
        name: String,
        limit: usize,
    },
    #[error("table {other} does not overlap {name} at time {time}")]
    Overlap {
        name: String,
        other: String,
        time: f64,
    },
    #[error("too many segments requested (limit {limit}), some curve carries too many breakpoints")]
    TooManySegments { limit: usize },
}

pub type Result<T> = std::result::Result<T, SynthError>;

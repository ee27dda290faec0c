//! Run limits and tolerances
//!
//! Every ceiling the synthesis run enforces lives here so a rig with a
//! different playback capacity only needs a TOML override.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, SynthError};

/// Ceilings and tolerances for one synthesis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Maximum breakpoints held by any curve, including consolidation inserts
    pub max_breakpoints: usize,
    /// Maximum curves in the baseline or rows in the perturbation set
    pub max_variables: usize,
    /// Maximum number of output segments
    pub max_segments: usize,
    /// Maximum breakpoints the rig accepts per curve per segment
    pub max_segment_breakpoints: usize,
    /// Maximum segment length the rig accepts, padding included [s]
    pub max_segment_time: f64,
    /// Non-constant curves per listing before the rig complains
    pub max_def_curves: usize,
    /// Flat pre-roll and post-roll added to each segment [s]
    pub time_pad: f64,
    /// Two times closer than this are the same breakpoint [s]
    pub time_resolution: f64,
    /// Flat tail appended past the run end on carried-through curves [s]
    pub tail_extension: f64,
    /// Start marker written to the schedule file [s]
    pub scd_start_time: f64,
    /// Treat baseline ordering violations as fatal
    pub strict_order: bool,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            max_breakpoints: 50_000,
            max_variables: 75,
            max_segments: 25,
            max_segment_breakpoints: 200,
            max_segment_time: 3600.0,
            max_def_curves: 15,
            time_pad: 5.0,
            time_resolution: 1e-5,
            tail_extension: 10.0,
            scd_start_time: 2.0,
            strict_order: false,
        }
    }
}

impl SynthConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: SynthConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_breakpoints < 2 {
            return Err(SynthError::InvalidConfig(
                "max_breakpoints must be at least 2".to_string(),
            ));
        }

        if self.max_variables == 0 {
            return Err(SynthError::InvalidConfig(
                "max_variables must be greater than zero".to_string(),
            ));
        }

        if self.max_segments == 0 {
            return Err(SynthError::InvalidConfig(
                "max_segments must be greater than zero".to_string(),
            ));
        }

        // Two pad points and the end hold leave room for at least one body point.
        if self.max_segment_breakpoints < 4 {
            return Err(SynthError::InvalidConfig(
                "max_segment_breakpoints must be at least 4".to_string(),
            ));
        }

        if !self.time_pad.is_finite() || self.time_pad < 0.0 {
            return Err(SynthError::InvalidConfig(
                "time_pad must be finite and >= 0".to_string(),
            ));
        }

        if !self.max_segment_time.is_finite() || self.max_segment_time <= 4.0 * self.time_pad {
            return Err(SynthError::InvalidConfig(
                "max_segment_time must exceed four time pads".to_string(),
            ));
        }

        if !self.time_resolution.is_finite() || self.time_resolution <= 0.0 {
            return Err(SynthError::InvalidConfig(
                "time_resolution must be finite and > 0".to_string(),
            ));
        }

        if !self.tail_extension.is_finite() || self.tail_extension <= self.time_resolution {
            return Err(SynthError::InvalidConfig(
                "tail_extension must exceed time_resolution".to_string(),
            ));
        }

        Ok(())
    }

    /// Longest stretch of timeline one segment may cover.
    pub fn segment_span(&self) -> f64 {
        self.max_segment_time - 4.0 * self.time_pad
    }

    /// Breakpoints one segment may take from a curve, leaving room for the
    /// two leading pad points and the trailing hold.
    pub fn segment_body_points(&self) -> usize {
        self.max_segment_breakpoints - 3
    }
}

#[cfg(test)]
mod tests {
    use super::SynthConfig;

    #[test]
    fn default_config_is_valid() {
        let config = SynthConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.segment_body_points(), 197);
        assert!((config.segment_span() - 3580.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_segment_time_inside_padding() {
        let config = SynthConfig {
            max_segment_time: 20.0,
            ..SynthConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: SynthConfig = toml::from_str("max_segments = 3\ntime_pad = 1.0\n")
            .expect("partial config should parse");
        assert_eq!(config.max_segments, 3);
        assert_eq!(config.max_segment_breakpoints, 200);
        assert!((config.time_pad - 1.0).abs() < 1e-12);
    }
}

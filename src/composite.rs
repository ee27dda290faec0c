//! Composite synthesis and segment planning
//!
//! Every baseline curve either passes through unchanged (plus a flat tail
//! past the run end) or is summed with the sampled, clamped delta of the
//! process that perturbs it. The merged timeline is then cut into segments
//! that respect the rig's per-curve breakpoint and duration ceilings.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::baseline::BaselineProfile;
use crate::config::SynthConfig;
use crate::curve::{Curve, SegmentCurve};
use crate::process::PerturbationProcess;
use crate::spec_set::PerturbationSpecSet;
use crate::{Result, SynthError};

/// One contiguous stretch `[begin, end]` of the run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub index: usize,
    pub begin: f64,
    pub end: f64,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end - self.begin
    }
}

/// Baseline and perturbations merged into one set of curves
#[derive(Debug, Clone)]
pub struct CompositeSynthesizer<'a> {
    baseline: &'a BaselineProfile,
    perturbations: &'a PerturbationSpecSet,
    config: &'a SynthConfig,
    merged: Vec<Curve>,
}

impl<'a> CompositeSynthesizer<'a> {
    /// Sample every process and merge it into its baseline curve.
    ///
    /// Processes are sampled from a copy, so the same inputs always build
    /// the same merged curves.
    pub fn new(
        baseline: &'a BaselineProfile,
        perturbations: &'a PerturbationSpecSet,
        config: &'a SynthConfig,
    ) -> Result<Self> {
        if let Some(stray) = perturbations
            .processes()
            .iter()
            .find(|p| baseline.curve(p.name()).is_none())
        {
            return Err(SynthError::NameMismatch {
                name: stray.name().to_string(),
            });
        }

        let total_duration = baseline.total_duration();
        let mut merged = Vec::with_capacity(baseline.len());
        for curve in baseline.curves() {
            let out = match perturbations.process(curve.name()) {
                Some(process) => compose(curve, process, total_duration, config)?,
                None => carry_through(curve, total_duration, config)?,
            };
            debug!(curve = out.name(), points = out.len(), "merged curve");
            merged.push(out);
        }

        info!(
            curves = merged.len(),
            perturbed = perturbations.len(),
            total_duration,
            "composite built"
        );
        Ok(Self {
            baseline,
            perturbations,
            config,
            merged,
        })
    }

    pub fn baseline(&self) -> &BaselineProfile {
        self.baseline
    }

    pub fn perturbations(&self) -> &PerturbationSpecSet {
        self.perturbations
    }

    pub fn config(&self) -> &SynthConfig {
        self.config
    }

    pub fn total_duration(&self) -> f64 {
        self.baseline.total_duration()
    }

    pub fn merged(&self) -> &[Curve] {
        &self.merged
    }

    pub fn curve(&self, name: &str) -> Option<&Curve> {
        self.merged.iter().find(|curve| curve.name() == name)
    }

    /// End of the segment starting at `begin`.
    ///
    /// The segment span is shortened to the time of the last breakpoint any
    /// curve may contribute to one segment. `None` when no curve lets the
    /// segment grow past `begin`.
    pub fn next_time(&self, begin: f64) -> Option<f64> {
        let body = self.config.segment_body_points();
        let mut next = begin + self.config.segment_span();

        for curve in &self.merged {
            let limit = match curve.find_place(begin) {
                Some(place) => place + body,
                None => body - 1,
            };
            if let Some(&t) = curve.times().get(limit) {
                next = next.min(t);
            }
        }

        if next - begin < self.config.time_resolution {
            return None;
        }
        Some(next)
    }

    /// Cut `[0, total_duration]` into contiguous segments.
    pub fn plan_segments(&self) -> Result<Vec<Segment>> {
        let total = self.total_duration();
        let resolution = self.config.time_resolution;
        let limit = self.config.max_segments;

        let mut segments: Vec<Segment> = Vec::new();
        let mut begin = 0.0;
        while total - begin > resolution {
            if segments.len() >= limit {
                return Err(SynthError::TooManySegments { limit });
            }
            let end = self
                .next_time(begin)
                .ok_or(SynthError::TooManySegments { limit })?
                .min(total);
            let segment = Segment {
                index: segments.len(),
                begin,
                end,
            };
            debug!(
                index = segment.index,
                begin,
                end,
                duration = segment.duration(),
                "planned segment"
            );
            segments.push(segment);
            begin = end;
        }

        if segments.is_empty() {
            warn!(total_duration = total, "run duration too short, no segments produced");
        }
        Ok(segments)
    }

    /// Format every merged curve over `segment`.
    pub fn render(&self, segment: &Segment) -> Vec<SegmentCurve> {
        self.merged
            .iter()
            .map(|curve| curve.partial_out(segment.begin, segment.end, self.config.time_pad))
            .collect()
    }
}

/// Copy of `curve` held flat past the run end.
fn carry_through(curve: &Curve, total_duration: f64, config: &SynthConfig) -> Result<Curve> {
    let mut out = curve.clone();
    if let (Some(end), Some(last)) = (out.end_time(), out.last_value()) {
        out.append(end.max(total_duration) + config.tail_extension, last, false)?;
    }
    Ok(out)
}

/// `base(t) + clamp(delta(t))` at every breakpoint of either curve.
fn compose(
    base: &Curve,
    process: &PerturbationProcess,
    total_duration: f64,
    config: &SynthConfig,
) -> Result<Curve> {
    let mut process = process.clone();
    let mut delta = process.sample(
        total_duration,
        base.kind(),
        config.max_breakpoints,
        config.time_resolution,
    )?;
    delta.consolidate(base)?;

    let resolution = config.time_resolution;
    let mut merged =
        Curve::with_limits(base.name(), base.kind(), config.max_breakpoints, resolution);
    for (&t, &d) in delta.times().iter().zip(delta.values()) {
        let from_file = base
            .find_place(t)
            .is_some_and(|k| base.is_marked(k) && (base.times()[k] - t).abs() < resolution);
        merged.append(t, base.value_at(t) + process.bound(d), from_file)?;
    }
    Ok(merged)
}

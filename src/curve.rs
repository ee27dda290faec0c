//! Piecewise-linear breakpoint curves
//!
//! A curve is a named, typed sequence of `(time, value)` breakpoints held in
//! parallel arrays. Values between breakpoints are linear; values outside the
//! span hold the nearest end.

use std::ops::RangeInclusive;

use tracing::warn;

use crate::{Result, SynthError};

pub const DEFAULT_MAX_BREAKPOINTS: usize = 50_000;
pub const DEFAULT_TIME_RESOLUTION: f64 = 1e-5;

/// Named breakpoint curve
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    name: String,
    /// Rig interpolation type carried from the baseline `$INPUT` line
    kind: i32,
    time: Vec<f64>,
    value: Vec<f64>,
    /// Breakpoints read from a definition file, as opposed to synthesized
    marked: Vec<bool>,
    capacity: usize,
    resolution: f64,
}

/// One curve's share of a segment, formatted for the rig listing
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentCurve {
    /// `$INPUT` header, empty when the curve is constant over the window
    pub header: String,
    /// Points in `points`, zero when the curve is omitted
    pub num_points: usize,
    /// One formatted line per point
    pub points: String,
    /// Value at the start of the window, always present
    pub initial: String,
}

impl SegmentCurve {
    /// Header and points as they appear in the listing.
    pub fn listing(&self) -> String {
        format!("{}{}", self.header, self.points)
    }

    pub fn is_omitted(&self) -> bool {
        self.num_points == 0
    }
}

impl Curve {
    pub fn new(name: impl Into<String>, kind: i32) -> Self {
        Self::with_limits(name, kind, DEFAULT_MAX_BREAKPOINTS, DEFAULT_TIME_RESOLUTION)
    }

    pub fn with_limits(
        name: impl Into<String>,
        kind: i32,
        capacity: usize,
        resolution: f64,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            time: Vec::new(),
            value: Vec::new(),
            marked: Vec::new(),
            capacity,
            resolution,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> i32 {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.time
    }

    pub fn values(&self) -> &[f64] {
        &self.value
    }

    pub fn is_marked(&self, index: usize) -> bool {
        self.marked.get(index).copied().unwrap_or(false)
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn start_time(&self) -> Option<f64> {
        self.time.first().copied()
    }

    pub fn end_time(&self) -> Option<f64> {
        self.time.last().copied()
    }

    pub fn last_value(&self) -> Option<f64> {
        self.value.last().copied()
    }

    fn ensure_room(&self) -> Result<()> {
        if self.time.len() >= self.capacity {
            return Err(SynthError::Capacity {
                what: "breakpoints",
                name: self.name.clone(),
                limit: self.capacity,
            });
        }
        Ok(())
    }

    /// Add a breakpoint at the end.
    pub fn append(&mut self, time: f64, value: f64, marked: bool) -> Result<()> {
        self.ensure_room()?;
        self.time.push(time);
        self.value.push(value);
        self.marked.push(marked);
        Ok(())
    }

    /// Insert a breakpoint directly after `after`.
    pub fn insert(&mut self, time: f64, value: f64, marked: bool, after: usize) -> Result<()> {
        self.ensure_room()?;
        let at = (after + 1).min(self.time.len());
        self.time.insert(at, time);
        self.value.insert(at, value);
        self.marked.insert(at, marked);
        Ok(())
    }

    /// Index of the last breakpoint at or before `t`, within the time
    /// resolution. `None` when `t` precedes the whole curve.
    pub fn find_place(&self, t: f64) -> Option<usize> {
        let limit = t + self.resolution;
        self.time.iter().rposition(|&tk| tk <= limit)
    }

    /// Value at `t` given its place from [`Curve::find_place`].
    ///
    /// Outside the span the first or last value is held. An empty curve
    /// holds zero.
    pub fn interpolate(&self, t: f64, place: Option<usize>) -> f64 {
        let Some(last) = self.value.last().copied() else {
            return 0.0;
        };
        match place {
            None => self.value[0],
            Some(k) if k + 1 < self.time.len() => {
                let (t0, t1) = (self.time[k], self.time[k + 1]);
                let (v0, v1) = (self.value[k], self.value[k + 1]);
                (t - t0) / (t1 - t0) * (v1 - v0) + v0
            }
            Some(_) => last,
        }
    }

    pub fn value_at(&self, t: f64) -> f64 {
        self.interpolate(t, self.find_place(t))
    }

    /// Report every place where time fails to increase.
    ///
    /// Returns the number of violations; zero means strictly increasing.
    pub fn check_order(&self) -> usize {
        let mut violations = 0;
        for (i, pair) in self.time.windows(2).enumerate() {
            if pair[0] >= pair[1] {
                warn!(
                    curve = %self.name,
                    place = i,
                    time = pair[0],
                    "time value not monotonically increasing"
                );
                violations += 1;
            }
        }
        violations
    }

    /// Give `self` every breakpoint time of `other`.
    ///
    /// The shorter curve's end is first matched with a flat breakpoint; as
    /// `other` is only read, its extension is implied by the new end of
    /// `self`. Inserted values come from interpolating `self`, so its shape
    /// is unchanged. Returns the number of breakpoints added.
    pub fn consolidate(&mut self, other: &Curve) -> Result<usize> {
        let Some(other_end) = other.end_time() else {
            return Ok(0);
        };
        let (Some(self_end), Some(last)) = (self.end_time(), self.last_value()) else {
            return Err(SynthError::Overlap {
                name: self.name.clone(),
                other: other.name.clone(),
                time: other.start_time().unwrap_or(other_end),
            });
        };

        let mut added = 0;
        if other_end - self_end >= self.resolution {
            self.append(other_end, last, false)?;
            added += 1;
        }

        for &t in &other.time {
            let place = self.find_place(t).ok_or_else(|| SynthError::Overlap {
                name: self.name.clone(),
                other: other.name.clone(),
                time: t,
            })?;
            if (t - self.time[place]).abs() >= self.resolution {
                let between = self.interpolate(t, Some(place));
                self.insert(t, between, false, place)?;
                added += 1;
            }
        }

        Ok(added)
    }

    /// Breakpoint indices covering `[begin, end]`: the place of `begin`
    /// through the place of `end`.
    pub fn window(&self, begin: f64, end: f64) -> RangeInclusive<usize> {
        let first = self.find_place(begin).unwrap_or(0);
        let last = self.find_place(end).unwrap_or(0).max(first);
        first..=last
    }

    /// Format the `[begin, end]` stretch for a rig listing.
    ///
    /// Time is re-based so the window opens at zero, holds its opening value
    /// until `pad`, runs the body shifted by `pad`, and closes with a hold at
    /// `end - begin + 4 * pad`. A curve flat over the whole window is
    /// omitted, leaving only its initial value.
    pub fn partial_out(&self, begin: f64, end: f64, pad: f64) -> SegmentCurve {
        let opening = self.value_at(begin);
        let initial = format!("{:<17} {:13.4}\n", self.name, opening);

        let body_start = self.find_place(begin).map_or(0, |k| k + 1);
        let body_end = self.find_place(end);
        let body: Vec<(f64, f64)> = match body_end {
            Some(last) if !self.is_empty() && last >= body_start => (body_start..=last)
                .map(|k| (self.time[k] - begin + pad, self.value[k]))
                .collect(),
            _ => Vec::new(),
        };
        let closing = self.value_at(end);

        let constant = closing == opening && body.iter().all(|&(_, v)| v == opening);
        if constant {
            return SegmentCurve {
                header: String::new(),
                num_points: 0,
                points: String::new(),
                initial,
            };
        }

        let mut points = Vec::with_capacity(body.len() + 3);
        points.push((0.0, opening));
        points.push((pad, opening));
        points.extend(body);
        points.push((end - begin + 4.0 * pad, closing));

        let header = format!("$INPUT {}  {:<2} {:<4}\n", self.name, self.kind, points.len());
        let lines: String = points
            .iter()
            .map(|(t, v)| format!(" {t:7.2}  {v:13.4}\n"))
            .collect();

        SegmentCurve {
            header,
            num_points: points.len(),
            points: lines,
            initial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Curve;
    use crate::SynthError;

    fn ramp(name: &str, points: &[(f64, f64)]) -> Curve {
        let mut curve = Curve::new(name, 2);
        for &(t, v) in points {
            curve.append(t, v, true).expect("append within capacity");
        }
        curve
    }

    #[test]
    fn append_fails_at_capacity() {
        let mut curve = Curve::with_limits("X", 1, 2, 1e-5);
        curve.append(0.0, 1.0, false).unwrap();
        curve.append(1.0, 1.0, false).unwrap();
        let err = curve.append(2.0, 1.0, false).unwrap_err();
        assert!(matches!(err, SynthError::Capacity { limit: 2, .. }));
        let err = curve.insert(0.5, 1.0, false, 0).unwrap_err();
        assert!(matches!(err, SynthError::Capacity { .. }));
    }

    #[test]
    fn find_place_scans_from_end_with_tolerance() {
        let curve = ramp("X", &[(0.0, 0.0), (1.0, 1.0), (2.0, 4.0)]);
        assert_eq!(curve.find_place(-0.5), None);
        assert_eq!(curve.find_place(0.0), Some(0));
        assert_eq!(curve.find_place(1.5), Some(1));
        assert_eq!(curve.find_place(2.0 - 5e-6), Some(2));
        assert_eq!(curve.find_place(10.0), Some(2));
    }

    #[test]
    fn interpolate_holds_outside_span() {
        let curve = ramp("X", &[(1.0, 10.0), (3.0, 30.0)]);
        assert_eq!(curve.value_at(0.0), 10.0);
        assert!((curve.value_at(2.0) - 20.0).abs() < 1e-12);
        assert_eq!(curve.value_at(5.0), 30.0);
        assert_eq!(Curve::new("E", 1).value_at(1.0), 0.0);
    }

    #[test]
    fn check_order_counts_violations() {
        let good = ramp("G", &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        assert_eq!(good.check_order(), 0);
        let bad = ramp("B", &[(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (1.0, 0.0)]);
        assert_eq!(bad.check_order(), 2);
    }

    #[test]
    fn consolidate_adds_other_times_without_reshaping() {
        let mut a = ramp("A", &[(0.0, 0.0), (4.0, 8.0)]);
        let b = ramp("B", &[(0.0, 5.0), (1.0, 5.0), (3.0, 5.0), (6.0, 5.0)]);
        let added = a.consolidate(&b).unwrap();
        assert_eq!(added, 3);
        assert_eq!(a.times(), &[0.0, 1.0, 3.0, 4.0, 6.0]);
        assert_eq!(a.values(), &[0.0, 2.0, 6.0, 8.0, 8.0]);
        assert_eq!(a.check_order(), 0);

        let again = a.consolidate(&b).unwrap();
        assert_eq!(again, 0);
        assert_eq!(a.times(), &[0.0, 1.0, 3.0, 4.0, 6.0]);
    }

    #[test]
    fn consolidate_rejects_times_before_start() {
        let mut a = ramp("A", &[(1.0, 0.0), (4.0, 8.0)]);
        let b = ramp("B", &[(0.0, 5.0), (4.0, 5.0)]);
        let err = a.consolidate(&b).unwrap_err();
        assert!(matches!(err, SynthError::Overlap { time, .. } if time == 0.0));
    }

    #[test]
    fn partial_out_omits_constant_curves() {
        let curve = ramp("ALT", &[(0.0, 1000.0), (100.0, 1000.0)]);
        let out = curve.partial_out(0.0, 100.0, 5.0);
        assert!(out.is_omitted());
        assert!(out.header.is_empty());
        assert!(out.initial.starts_with("ALT"));
        assert!(out.initial.contains("1000.0000"));
    }

    #[test]
    fn partial_out_rebases_and_holds_both_ends() {
        let curve = ramp("N1", &[(0.0, 0.0), (10.0, 10.0), (20.0, 0.0), (30.0, 5.0)]);
        let out = curve.partial_out(10.0, 20.0, 5.0);
        assert_eq!(out.num_points, 4);
        assert_eq!(out.header, "$INPUT N1  2  4   \n");
        let lines: Vec<&str> = out.points.lines().collect();
        assert_eq!(lines[0], "    0.00        10.0000");
        assert_eq!(lines[1], "    5.00        10.0000");
        assert_eq!(lines[2], "   15.00         0.0000");
        assert_eq!(lines[3], "   30.00         0.0000");
    }
}

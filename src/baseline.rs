//! Baseline profile loader
//!
//! A baseline definition carries the run length on a `$FTIME <seconds>` line
//! and one `$INPUT <name> <type>` block per curve, each followed by its
//! `<time> <value>` rows.

use tracing::{debug, warn};

use crate::config::SynthConfig;
use crate::curve::Curve;
use crate::source::{DefinitionSource, SourceLine};
use crate::{Result, SynthError};

/// Deterministic baseline: named curves and the total run duration
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineProfile {
    name: String,
    total_duration: f64,
    curves: Vec<Curve>,
}

fn is_point_row(line: &SourceLine) -> bool {
    line.token(0).is_some_and(|token| token.parse::<f64>().is_ok())
}

impl BaselineProfile {
    pub fn load(source: &DefinitionSource, config: &SynthConfig) -> Result<Self> {
        let lines = source.lines();

        let ftime_at = source
            .find_keyword("$FTIME", 0)
            .ok_or_else(|| SynthError::MissingSection {
                source_name: source.name().to_string(),
                section: "$FTIME",
            })?;
        let ftime_line = &lines[ftime_at];
        if ftime_line.len() != 2 {
            return Err(source.format_error(ftime_line, "2 fields needed"));
        }
        let total_duration = source.number(ftime_line, 1)?;
        if total_duration < 0.0 {
            return Err(source.format_error(ftime_line, "run duration must be >= 0"));
        }

        let mut curves: Vec<Curve> = Vec::new();
        let mut at = 0;
        while let Some(header_at) = source.find_keyword("$INPUT", at) {
            let header = &lines[header_at];
            let Some(name) = header.token(1) else {
                return Err(source.format_error(header, "curve name missing"));
            };
            if header.len() < 3 {
                return Err(source.format_error(header, format!("need type spec for input {name}")));
            }
            let kind = header
                .token(2)
                .and_then(|token| token.parse::<i32>().ok())
                .ok_or_else(|| source.format_error(header, "curve type must be an integer"))?;
            if curves.iter().any(|curve| curve.name() == name) {
                return Err(source.format_error(header, format!("duplicate curve {name}")));
            }
            if curves.len() >= config.max_variables {
                return Err(SynthError::Capacity {
                    what: "curves",
                    name: source.name().to_string(),
                    limit: config.max_variables,
                });
            }

            let mut curve =
                Curve::with_limits(name, kind, config.max_breakpoints, config.time_resolution);
            at = header_at + 1;
            while let Some(row) = lines.get(at).filter(|row| is_point_row(row)) {
                if row.len() != 2 {
                    return Err(source.format_error(row, "breakpoint needs time and value"));
                }
                curve.append(source.number(row, 0)?, source.number(row, 1)?, true)?;
                at += 1;
            }

            if curve.is_empty() {
                return Err(source.format_error(header, format!("input {name} has no breakpoints")));
            }
            if curve.check_order() > 0 {
                if config.strict_order {
                    return Err(source.format_error(header, "time is not monotonically increasing"));
                }
                warn!(curve = name, "baseline curve out of order, output is suspect");
            }
            debug!(curve = name, kind, points = curve.len(), "loaded baseline curve");
            curves.push(curve);
        }

        Ok(Self {
            name: source.name().to_string(),
            total_duration,
            curves,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn curves(&self) -> &[Curve] {
        &self.curves
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    pub fn curve(&self, name: &str) -> Option<&Curve> {
        self.curves.iter().find(|curve| curve.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::BaselineProfile;
    use crate::config::SynthConfig;
    use crate::source::DefinitionSource;
    use crate::SynthError;

    const G1000: &str = "\
# base profile
$FTIME 600.0
$INPUT ALT 1
  0.0  1000.0
  600.0 1000.0
$INPUT PLASLIDER 2
  0.0   20.0
  100.0 80.0
  300.0 80.0
  400.0 20.0
";

    #[test]
    fn loads_curves_and_duration() {
        let src = DefinitionSource::parse("g1000.def", G1000);
        let base = BaselineProfile::load(&src, &SynthConfig::default()).unwrap();
        assert_eq!(base.total_duration(), 600.0);
        assert_eq!(base.len(), 2);
        let pla = base.curve("PLASLIDER").unwrap();
        assert_eq!(pla.kind(), 2);
        assert_eq!(pla.len(), 4);
        assert!(pla.is_marked(0));
        assert!(base.curve("XM").is_none());
    }

    #[test]
    fn missing_ftime_is_reported() {
        let src = DefinitionSource::parse("bad.def", "$INPUT ALT 1\n0 1\n");
        let err = BaselineProfile::load(&src, &SynthConfig::default()).unwrap_err();
        assert!(matches!(err, SynthError::MissingSection { section: "$FTIME", .. }));
    }

    #[test]
    fn input_without_type_is_a_format_error() {
        let src = DefinitionSource::parse("bad.def", "$FTIME 10\n$INPUT ALT\n0 1\n");
        let err = BaselineProfile::load(&src, &SynthConfig::default()).unwrap_err();
        assert!(matches!(err, SynthError::Format { line: 2, .. }));
    }

    #[test]
    fn too_many_curves_hits_capacity() {
        let config = SynthConfig {
            max_variables: 1,
            ..SynthConfig::default()
        };
        let src = DefinitionSource::parse("g1000.def", G1000);
        let err = BaselineProfile::load(&src, &config).unwrap_err();
        assert!(matches!(err, SynthError::Capacity { limit: 1, .. }));
    }

    #[test]
    fn strict_order_rejects_reversed_time() {
        let text = "$FTIME 10\n$INPUT N1 2\n0 1\n5 2\n4 3\n";
        let src = DefinitionSource::parse("order.def", text);
        assert!(BaselineProfile::load(&src, &SynthConfig::default()).is_ok());
        let strict = SynthConfig {
            strict_order: true,
            ..SynthConfig::default()
        };
        assert!(BaselineProfile::load(&src, &strict).is_err());
    }
}

//! Perturbation spec set loader
//!
//! One row per perturbed variable. Rows are recognised by field count and
//! keyword position:
//!
//! ```text
//! NAME UPDATE INPUT min max RISE min max FALL min max HOLD min max ABSMIN ABSMAX
//! NAME UPDATE SWITCH HOLD min max INITIAL
//! NAME UPDATE ONESWITCH HOLD min max OFFTIME
//! NAME UNIFORMCONSTANT min max ABSMIN ABSMAX
//! NAME NORMALCONSTANT min max ABSMIN ABSMAX
//! ```

use tracing::debug;

use crate::config::SynthConfig;
use crate::process::{PerturbationProcess, ProcessSpec};
use crate::source::{DefinitionSource, SourceLine};
use crate::variable::{SeedAllocator, VariableKind};
use crate::{Result, SynthError};

const REGULAR_FIELDS: usize = 16;
const SWITCH_FIELDS: usize = 7;
const CONSTANT_FIELDS: usize = 6;

/// Ordered perturbation processes, one per named variable
#[derive(Debug, Clone)]
pub struct PerturbationSpecSet {
    name: String,
    processes: Vec<PerturbationProcess>,
}

fn update_interval(source: &DefinitionSource, row: &SourceLine) -> Result<f64> {
    let update = source.number(row, 1)?;
    if update <= 0.0 {
        return Err(source.format_error(row, "update interval must be > 0"));
    }
    Ok(update)
}

/// Distribution in fields `at..at + 3`: tag, min, max.
fn tagged(source: &DefinitionSource, row: &SourceLine, at: usize) -> Result<VariableKind> {
    let tag = row.token(at).unwrap_or_default();
    let min = source.number(row, at + 1)?;
    let max = source.number(row, at + 2)?;
    Ok(VariableKind::from_tag(tag, min, max))
}

fn parse_row(source: &DefinitionSource, row: &SourceLine) -> Result<ProcessSpec> {
    let name = row.token(0).unwrap_or_default();
    let keyword = |index: usize| row.token(index).unwrap_or_default();

    match row.len() {
        REGULAR_FIELDS => Ok(ProcessSpec {
            name: name.to_string(),
            update: update_interval(source, row)?,
            input: tagged(source, row, 2)?,
            rise: tagged(source, row, 5)?,
            fall: tagged(source, row, 8)?,
            hold: tagged(source, row, 11)?,
            abs_min: source.number(row, 14)?,
            abs_max: source.number(row, 15)?,
        }),
        SWITCH_FIELDS if keyword(2) == "SWITCH" => Ok(ProcessSpec::switch(
            name,
            update_interval(source, row)?,
            tagged(source, row, 3)?,
            source.number(row, 6)?,
        )),
        SWITCH_FIELDS if keyword(2) == "ONESWITCH" => Ok(ProcessSpec::one_switch(
            name,
            update_interval(source, row)?,
            tagged(source, row, 3)?,
            source.number(row, 6)?,
        )),
        CONSTANT_FIELDS if matches!(keyword(1), "UNIFORMCONSTANT" | "NORMALCONSTANT") => {
            Ok(ProcessSpec::constant(
                name,
                tagged(source, row, 1)?,
                source.number(row, 4)?,
                source.number(row, 5)?,
            ))
        }
        fields => Err(source.format_error(
            row,
            format!("{fields} fields do not match any perturbation row shape"),
        )),
    }
}

impl PerturbationSpecSet {
    /// Parse every row of `source`, seeding processes in row order.
    pub fn load(
        source: &DefinitionSource,
        config: &SynthConfig,
        seeds: &mut SeedAllocator,
    ) -> Result<Self> {
        let mut processes: Vec<PerturbationProcess> = Vec::new();

        for row in source.lines() {
            let spec = parse_row(source, row)?;
            if processes.iter().any(|p| p.name() == spec.name) {
                return Err(source.format_error(row, format!("{} perturbed twice", spec.name)));
            }
            if processes.len() >= config.max_variables {
                return Err(SynthError::Capacity {
                    what: "perturbed variables",
                    name: source.name().to_string(),
                    limit: config.max_variables,
                });
            }

            let process = PerturbationProcess::new(spec, seeds)?;
            debug!("{process}");
            processes.push(process);
        }

        Ok(Self {
            name: source.name().to_string(),
            processes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn processes(&self) -> &[PerturbationProcess] {
        &self.processes
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn process(&self, name: &str) -> Option<&PerturbationProcess> {
        self.processes.iter().find(|p| p.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::PerturbationSpecSet;
    use crate::config::SynthConfig;
    use crate::process::ProcessKind;
    use crate::source::DefinitionSource;
    use crate::variable::SeedAllocator;
    use crate::SynthError;

    const MTC: &str = "\
# perturbations
PLASLIDER 1.0 NORMAL -10 10 UNIFORM 2 420 UNIFORM -240 -2 UNIFORM 3 4 15 132
SWWOW 2.0 SWITCH UNIFORM 3 5 1
MASTER_SW 1.0 ONESWITCH UNIFORM 1 5 120
ALT NORMALCONSTANT -10 10 -50 50
XM UNIFORMCONSTANT 0 0.1 0 1
";

    fn load(text: &str, seed: u64) -> crate::Result<PerturbationSpecSet> {
        let src = DefinitionSource::parse("test.mtc", text);
        PerturbationSpecSet::load(&src, &SynthConfig::default(), &mut SeedAllocator::new(seed))
    }

    #[test]
    fn recognises_every_row_shape() {
        let set = load(MTC, 1).unwrap();
        let kinds: Vec<ProcessKind> = set.processes().iter().map(|p| p.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ProcessKind::RandomWalk,
                ProcessKind::Switch,
                ProcessKind::OneSwitch,
                ProcessKind::Constant,
                ProcessKind::Constant,
            ]
        );
        let pla = set.process("PLASLIDER").unwrap();
        assert_eq!(pla.abs_min(), 15.0);
        assert_eq!(pla.abs_max(), 132.0);
        let sw = set.process("SWWOW").unwrap();
        assert_eq!(sw.update(), 2.0);
        assert_eq!((sw.abs_min(), sw.abs_max()), (0.0, 1.0));
        assert_eq!(set.process("ALT").unwrap().update(), 1.0);
    }

    #[test]
    fn seeds_follow_row_order() {
        let mut seeds = SeedAllocator::new(40);
        let src = DefinitionSource::parse("test.mtc", MTC);
        PerturbationSpecSet::load(&src, &SynthConfig::default(), &mut seeds).unwrap();
        assert_eq!(seeds.issued(), 5 * 4);
    }

    #[test]
    fn unmatched_row_reports_its_line() {
        let err = load("ALT 1.0 UNIFORM 0 1\n", 1).unwrap_err();
        assert!(matches!(err, SynthError::Format { line: 1, .. }));

        let err = load("SW 1.0 TOGGLE UNIFORM 3 5 1\n", 1).unwrap_err();
        assert!(matches!(err, SynthError::Format { .. }));
    }

    #[test]
    fn non_positive_update_is_a_format_error() {
        let err = load("SWWOW 0 SWITCH UNIFORM 3 5 1\n", 1).unwrap_err();
        assert!(matches!(err, SynthError::Format { .. }));
    }

    #[test]
    fn duplicate_rows_are_rejected() {
        let text = "ALT NORMALCONSTANT -1 1 -5 5\nALT UNIFORMCONSTANT -1 1 -5 5\n";
        let err = load(text, 1).unwrap_err();
        assert!(matches!(err, SynthError::Format { line: 2, .. }));
    }

    #[test]
    fn row_count_is_capped() {
        let config = SynthConfig {
            max_variables: 2,
            ..SynthConfig::default()
        };
        let src = DefinitionSource::parse("test.mtc", MTC);
        let err = PerturbationSpecSet::load(&src, &config, &mut SeedAllocator::new(1)).unwrap_err();
        assert!(matches!(err, SynthError::Capacity { limit: 2, .. }));
    }
}

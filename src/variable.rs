//! Seeded random variables
//!
//! Every variable owns its own generator. Seeds are handed out by a
//! [`SeedAllocator`] in construction order, so a run is reproduced exactly by
//! its base seed and the declaration order of its inputs.

use std::f64::consts::PI;
use std::fmt;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, OpenClosed01, Standard};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Hands out consecutive seeds starting at the base seed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedAllocator {
    base: u64,
    next: u64,
}

impl SeedAllocator {
    pub fn new(base: u64) -> Self {
        Self { base, next: base }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    /// Seeds allocated so far.
    pub fn issued(&self) -> u64 {
        self.next.wrapping_sub(self.base)
    }

    pub fn next_seed(&mut self) -> u64 {
        let seed = self.next;
        self.next = self.next.wrapping_add(1);
        seed
    }
}

/// Distribution kind together with its parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum VariableKind {
    Uniform { min: f64, max: f64 },
    Normal { min: f64, max: f64 },
    /// Two-level toggle between `min` and `max`
    Switch { min: f64, max: f64, initial: f64 },
    /// Single on pulse that ends at `off_time`
    OneSwitch { min: f64, max: f64, off_time: f64 },
    Constant { value: f64 },
    UniformConstant { min: f64, max: f64 },
    NormalConstant { min: f64, max: f64 },
}

impl VariableKind {
    /// Build a kind from its definition-file tag.
    ///
    /// Unknown tags fall back to uniform with a warning. Switch parameters
    /// not carried by the tag row (`initial`, `off_time`) are zero and are
    /// filled in by the caller.
    pub fn from_tag(tag: &str, min: f64, max: f64) -> Self {
        match tag.to_ascii_uppercase().as_str() {
            "UNIFORM" => Self::Uniform { min, max },
            "NORMAL" => Self::Normal { min, max },
            "SWITCH" => Self::Switch {
                min,
                max,
                initial: 0.0,
            },
            "ONESWITCH" => Self::OneSwitch {
                min,
                max,
                off_time: 0.0,
            },
            "CONSTANT" => Self::Constant { value: min },
            "UNIFORMCONSTANT" => Self::UniformConstant { min, max },
            "NORMALCONSTANT" => Self::NormalConstant { min, max },
            other => {
                warn!(kind = other, "variable type not supported, assuming UNIFORM");
                Self::Uniform { min, max }
            }
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Uniform { .. } => "UNIFORM",
            Self::Normal { .. } => "NORMAL",
            Self::Switch { .. } => "SWITCH",
            Self::OneSwitch { .. } => "ONESWITCH",
            Self::Constant { .. } => "CONSTANT",
            Self::UniformConstant { .. } => "UNIFORMCONSTANT",
            Self::NormalConstant { .. } => "NORMALCONSTANT",
        }
    }

    /// Lower and upper parameter, `(value, value)` for a fixed constant.
    pub fn bounds(&self) -> (f64, f64) {
        match *self {
            Self::Uniform { min, max }
            | Self::Normal { min, max }
            | Self::Switch { min, max, .. }
            | Self::OneSwitch { min, max, .. }
            | Self::UniformConstant { min, max }
            | Self::NormalConstant { min, max } => (min, max),
            Self::Constant { value } => (value, value),
        }
    }

    /// True for the kinds that produce one value for the whole run.
    pub fn is_constant(&self) -> bool {
        matches!(
            self,
            Self::Constant { .. } | Self::UniformConstant { .. } | Self::NormalConstant { .. }
        )
    }
}

/// One seeded random variable
#[derive(Clone, Debug)]
pub struct RandomVariable {
    label: String,
    kind: VariableKind,
    seed: u64,
    rng: ChaCha8Rng,
    /// Value drawn at construction for the constant kinds
    fixed: Option<f64>,
}

impl RandomVariable {
    /// Construct a variable, taking the next seed from `seeds`.
    pub fn new(label: impl Into<String>, kind: VariableKind, seeds: &mut SeedAllocator) -> Self {
        let label = label.into();
        let (min, max) = kind.bounds();
        if min > max && !matches!(kind, VariableKind::Constant { .. }) {
            warn!(variable = %label, min, max, "min/max disagree for variable");
        }

        let seed = seeds.next_seed();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let fixed = match kind {
            VariableKind::Constant { value } => Some(value),
            VariableKind::UniformConstant { min, max } => Some(uniform(&mut rng, min, max)),
            VariableKind::NormalConstant { min, max } => Some(normal(&mut rng, min, max)),
            _ => None,
        };

        Self {
            label,
            kind,
            seed,
            rng,
            fixed,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> &VariableKind {
        &self.kind
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Draw this tick's value.
    ///
    /// On the first tick uniform and normal variables whose lower bound is
    /// not positive return exactly zero without drawing. Switch kinds have
    /// no independent draw and return zero here; see
    /// [`RandomVariable::value_from_past`].
    pub fn value(&mut self, first_tick: bool) -> f64 {
        if let Some(value) = self.fixed {
            return value;
        }
        match self.kind {
            VariableKind::Uniform { min, max } => {
                if first_tick && min <= 0.0 {
                    return 0.0;
                }
                uniform(&mut self.rng, min, max)
            }
            VariableKind::Normal { min, max } => {
                if first_tick && min <= 0.0 {
                    return 0.0;
                }
                normal(&mut self.rng, min, max)
            }
            _ => 0.0,
        }
    }

    /// Toggle target: the lower level when `past` sits on the upper one,
    /// otherwise the upper level.
    pub fn value_from_past(&self, past: f64) -> f64 {
        let (min, max) = self.kind.bounds();
        if past == max {
            min
        } else {
            max
        }
    }
}

impl fmt::Display for RandomVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (min, max) = self.kind.bounds();
        write!(
            f,
            "{} {:<6} min = {:<10.4} max = {:<10.4} seed = {}",
            self.kind.tag(),
            self.label,
            min,
            max,
            self.seed
        )?;
        match self.kind {
            VariableKind::Switch { initial, .. } => write!(f, " initial = {initial}"),
            VariableKind::OneSwitch { off_time, .. } => write!(f, " off_time = {off_time}"),
            _ => match self.fixed {
                Some(value) => write!(f, " value = {value:.4}"),
                None => Ok(()),
            },
        }
    }
}

/// Uniform draw in `[0, 1)` mapped onto `[min, max]`.
fn uniform(rng: &mut ChaCha8Rng, min: f64, max: f64) -> f64 {
    let u: f64 = Standard.sample(rng);
    u * (max - min) + min
}

/// Box-Muller draw centred on the midpoint of `[min, max]` with the half
/// range as one standard deviation.
fn normal(rng: &mut ChaCha8Rng, min: f64, max: f64) -> f64 {
    let u1: f64 = OpenClosed01.sample(rng);
    let u2: f64 = Standard.sample(rng);
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    0.5 * (min + max) + z * 0.5 * (max - min)
}

#[cfg(test)]
mod tests {
    use super::{RandomVariable, SeedAllocator, VariableKind};

    #[test]
    fn seeds_are_issued_in_order() {
        let mut seeds = SeedAllocator::new(11);
        let a = RandomVariable::new("INPUT", VariableKind::from_tag("UNIFORM", 0.0, 1.0), &mut seeds);
        let b = RandomVariable::new("RISE", VariableKind::Constant { value: 1.0 }, &mut seeds);
        assert_eq!(a.seed(), 11);
        assert_eq!(b.seed(), 12);
        assert_eq!(seeds.issued(), 2);
    }

    #[test]
    fn same_seed_reproduces_draws() {
        let kind = VariableKind::Normal { min: 1.0, max: 3.0 };
        let mut a = RandomVariable::new("INPUT", kind.clone(), &mut SeedAllocator::new(7));
        let mut b = RandomVariable::new("INPUT", kind, &mut SeedAllocator::new(7));
        for _ in 0..32 {
            assert_eq!(a.value(false), b.value(false));
        }
    }

    #[test]
    fn uniform_stays_in_range() {
        let mut v = RandomVariable::new(
            "INPUT",
            VariableKind::Uniform { min: 2.0, max: 420.0 },
            &mut SeedAllocator::new(3),
        );
        for _ in 0..500 {
            let x = v.value(false);
            assert!((2.0..=420.0).contains(&x));
        }
    }

    #[test]
    fn first_tick_zero_only_for_non_positive_minimum() {
        let mut seeds = SeedAllocator::new(5);
        let mut signed = RandomVariable::new("INPUT", VariableKind::Normal { min: -10.0, max: 10.0 }, &mut seeds);
        let mut positive = RandomVariable::new("HOLD", VariableKind::Uniform { min: 3.0, max: 4.0 }, &mut seeds);
        assert_eq!(signed.value(true), 0.0);
        assert!(positive.value(true) >= 3.0);
        let mut constant = RandomVariable::new(
            "INPUT",
            VariableKind::UniformConstant { min: -1.0, max: 1.0 },
            &mut seeds,
        );
        let drawn = constant.value(true);
        assert_eq!(constant.value(false), drawn);
    }

    #[test]
    fn unknown_tag_falls_back_to_uniform() {
        let kind = VariableKind::from_tag("TRIANGULAR", 1.0, 2.0);
        assert_eq!(kind, VariableKind::Uniform { min: 1.0, max: 2.0 });
    }

    #[test]
    fn switch_toggles_from_past() {
        let v = RandomVariable::new(
            "INPUT",
            VariableKind::Switch {
                min: -1.0,
                max: 1.0,
                initial: 1.0,
            },
            &mut SeedAllocator::new(1),
        );
        assert_eq!(v.value_from_past(1.0), -1.0);
        assert_eq!(v.value_from_past(-1.0), 1.0);
        assert_eq!(v.value_from_past(0.0), 1.0);
    }
}

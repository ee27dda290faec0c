//! Rate and dwell limited perturbation processes
//!
//! A process is driven at its own update interval. Each tick samples rise,
//! fall and hold limits, forms a raw target from its input variable, passes
//! the target through a dwell (hold) stage and finally a slew limiter. The
//! limiter's saturation feeds back into the dwell stage on the next tick.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::curve::Curve;
use crate::variable::{RandomVariable, SeedAllocator, VariableKind};
use crate::{Result, SynthError};

/// Behaviour selected by the input variable's kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessKind {
    /// Uniform or normal target, slew and dwell limited
    RandomWalk,
    /// Toggles between two levels
    Switch,
    /// One pulse, forced to zero after its off time
    OneSwitch,
    /// One value for the whole run
    Constant,
}

impl ProcessKind {
    fn of(input: &VariableKind) -> Self {
        match input {
            VariableKind::Switch { .. } => Self::Switch,
            VariableKind::OneSwitch { .. } => Self::OneSwitch,
            kind if kind.is_constant() => Self::Constant,
            _ => Self::RandomWalk,
        }
    }
}

/// Declarative description of one process, as read from one perturbation row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub name: String,
    /// Tick interval [s]
    pub update: f64,
    pub input: VariableKind,
    pub rise: VariableKind,
    pub fall: VariableKind,
    pub hold: VariableKind,
    /// Bounds on the perturbation added to the baseline
    pub abs_min: f64,
    pub abs_max: f64,
}

impl ProcessSpec {
    /// Slew limits wide enough for a full toggle within one tick.
    fn switch_slew(update: f64) -> (VariableKind, VariableKind) {
        let slew = 1.0 / update + 1.0;
        (
            VariableKind::Constant { value: slew },
            VariableKind::Constant { value: -slew },
        )
    }

    pub fn switch(name: impl Into<String>, update: f64, hold: VariableKind, initial: f64) -> Self {
        let (rise, fall) = Self::switch_slew(update);
        Self {
            name: name.into(),
            update,
            input: VariableKind::Switch {
                min: -1.0,
                max: 1.0,
                initial,
            },
            rise,
            fall,
            hold,
            abs_min: 0.0,
            abs_max: 1.0,
        }
    }

    pub fn one_switch(
        name: impl Into<String>,
        update: f64,
        hold: VariableKind,
        off_time: f64,
    ) -> Self {
        let (rise, fall) = Self::switch_slew(update);
        Self {
            name: name.into(),
            update,
            input: VariableKind::OneSwitch {
                min: -1.0,
                max: 1.0,
                off_time,
            },
            rise,
            fall,
            hold,
            abs_min: 0.0,
            abs_max: 1.0,
        }
    }

    /// Constant row: unit update, fixed slew and no dwell.
    pub fn constant(name: impl Into<String>, input: VariableKind, abs_min: f64, abs_max: f64) -> Self {
        Self {
            name: name.into(),
            update: 1.0,
            input,
            rise: VariableKind::Constant { value: 1.0 },
            fall: VariableKind::Constant { value: -1.0 },
            hold: VariableKind::Constant { value: 0.0 },
            abs_min,
            abs_max,
        }
    }
}

/// Dwell counter: counts down `tf / update` ticks while active, counts up
/// from `-(ft / update + 1)` while inactive, and re-arms on a sign flip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct VarDelay {
    count: i64,
}

impl VarDelay {
    fn step(
        &mut self,
        input: bool,
        update: f64,
        tf_delay: f64,
        ft_delay: f64,
        initial: bool,
        first_tick: bool,
    ) -> bool {
        let tf = (tf_delay / update) as i64;
        let ft = (ft_delay / update + 1.0) as i64;
        if first_tick {
            self.count = if initial { tf } else { -ft };
            return initial;
        }

        if self.count >= 0 {
            if input {
                self.count = tf;
            } else {
                self.count -= 1;
                if self.count < 0 {
                    self.count = -ft;
                }
            }
        } else if input {
            self.count += 1;
            if self.count >= 0 {
                self.count = tf;
            }
        } else {
            self.count = -ft;
        }
        self.count >= 0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct ProcessState {
    input: f64,
    rise: f64,
    fall: f64,
    hold: f64,
    output: f64,
    past_output: f64,
    held_input: f64,
    frozen: bool,
    delay: VarDelay,
    rise_limit: f64,
    fall_limit: f64,
    limited: bool,
}

/// Stochastic perturbation process for one named variable
#[derive(Debug, Clone)]
pub struct PerturbationProcess {
    name: String,
    update: f64,
    kind: ProcessKind,
    input: RandomVariable,
    rise: RandomVariable,
    fall: RandomVariable,
    hold: RandomVariable,
    abs_min: f64,
    abs_max: f64,
    state: ProcessState,
}

impl PerturbationProcess {
    /// Build the process, drawing four seeds (input, rise, fall, hold).
    pub fn new(spec: ProcessSpec, seeds: &mut SeedAllocator) -> Result<Self> {
        if !(spec.update > 0.0) {
            return Err(SynthError::InvalidConfig(format!(
                "update interval for {} must be > 0, got {}",
                spec.name, spec.update
            )));
        }

        let kind = ProcessKind::of(&spec.input);
        let input = RandomVariable::new("INPUT", spec.input, seeds);
        let rise = RandomVariable::new("RISE", spec.rise, seeds);
        let fall = RandomVariable::new("FALL", spec.fall, seeds);
        let hold = RandomVariable::new("HOLD", spec.hold, seeds);

        Ok(Self {
            name: spec.name,
            update: spec.update,
            kind,
            input,
            rise,
            fall,
            hold,
            abs_min: spec.abs_min,
            abs_max: spec.abs_max,
            state: ProcessState::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn update(&self) -> f64 {
        self.update
    }

    pub fn kind(&self) -> ProcessKind {
        self.kind
    }

    pub fn abs_min(&self) -> f64 {
        self.abs_min
    }

    pub fn abs_max(&self) -> f64 {
        self.abs_max
    }

    /// Clamp a perturbation into `[abs_min, abs_max]`.
    pub fn bound(&self, value: f64) -> f64 {
        value.max(self.abs_min).min(self.abs_max)
    }

    /// Advance one tick at elapsed `time` and return the new output.
    pub fn tick(&mut self, time: f64, first_tick: bool) -> f64 {
        self.state.rise = self.rise.value(first_tick);
        self.state.hold = self.hold.value(first_tick);
        self.state.fall = self.fall.value(first_tick);

        match self.kind {
            ProcessKind::Switch => {
                if first_tick {
                    if let VariableKind::Switch { initial, .. } = *self.input.kind() {
                        self.state.output = initial;
                    }
                }
                self.state.input = self.input.value_from_past(self.state.output);
            }
            ProcessKind::OneSwitch => {
                if first_tick {
                    self.state.output = 0.0;
                }
                if self.state.output == 0.0 {
                    self.state.input = self.input.value_from_past(self.state.output);
                }
            }
            ProcessKind::RandomWalk | ProcessKind::Constant => {
                self.state.input = self.input.value(first_tick);
            }
        }

        if self.kind == ProcessKind::Constant {
            self.state.output = self.state.input;
        } else {
            self.state.output = self.slew_limit(first_tick);
            let s = &self.state;
            trace!(
                process = %self.name,
                time,
                input = s.input,
                rise = s.rise,
                hold = s.hold,
                fall = s.fall,
                delay = s.delay.count,
                held = s.held_input,
                limited = s.limited,
                frozen = s.frozen,
                rise_limit = s.rise_limit,
                fall_limit = s.fall_limit,
                output = s.output,
                "tick"
            );
        }

        if let VariableKind::OneSwitch { off_time, .. } = *self.input.kind() {
            if time > off_time {
                self.state.output = 0.0;
            }
        }

        self.state.output
    }

    /// Dwell stage: while frozen the previous target is held. Returns the
    /// held target and whether the stage was frozen coming into this tick.
    fn hold_target(&mut self, first_tick: bool) -> (f64, bool) {
        let s = &mut self.state;
        if first_tick {
            s.held_input = s.input;
            s.frozen = true;
        }

        let output = if s.frozen { s.held_input } else { s.input };
        let changed = (!s.frozen && output != s.held_input) || s.limited;
        let active = s
            .delay
            .step(changed, self.update, s.hold, 0.0, true, first_tick);
        let was_frozen = s.frozen;
        s.held_input = output;
        s.frozen = active;
        (output, was_frozen)
    }

    fn slew_limit(&mut self, first_tick: bool) -> f64 {
        if first_tick {
            self.state.past_output = self.state.input;
        }

        let (target, was_frozen) = self.hold_target(first_tick);
        let s = &mut self.state;
        if !was_frozen {
            s.rise_limit = s.rise;
            s.fall_limit = s.fall;
        }

        let upper = self.update * s.rise_limit + s.past_output;
        let lower = self.update * s.fall_limit + s.past_output;
        s.limited = false;
        let output = if target > upper {
            s.limited = true;
            upper
        } else if target < lower {
            s.limited = true;
            lower
        } else {
            target
        };
        s.past_output = output;
        output
    }

    /// Run the process from zero to `total_duration` into a delta curve.
    ///
    /// Ticks land on multiples of the update interval up to and including
    /// the first one at or past `total_duration`. Constant processes give a
    /// flat two-point curve.
    pub fn sample(
        &mut self,
        total_duration: f64,
        kind: i32,
        capacity: usize,
        resolution: f64,
    ) -> Result<Curve> {
        self.state = ProcessState::default();
        let mut curve = Curve::with_limits(self.name.clone(), kind, capacity, resolution);

        if self.kind == ProcessKind::Constant {
            let value = self.tick(0.0, true);
            curve.append(0.0, value, false)?;
            if total_duration > resolution {
                curve.append(total_duration, value, false)?;
            }
            return Ok(curve);
        }

        let mut step = 0_u64;
        loop {
            let time = self.update * step as f64;
            let value = self.tick(time, step == 0);
            curve.append(time, value, false)?;
            step += 1;
            if time >= total_duration {
                break;
            }
        }
        Ok(curve)
    }
}

impl fmt::Display for PerturbationProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<12} update = {} abs = [{}, {}]\n  inputV = {}\n  riseV  = {}\n  fallV  = {}\n  holdV  = {}",
            self.name,
            self.update,
            self.abs_min,
            self.abs_max,
            self.input,
            self.rise,
            self.fall,
            self.hold
        )
    }
}

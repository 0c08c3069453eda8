//! Traffic light controller
//!
//! Runs as its own process. Each cycle it picks the axis that should be
//! green, shows orange on every head that changes colour for a clearance
//! interval, then commits the new colours and holds them for a dwell time.
//! Turning an axis green fires its ready event; starting its change to red
//! replaces that event with a fresh one.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::error::SimResult;
use super::intersection::IntersectionState;
use super::scheduler::{Context, Process, Step};
use super::types::{Axis, LightColor, SimTime, ORANGE_CLEARANCE};

type Ctx<'a> = Context<'a, IntersectionState>;

/// Green dwell bounds for the random policy
pub const RANDOM_DWELL: (SimTime, SimTime) = (2.0, 9.0);

/// Green dwell for the static policy
pub const STATIC_DWELL: SimTime = 6.0;

/// Green dwell before an adaptive policy re-evaluates
pub const ADAPTIVE_DWELL: SimTime = 0.5;

/// Wait before the count policy re-evaluates when no switch is needed
pub const COUNT_RECHECK: SimTime = ADAPTIVE_DWELL * 5.0;

/// Wait before the wait-time policy re-evaluates when no switch is needed
pub const WAIT_TIME_RECHECK: SimTime = ADAPTIVE_DWELL * 2.0;

/// Difference in waiting cars that makes the count policy switch
pub const COUNT_IMBALANCE_THRESHOLD: u32 = 6;

/// Relative difference in mean wait that makes the wait-time policy switch
pub const WAIT_TIME_SWITCH_RATIO: f64 = 0.3;

/// How the controller chooses the next green axis and its dwell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightPolicy {
    /// Random axis and colour, random dwell
    Random,
    /// Random axis and colour, fixed dwell
    Static,
    /// Prefer the axis with more cars before the lights
    #[default]
    CountPreferred,
    /// Prefer the axis whose waiting cars have waited longer on average
    WaitTimePreferred,
}

impl LightPolicy {
    pub const ALL: [LightPolicy; 4] = [
        LightPolicy::Random,
        LightPolicy::Static,
        LightPolicy::CountPreferred,
        LightPolicy::WaitTimePreferred,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LightPolicy::Random => "random",
            LightPolicy::Static => "static",
            LightPolicy::CountPreferred => "count",
            LightPolicy::WaitTimePreferred => "wait-time",
        }
    }
}

/// Axis the count policy wants green, given cars before the lights on each
/// axis and the axis it picked last time.
pub fn count_preference(north_south: u32, east_west: u32, current: Axis) -> Axis {
    if north_south.abs_diff(east_west) >= COUNT_IMBALANCE_THRESHOLD {
        if north_south > east_west {
            Axis::NorthSouth
        } else {
            Axis::EastWest
        }
    } else {
        empty_side_preference(north_south, east_west, current)
    }
}

/// Axis the wait-time policy wants green
pub fn wait_time_preference(
    means: (SimTime, SimTime),
    counts: (u32, u32),
    current: Axis,
) -> Axis {
    let (ns_mean, ew_mean) = means;
    let average = (ns_mean + ew_mean) / 2.0;
    if (ns_mean - ew_mean).abs() > average * WAIT_TIME_SWITCH_RATIO {
        if ns_mean > ew_mean {
            Axis::NorthSouth
        } else {
            Axis::EastWest
        }
    } else {
        empty_side_preference(counts.0, counts.1, current)
    }
}

fn empty_side_preference(north_south: u32, east_west: u32, current: Axis) -> Axis {
    match (north_south, east_west) {
        (0, ew) if ew != 0 => Axis::EastWest,
        (ns, 0) if ns != 0 => Axis::NorthSouth,
        _ => current,
    }
}

/// Mean time since spawn of cars that have not passed their stopline, for
/// the N/S and E/W axes.
pub fn mean_waits(state: &IntersectionState, now: SimTime) -> (SimTime, SimTime) {
    let mut sums = [0.0; 2];
    let mut counts = [0u32; 2];
    for car in state.cars().filter(|c| c.progress <= 1) {
        let axis = car.origin.axis().index();
        sums[axis] += now - car.spawn_time;
        counts[axis] += 1;
    }
    let mean = |i: usize| {
        if counts[i] == 0 {
            0.0
        } else {
            sums[i] / f64::from(counts[i])
        }
    };
    (mean(0), mean(1))
}

/// Outcome of one policy evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
enum Selection {
    /// Move `axis` to `color` and the other axis to the opposite colour
    Switch(Axis, LightColor),
    /// Keep the current phase and evaluate again after the given wait
    Hold(SimTime),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LightPhase {
    Select,
    Orange { axis: Axis, color: LightColor },
    Dwell,
}

/// Owns the light colours and axis-ready events for the whole run
#[derive(Debug)]
pub struct TrafficLightController {
    policy: LightPolicy,
    rng: StdRng,
    selected: Axis,
    phase: LightPhase,
}

impl TrafficLightController {
    pub fn new(policy: LightPolicy, seed: u64) -> Self {
        Self {
            policy,
            rng: StdRng::seed_from_u64(seed),
            selected: Axis::NorthSouth,
            phase: LightPhase::Select,
        }
    }

    fn dwell(&mut self) -> SimTime {
        match self.policy {
            LightPolicy::Random => self.rng.random_range(RANDOM_DWELL.0..=RANDOM_DWELL.1),
            LightPolicy::Static => STATIC_DWELL,
            LightPolicy::CountPreferred | LightPolicy::WaitTimePreferred => ADAPTIVE_DWELL,
        }
    }

    /// Pick the axis to change and the colour it should get.
    fn select(&mut self, state: &IntersectionState, now: SimTime) -> Selection {
        let first = |axis: Axis| axis.directions()[0];
        match self.policy {
            LightPolicy::Random | LightPolicy::Static => {
                let axis = Axis::from_index(self.rng.random_range(0..2));
                let mut color = if self.rng.random_bool(0.5) {
                    LightColor::Red
                } else {
                    LightColor::Green
                };
                if color == state.light(first(axis)) {
                    color = opposite(color);
                }
                self.selected = axis;
                Selection::Switch(axis, color)
            }
            LightPolicy::CountPreferred => {
                let ns = state.before_lights_on(Axis::NorthSouth);
                let ew = state.before_lights_on(Axis::EastWest);
                self.selected = count_preference(ns, ew, self.selected);
                if state.is_green(first(self.selected)) {
                    return Selection::Hold(COUNT_RECHECK);
                }
                Selection::Switch(self.selected, LightColor::Green)
            }
            LightPolicy::WaitTimePreferred => {
                let ns = state.before_lights_on(Axis::NorthSouth);
                let ew = state.before_lights_on(Axis::EastWest);
                let means = mean_waits(state, now);
                self.selected = wait_time_preference(means, (ns, ew), self.selected);
                if state.is_green(first(self.selected)) {
                    return Selection::Hold(WAIT_TIME_RECHECK);
                }
                Selection::Switch(self.selected, LightColor::Green)
            }
        }
    }

    /// Show orange on an axis that is about to change to `color`.
    fn prepare(ctx: &mut Ctx<'_>, axis: Axis, color: LightColor) {
        let [a, b] = axis.directions();
        if ctx.world().light(a) == color {
            return;
        }
        if color == LightColor::Red {
            let fresh = ctx.new_event();
            ctx.world_mut().replace_axis_ready(axis, fresh);
        }
        let state = ctx.world_mut();
        state.set_light(a, LightColor::Orange);
        state.set_light(b, LightColor::Orange);
    }

    /// Commit an axis to its new colour.
    fn commit(ctx: &mut Ctx<'_>, axis: Axis, color: LightColor) -> SimResult<()> {
        let [a, b] = axis.directions();
        if ctx.world().light(a) == color {
            return Ok(());
        }
        let state = ctx.world_mut();
        state.set_light(a, color);
        state.set_light(b, color);
        if color == LightColor::Green {
            let ready = state.axis_ready(axis);
            ctx.succeed(ready)?;
        }
        Ok(())
    }
}

fn opposite(color: LightColor) -> LightColor {
    if color == LightColor::Green {
        LightColor::Red
    } else {
        LightColor::Green
    }
}

impl Process<IntersectionState> for TrafficLightController {
    fn resume(&mut self, ctx: &mut Ctx<'_>) -> SimResult<Step> {
        let now = ctx.now();
        match self.phase {
            LightPhase::Select | LightPhase::Dwell => {
                let (axis, color) = match self.select(ctx.world(), now) {
                    Selection::Switch(axis, color) => (axis, color),
                    Selection::Hold(recheck) => {
                        self.phase = LightPhase::Select;
                        return Ok(Step::Timeout(recheck));
                    }
                };
                debug!("{:8.3} (Lights) Setting lights: {} to {:?}", now, axis, color);
                debug!(
                    "{:8.3} (Lights) Setting lights: {} to {:?}",
                    now,
                    axis.other(),
                    opposite(color)
                );
                Self::prepare(ctx, axis, color);
                Self::prepare(ctx, axis.other(), opposite(color));
                self.phase = LightPhase::Orange { axis, color };
                Ok(Step::Timeout(ORANGE_CLEARANCE))
            }
            LightPhase::Orange { axis, color } => {
                Self::commit(ctx, axis, color)?;
                Self::commit(ctx, axis.other(), opposite(color))?;
                self.phase = LightPhase::Dwell;
                Ok(Step::Timeout(self.dwell()))
            }
        }
    }
}

//! Car arrival stream
//!
//! The factory creates cars with exponentially distributed gaps, picks the
//! origin uniformly and the destination uniformly among the other three
//! directions, and stops after a fixed number of cars. It never waits for
//! the cars it created.

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};

use super::car::CarProcess;
use super::error::{SimError, SimResult};
use super::intersection::{CarRecord, IntersectionState};
use super::scheduler::{Context, Process, Step};
use super::types::{CarId, Direction, SimTime};

/// Share of `rate * horizon` expected arrivals the factory actually creates
pub const DEFAULT_CAR_FRACTION: f64 = 0.8;

/// Number of cars a factory creates for the given rate and horizon
pub fn target_car_count(rate: f64, horizon: SimTime, fraction: f64) -> usize {
    (rate * horizon * fraction).floor().max(0.0) as usize
}

/// Register a new car and start its process.
pub fn create_car(
    ctx: &mut Context<'_, IntersectionState>,
    origin: Direction,
    destination: Direction,
) -> SimResult<CarId> {
    let now = ctx.now();
    let admission = ctx.new_event();
    let state = ctx.world_mut();
    let id = state.ids.next_car_id();
    let record = CarRecord::new(id, origin, destination, now, admission);
    let process = CarProcess::new(&record);
    state.add_car(record);
    state.enqueue(origin, id);
    ctx.spawn(Box::new(process))?;
    Ok(id)
}

/// Process that feeds cars into the intersection
#[derive(Debug)]
pub struct CarFactory {
    rng: StdRng,
    inter_arrival: Exp<f64>,
    target: usize,
    created: usize,
}

impl CarFactory {
    pub fn new(rate: f64, target: usize, seed: u64) -> SimResult<Self> {
        let inter_arrival = Exp::new(rate)
            .map_err(|e| SimError::InvalidConfig(format!("arrival rate {rate}: {e}")))?;
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            inter_arrival,
            target,
            created: 0,
        })
    }

    pub fn target(&self) -> usize {
        self.target
    }
}

impl Process<IntersectionState> for CarFactory {
    fn resume(&mut self, ctx: &mut Context<'_, IntersectionState>) -> SimResult<Step> {
        if self.created >= self.target {
            if self.target == 0 {
                warn!("car factory has nothing to create");
            }
            return Ok(Step::Exit(Some(self.created as f64)));
        }

        let origin = Direction::from_index(self.rng.random_range(0..4));
        let destination = Direction::from_index(origin.index() + self.rng.random_range(1..4));
        let id = create_car(ctx, origin, destination)?;
        self.created += 1;
        debug!(
            "{:8.3} (Factory) created {} ({}/{})",
            ctx.now(),
            id,
            self.created,
            self.target
        );

        if self.created >= self.target {
            return Ok(Step::Exit(Some(self.created as f64)));
        }
        Ok(Step::Timeout(self.inter_arrival.sample(&mut self.rng)))
    }
}

//! Car lifecycle for the crossroad simulation
//!
//! A car queues at its origin, enters the grid, drives to the stopline, waits
//! for a green phase and right of way, crosses and drives to its exit. Each
//! leg on the grid runs as a child [`Drive`] process that the car joins.

use log::debug;

use super::error::{SimError, SimResult};
use super::intersection::{CarRecord, IntersectionState};
use super::right_of_way;
use super::scheduler::{Context, Process, Step};
use super::types::{
    CarId, Cell, Direction, Heading, Maneuver, SimTime, CAR_SPEED, CELL_POLL_INTERVAL,
    ENTRY_POLL_INTERVAL, SETTLE_INTERVAL,
};

type Ctx<'a> = Context<'a, IntersectionState>;

/// The three waypoints every car passes after entering: stopline, middle of
/// the crossing (or left-turn pivot) and exit.
pub fn route(origin: Direction, destination: Direction) -> [Cell; 3] {
    let entry = origin.entry_cell();
    let middle = if origin.left_turn_target() == destination {
        origin.pivot_cell()
    } else {
        entry.step(origin.lane_heading(), 1)
    };
    [entry, middle, destination.exit_cell()]
}

/// Finish minus spawn time for a car that never waits for anything
pub fn route_baseline(origin: Direction, destination: Direction) -> SimTime {
    let mut from = origin.start_cell();
    let mut cells = 0;
    for waypoint in route(origin, destination) {
        cells += from.manhattan(waypoint);
        from = waypoint;
    }
    f64::from(cells) * (CAR_SPEED + SETTLE_INTERVAL)
}

fn record<'s>(state: &'s IntersectionState, id: CarId) -> SimResult<&'s CarRecord> {
    state.car(id).ok_or(SimError::UnknownCar(id))
}

fn record_mut(state: &mut IntersectionState, id: CarId) -> SimResult<&mut CarRecord> {
    state.car_mut(id).ok_or(SimError::UnknownCar(id))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrivePhase {
    /// Looking at the next cell
    Probe,
    /// Holding both the previous and the next cell while moving
    Moving { from: Cell, to: Cell },
}

/// Movement primitive: drive a car cell by cell towards a target in a
/// straight line.
///
/// Waits for the next cell to be empty, claims it, spends one travel time in
/// transit, releases the previous cell and settles briefly. Exits with the
/// arrival time.
#[derive(Debug)]
pub struct Drive {
    car: CarId,
    maneuver: Maneuver,
    target: Cell,
    phase: DrivePhase,
}

impl Drive {
    pub fn new(car: CarId, maneuver: Maneuver, target: Cell) -> Self {
        Self {
            car,
            maneuver,
            target,
            phase: DrivePhase::Probe,
        }
    }
}

impl Process<IntersectionState> for Drive {
    fn resume(&mut self, ctx: &mut Ctx<'_>) -> SimResult<Step> {
        let now = ctx.now();
        let state = ctx.world_mut();

        if let DrivePhase::Moving { from, to } = self.phase {
            state.clear(from);
            record_mut(state, self.car)?.cell = Some(to);
            self.phase = DrivePhase::Probe;
            return Ok(Step::Timeout(SETTLE_INTERVAL));
        }

        let current = record(state, self.car)?
            .cell
            .ok_or(SimError::UnknownCar(self.car))?;
        if current == self.target {
            return Ok(Step::Exit(Some(now)));
        }

        let next = current.step(Heading::towards(current, self.target), 1);
        if !state.read(next).is_empty() {
            return Ok(Step::Timeout(CELL_POLL_INTERVAL));
        }
        state.write(next, self.car, self.maneuver)?;
        self.phase = DrivePhase::Moving {
            from: current,
            to: next,
        };
        Ok(Step::Timeout(CAR_SPEED))
    }
}

/// Where a car is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarStage {
    Queued,
    PollingEntry,
    ToStopline,
    AtStopline(StoplineWait),
    Crossing,
    Exiting,
    Finished,
}

/// What a car at the stopline is currently waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoplineWait {
    /// About to look at the light and the right-of-way rules
    Evaluate,
    /// Light was not green; woke from the axis-ready event
    RedLight,
    /// Looked clear; woke from the axis-ready event and re-checks
    AxisReady,
}

/// One vehicle moving through the intersection
#[derive(Debug)]
pub struct CarProcess {
    id: CarId,
    origin: Direction,
    maneuver: Maneuver,
    targets: [Cell; 3],
    stage: CarStage,
}

impl CarProcess {
    /// Create the process for a car whose record is already in the state.
    pub fn new(record: &CarRecord) -> Self {
        Self {
            id: record.id,
            origin: record.origin,
            maneuver: record.maneuver(),
            targets: route(record.origin, record.destination),
            stage: CarStage::Queued,
        }
    }

    pub fn stage(&self) -> CarStage {
        self.stage
    }

    fn drive_to(&self, ctx: &mut Ctx<'_>, target: Cell) -> SimResult<Step> {
        let child = ctx.spawn(Box::new(Drive::new(self.id, self.maneuver, target)))?;
        Ok(Step::Join(child))
    }

    /// Hand the start cell to the next queued car, skipping this car if it
    /// is still at the head of the queue.
    fn release_next(&self, ctx: &mut Ctx<'_>) -> SimResult<()> {
        let state = ctx.world_mut();
        let next = match state.pop_queue(self.origin) {
            Some(head) if head == self.id => state.pop_queue(self.origin),
            other => other,
        };
        if let Some(next) = next {
            let admission = record(state, next)?.admission;
            ctx.succeed(admission)?;
        }
        Ok(())
    }
}

impl Process<IntersectionState> for CarProcess {
    fn resume(&mut self, ctx: &mut Ctx<'_>) -> SimResult<Step> {
        loop {
            let now = ctx.now();
            match self.stage {
                CarStage::Queued => {
                    let state = ctx.world_mut();
                    let car = record(state, self.id)?;
                    debug!(
                        "{:8.3} ({}) I live! [from: {}, to: {}]",
                        now, self.id, car.origin, car.destination
                    );
                    let admission = car.admission;
                    state.arrive(self.origin);
                    self.stage = CarStage::PollingEntry;
                    if state.queued(self.origin) > 1 {
                        return Ok(Step::Event(admission));
                    }
                }
                CarStage::PollingEntry => {
                    let start = self.origin.start_cell();
                    let state = ctx.world_mut();
                    if !state.read(start).is_empty() {
                        return Ok(Step::Timeout(ENTRY_POLL_INTERVAL));
                    }
                    state.write(start, self.id, self.maneuver)?;
                    state.leave_queue(self.origin);
                    let car = record_mut(state, self.id)?;
                    car.cell = Some(start);
                    car.progress = 1;
                    car.entered_at = Some(now);
                    self.release_next(ctx)?;

                    debug!(
                        "{:8.3} ({}) Going to crossroad line [from: {}, to: {}]",
                        now, self.id, start, self.targets[0]
                    );
                    self.stage = CarStage::ToStopline;
                    return self.drive_to(ctx, self.targets[0]);
                }
                CarStage::ToStopline => {
                    debug!("{:8.3} ({}) At crossroad line: {}", now, self.id, self.targets[0]);
                    self.stage = CarStage::AtStopline(StoplineWait::Evaluate);
                }
                CarStage::AtStopline(wait) => {
                    let state = ctx.world();
                    let car = record(state, self.id)?;
                    let green = state.is_green(self.origin);
                    let blocker = right_of_way::yield_reason(state, car);
                    let axis_ready = state.axis_ready(self.origin.axis());

                    match (wait, green, blocker) {
                        (StoplineWait::AxisReady, true, None) => {
                            let state = ctx.world_mut();
                            let light = state.light(self.origin);
                            let car = record_mut(state, self.id)?;
                            car.progress = 2;
                            car.crossed_at = Some(now);
                            car.stopline_light = Some(light);
                            self.stage = CarStage::Crossing;
                            return self.drive_to(ctx, self.targets[1]);
                        }
                        (StoplineWait::RedLight, _, _) => {
                            self.stage = CarStage::AtStopline(StoplineWait::Evaluate);
                            return Ok(Step::Timeout(CAR_SPEED));
                        }
                        (_, true, None) => {
                            self.stage = CarStage::AtStopline(StoplineWait::AxisReady);
                            return Ok(Step::Event(axis_ready));
                        }
                        (_, false, _) => {
                            self.stage = CarStage::AtStopline(StoplineWait::RedLight);
                            return Ok(Step::Event(axis_ready));
                        }
                        (_, true, Some(reason)) => {
                            debug!("{:8.3} ({}) Must wait: {:?}", now, self.id, reason);
                            self.stage = CarStage::AtStopline(StoplineWait::Evaluate);
                            return Ok(Step::Timeout(CAR_SPEED));
                        }
                    }
                }
                CarStage::Crossing => {
                    debug!(
                        "{:8.3} ({}) At the middle of the crossroad: {}",
                        now, self.id, self.targets[1]
                    );
                    ctx.world_mut().pass_lights(self.origin);
                    self.stage = CarStage::Exiting;
                    return self.drive_to(ctx, self.targets[2]);
                }
                CarStage::Exiting => {
                    let state = ctx.world_mut();
                    let car = record_mut(state, self.id)?;
                    let exit = car.cell.take().unwrap_or(self.targets[2]);
                    car.finish_time = Some(now);
                    let elapsed = now - car.spawn_time;
                    state.clear(exit);
                    debug!("{:8.3} ({}) Finish! current_pos: {}", now, self.id, exit);
                    self.stage = CarStage::Finished;
                    return Ok(Step::Exit(Some(elapsed)));
                }
                CarStage::Finished => return Ok(Step::Exit(None)),
            }
        }
    }
}

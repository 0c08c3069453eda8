//! Main simulation world that ties everything together
//!
//! A `SimWorld` is one simulation session: a scheduler, the intersection
//! state it drives, the light controller and (optionally) the car factory.

use log::info;

use super::config::SimConfig;
use super::error::SimResult;
use super::factory::{create_car, CarFactory};
use super::intersection::IntersectionState;
use super::scheduler::{Context, Process, ProcessId, Scheduler, Step};
use super::stats::{FinishedCar, Summary};
use super::traffic_light::TrafficLightController;
use super::types::{CarId, Cell, CellState, Direction, LightColor, Maneuver, SimTime, GRID_SIZE};

/// Position of one car, as a renderer needs it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarView {
    pub id: CarId,
    pub cell: Cell,
    pub maneuver: Maneuver,
}

/// Everything a renderer needs to draw one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub time: SimTime,
    pub cars: Vec<CarView>,
    /// Indexed by [`Direction::index`]
    pub lights: [LightColor; 4],
    /// Cars waiting to enter, per direction
    pub queued: [u32; 4],
}

/// Starts a single car when first resumed, then exits
struct Arrival {
    origin: Direction,
    destination: Direction,
}

impl Process<IntersectionState> for Arrival {
    fn resume(&mut self, ctx: &mut Context<'_, IntersectionState>) -> SimResult<Step> {
        create_car(ctx, self.origin, self.destination)?;
        Ok(Step::Exit(None))
    }
}

/// The main simulation world
pub struct SimWorld {
    scheduler: Scheduler<IntersectionState>,
    state: IntersectionState,
    config: SimConfig,
    factory: Option<ProcessId>,
}

impl SimWorld {
    fn new_internal(config: SimConfig, with_factory: bool) -> SimResult<Self> {
        config.validate()?;
        let mut scheduler = Scheduler::new(config.pacing);
        let axis_ready = [scheduler.new_event(), scheduler.new_event()];
        let mut state = IntersectionState::new(axis_ready);

        let factory = if with_factory {
            let factory = CarFactory::new(
                config.arrival_rate,
                config.car_count(),
                config.factory_seed(),
            )?;
            Some(scheduler.spawn(Box::new(factory), &mut state)?)
        } else {
            None
        };
        let lights = TrafficLightController::new(config.policy, config.lights_seed());
        scheduler.spawn(Box::new(lights), &mut state)?;

        Ok(Self {
            scheduler,
            state,
            config,
            factory,
        })
    }

    /// Create a session with an arrival stream and a light controller.
    pub fn new(config: SimConfig) -> SimResult<Self> {
        Self::new_internal(config, true)
    }

    /// Create a session with a light controller but no arrival stream; cars
    /// are added with [`SimWorld::spawn_car`].
    pub fn without_arrivals(config: SimConfig) -> SimResult<Self> {
        Self::new_internal(config, false)
    }

    /// Add a car at the current time.
    pub fn spawn_car(&mut self, origin: Direction, destination: Direction) -> SimResult<CarId> {
        self.scheduler.spawn(
            Box::new(Arrival {
                origin,
                destination,
            }),
            &mut self.state,
        )?;
        // The arrival ran synchronously and took the newest id
        Ok(CarId(self.state.ids.allocated()))
    }

    /// Start an extra process on this session, such as an observer that
    /// samples the state for a renderer.
    pub fn spawn_process(
        &mut self,
        body: Box<dyn Process<IntersectionState>>,
    ) -> SimResult<ProcessId> {
        self.scheduler.spawn(body, &mut self.state)
    }

    /// Run until the configured horizon.
    pub fn run(&mut self) -> SimResult<()> {
        self.run_until(self.config.horizon)?;
        info!(
            "Run finished at {:.3}: {} dispatches, {} pending, {}/{} cars finished",
            self.now(),
            self.scheduler.dispatched(),
            self.scheduler.pending(),
            self.finished_cars().len(),
            self.state.car_count()
        );
        Ok(())
    }

    pub fn run_until(&mut self, until: SimTime) -> SimResult<()> {
        self.scheduler.run(Some(until), &mut self.state)
    }

    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn state(&self) -> &IntersectionState {
        &self.state
    }

    /// Mutable access to the shared state, for setting up scenarios between
    /// runs.
    pub fn state_mut(&mut self) -> &mut IntersectionState {
        &mut self.state
    }

    pub fn scheduler(&self) -> &Scheduler<IntersectionState> {
        &self.scheduler
    }

    /// Whether the arrival stream has created all its cars
    pub fn factory_done(&self) -> bool {
        self.factory
            .is_some_and(|factory| self.scheduler.is_finished(factory))
    }

    /// Finished cars in id order
    pub fn finished_cars(&self) -> Vec<FinishedCar> {
        self.state
            .cars()
            .filter_map(FinishedCar::from_record)
            .collect()
    }

    pub fn summary(&self) -> SimResult<Summary> {
        Summary::from_records(&self.finished_cars(), self.state.car_count())
    }

    pub fn snapshot(&self) -> Snapshot {
        let cars = self
            .state
            .cars()
            .filter_map(|car| {
                car.cell.map(|cell| CarView {
                    id: car.id,
                    cell,
                    maneuver: car.maneuver(),
                })
            })
            .collect();
        Snapshot {
            time: self.now(),
            cars,
            lights: self.state.lights(),
            queued: Direction::ALL.map(|d| self.state.queued(d)),
        }
    }

    /// Print a summary of the simulation state
    pub fn print_summary(&self) {
        println!("=== Crossroad at t={:.3} ===", self.now());
        println!(
            "Policy: {}, rate: {}, seed: {}",
            self.config.policy.name(),
            self.config.arrival_rate,
            self.config.seed
        );
        println!(
            "Cars: {} created, {} finished",
            self.state.car_count(),
            self.finished_cars().len()
        );
        println!("--- Approaches ---");
        for direction in Direction::ALL {
            println!(
                "  {}: light={:?}, queued={}, before lights={}",
                direction,
                self.state.light(direction),
                self.state.queued(direction),
                self.state.before_lights(direction)
            );
        }
        match self.summary() {
            Ok(summary) => println!("--- Travel times ---\n  {summary}"),
            Err(e) => println!("--- Travel times ---\n  {e}"),
        }
    }

    /// Draw the intersection grid in the terminal
    pub fn draw_map(&self) {
        let size = GRID_SIZE as usize;
        let mut grid = vec![vec![String::from(" . "); size]; size];

        for row in 0..GRID_SIZE {
            for col in 0..GRID_SIZE {
                let cell = Cell::new(row, col);
                if let CellState::Occupied { car, maneuver } = self.state.read(cell) {
                    let marker = if maneuver == Maneuver::Left { 'L' } else { ' ' };
                    grid[row as usize][col as usize] = format!("{:02}{}", car.0 % 100, marker);
                }
            }
        }

        // Light heads sit beside each stopline, outside the lanes
        for direction in Direction::ALL {
            let entry = direction.entry_cell();
            let (d_row, d_col) = direction.left_diagonal();
            let head = entry.offset(-d_row, -d_col);
            if head.in_bounds() && self.state.read(head).is_empty() {
                let letter = self.state.light(direction).letter();
                grid[head.row as usize][head.col as usize] = format!("[{letter}]");
            }
        }

        println!("\n=== Crossroad Map (t={:.3}) ===", self.now());
        println!("Legend: NN=car id, L=turning left, [r]/[o]/[g]=light");
        println!();
        for row in &grid {
            println!("{}", row.concat());
        }
        println!();
    }
}

//! Shared state of the intersection
//!
//! Grid occupancy, per-direction queues and counters, light colours and the
//! per-axis ready events. There is no internal locking: processes mutate this
//! between suspension points only, and must re-check anything they read
//! before their last suspension.

use std::collections::{BTreeMap, VecDeque};

use super::error::{SimError, SimResult};
use super::scheduler::EventId;
use super::types::{
    Axis, Cell, CellState, CarId, Direction, IdAllocator, LightColor, Maneuver, SimTime, GRID_SIZE,
};

/// Everything the simulation knows about one car
#[derive(Debug, Clone)]
pub struct CarRecord {
    pub id: CarId,
    pub origin: Direction,
    pub destination: Direction,
    pub turning_left: bool,
    /// 0 queued, 1 entered the grid, 2 passed the stopline
    pub progress: u8,
    /// Cell the car currently holds, once it has entered
    pub cell: Option<Cell>,
    pub spawn_time: SimTime,
    pub entered_at: Option<SimTime>,
    /// When the car left the stopline for the crossing
    pub crossed_at: Option<SimTime>,
    /// Light shown to this car's direction when it left the stopline
    pub stopline_light: Option<LightColor>,
    pub finish_time: Option<SimTime>,
    /// Fired when the car is allowed to try the start cell
    pub admission: EventId,
}

impl CarRecord {
    pub fn new(
        id: CarId,
        origin: Direction,
        destination: Direction,
        spawn_time: SimTime,
        admission: EventId,
    ) -> Self {
        Self {
            id,
            origin,
            destination,
            turning_left: origin.left_turn_target() == destination,
            progress: 0,
            cell: None,
            spawn_time,
            entered_at: None,
            crossed_at: None,
            stopline_light: None,
            finish_time: None,
            admission,
        }
    }

    pub fn maneuver(&self) -> Maneuver {
        if self.turning_left {
            Maneuver::Left
        } else {
            Maneuver::Through
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finish_time.is_some()
    }
}

/// Grid, counters, queues and lights for one crossroad
#[derive(Debug)]
pub struct IntersectionState {
    grid: Vec<CellState>,
    cars: BTreeMap<CarId, CarRecord>,
    spawn_queues: [VecDeque<CarId>; 4],
    queued: [u32; 4],
    before_lights: [u32; 4],
    lights: [LightColor; 4],
    axis_ready: [EventId; 2],
    /// Car ids for this session
    pub ids: IdAllocator,
}

impl IntersectionState {
    /// Create an empty intersection with every light red.
    ///
    /// `axis_ready` holds the unfired ready events for the N/S and E/W axes.
    pub fn new(axis_ready: [EventId; 2]) -> Self {
        Self {
            grid: vec![CellState::Empty; (GRID_SIZE * GRID_SIZE) as usize],
            cars: BTreeMap::new(),
            spawn_queues: Default::default(),
            queued: [0; 4],
            before_lights: [0; 4],
            lights: [LightColor::Red; 4],
            axis_ready,
            ids: IdAllocator::new(),
        }
    }

    fn index(cell: Cell) -> Option<usize> {
        cell.in_bounds()
            .then(|| (cell.row * GRID_SIZE + cell.col) as usize)
    }

    /// Read a cell. Cells outside the grid read as empty.
    pub fn read(&self, cell: Cell) -> CellState {
        Self::index(cell).map_or(CellState::Empty, |i| self.grid[i])
    }

    /// Claim an empty cell for a car.
    pub fn write(&mut self, cell: Cell, car: CarId, maneuver: Maneuver) -> SimResult<()> {
        let i = Self::index(cell).ok_or(SimError::OutOfGrid(cell))?;
        let occupant = self.grid[i];
        if !occupant.is_empty() {
            return Err(SimError::InvariantViolation { cell, occupant });
        }
        self.grid[i] = CellState::Occupied { car, maneuver };
        Ok(())
    }

    pub fn clear(&mut self, cell: Cell) {
        if let Some(i) = Self::index(cell) {
            self.grid[i] = CellState::Empty;
        }
    }

    pub fn occupied_cells(&self) -> usize {
        self.grid.iter().filter(|c| !c.is_empty()).count()
    }

    // --- cars ---

    pub fn add_car(&mut self, record: CarRecord) {
        self.cars.insert(record.id, record);
    }

    pub fn car(&self, id: CarId) -> Option<&CarRecord> {
        self.cars.get(&id)
    }

    pub fn car_mut(&mut self, id: CarId) -> Option<&mut CarRecord> {
        self.cars.get_mut(&id)
    }

    /// All cars in id order
    pub fn cars(&self) -> impl Iterator<Item = &CarRecord> {
        self.cars.values()
    }

    pub fn car_count(&self) -> usize {
        self.cars.len()
    }

    // --- queues and counters ---

    pub fn enqueue(&mut self, direction: Direction, car: CarId) {
        self.spawn_queues[direction.index()].push_back(car);
    }

    pub fn queue_len(&self, direction: Direction) -> usize {
        self.spawn_queues[direction.index()].len()
    }

    pub fn pop_queue(&mut self, direction: Direction) -> Option<CarId> {
        self.spawn_queues[direction.index()].pop_front()
    }

    pub fn queued(&self, direction: Direction) -> u32 {
        self.queued[direction.index()]
    }

    pub fn before_lights(&self, direction: Direction) -> u32 {
        self.before_lights[direction.index()]
    }

    /// Cars between spawn and the middle of the crossing on both approaches
    pub fn before_lights_on(&self, axis: Axis) -> u32 {
        axis.directions()
            .iter()
            .map(|d| self.before_lights(*d))
            .sum()
    }

    pub fn set_before_lights(&mut self, direction: Direction, count: u32) {
        self.before_lights[direction.index()] = count;
    }

    pub fn arrive(&mut self, direction: Direction) {
        self.queued[direction.index()] += 1;
        self.before_lights[direction.index()] += 1;
    }

    pub fn leave_queue(&mut self, direction: Direction) {
        let count = &mut self.queued[direction.index()];
        *count = count.saturating_sub(1);
    }

    pub fn pass_lights(&mut self, direction: Direction) {
        let count = &mut self.before_lights[direction.index()];
        *count = count.saturating_sub(1);
    }

    // --- lights ---

    pub fn light(&self, direction: Direction) -> LightColor {
        self.lights[direction.index()]
    }

    pub fn lights(&self) -> [LightColor; 4] {
        self.lights
    }

    pub fn is_green(&self, direction: Direction) -> bool {
        self.light(direction) == LightColor::Green
    }

    pub fn set_light(&mut self, direction: Direction, color: LightColor) {
        self.lights[direction.index()] = color;
    }

    pub fn axis_ready(&self, axis: Axis) -> EventId {
        self.axis_ready[axis.index()]
    }

    pub fn replace_axis_ready(&mut self, axis: Axis, event: EventId) {
        self.axis_ready[axis.index()] = event;
    }

    /// Axes showing green on at least one of their directions
    pub fn green_axes(&self) -> Vec<Axis> {
        Axis::BOTH
            .into_iter()
            .filter(|axis| axis.directions().iter().any(|d| self.is_green(*d)))
            .collect()
    }
}

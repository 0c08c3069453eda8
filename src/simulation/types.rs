//! Core types for the crossroad simulation
//!
//! Directions, grid cells, waypoint tables and timing constants shared by
//! every process in the simulation.

use std::fmt;

/// Side length of the square intersection grid
pub const GRID_SIZE: i32 = 12;

/// Time a car needs to move from one cell into the next
pub const CAR_SPEED: f64 = 0.4;

/// Interval between checks of an occupied start cell
pub const ENTRY_POLL_INTERVAL: f64 = CAR_SPEED / 2.0;

/// Interval between checks of an occupied next cell while driving
pub const CELL_POLL_INTERVAL: f64 = CAR_SPEED / 6.0;

/// Pause after vacating a cell before probing the next one
pub const SETTLE_INTERVAL: f64 = CAR_SPEED / 20.0;

/// How long lights stay orange between red and green
pub const ORANGE_CLEARANCE: f64 = 1.2;

/// Simulated time, in abstract time units
pub type SimTime = f64;

/// A unique identifier for a car, allocated per simulation session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CarId(pub usize);

impl fmt::Display for CarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Car:{:02}", self.0)
    }
}

/// Hands out car ids for one simulation session
///
/// Owned by the session and passed by reference to whoever creates cars, so
/// two sessions in the same process never share a counter.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: usize,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_car_id(&mut self) -> CarId {
        let id = CarId(self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far
    pub fn allocated(&self) -> usize {
        self.next - 1
    }
}

/// One of the four approaches to the intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }

    pub fn from_index(index: usize) -> Direction {
        Self::ALL[index % 4]
    }

    pub fn opposite(self) -> Direction {
        Self::from_index(self.index() + 2)
    }

    /// The signal axis this approach belongs to
    pub fn axis(self) -> Axis {
        match self {
            Direction::North | Direction::South => Axis::NorthSouth,
            Direction::East | Direction::West => Axis::EastWest,
        }
    }

    /// Destination reached by turning left from this approach
    pub fn left_turn_target(self) -> Direction {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }

    /// Cell where cars coming from this direction appear
    pub fn start_cell(self) -> Cell {
        match self {
            Direction::North => Cell::new(0, 5),
            Direction::East => Cell::new(5, 11),
            Direction::South => Cell::new(11, 6),
            Direction::West => Cell::new(6, 0),
        }
    }

    /// Cell where cars heading to this direction leave the grid
    pub fn exit_cell(self) -> Cell {
        match self {
            Direction::North => Cell::new(0, 6),
            Direction::East => Cell::new(6, 11),
            Direction::South => Cell::new(11, 5),
            Direction::West => Cell::new(5, 0),
        }
    }

    /// Stopline cell in front of the crossing area
    pub fn entry_cell(self) -> Cell {
        match self {
            Direction::North => Cell::new(4, 5),
            Direction::East => Cell::new(5, 7),
            Direction::South => Cell::new(7, 6),
            Direction::West => Cell::new(6, 4),
        }
    }

    /// Interior waypoint a left-turning car routes through
    pub fn pivot_cell(self) -> Cell {
        match self {
            Direction::North => Cell::new(6, 5),
            Direction::East => Cell::new(5, 5),
            Direction::South => Cell::new(5, 6),
            Direction::West => Cell::new(6, 6),
        }
    }

    /// Offset from the stopline to the cell diagonally on the driver's left
    pub fn left_diagonal(self) -> (i32, i32) {
        match self {
            Direction::North => (1, 1),
            Direction::East => (1, -1),
            Direction::South => (-1, -1),
            Direction::West => (-1, 1),
        }
    }

    /// Unit step of travel along this approach's inbound lane
    pub fn lane_heading(self) -> Heading {
        Heading::towards(self.start_cell(), self.entry_cell())
    }

    pub fn letter(self) -> char {
        match self {
            Direction::North => 'N',
            Direction::East => 'E',
            Direction::South => 'S',
            Direction::West => 'W',
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// A pair of opposing directions sharing one signal phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Axis {
    NorthSouth,
    EastWest,
}

impl Axis {
    pub const BOTH: [Axis; 2] = [Axis::NorthSouth, Axis::EastWest];

    pub fn index(self) -> usize {
        match self {
            Axis::NorthSouth => 0,
            Axis::EastWest => 1,
        }
    }

    pub fn from_index(index: usize) -> Axis {
        Self::BOTH[index % 2]
    }

    pub fn other(self) -> Axis {
        match self {
            Axis::NorthSouth => Axis::EastWest,
            Axis::EastWest => Axis::NorthSouth,
        }
    }

    pub fn directions(self) -> [Direction; 2] {
        match self {
            Axis::NorthSouth => [Direction::North, Direction::South],
            Axis::EastWest => [Direction::East, Direction::West],
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::NorthSouth => write!(f, "N/S"),
            Axis::EastWest => write!(f, "E/W"),
        }
    }
}

/// A position on the intersection grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cell {
    pub row: i32,
    pub col: i32,
}

impl Cell {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn offset(self, d_row: i32, d_col: i32) -> Cell {
        Cell::new(self.row + d_row, self.col + d_col)
    }

    pub fn step(self, heading: Heading, times: i32) -> Cell {
        self.offset(heading.d_row * times, heading.d_col * times)
    }

    pub fn in_bounds(self) -> bool {
        (0..GRID_SIZE).contains(&self.row) && (0..GRID_SIZE).contains(&self.col)
    }

    /// Number of unit steps between two cells sharing a row or column
    pub fn manhattan(self, other: Cell) -> u32 {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.row, self.col)
    }
}

/// A unit step along one grid axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heading {
    pub d_row: i32,
    pub d_col: i32,
}

impl Heading {
    /// Step from `from` towards `to`.
    ///
    /// Moves along rows when both cells share a column, otherwise along
    /// columns. Routes are built from waypoints that always share a row or a
    /// column with the previous one.
    pub fn towards(from: Cell, to: Cell) -> Heading {
        let (d_row, d_col) = if from.col == to.col { (1, 0) } else { (0, 1) };
        let sign = if from.row > to.row || from.col > to.col {
            -1
        } else {
            1
        };
        Heading {
            d_row: d_row * sign,
            d_col: d_col * sign,
        }
    }
}

/// How a car is moving through the crossing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Maneuver {
    /// Straight ahead or turning right
    Through,
    /// Turning left across oncoming traffic
    Left,
}

/// State of a single grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellState {
    #[default]
    Empty,
    Occupied { car: CarId, maneuver: Maneuver },
}

impl CellState {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellState::Empty)
    }

    pub fn occupant(&self) -> Option<(CarId, Maneuver)> {
        match *self {
            CellState::Empty => None,
            CellState::Occupied { car, maneuver } => Some((car, maneuver)),
        }
    }
}

/// Colour shown by one direction's signal head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightColor {
    Red,
    Orange,
    Green,
}

impl LightColor {
    pub fn letter(self) -> char {
        match self {
            LightColor::Red => 'r',
            LightColor::Orange => 'o',
            LightColor::Green => 'g',
        }
    }
}

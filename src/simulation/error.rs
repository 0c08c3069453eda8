//! Error type for the simulation core.
//!
//! None of these are transient: the core does no I/O, so every error is a
//! deterministic consequence of configuration, seed and coordination logic.

use thiserror::Error;

use super::scheduler::{EventId, ProcessId};
use super::types::{CarId, Cell, CellState};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("invalid timeout duration {0}")]
    InvalidDuration(f64),

    #[error("event {0} has already been triggered")]
    AlreadyTriggered(EventId),

    #[error("cell {cell} is not empty (holds {occupant:?})")]
    InvariantViolation { cell: Cell, occupant: CellState },

    #[error("cell {0} is outside the grid")]
    OutOfGrid(Cell),

    #[error("no finished cars to compute statistics over")]
    EmptyStatistics,

    #[error("unknown car {0}")]
    UnknownCar(CarId),

    #[error("unknown process {0}")]
    UnknownProcess(ProcessId),

    #[error("unknown event {0}")]
    UnknownEvent(EventId),

    #[error("configuration error: {0}")]
    InvalidConfig(String),
}

/// Shorthand result type for the simulation core.
pub type SimResult<T> = Result<T, SimError>;

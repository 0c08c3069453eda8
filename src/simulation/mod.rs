//! Crossroad simulation core
//!
//! A discrete-event scheduler and the signal-controlled intersection built on
//! top of it. Everything here is single-threaded and deterministic for a given
//! configuration and seed.

mod car;
mod config;
mod error;
mod factory;
mod intersection;
mod right_of_way;
mod scheduler;
mod stats;
mod traffic_light;
mod types;
mod world;

pub use car::{route, route_baseline, CarProcess, CarStage, Drive, StoplineWait};
pub use config::SimConfig;
pub use error::{SimError, SimResult};
pub use factory::{create_car, target_car_count, CarFactory, DEFAULT_CAR_FRACTION};
pub use intersection::{CarRecord, IntersectionState};
pub use right_of_way::{is_free_to_go, yield_reason, YieldReason};
pub use scheduler::{
    Context, EventId, ExitValue, PacingStrategy, Process, ProcessId, Scheduler, Step,
};
pub use stats::{FinishedCar, Summary};
pub use traffic_light::{
    count_preference, mean_waits, wait_time_preference, LightPolicy, TrafficLightController,
    ADAPTIVE_DWELL, COUNT_IMBALANCE_THRESHOLD, COUNT_RECHECK, RANDOM_DWELL, STATIC_DWELL,
    WAIT_TIME_RECHECK, WAIT_TIME_SWITCH_RATIO,
};
pub use types::{
    Axis, CarId, Cell, CellState, Direction, Heading, IdAllocator, LightColor, Maneuver, SimTime,
    CAR_SPEED, CELL_POLL_INTERVAL, ENTRY_POLL_INTERVAL, GRID_SIZE, ORANGE_CLEARANCE,
    SETTLE_INTERVAL,
};
pub use world::{CarView, SimWorld, Snapshot};

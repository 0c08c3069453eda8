//! Right-of-way rules inside a granted green phase
//!
//! Checked by a car waiting at its stopline, on top of the signal: a green
//! light lets the car go only if nobody with priority is in its way.

use super::intersection::{CarRecord, IntersectionState};
use super::types::{Cell, CarId, CellState, Maneuver};

/// Why a car at the stopline has to keep waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldReason {
    /// A through car is in the oncoming entry lane
    OncomingTraffic(Cell),
    /// The cell two steps ahead in the car's own lane is taken
    BlockedAhead(Cell),
    /// A left-turning car sits diagonally on the left
    LeftTurnerOnLeft(CarId),
    /// A through car on the left is heading across this car's path
    CrossingTraffic(CarId),
}

/// Decide whether `car`, standing at its stopline, must yield.
///
/// Returns `None` when the car may enter the crossing.
pub fn yield_reason(state: &IntersectionState, car: &CarRecord) -> Option<YieldReason> {
    let position = car.cell?;
    if car.turning_left {
        left_turn_yield(state, car, position)
    } else {
        through_yield(state, car, position)
    }
}

pub fn is_free_to_go(state: &IntersectionState, car: &CarRecord) -> bool {
    yield_reason(state, car).is_none()
}

fn left_turn_yield(state: &IntersectionState, car: &CarRecord, position: Cell) -> Option<YieldReason> {
    let oncoming = car.origin.opposite();
    let entry = oncoming.entry_cell();
    let beyond = entry.step(oncoming.lane_heading(), 1);
    for cell in [entry, beyond] {
        if let CellState::Occupied {
            maneuver: Maneuver::Through,
            ..
        } = state.read(cell)
        {
            return Some(YieldReason::OncomingTraffic(cell));
        }
    }

    let ahead = position.step(car.origin.lane_heading(), 2);
    if !state.read(ahead).is_empty() {
        return Some(YieldReason::BlockedAhead(ahead));
    }
    None
}

fn through_yield(state: &IntersectionState, car: &CarRecord, position: Cell) -> Option<YieldReason> {
    let (d_row, d_col) = car.origin.left_diagonal();
    let (other, maneuver) = state.read(position.offset(d_row, d_col)).occupant()?;
    match maneuver {
        Maneuver::Left => Some(YieldReason::LeftTurnerOnLeft(other)),
        Maneuver::Through => {
            let parallel = state
                .car(other)
                .is_some_and(|o| o.destination.axis() == car.destination.axis());
            (!parallel).then_some(YieldReason::CrossingTraffic(other))
        }
    }
}

//! Crossroad Simulation Library
//!
//! Discrete-event simulation of a signal-controlled four-way intersection.

pub mod simulation;

//! Run configuration

use super::error::{SimError, SimResult};
use super::factory::{target_car_count, DEFAULT_CAR_FRACTION};
use super::scheduler::PacingStrategy;
use super::traffic_light::LightPolicy;
use super::types::SimTime;

/// Mixed into the session seed for the light controller's random stream
const LIGHTS_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Everything needed to set up one simulation session
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub policy: LightPolicy,
    /// Mean arrivals per time unit
    pub arrival_rate: f64,
    pub horizon: SimTime,
    pub seed: u64,
    pub pacing: PacingStrategy,
    /// Share of `arrival_rate * horizon` cars the factory creates
    pub car_fraction: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            policy: LightPolicy::default(),
            arrival_rate: 2.0,
            horizon: 40.0,
            seed: 42,
            pacing: PacingStrategy::Unthrottled,
            car_fraction: DEFAULT_CAR_FRACTION,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> SimResult<()> {
        if !(self.arrival_rate > 0.0 && self.arrival_rate.is_finite()) {
            return Err(SimError::InvalidConfig(format!(
                "arrival rate must be positive, got {}",
                self.arrival_rate
            )));
        }
        if !(self.horizon > 0.0 && self.horizon.is_finite()) {
            return Err(SimError::InvalidConfig(format!(
                "horizon must be positive, got {}",
                self.horizon
            )));
        }
        if !(0.0..=1.0).contains(&self.car_fraction) {
            return Err(SimError::InvalidConfig(format!(
                "car fraction must be within [0, 1], got {}",
                self.car_fraction
            )));
        }
        if let PacingStrategy::RealtimePaced { factor } = self.pacing {
            if !(factor > 0.0 && factor.is_finite()) {
                return Err(SimError::InvalidConfig(format!(
                    "real-time factor must be positive, got {factor}"
                )));
            }
        }
        Ok(())
    }

    /// Number of cars the factory will create
    pub fn car_count(&self) -> usize {
        target_car_count(self.arrival_rate, self.horizon, self.car_fraction)
    }

    pub fn factory_seed(&self) -> u64 {
        self.seed
    }

    pub fn lights_seed(&self) -> u64 {
        self.seed ^ LIGHTS_SEED_SALT
    }
}

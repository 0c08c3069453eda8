//! Statistics over finished cars

use std::fmt;

use super::car::route_baseline;
use super::error::{SimError, SimResult};
use super::intersection::CarRecord;
use super::types::{CarId, Direction, SimTime};

/// A car that reached its exit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinishedCar {
    pub id: CarId,
    pub origin: Direction,
    pub destination: Direction,
    pub spawn_time: SimTime,
    pub finish_time: SimTime,
}

impl FinishedCar {
    pub fn from_record(record: &CarRecord) -> Option<Self> {
        record.finish_time.map(|finish_time| Self {
            id: record.id,
            origin: record.origin,
            destination: record.destination,
            spawn_time: record.spawn_time,
            finish_time,
        })
    }

    pub fn travel_time(&self) -> SimTime {
        self.finish_time - self.spawn_time
    }

    /// Time lost to queues, lights and yielding
    pub fn delay(&self) -> SimTime {
        self.travel_time() - route_baseline(self.origin, self.destination)
    }
}

/// Aggregate travel times of the finished cars of one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub mean: SimTime,
    /// Population standard deviation
    pub std: SimTime,
    pub min: SimTime,
    pub max: SimTime,
    pub mean_delay: SimTime,
    pub finished: usize,
    pub created: usize,
}

impl Summary {
    pub fn from_records(records: &[FinishedCar], created: usize) -> SimResult<Self> {
        if records.is_empty() {
            return Err(SimError::EmptyStatistics);
        }
        let n = records.len() as f64;
        let times: Vec<SimTime> = records.iter().map(FinishedCar::travel_time).collect();
        let mean = times.iter().sum::<f64>() / n;
        let variance = times.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean_delay = records.iter().map(FinishedCar::delay).sum::<f64>() / n;

        Ok(Self {
            mean,
            std: variance.sqrt(),
            min,
            max,
            mean_delay,
            finished: records.len(),
            created: created.max(records.len()),
        })
    }

    pub fn finished_fraction(&self) -> f64 {
        self.finished as f64 / self.created as f64
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mean: {:.3}, std: {:.3}, min: {:.3}, max: {:.3}, delay: {:.3}, finished: {}/{} ({:.1}%)",
            self.mean,
            self.std,
            self.min,
            self.max,
            self.mean_delay,
            self.finished,
            self.created,
            self.finished_fraction() * 100.0
        )
    }
}

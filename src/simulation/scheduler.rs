//! Discrete-event scheduler
//!
//! A virtual clock plus a queue of pending process resumptions. Processes are
//! explicit state machines: every call to [`Process::resume`] runs the body up
//! to its next suspension point and reports what it is waiting for as a
//! [`Step`]. Only one body runs at a time and nothing preempts it, so shared
//! world state needs no locks. A body must still re-read anything it observed
//! before its last suspension, since other processes may have run meanwhile.
//!
//! Resumptions are ordered by `(time, scheduling sequence)`; entries for the
//! same timestamp dispatch in the order they were scheduled, which is what
//! makes seeded runs reproducible.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::time::{Duration, Instant};

use log::trace;
use ordered_float::OrderedFloat;

use super::error::{SimError, SimResult};
use super::types::SimTime;

/// Handle to a one-shot event owned by a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(usize);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event#{}", self.0)
    }
}

/// Handle to a process registered with a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(usize);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Process#{}", self.0)
    }
}

/// Value a finished process hands to the processes joining it
pub type ExitValue = Option<f64>;

/// What a process waits for after a call to [`Process::resume`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Resume after the given simulated duration. Zero still yields once.
    Timeout(SimTime),
    /// Resume when the event fires, or right away if it already has.
    Event(EventId),
    /// Resume when the child process exits.
    Join(ProcessId),
    /// The process is finished.
    Exit(ExitValue),
}

/// A suspendable computation driven by the scheduler
pub trait Process<W> {
    /// Run until the next suspension point.
    fn resume(&mut self, ctx: &mut Context<'_, W>) -> SimResult<Step>;
}

/// How dispatch relates to wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PacingStrategy {
    /// Dispatch as fast as possible.
    #[default]
    Unthrottled,
    /// Keep simulated time in step with the wall clock: `factor` simulated
    /// time units elapse per wall-clock second.
    RealtimePaced { factor: f64 },
}

impl PacingStrategy {
    /// Wall-clock offset from the start of a run at which a resumption
    /// `sim_elapsed` units into the run may dispatch.
    pub fn wall_offset(&self, sim_elapsed: SimTime) -> Option<Duration> {
        match *self {
            PacingStrategy::Unthrottled => None,
            PacingStrategy::RealtimePaced { factor } => {
                Duration::try_from_secs_f64((sim_elapsed / factor).max(0.0)).ok()
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Scheduled {
    at: OrderedFloat<SimTime>,
    seq: u64,
    process: ProcessId,
}

#[derive(Debug, Default)]
struct EventSlot {
    fired: bool,
    waiters: Vec<ProcessId>,
}

struct ProcessSlot<W> {
    /// `None` while the body is running or after it exited
    body: Option<Box<dyn Process<W>>>,
    completion: EventId,
    exit: Option<ExitValue>,
    joining: Option<ProcessId>,
}

/// Virtual clock, event table and cooperative process runner
pub struct Scheduler<W> {
    now: SimTime,
    next_seq: u64,
    queue: BinaryHeap<Reverse<Scheduled>>,
    events: Vec<EventSlot>,
    processes: Vec<ProcessSlot<W>>,
    pacing: PacingStrategy,
    dispatched: u64,
}

impl<W> Default for Scheduler<W> {
    fn default() -> Self {
        Self::new(PacingStrategy::Unthrottled)
    }
}

impl<W> Scheduler<W> {
    pub fn new(pacing: PacingStrategy) -> Self {
        Self {
            now: 0.0,
            next_seq: 0,
            queue: BinaryHeap::new(),
            events: Vec::new(),
            processes: Vec::new(),
            pacing,
            dispatched: 0,
        }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn pacing(&self) -> PacingStrategy {
        self.pacing
    }

    /// Number of resumptions dispatched so far
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Number of resumptions waiting in the queue
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn new_event(&mut self) -> EventId {
        self.events.push(EventSlot::default());
        EventId(self.events.len() - 1)
    }

    pub fn is_triggered(&self, event: EventId) -> SimResult<bool> {
        self.events
            .get(event.0)
            .map(|slot| slot.fired)
            .ok_or(SimError::UnknownEvent(event))
    }

    /// Fire an event, waking its waiters in registration order.
    pub fn succeed(&mut self, event: EventId) -> SimResult<()> {
        let slot = self
            .events
            .get_mut(event.0)
            .ok_or(SimError::UnknownEvent(event))?;
        if slot.fired {
            return Err(SimError::AlreadyTriggered(event));
        }
        slot.fired = true;
        let waiters = std::mem::take(&mut slot.waiters);
        trace!("{:8.3} {} fired, waking {}", self.now, event, waiters.len());
        for process in waiters {
            self.schedule(self.now, process);
        }
        Ok(())
    }

    /// Register a process and run it until its first suspension.
    pub fn spawn(&mut self, body: Box<dyn Process<W>>, world: &mut W) -> SimResult<ProcessId> {
        let completion = self.new_event();
        let id = ProcessId(self.processes.len());
        self.processes.push(ProcessSlot {
            body: Some(body),
            completion,
            exit: None,
            joining: None,
        });
        self.step(id, world)?;
        Ok(id)
    }

    pub fn is_finished(&self, process: ProcessId) -> bool {
        self.processes
            .get(process.0)
            .is_some_and(|slot| slot.exit.is_some())
    }

    /// The exit value of a finished process
    pub fn exit_value(&self, process: ProcessId) -> Option<ExitValue> {
        self.processes.get(process.0).and_then(|slot| slot.exit)
    }

    /// Dispatch resumptions in `(time, sequence)` order until the queue is
    /// empty or the next resumption is at or beyond `until`.
    ///
    /// The clock ends at `until` when one is given. Any process error aborts
    /// the run and is returned unchanged.
    pub fn run(&mut self, until: Option<SimTime>, world: &mut W) -> SimResult<()> {
        if let Some(limit) = until {
            if limit < self.now {
                return Err(SimError::InvalidDuration(limit - self.now));
            }
        }

        let wall_start = Instant::now();
        let sim_start = self.now;

        loop {
            let Some(Reverse(next)) = self.queue.peek() else {
                break;
            };
            let at = next.at.into_inner();
            if until.is_some_and(|limit| at >= limit) {
                break;
            }
            let Some(Reverse(item)) = self.queue.pop() else {
                break;
            };

            if let Some(offset) = self.pacing.wall_offset(at - sim_start) {
                let deadline = wall_start + offset;
                let wall_now = Instant::now();
                if deadline > wall_now {
                    std::thread::sleep(deadline - wall_now);
                }
            }

            self.now = at;
            self.dispatched += 1;
            trace!("{:8.3} dispatch {} (seq {})", at, item.process, item.seq);
            self.step(item.process, world)?;
        }

        if let Some(limit) = until {
            self.now = self.now.max(limit);
        }
        Ok(())
    }

    fn schedule(&mut self, at: SimTime, process: ProcessId) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Scheduled {
            at: OrderedFloat(at),
            seq,
            process,
        }));
    }

    fn wait_on(&mut self, event: EventId, process: ProcessId) -> SimResult<()> {
        let slot = self
            .events
            .get_mut(event.0)
            .ok_or(SimError::UnknownEvent(event))?;
        if slot.fired {
            self.schedule(self.now, process);
        } else {
            slot.waiters.push(process);
        }
        Ok(())
    }

    fn step(&mut self, id: ProcessId, world: &mut W) -> SimResult<()> {
        let slot = self
            .processes
            .get_mut(id.0)
            .ok_or(SimError::UnknownProcess(id))?;
        let Some(mut body) = slot.body.take() else {
            return Ok(());
        };
        let joining = slot.joining.take();
        let joined = joining
            .and_then(|child| self.exit_value(child))
            .flatten();

        let step = {
            let mut ctx = Context {
                scheduler: self,
                world,
                current: id,
                joined,
            };
            body.resume(&mut ctx)?
        };

        match step {
            Step::Timeout(duration) => {
                if !(duration >= 0.0 && duration.is_finite()) {
                    return Err(SimError::InvalidDuration(duration));
                }
                self.processes[id.0].body = Some(body);
                self.schedule(self.now + duration, id);
            }
            Step::Event(event) => {
                self.processes[id.0].body = Some(body);
                self.wait_on(event, id)?;
            }
            Step::Join(child) => {
                let completion = self
                    .processes
                    .get(child.0)
                    .map(|slot| slot.completion)
                    .ok_or(SimError::UnknownProcess(child))?;
                let slot = &mut self.processes[id.0];
                slot.body = Some(body);
                slot.joining = Some(child);
                self.wait_on(completion, id)?;
            }
            Step::Exit(value) => {
                let slot = &mut self.processes[id.0];
                slot.exit = Some(value);
                let completion = slot.completion;
                self.succeed(completion)?;
            }
        }
        Ok(())
    }
}

/// What a running process body can see and do
pub struct Context<'a, W> {
    scheduler: &'a mut Scheduler<W>,
    world: &'a mut W,
    current: ProcessId,
    joined: ExitValue,
}

impl<W> Context<'_, W> {
    pub fn now(&self) -> SimTime {
        self.scheduler.now
    }

    /// The process being resumed
    pub fn current(&self) -> ProcessId {
        self.current
    }

    pub fn world(&self) -> &W {
        &*self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut *self.world
    }

    pub fn new_event(&mut self) -> EventId {
        self.scheduler.new_event()
    }

    pub fn succeed(&mut self, event: EventId) -> SimResult<()> {
        self.scheduler.succeed(event)
    }

    pub fn is_triggered(&self, event: EventId) -> SimResult<bool> {
        self.scheduler.is_triggered(event)
    }

    /// Start a child process; it runs until its first suspension before this
    /// call returns.
    pub fn spawn(&mut self, body: Box<dyn Process<W>>) -> SimResult<ProcessId> {
        self.scheduler.spawn(body, &mut *self.world)
    }

    /// Exit value of the child whose completion woke this process
    pub fn joined(&self) -> ExitValue {
        self.joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ticker {
        label: char,
        remaining: u32,
        period: f64,
    }

    impl Process<Vec<(char, f64)>> for Ticker {
        fn resume(&mut self, ctx: &mut Context<'_, Vec<(char, f64)>>) -> SimResult<Step> {
            let now = ctx.now();
            ctx.world_mut().push((self.label, now));
            if self.remaining == 0 {
                return Ok(Step::Exit(None));
            }
            self.remaining -= 1;
            Ok(Step::Timeout(self.period))
        }
    }

    #[test]
    fn equal_timestamps_dispatch_in_scheduling_order() {
        let mut log = Vec::new();
        let mut sched = Scheduler::default();
        for label in ['a', 'b', 'c'] {
            let ticker = Ticker {
                label,
                remaining: 2,
                period: 1.0,
            };
            sched.spawn(Box::new(ticker), &mut log).unwrap();
        }
        sched.run(None, &mut log).unwrap();
        let labels: String = log.iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, "abcabcabc");
        assert_eq!(sched.now(), 2.0);
    }

    #[test]
    fn run_until_leaves_clock_at_horizon() {
        let mut log = Vec::new();
        let mut sched = Scheduler::default();
        let ticker = Ticker {
            label: 't',
            remaining: 100,
            period: 1.0,
        };
        sched.spawn(Box::new(ticker), &mut log).unwrap();
        sched.run(Some(3.5), &mut log).unwrap();
        assert_eq!(log.len(), 4);
        assert_eq!(sched.now(), 3.5);
        assert_eq!(sched.pending(), 1);
    }

    #[test]
    fn realtime_pacing_scales_wall_offset() {
        let pacing = PacingStrategy::RealtimePaced { factor: 4.0 };
        assert_eq!(pacing.wall_offset(2.0), Some(Duration::from_millis(500)));
        assert_eq!(PacingStrategy::Unthrottled.wall_offset(2.0), None);
    }
}

//! Scheduler contract tests
//!
//! Ordering, events, joins and error cases of the discrete-event scheduler,
//! driven with small scripted processes over a plain log.

use std::time::{Duration, Instant};

use crossroad_sim::simulation::{
    Context, EventId, PacingStrategy, Process, ProcessId, Scheduler, SimError, SimResult, Step,
};

type Log = Vec<String>;

/// Logs `label:n@time` on every resume and follows a fixed list of steps
struct Scripted {
    label: &'static str,
    steps: Vec<Step>,
    resumes: usize,
}

impl Scripted {
    fn new(label: &'static str, steps: Vec<Step>) -> Box<Self> {
        Box::new(Self {
            label,
            steps,
            resumes: 0,
        })
    }
}

impl Process<Log> for Scripted {
    fn resume(&mut self, ctx: &mut Context<'_, Log>) -> SimResult<Step> {
        let entry = format!("{}:{}@{}", self.label, self.resumes, ctx.now());
        ctx.world_mut().push(entry);
        let step = self
            .steps
            .get(self.resumes)
            .copied()
            .unwrap_or(Step::Exit(None));
        self.resumes += 1;
        Ok(step)
    }
}

/// Test that spawning runs the body up to its first wait
#[test]
fn test_spawn_runs_until_first_suspension() {
    let mut log = Log::new();
    let mut sched = Scheduler::default();
    sched
        .spawn(Scripted::new("a", vec![Step::Timeout(1.0)]), &mut log)
        .unwrap();
    assert_eq!(log, vec!["a:0@0"]);
    assert_eq!(sched.pending(), 1);
}

/// Test that a zero timeout lets other processes at the same time run
#[test]
fn test_zero_timeout_yields_to_other_ready_processes() {
    let mut log = Log::new();
    let mut sched = Scheduler::default();
    sched
        .spawn(Scripted::new("a", vec![Step::Timeout(0.0)]), &mut log)
        .unwrap();
    sched
        .spawn(Scripted::new("b", vec![Step::Timeout(0.0)]), &mut log)
        .unwrap();
    sched.run(None, &mut log).unwrap();
    assert_eq!(log, vec!["a:0@0", "b:0@0", "a:1@0", "b:1@0"]);
}

/// Test that a negative timeout is an error
#[test]
fn test_negative_timeout_is_rejected() {
    let mut log = Log::new();
    let mut sched = Scheduler::default();
    let result = sched.spawn(Scripted::new("a", vec![Step::Timeout(-0.5)]), &mut log);
    assert_eq!(result, Err(SimError::InvalidDuration(-0.5)));
}

/// Test dispatch order by time, then by scheduling order
#[test]
fn test_dispatch_follows_time_then_scheduling_order() {
    let mut log = Log::new();
    let mut sched = Scheduler::default();
    sched
        .spawn(Scripted::new("slow", vec![Step::Timeout(2.0)]), &mut log)
        .unwrap();
    sched
        .spawn(Scripted::new("fast", vec![Step::Timeout(1.0)]), &mut log)
        .unwrap();
    sched
        .spawn(Scripted::new("tie", vec![Step::Timeout(2.0)]), &mut log)
        .unwrap();
    sched.run(None, &mut log).unwrap();
    assert_eq!(
        log,
        vec!["slow:0@0", "fast:0@0", "tie:0@0", "fast:1@1", "slow:1@2", "tie:1@2"]
    );
    assert_eq!(sched.dispatched(), 3);
}

/// Test that an event fires only once
#[test]
fn test_double_fire_is_rejected() {
    let mut sched: Scheduler<Log> = Scheduler::default();
    let event = sched.new_event();
    sched.succeed(event).unwrap();
    assert_eq!(sched.is_triggered(event), Ok(true));
    assert_eq!(sched.succeed(event), Err(SimError::AlreadyTriggered(event)));
}

/// Test firing an event nobody waits on
#[test]
fn test_firing_without_waiters_only_sets_the_flag() {
    let mut sched: Scheduler<Log> = Scheduler::default();
    let event = sched.new_event();
    assert_eq!(sched.is_triggered(event), Ok(false));
    sched.succeed(event).unwrap();
    assert_eq!(sched.pending(), 0);
    assert_eq!(sched.is_triggered(event), Ok(true));
}

/// Test that event waiters wake in the order they registered
#[test]
fn test_waiters_wake_in_registration_order() {
    let mut log = Log::new();
    let mut sched = Scheduler::default();
    let event = sched.new_event();
    for label in ["w1", "w2", "w3"] {
        sched
            .spawn(Scripted::new(label, vec![Step::Event(event)]), &mut log)
            .unwrap();
    }
    sched
        .spawn(Scripted::new("firer", vec![Step::Timeout(3.0)]), &mut log)
        .unwrap();
    sched.run(Some(2.0), &mut log).unwrap();
    assert_eq!(log.len(), 4);

    sched.succeed(event).unwrap();
    sched.run(None, &mut log).unwrap();
    assert_eq!(
        &log[4..],
        &["w1:1@2", "w2:1@2", "w3:1@2", "firer:1@3"]
    );
}

/// Test waiting on an event that already fired
#[test]
fn test_waiting_on_a_fired_event_resumes_immediately() {
    let mut log = Log::new();
    let mut sched = Scheduler::default();
    let event = sched.new_event();
    sched.succeed(event).unwrap();
    sched
        .spawn(Scripted::new("late", vec![Step::Event(event)]), &mut log)
        .unwrap();
    sched.run(None, &mut log).unwrap();
    assert_eq!(log, vec!["late:0@0", "late:1@0"]);
}

/// Test that a handle from another scheduler is rejected
#[test]
fn test_unknown_event_is_reported() {
    let mut other: Scheduler<Log> = Scheduler::default();
    let foreign: EventId = {
        other.new_event();
        other.new_event()
    };
    let mut sched: Scheduler<Log> = Scheduler::default();
    assert_eq!(sched.succeed(foreign), Err(SimError::UnknownEvent(foreign)));
}

/// Spawns a child, joins it and records what the child handed back
struct Parent {
    child_steps: Vec<Step>,
}

impl Process<Log> for Parent {
    fn resume(&mut self, ctx: &mut Context<'_, Log>) -> SimResult<Step> {
        if !self.child_steps.is_empty() {
            let steps = std::mem::take(&mut self.child_steps);
            let child = ctx.spawn(Scripted::new("child", steps))?;
            return Ok(Step::Join(child));
        }
        let entry = format!("parent joined {:?} at {}", ctx.joined(), ctx.now());
        ctx.world_mut().push(entry);
        Ok(Step::Exit(None))
    }
}

/// Test that joining a child hands over its exit value
#[test]
fn test_join_delivers_child_exit_value() {
    let mut log = Log::new();
    let mut sched = Scheduler::default();
    let parent = Parent {
        child_steps: vec![Step::Timeout(2.0), Step::Exit(Some(7.0))],
    };
    let id = sched.spawn(Box::new(parent), &mut log).unwrap();
    sched.run(None, &mut log).unwrap();
    assert_eq!(
        log,
        vec!["child:0@0", "child:1@2", "parent joined Some(7.0) at 2"]
    );
    assert!(sched.is_finished(id));
    assert_eq!(sched.exit_value(id), Some(None));
}

/// Test joining a child that exited during spawn
#[test]
fn test_joining_an_already_finished_child_does_not_block() {
    let mut log = Log::new();
    let mut sched = Scheduler::default();
    let parent = Parent {
        child_steps: vec![Step::Exit(Some(1.5))],
    };
    sched.spawn(Box::new(parent), &mut log).unwrap();
    sched.run(None, &mut log).unwrap();
    assert_eq!(log, vec!["child:0@0", "parent joined Some(1.5) at 0"]);
}

/// Touches the log twice per resume; the two writes must stay adjacent
struct CriticalSection {
    label: &'static str,
    rounds: u32,
}

impl Process<Log> for CriticalSection {
    fn resume(&mut self, ctx: &mut Context<'_, Log>) -> SimResult<Step> {
        let label = self.label;
        ctx.world_mut().push(format!("{label} enter"));
        ctx.world_mut().push(format!("{label} leave"));
        if self.rounds == 0 {
            return Ok(Step::Exit(None));
        }
        self.rounds -= 1;
        Ok(Step::Timeout(0.0))
    }
}

/// Test that no process runs between two suspension points of another
#[test]
fn test_processes_never_interleave_between_suspension_points() {
    let mut log = Log::new();
    let mut sched = Scheduler::default();
    for label in ["x", "y", "z"] {
        sched
            .spawn(Box::new(CriticalSection { label, rounds: 5 }), &mut log)
            .unwrap();
    }
    sched.run(None, &mut log).unwrap();
    assert_eq!(log.len(), 3 * 6 * 2);
    for pair in log.chunks(2) {
        let enter = pair[0].strip_suffix(" enter").unwrap();
        let leave = pair[1].strip_suffix(" leave").unwrap();
        assert_eq!(enter, leave);
    }
}

/// Test that running to a time in the past fails
#[test]
fn test_run_until_before_now_is_rejected() {
    let mut log = Log::new();
    let mut sched = Scheduler::default();
    sched
        .spawn(Scripted::new("a", vec![Step::Timeout(5.0)]), &mut log)
        .unwrap();
    sched.run(Some(3.0), &mut log).unwrap();
    assert_eq!(sched.now(), 3.0);
    assert!(matches!(
        sched.run(Some(1.0), &mut log),
        Err(SimError::InvalidDuration(_))
    ));
}

fn paced_workload(pacing: PacingStrategy) -> (Log, Duration) {
    let mut log = Log::new();
    let mut sched = Scheduler::new(pacing);
    assert_eq!(sched.pacing(), pacing);
    sched
        .spawn(
            Scripted::new("a", vec![Step::Timeout(1.0), Step::Timeout(1.0), Step::Timeout(1.0)]),
            &mut log,
        )
        .unwrap();
    sched
        .spawn(Scripted::new("b", vec![Step::Timeout(0.5), Step::Timeout(2.0)]), &mut log)
        .unwrap();
    let started = Instant::now();
    sched.run(None, &mut log).unwrap();
    assert_eq!(sched.now(), 3.0);
    (log, started.elapsed())
}

/// Test that real-time pacing keeps the dispatch order and slows the run down
#[test]
fn test_realtime_pacing_keeps_order_and_tracks_wall_clock() {
    let (fast, _) = paced_workload(PacingStrategy::Unthrottled);
    let (paced, wall) = paced_workload(PacingStrategy::RealtimePaced { factor: 20.0 });
    assert_eq!(fast, paced);
    // Last dispatch is at t=3, i.e. 3 / 20 seconds into the run
    assert!(wall >= Duration::from_millis(150), "paced run took {wall:?}");
}

/// Spends wall-clock time inside one resume, making the next dispatches late
struct Sluggish {
    resumes: u32,
    stall: Duration,
}

impl Process<Log> for Sluggish {
    fn resume(&mut self, ctx: &mut Context<'_, Log>) -> SimResult<Step> {
        let entry = format!("sluggish:{}@{}", self.resumes, ctx.now());
        ctx.world_mut().push(entry);
        self.resumes += 1;
        match self.resumes {
            2 => std::thread::sleep(self.stall),
            5 => return Ok(Step::Exit(None)),
            _ => {}
        }
        Ok(Step::Timeout(0.1))
    }
}

/// Test that dispatches already behind the wall clock run without sleeping
#[test]
fn test_realtime_pacing_does_not_sleep_for_late_dispatches() {
    let stall = Duration::from_millis(200);
    let mut log = Log::new();
    let mut sched = Scheduler::new(PacingStrategy::RealtimePaced { factor: 10.0 });
    sched
        .spawn(Box::new(Sluggish { resumes: 0, stall }), &mut log)
        .unwrap();

    let started = Instant::now();
    sched.run(None, &mut log).unwrap();
    let wall = started.elapsed();

    assert_eq!(log.len(), 5);
    assert_eq!(log[4], "sluggish:4@0.4");
    // Deadlines for t=0.2..0.4 fall at 20..40ms, long before the stall ends
    assert!(wall >= stall);
    assert!(wall < stall + Duration::from_millis(150), "late dispatches slept: {wall:?}");
}

/// Records the id the scheduler reports for the running process
struct WhoAmI;

impl Process<Log> for WhoAmI {
    fn resume(&mut self, ctx: &mut Context<'_, Log>) -> SimResult<Step> {
        let entry = format!("{}", ctx.current());
        ctx.world_mut().push(entry);
        Ok(Step::Exit(None))
    }
}

/// Test that a running body sees its own process id
#[test]
fn test_context_reports_the_running_process() {
    let mut log = Log::new();
    let mut sched = Scheduler::default();
    let first = sched.spawn(Box::new(WhoAmI), &mut log).unwrap();
    let second: ProcessId = sched.spawn(Box::new(WhoAmI), &mut log).unwrap();
    assert_ne!(first, second);
    assert_eq!(log, vec![first.to_string(), second.to_string()]);
}

//! Command-line entry point over the fixed menu of litmus scenarios (spec §8)
//! plus the tunables `Builder` already reads from `DPOR_*` environment
//! variables. The teacher crate has no CLI of its own — everything runs
//! through `#[test]` functions — so this binary exists purely to give the
//! exploration engine an external interface per spec §6: parse flags, build
//! the chosen scenario's body, hand it to `Builder::check`, and translate the
//! resulting violations into an exit code.

use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use clap::{Parser, ValueEnum};

use dpor::action::{ActionKind, Location};
use dpor::thread;
use dpor::{Builder, Harness, StepContext, Steps, ThreadProgram, Violation};

/// One of spec §8's named litmus programs.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scenario {
    /// Two threads write disjoint locations; no conflict should ever arise.
    IndependentWrites,
    /// Release/acquire message passing: a seen flag must carry its payload.
    MessagePassingCorrect,
    /// The same handoff with every access weakened to relaxed.
    MessagePassingBroken,
    /// Seq-cst store buffering: both loads observing the pre-store value is
    /// forbidden.
    StoreBuffering,
    /// Two threads increment the same location via a read-modify-write.
    RmwConflict,
    /// Two threads join on each other; always a deadlock.
    DeadlockViaJoin,
}

type Program = (thread::Id, Box<dyn ThreadProgram>);

impl Scenario {
    fn spawn(self, h: &Harness) -> Vec<Program> {
        match self {
            Scenario::IndependentWrites => {
                let t0 = h.register_thread(None);
                let t1 = h.register_thread(None);
                vec![
                    one_step(t0, ActionKind::AtomicWrite, Ordering::Relaxed, Location(0), 1),
                    one_step(t1, ActionKind::AtomicWrite, Ordering::Relaxed, Location(1), 2),
                ]
            }
            Scenario::MessagePassingCorrect => {
                let t0 = h.register_thread(None);
                let t1 = h.register_thread(None);
                vec![
                    (
                        t0,
                        Box::new(
                            Steps::new()
                                .then(|ctx| {
                                    ctx.submit(ActionKind::AtomicWrite, Ordering::Relaxed, Location(0), 42);
                                })
                                .then(|ctx| {
                                    ctx.submit(ActionKind::AtomicWrite, Ordering::Release, Location(1), 1);
                                }),
                        ) as Box<dyn ThreadProgram>,
                    ),
                    (
                        t1,
                        Box::new(
                            Steps::new()
                                .then(|ctx| {
                                    ctx.submit(ActionKind::AtomicRead, Ordering::Acquire, Location(1), 0);
                                })
                                .then(|ctx| {
                                    ctx.submit(ActionKind::AtomicRead, Ordering::Relaxed, Location(0), 0);
                                }),
                        ) as Box<dyn ThreadProgram>,
                    ),
                ]
            }
            Scenario::MessagePassingBroken => {
                let t0 = h.register_thread(None);
                let t1 = h.register_thread(None);
                vec![
                    (
                        t0,
                        Box::new(
                            Steps::new()
                                .then(|ctx| {
                                    ctx.submit(ActionKind::AtomicWrite, Ordering::Relaxed, Location(0), 42);
                                })
                                .then(|ctx| {
                                    ctx.submit(ActionKind::AtomicWrite, Ordering::Relaxed, Location(1), 1);
                                }),
                        ) as Box<dyn ThreadProgram>,
                    ),
                    (t1, Box::new(MessagePassingBrokenReader::default()) as Box<dyn ThreadProgram>),
                ]
            }
            Scenario::StoreBuffering => {
                let shared = Arc::new(Mutex::new([None, None]));
                let t0 = h.register_thread(None);
                let t1 = h.register_thread(None);
                vec![
                    (
                        t0,
                        Box::new(StoreBufferThread::new(0, shared.clone(), Location(0), 1, Location(1)))
                            as Box<dyn ThreadProgram>,
                    ),
                    (
                        t1,
                        Box::new(StoreBufferThread::new(1, shared, Location(1), 1, Location(0))) as Box<dyn ThreadProgram>,
                    ),
                ]
            }
            Scenario::RmwConflict => {
                let t0 = h.register_thread(None);
                let t1 = h.register_thread(None);
                vec![
                    (
                        t0,
                        Box::new(
                            Steps::new()
                                .then(|ctx| {
                                    ctx.submit(ActionKind::AtomicWrite, Ordering::Relaxed, Location(0), 0);
                                })
                                .then(|ctx| {
                                    ctx.submit(ActionKind::AtomicRmw, Ordering::AcqRel, Location(0), 1);
                                }),
                        ) as Box<dyn ThreadProgram>,
                    ),
                    one_step(t1, ActionKind::AtomicRmw, Ordering::AcqRel, Location(0), 1),
                ]
            }
            Scenario::DeadlockViaJoin => {
                let t0 = h.register_thread(None);
                let t1 = h.register_thread(None);
                vec![
                    one_step(t0, ActionKind::ThreadJoin, Ordering::SeqCst, Location(0), t1.as_value()),
                    one_step(t1, ActionKind::ThreadJoin, Ordering::SeqCst, Location(0), t0.as_value()),
                ]
            }
        }
    }
}

/// A thread whose entire program is a single atomic action.
fn one_step(tid: thread::Id, kind: ActionKind, order: Ordering, location: Location, value: i64) -> Program {
    (
        tid,
        Box::new(Steps::new().then(move |ctx| {
            ctx.submit(kind, order, location, value);
        })) as Box<dyn ThreadProgram>,
    )
}

/// Reads the flag relaxed, then reads the payload only if the flag was seen
/// set, flagging the message-passing hazard (spec §8 scenario 3) the moment
/// the payload doesn't match what the writer actually stored.
#[derive(Default)]
enum MessagePassingBrokenReader {
    #[default]
    ReadFlag,
    ReadDataIfSet,
    Done,
}

impl ThreadProgram for MessagePassingBrokenReader {
    fn step(&mut self, ctx: &StepContext<'_>) -> bool {
        match self {
            MessagePassingBrokenReader::ReadFlag => {
                let flag = ctx.submit(ActionKind::AtomicRead, Ordering::Relaxed, Location(1), 0);
                *self = if flag == 1 {
                    MessagePassingBrokenReader::ReadDataIfSet
                } else {
                    MessagePassingBrokenReader::Done
                };
                true
            }
            MessagePassingBrokenReader::ReadDataIfSet => {
                let data = ctx.submit(ActionKind::AtomicRead, Ordering::Relaxed, Location(0), 0);
                if data != 42 {
                    ctx.record_violation(Violation::AssertionFailure {
                        thread: ctx.tid(),
                        message: format!("observed flag=1 but data={data} (message passing hazard)"),
                    });
                }
                *self = MessagePassingBrokenReader::Done;
                true
            }
            MessagePassingBrokenReader::Done => false,
        }
    }
}

/// One side of the seq-cst store-buffering litmus test: writes `write_val`
/// to `write_loc`, then reads `read_loc`, recording what it saw into a
/// shared slot. Once both sides have recorded their read, either one
/// notices if the forbidden (0, 0) outcome occurred and reports it (spec §8
/// scenario 4).
struct StoreBufferThread {
    slot: usize,
    shared: Arc<Mutex<[Option<i64>; 2]>>,
    write_loc: Location,
    write_val: i64,
    read_loc: Location,
    state: u8,
}

impl StoreBufferThread {
    fn new(slot: usize, shared: Arc<Mutex<[Option<i64>; 2]>>, write_loc: Location, write_val: i64, read_loc: Location) -> Self {
        StoreBufferThread {
            slot,
            shared,
            write_loc,
            write_val,
            read_loc,
            state: 0,
        }
    }
}

impl ThreadProgram for StoreBufferThread {
    fn step(&mut self, ctx: &StepContext<'_>) -> bool {
        match self.state {
            0 => {
                ctx.submit(ActionKind::AtomicWrite, Ordering::SeqCst, self.write_loc, self.write_val);
                self.state = 1;
                true
            }
            1 => {
                let observed = ctx.submit(ActionKind::AtomicRead, Ordering::SeqCst, self.read_loc, 0);
                let forbidden = {
                    let mut shared = self.shared.lock().unwrap();
                    shared[self.slot] = Some(observed);
                    shared.iter().all(Option::is_some) && shared.iter().all(|v| *v == Some(0))
                };
                if forbidden {
                    ctx.record_violation(Violation::AssertionFailure {
                        thread: ctx.tid(),
                        message: "both loads observed 0: forbidden under sequential consistency".to_string(),
                    });
                }
                self.state = 2;
                true
            }
            _ => false,
        }
    }
}

/// Explore every interleaving of a litmus program under the relaxed-memory
/// model and report any violation found.
#[derive(Debug, Parser)]
#[command(name = "dpor-check", version, about)]
struct Cli {
    /// Which litmus program to check.
    #[arg(value_enum)]
    scenario: Scenario,

    /// Upper bound on explored executions (overrides `DPOR_MAX_EXECUTIONS`).
    #[arg(long)]
    max_executions: Option<usize>,

    /// Wall-clock budget in seconds (overrides `DPOR_MAX_DURATION`).
    #[arg(long)]
    max_duration: Option<u64>,

    /// Install a `tracing-subscriber` regardless of `DPOR_LOG`.
    #[arg(long)]
    log: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut builder = Builder::new();
    if let Some(max_executions) = cli.max_executions {
        builder.max_executions = max_executions;
    }
    if let Some(secs) = cli.max_duration {
        builder.max_duration = Some(std::time::Duration::from_secs(secs));
    }
    if cli.log {
        builder.log = true;
    }

    let scenario = cli.scenario;
    let violations = builder.check(move |h: &Harness| scenario.spawn(h));

    report(&violations)
}

/// Prints every violation found and maps them to spec §6's exit-code
/// contract: zero when no execution uncovered a problem, non-zero otherwise.
fn report(violations: &[Violation]) -> ExitCode {
    if violations.is_empty() {
        println!("no violations found");
        return ExitCode::SUCCESS;
    }

    for violation in violations {
        println!("violation: {violation}");
    }
    ExitCode::FAILURE
}

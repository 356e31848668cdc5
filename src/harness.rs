//! External interface a checked program's instrumentation calls into (spec
//! §6). Wraps [`crate::checker::Checker`] with the fiber turn-passing
//! runtime from [`crate::rt`], so callers don't need to drive either
//! directly.

use crate::action::{ActionKind, Location};
use crate::checker::Checker;
use crate::error::Violation;
use crate::rt::Runtime;
use crate::thread;

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

/// Coordinates one exploration run: owns the [`Checker`] and exposes the
/// handful of calls a checked program's atomic-operation shims make.
///
/// `Checker` itself isn't `Sync` in any meaningful sense — only one fiber
/// runs at a time — so access is serialized behind a plain [`Mutex`] rather
/// than requiring callers to prove exclusive access some other way.
#[derive(Debug)]
pub struct Harness {
    checker: Mutex<Checker>,
}

impl Default for Harness {
    fn default() -> Harness {
        Harness::new()
    }
}

impl Harness {
    pub fn new() -> Harness {
        Harness {
            checker: Mutex::new(Checker::new()),
        }
    }

    /// Registers a new modeled thread, optionally created by `parent` (spec
    /// §6, "register_thread").
    pub fn register_thread(&self, parent: Option<thread::Id>) -> thread::Id {
        self.checker.lock().unwrap().spawn_thread(parent)
    }

    pub fn thread_exit(&self, tid: thread::Id) {
        self.checker.lock().unwrap().exit_thread(tid);
    }

    /// Submits one atomic action on behalf of the checked program, returning
    /// the value it observed — its own value for a write, or the value of
    /// whatever it read from for a read/rmw (spec §6, "submit_action ...
    /// returning the observed value for reads").
    pub fn submit_action(&self, kind: ActionKind, order: Ordering, location: Location, tid: thread::Id, value: i64) -> i64 {
        let mut checker = self.checker.lock().unwrap();
        let id = checker.record_action(kind, order, location, tid, value);
        checker.observed_value(id)
    }

    pub fn record_violation(&self, violation: Violation) {
        self.checker.lock().unwrap().record_violation(violation);
    }

    /// Ends the current execution and advances to the next unexplored
    /// interleaving, if any (spec §6, "finish_execution" + "next_execution").
    /// Returns `false` once every backtrack point has been exhausted.
    pub fn finish_execution(&self) -> bool {
        self.checker.lock().unwrap().next_execution()
    }

    pub fn violations(&self) -> Vec<Violation> {
        self.checker.lock().unwrap().violations().to_vec()
    }

    pub fn executions(&self) -> usize {
        self.checker.lock().unwrap().executions()
    }

    pub fn total_nodes(&self) -> usize {
        self.checker.lock().unwrap().total_nodes()
    }

    pub fn print_summary(&self) {
        self.checker.lock().unwrap().print_summary();
    }

    #[cfg(feature = "checkpoint")]
    pub fn checkpoint_state(&self) -> crate::checker::CheckpointState {
        self.checker.lock().unwrap().checkpoint_state()
    }

    #[cfg(feature = "checkpoint")]
    pub fn restore_checkpoint(&self, state: crate::checker::CheckpointState) {
        self.checker.lock().unwrap().restore_checkpoint_state(state);
    }

    /// Drives every program in `threads` to completion for one execution,
    /// letting the checker pick which thread's next action runs at each
    /// step instead of running each thread start-to-finish in registration
    /// order (spec §6's exploration loop). This is what lets a recorded
    /// [`crate::checker::Backtrack`] actually change which code path a
    /// checked program takes on a later execution: the driver, not the
    /// program's own control flow, decides step order.
    ///
    /// Stops as soon as any violation is recorded, matching this crate's
    /// cancellation rule (spec §7): an aborted execution never leaves a
    /// thread waiting on a turn nobody will ever hand it. `threads`' order
    /// doesn't matter; each entry names the `thread::Id` it was registered
    /// under.
    ///
    /// `Runtime`'s turn bookkeeping (`finish`/`is_finished`/`all_finished`)
    /// tracks which programs have returned `false`, independent of the
    /// checker's own enabled-set — real OS-thread handoff (`spawn`/
    /// `wait_for_turn`) is unused here since every program runs
    /// synchronously on the calling thread; see `DESIGN.md`.
    pub fn run(&self, mut threads: Vec<(thread::Id, Box<dyn ThreadProgram>)>) {
        let runtime = Runtime::new(threads.len());

        loop {
            if !self.violations().is_empty() || runtime.all_finished() {
                break;
            }

            let preferred = {
                let checker = self.checker.lock().unwrap();
                checker.get_next_replay_thread(checker.current_node())
            };
            let chosen = {
                let mut checker = self.checker.lock().unwrap();
                checker.choose_next(preferred)
            };
            let Some(tid) = chosen else {
                // Nothing enabled: every thread finished or is blocked on a
                // join that will never resolve.
                break;
            };

            let Some(slot) = threads.iter().position(|(id, _)| *id == tid) else {
                // The checker chose a thread this run never spawned a
                // program for; nothing to do with its turn.
                break;
            };

            let ctx = StepContext { harness: self, tid };
            let more = threads[slot].1.step(&ctx);
            if !more {
                runtime.finish(slot);
                self.thread_exit(tid);
            }
        }
    }
}

/// One modeled thread's logic, advanced one atomic action at a time by
/// [`Harness::run`]. A plain closure run straight through front-to-back
/// can't branch on anything the checker decides mid-execution; a
/// `ThreadProgram` can, since the driver calls `step` again only once it
/// has chosen this thread's next turn.
pub trait ThreadProgram {
    /// Advances by exactly one atomic action, submitted through `ctx`.
    /// Returns `false` once this thread has nothing left to do.
    fn step(&mut self, ctx: &StepContext<'_>) -> bool;
}

/// Handed to a [`ThreadProgram`] on each step: the identity it's running as,
/// and the calls it's allowed to make back into the harness.
#[derive(Debug)]
pub struct StepContext<'a> {
    harness: &'a Harness,
    tid: thread::Id,
}

impl<'a> StepContext<'a> {
    pub fn tid(&self) -> thread::Id {
        self.tid
    }

    pub fn submit(&self, kind: ActionKind, order: Ordering, location: Location, value: i64) -> i64 {
        self.harness.submit_action(kind, order, location, self.tid, value)
    }

    pub fn record_violation(&self, violation: Violation) {
        self.harness.record_violation(violation);
    }
}

/// A [`ThreadProgram`] that's just a fixed queue of steps, for litmus
/// programs whose control flow doesn't depend on an observed value.
#[derive(Default)]
pub struct Steps(VecDeque<Box<dyn FnMut(&StepContext<'_>)>>);

impl std::fmt::Debug for Steps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Steps").field("remaining", &self.0.len()).finish()
    }
}

impl Steps {
    pub fn new() -> Steps {
        Steps::default()
    }

    pub fn then(mut self, step: impl FnMut(&StepContext<'_>) + 'static) -> Steps {
        self.0.push_back(Box::new(step));
        self
    }
}

impl ThreadProgram for Steps {
    fn step(&mut self, ctx: &StepContext<'_>) -> bool {
        match self.0.pop_front() {
            Some(mut f) => {
                f(ctx);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_submit_then_finish_round_trips() {
        let h = Harness::new();
        let t0 = h.register_thread(None);
        h.submit_action(ActionKind::AtomicWrite, Ordering::Relaxed, Location(1), t0, 1);
        assert!(h.violations().is_empty());
        // No conflicting accesses were recorded, so there's nothing left to
        // backtrack into.
        assert!(!h.finish_execution());
    }
}

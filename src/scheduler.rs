//! Model-checker-level thread scheduling (spec §4.8, "Scheduler").
//!
//! This is distinct from the fiber-style context-switch primitive in
//! [`crate::rt`]: `Scheduler` only tracks which threads are currently
//! enabled and picks the next one to run, given the driver's preference for
//! whichever thread the active `Node`'s backtrack set names. Grounded on
//! `examples/original_source/schedule.h`'s `Scheduler`.

use crate::thread;

/// Tracks live/enabled state for the thread set and chooses who runs next.
#[derive(Debug, Default)]
pub struct Scheduler {
    /// `enabled[tid]` is `true` while `tid` is alive and not blocked.
    enabled: Vec<bool>,
    current: Option<thread::Id>,
}

impl Scheduler {
    pub fn new() -> Scheduler {
        Scheduler::default()
    }

    fn ensure_len(&mut self, tid: thread::Id) {
        let idx = tid.as_usize();
        if self.enabled.len() <= idx {
            self.enabled.resize(idx + 1, false);
        }
    }

    /// Registers `tid` as enabled (spec §4.8).
    pub fn add_thread(&mut self, tid: thread::Id) {
        self.ensure_len(tid);
        self.enabled[tid.as_usize()] = true;
    }

    /// Marks `tid` as no longer runnable: it exited, blocked on a join, or
    /// the checker is rolling back past its creation.
    pub fn remove_thread(&mut self, tid: thread::Id) {
        self.ensure_len(tid);
        self.enabled[tid.as_usize()] = false;
        if self.current == Some(tid) {
            self.current = None;
        }
    }

    pub fn is_enabled(&self, tid: thread::Id) -> bool {
        self.enabled.get(tid.as_usize()).copied().unwrap_or(false)
    }

    /// Full snapshot of enabled threads, indexed by thread id. Used to seed
    /// a new [`crate::node::Node`]'s frozen enabled set (spec §4.4).
    pub fn enabled_snapshot(&self) -> Vec<bool> {
        self.enabled.clone()
    }

    pub fn current(&self) -> Option<thread::Id> {
        self.current
    }

    /// Picks the next thread to run.
    ///
    /// If `preferred` names an enabled thread, it wins — this is how the
    /// driver replays a recorded backtrack choice (spec §4.6). Otherwise the
    /// lowest-id enabled thread runs, matching [`crate::node::Node::next_backtrack`]'s
    /// determinism requirement.
    pub fn choose_next(&mut self, preferred: Option<thread::Id>) -> Option<thread::Id> {
        let choice = match preferred {
            Some(tid) if self.is_enabled(tid) => Some(tid),
            _ => (0..self.enabled.len())
                .find(|&i| self.enabled[i])
                .map(thread::Id::new),
        };
        self.current = choice;
        choice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(i: usize) -> thread::Id {
        thread::Id::new(i)
    }

    #[test]
    fn choose_next_prefers_the_requested_thread_if_enabled() {
        let mut s = Scheduler::new();
        s.add_thread(t(0));
        s.add_thread(t(1));
        assert_eq!(s.choose_next(Some(t(1))), Some(t(1)));
    }

    #[test]
    fn choose_next_falls_back_to_lowest_enabled_id() {
        let mut s = Scheduler::new();
        s.add_thread(t(0));
        s.add_thread(t(2));
        assert_eq!(s.choose_next(None), Some(t(0)));
    }

    #[test]
    fn choose_next_ignores_a_disabled_preference() {
        let mut s = Scheduler::new();
        s.add_thread(t(0));
        s.add_thread(t(1));
        s.remove_thread(t(1));
        assert_eq!(s.choose_next(Some(t(1))), Some(t(0)));
    }

    #[test]
    fn no_enabled_threads_yields_none() {
        let mut s = Scheduler::new();
        assert_eq!(s.choose_next(None), None);
    }

    #[test]
    fn remove_thread_clears_current_if_it_was_running() {
        let mut s = Scheduler::new();
        s.add_thread(t(0));
        s.choose_next(Some(t(0)));
        s.remove_thread(t(0));
        assert_eq!(s.current(), None);
    }
}

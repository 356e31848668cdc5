//! Turn-passing runtime: every spawned OS thread blocks on a shared
//! [`std::sync::Condvar`] except the one currently holding the turn, so the
//! checked program behaves as if it were single-threaded from the driver's
//! point of view (spec §4.8's scheduling assumption). Modeled on
//! `examples/tokio-rs-loom/src/rt/scheduler/thread.rs`'s per-thread
//! mutex/condvar handoff, without that file's `unsafe` shared `Execution`
//! pointer — `pass_turn`/`wait_for_turn` only ever hand off a plain integer.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
    cv: Condvar,
}

#[derive(Debug)]
struct State {
    turn: Option<usize>,
    finished: Vec<bool>,
}

/// Owns the shared turn token for one execution's worth of fiber threads.
#[derive(Debug, Clone)]
pub struct Runtime {
    shared: Arc<Shared>,
}

impl Runtime {
    pub fn new(capacity: usize) -> Runtime {
        Runtime {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    turn: None,
                    finished: vec![false; capacity],
                }),
                cv: Condvar::new(),
            }),
        }
    }

    /// Spawns an OS thread that immediately blocks until it's handed the
    /// turn, runs `body`, then marks itself finished and releases the turn.
    pub fn spawn<F>(&self, id: usize, body: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let rt = self.clone();
        std::thread::spawn(move || {
            rt.wait_for_turn(id);
            body();
            rt.finish(id);
        })
    }

    /// Blocks the calling thread until the turn is `id`.
    pub fn wait_for_turn(&self, id: usize) {
        let mut state = self.shared.state.lock().unwrap();
        while state.turn != Some(id) {
            state = self.shared.cv.wait(state).unwrap();
        }
    }

    /// Hands the turn to `to` and wakes every waiter.
    pub fn pass_turn(&self, to: usize) {
        let mut state = self.shared.state.lock().unwrap();
        state.turn = Some(to);
        self.shared.cv.notify_all();
    }

    /// Marks `id` as finished and releases the turn so the driver (or the
    /// next fiber) can pick up without `id` ever being handed it again.
    pub fn finish(&self, id: usize) {
        let mut state = self.shared.state.lock().unwrap();
        state.finished[id] = true;
        state.turn = None;
        self.shared.cv.notify_all();
    }

    pub fn is_finished(&self, id: usize) -> bool {
        self.shared.state.lock().unwrap().finished[id]
    }

    pub fn all_finished(&self) -> bool {
        self.shared.state.lock().unwrap().finished.iter().all(|&f| f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn threads_run_strictly_in_turn_order() {
        let rt = Runtime::new(2);
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = order.clone();
        let rt1 = rt.clone();
        let h1 = rt.spawn(0, move || {
            o1.lock().unwrap().push(0);
            rt1.pass_turn(1);
        });

        let o2 = order.clone();
        let h2 = rt.spawn(1, move || {
            o2.lock().unwrap().push(1);
        });

        rt.pass_turn(0);
        h1.join().unwrap();
        h2.join().unwrap();

        assert_eq!(*order.lock().unwrap(), vec![0, 1]);
        assert!(rt.all_finished());
    }

    #[test]
    fn finish_releases_the_turn_without_reassigning_it() {
        let rt = Runtime::new(1);
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        let h = rt.spawn(0, move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        rt.pass_turn(0);
        h.join().unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(rt.is_finished(0));
    }
}

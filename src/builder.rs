//! Top-level configuration and the `check` driver loop (spec §6's external
//! interface, supplemented per SPEC_FULL's ambient-stack section). Grounded
//! on `examples/tokio-rs-loom/src/model.rs`'s `Builder`: same environment
//! variable + field shape, renamed `LOOM_*` to `DPOR_*`, with
//! loom's future/location/checkpoint-format-specific fields dropped since
//! this domain has no futures and a much smaller state to checkpoint.

use crate::error::Violation;
use crate::harness::{Harness, ThreadProgram};
use crate::thread;

use std::env;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::info;

const DEFAULT_MAX_EXECUTIONS: usize = 1_000_000;

/// Configures one checking run.
#[derive(Debug)]
#[non_exhaustive]
pub struct Builder {
    /// Upper bound on explored executions, beyond which `check` stops even
    /// if backtrack points remain. Defaults to `DPOR_MAX_EXECUTIONS`.
    pub max_executions: usize,

    /// Wall-clock budget for the run. Defaults to `DPOR_MAX_DURATION`
    /// (seconds).
    pub max_duration: Option<Duration>,

    /// Persists the backtracking frontier to this path as the run
    /// progresses, and resumes from it if it already exists. Requires the
    /// `checkpoint` feature. Defaults to `DPOR_CHECKPOINT_FILE`.
    pub checkpoint_file: Option<PathBuf>,

    /// How many executions between checkpoint writes. Defaults to
    /// `DPOR_CHECKPOINT_INTERVAL`.
    pub checkpoint_interval: usize,

    /// Installs a `tracing` subscriber driven by the `DPOR_LOG` filter
    /// string when `true`. Defaults to whether `DPOR_LOG` is set.
    pub log: bool,
}

impl Default for Builder {
    fn default() -> Builder {
        Builder::new()
    }
}

impl Builder {
    pub fn new() -> Builder {
        let max_executions = env::var("DPOR_MAX_EXECUTIONS")
            .map(|v| v.parse().expect("invalid value for `DPOR_MAX_EXECUTIONS`"))
            .unwrap_or(DEFAULT_MAX_EXECUTIONS);

        let max_duration = env::var("DPOR_MAX_DURATION")
            .map(|v| {
                let secs: u64 = v.parse().expect("invalid value for `DPOR_MAX_DURATION`");
                Duration::from_secs(secs)
            })
            .ok();

        let checkpoint_file = env::var("DPOR_CHECKPOINT_FILE").map(PathBuf::from).ok();

        let checkpoint_interval = env::var("DPOR_CHECKPOINT_INTERVAL")
            .map(|v| v.parse().expect("invalid value for `DPOR_CHECKPOINT_INTERVAL`"))
            .unwrap_or(20_000);

        let log = env::var("DPOR_LOG").is_ok();

        Builder {
            max_executions,
            max_duration,
            checkpoint_file,
            checkpoint_interval,
            log,
        }
    }

    pub fn checkpoint_file(&mut self, file: impl Into<PathBuf>) -> &mut Self {
        self.checkpoint_file = Some(file.into());
        self
    }

    /// Installs a `tracing-subscriber` filtered by `DPOR_LOG` if `self.log`
    /// is set (spec's ambient logging requirement). Safe to call more than
    /// once; later calls are no-ops once a global subscriber is installed.
    fn init_logging(&self) {
        if !self.log {
            return;
        }
        let filter = tracing_subscriber::EnvFilter::try_from_env("DPOR_LOG")
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }

    /// Explores every interleaving of `body` up to this builder's bounds,
    /// returning every [`Violation`] found across all executions (spec §6's
    /// driver loop, `ModelChecker`'s top-level `main()`).
    pub fn check<F>(&self, spawn: F) -> Vec<Violation>
    where
        F: Fn(&Harness) -> Vec<(thread::Id, Box<dyn ThreadProgram>)> + Sync + Send + 'static,
    {
        self.init_logging();

        let harness = self.load_or_new_harness();

        let start = Instant::now();
        let mut iteration = 0usize;

        loop {
            iteration += 1;
            let span = tracing::info_span!("execution", iteration);
            let _entered = span.enter();

            let programs = spawn(&harness);
            harness.run(programs);
            harness.print_summary();
            let more = harness.finish_execution();

            if iteration % self.checkpoint_interval == 0 {
                info!(iteration, nodes = harness.total_nodes(), "progress");
                self.write_checkpoint(&harness);
            }

            if !more {
                break;
            }
            if iteration >= self.max_executions {
                info!(iteration, "stopping: max_executions reached");
                break;
            }
            if let Some(budget) = self.max_duration {
                if start.elapsed() >= budget {
                    info!(iteration, "stopping: max_duration reached");
                    break;
                }
            }
        }

        harness.violations()
    }

    /// Restores a harness from `checkpoint_file` when the `checkpoint`
    /// feature is enabled and that file exists and parses; otherwise starts
    /// fresh. Only the `NodeStack` and pending backtrack list round-trip
    /// (see `checker::CheckpointState`) — a restored harness re-derives its
    /// action arena and cycle graph by replaying forward from the root, the
    /// same way an ordinary in-process replay already does.
    fn load_or_new_harness(&self) -> Harness {
        cfg_if::cfg_if! {
            if #[cfg(feature = "checkpoint")] {
                let harness = Harness::new();
                if let Some(path) = &self.checkpoint_file {
                    if let Ok(bytes) = std::fs::read(path) {
                        if let Ok(state) = serde_json::from_slice(&bytes) {
                            harness.restore_checkpoint(state);
                            info!(path = %path.display(), "resumed from checkpoint");
                        }
                    }
                }
                harness
            } else {
                Harness::new()
            }
        }
    }

    fn write_checkpoint(&self, harness: &Harness) {
        cfg_if::cfg_if! {
            if #[cfg(feature = "checkpoint")] {
                let Some(path) = &self.checkpoint_file else { return };
                match serde_json::to_vec(&harness.checkpoint_state()) {
                    Ok(bytes) => {
                        if let Err(err) = std::fs::write(path, bytes) {
                            info!(path = %path.display(), %err, "failed to write checkpoint");
                        }
                    }
                    Err(err) => info!(%err, "failed to serialize checkpoint"),
                }
            } else {
                let _ = harness;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionKind, Location};
    use crate::harness::Steps;
    use std::sync::atomic::Ordering;

    #[test]
    fn check_respects_the_max_executions_bound() {
        // Three threads racing unordered writes to the same location have
        // 3! = 6 possible orderings for the checker to discover through
        // backtracking, one more than `max_executions` allows — `check` must
        // stop via the bound rather than natural exhaustion. Asserting that
        // termination, not a specific violation outcome, is the point of
        // this test.
        let mut builder = Builder::new();
        builder.max_executions = 5;

        let violations = builder.check(|h: &Harness| {
            let t0 = h.register_thread(None);
            let t1 = h.register_thread(None);
            let t2 = h.register_thread(None);
            vec![
                (
                    t0,
                    Box::new(Steps::new().then(|ctx| {
                        ctx.submit(ActionKind::AtomicWrite, Ordering::Relaxed, Location(1), 1);
                    })) as Box<dyn ThreadProgram>,
                ),
                (
                    t1,
                    Box::new(Steps::new().then(|ctx| {
                        ctx.submit(ActionKind::AtomicWrite, Ordering::Relaxed, Location(1), 2);
                    })) as Box<dyn ThreadProgram>,
                ),
                (
                    t2,
                    Box::new(Steps::new().then(|ctx| {
                        ctx.submit(ActionKind::AtomicWrite, Ordering::Relaxed, Location(1), 3);
                    })) as Box<dyn ThreadProgram>,
                ),
            ]
        });

        assert!(violations.is_empty());
        assert_eq!(builder.max_executions, 5);
    }

    #[test]
    fn uninitialized_read_is_reported() {
        let builder = Builder::new();
        let violations = builder.check(|h: &Harness| {
            let t0 = h.register_thread(None);
            vec![(
                t0,
                Box::new(Steps::new().then(|ctx| {
                    ctx.submit(
                        ActionKind::AtomicRead,
                        Ordering::Relaxed,
                        Location(1),
                        crate::action::VALUE_NONE,
                    );
                })) as Box<dyn ThreadProgram>,
            )]
        });

        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::UninitializedRead { .. })));
    }
}

#![deny(missing_debug_implementations, rust_2018_idioms)]

//! A stateless model checker for programs built on relaxed-memory atomic
//! operations.
//!
//! Rather than running a concurrent program once and hoping a scheduler
//! quirk surfaces a bug, this crate drives the program's atomics through
//! [`Harness`] and systematically replays every schedule that could matter
//! under the C11-style memory model — two executions that agree on the
//! relative order of every pair of dependent actions are treated as
//! equivalent, so only one of them is ever actually explored. This is
//! dynamic partial-order reduction (DPOR): the state space shrinks from
//! "every interleaving" to "every distinct outcome."
//!
//! ```no_run
//! use dpor::{Builder, action::{ActionKind, Location}, Harness, Steps, ThreadProgram};
//! use std::sync::atomic::Ordering;
//!
//! let violations = Builder::new().check(|h: &Harness| {
//!     let t0 = h.register_thread(None);
//!     let t1 = h.register_thread(None);
//!     vec![
//!         (t0, Box::new(Steps::new().then(|ctx| {
//!             ctx.submit(ActionKind::AtomicWrite, Ordering::Relaxed, Location(0), 1);
//!         })) as Box<dyn ThreadProgram>),
//!         (t1, Box::new(Steps::new().then(|ctx| {
//!             ctx.submit(ActionKind::AtomicWrite, Ordering::Relaxed, Location(0), 2);
//!         })) as Box<dyn ThreadProgram>),
//!     ]
//! });
//!
//! assert!(violations.is_empty());
//! ```
//!
//! # Architecture
//!
//! - [`action`] models one atomic event and the predicates the rest of the
//!   crate needs to classify it (read/write, ordering, dependence).
//! - [`clock`] is the vector-clock representation of happens-before.
//! - [`cycle_graph`] incrementally tracks whether a hypothesized
//!   modification order is still acyclic.
//! - [`node`] and [`node_stack`] are the DPOR backtracking tree.
//! - [`checker`] is the driver that ties the above together: it records
//!   actions, detects conflicts, and decides what to explore next.
//! - [`scheduler`] picks which thread runs next within one execution.
//! - [`harness`] and [`builder`] are the external surface a checked program
//!   and its test runner actually call into.
//! - [`trace_analysis`] and [`sc_analysis`] run once an execution completes,
//!   checking properties that need the whole trace at once.
//! - [`rt`] is the cooperative thread-switching primitive underneath it all.
//! - [`predicate`] is a lightweight exploration-order heuristic.

pub mod action;
pub mod builder;
pub mod checker;
pub mod clock;
pub mod cycle_graph;
pub mod error;
pub mod harness;
pub mod node;
pub mod node_stack;
pub mod predicate;
pub mod rt;
pub mod sc_analysis;
pub mod scheduler;
pub mod thread;
pub mod trace_analysis;

pub use builder::Builder;
pub use error::Violation;
pub use harness::{Harness, Steps, StepContext, ThreadProgram};

//! Cooperative single-threaded-at-a-time execution of the checked program's
//! threads.
//!
//! The specification leaves the exact thread-switching mechanism
//! unconstrained (any cooperative scheme is acceptable) and scopes it as a
//! collaborator rather than a subsystem to get right in full generality.
//! This module is deliberately thin: real OS threads take turns under a
//! single lock, one holds the turn at a time, and `checker::Checker`'s
//! bookkeeping runs inline inside whichever thread currently holds it,
//! rather than on a separate driver thread. Grounded on the turn-passing
//! design of `examples/tokio-rs-loom/src/rt/scheduler/thread.rs`, simplified
//! to avoid that file's unsafe raw-pointer shared state.

mod fiber;

pub use fiber::Runtime;

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! flowforge-supervisor: spawn and tear down a child command as a whole
//! process tree, with a scoped signal trap for cleanup on parent termination.

pub mod output;
pub mod supervisor;
pub mod trap;

pub use output::OutputRing;
pub use supervisor::{ChildExit, StopOutcome, Supervisor, SupervisorError};
pub use trap::SignalTrap;

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! flowforge-policy: threshold decider, deterministic replay digest and
//! signal-baseline drift analysis.

pub mod baseline;
pub mod decider;
pub mod replay;

pub use baseline::{
    bucket_key, BaselineConfig, BaselineEvaluation, BaselineTransition, SignalDelta,
};
pub use baseline::{apply as apply_baseline, evaluate as evaluate_baseline};
pub use decider::{decide, TraceContext, ENGINE_NAME, ENGINE_VERSION};
pub use replay::{canonical_input, compute_digest, verify, ReplayVerdict};

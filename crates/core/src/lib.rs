// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! flowforge-core: shared domain types for the FlowForge control plane

pub mod macros;

pub mod clock;
pub mod decision;
pub mod id;
pub mod records;
pub mod redact;
pub mod state;
pub mod telemetry;

pub use clock::{Clock, FakeClock, SystemClock};
pub use decision::{
    CommandStatus, DecisionAction, ErrorKind, LifecycleDecision, PolicyDecision,
};
pub use id::{short, EventId, RunId};
pub use records::{
    AuditAction, AuditEvent, DecisionTrace, EventKind, Incident, IdempotencyRecord, RolloutMode,
    SignalBaselineState, SignalBaselineStatus, UnifiedEvent,
};
pub use redact::Redactor;
pub use state::{ExitReason, LifecyclePhase, ProcessState, Run, WorkerStatus};
pub use telemetry::{PolicyLimits, Telemetry};

//! Automatic replacement of workflow pods lost to infrastructure failures.
//!
//! A pod can fail before any user code ran: the kubelet evicted it under
//! resource pressure, the scheduler preempted it, the node shut down or
//! drifted out of affinity, or admission rejected it. Treating such a
//! failure as a node failure would fail the user's step without ever
//! executing it, so the controller classifies the terminal state,
//! accounts for the restart on the workflow object, and clears the pod
//! binding so the executor schedules a replacement.

pub mod classifier;
pub mod coordinator;
pub mod counter;
pub mod eviction;
pub mod policy;

pub use classifier::{classify, Classification, RestartableReason};
pub use coordinator::{Outcome, RestartCoordinator};
pub use policy::Command;

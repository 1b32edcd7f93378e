//! Step sequencing.
//!
//! [`Sequencer`] runs a provisioning plan in order, skipping steps whose
//! idempotency check already holds, retrying transient failures with
//! [`RetryPolicy`] backoff, and stopping at the first fatal failure. The
//! result is always a [`ProvisioningReport`].

pub mod backoff;
pub mod report;
pub mod sequencer;

pub use backoff::RetryPolicy;
pub use report::{FatalError, Outcome, ProvisioningReport};
pub use sequencer::{RunProgress, Sequencer};

//! Readiness probing for dependent services.
//!
//! Instead of sleeping for a guessed duration, the sequencer waits on an
//! observed readiness signal:
//!
//! - [`ServiceEndpoint`] - host, port and protocol of a dependency
//! - [`Probe`] / [`NetworkProbe`] - one protocol-level check
//! - [`ReadinessProber`] - polls a probe until ready or out of time
//!
//! # Example
//!
//! ```no_run
//! use provision::readiness::{wait_until_ready, Protocol, ServiceEndpoint};
//! use std::time::Duration;
//!
//! let db = ServiceEndpoint::new("127.0.0.1", 3306, Protocol::Mysql);
//! wait_until_ready(&db, Duration::from_secs(120), Duration::from_secs(2)).unwrap();
//! ```

pub mod endpoint;
pub mod probe;
pub mod prober;

pub use endpoint::{Protocol, ServiceEndpoint};
pub use probe::{NetworkProbe, Probe, HTTP_PING_PATH};
pub use prober::{wait_until_ready, Readiness, ReadinessProber, ReadinessWait};

//! Polling until a service is observably ready.

use super::endpoint::ServiceEndpoint;
use super::probe::{NetworkProbe, Probe};
use crate::cancel::CancellationToken;
use crate::error::{ProvisionError, Result};
use std::time::{Duration, Instant};

/// Lower bound on a single attempt's connect/read timeout.
const MIN_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(100);

/// Outcome of a successful wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    /// Number of checks performed, including the successful one.
    pub attempts: u32,
    /// Time from the first check to success.
    pub elapsed: Duration,
}

/// Polls an endpoint at a fixed cadence until it is ready or a deadline passes.
pub struct ReadinessProber<P: Probe = NetworkProbe> {
    probe: P,
    cancel: Option<CancellationToken>,
}

impl ReadinessProber<NetworkProbe> {
    /// Prober that checks real network services.
    pub fn new() -> Self {
        Self::with_probe(NetworkProbe)
    }
}

impl Default for ReadinessProber<NetworkProbe> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Probe> ReadinessProber<P> {
    /// Prober using a custom probe.
    pub fn with_probe(probe: P) -> Self {
        Self {
            probe,
            cancel: None,
        }
    }

    /// Stop waiting when `token` trips.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Block until `endpoint` passes a readiness check.
    ///
    /// A check is attempted every `poll_interval`. Failed checks are logged
    /// and retried; only once `max_wait` has elapsed does the wait fail with
    /// [`ProvisionError::ReadinessTimeout`]. There is always at least one
    /// attempt, and the last attempt happens at the deadline.
    pub fn wait_until_ready(
        &self,
        endpoint: &ServiceEndpoint,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> Result<Readiness> {
        let start = Instant::now();
        // None when `max_wait` is too large to represent: wait without a deadline.
        let deadline = start.checked_add(max_wait);
        let mut attempts = 0u32;
        let mut last_error = None;

        tracing::debug!(%endpoint, ?max_wait, ?poll_interval, "Waiting for service");

        loop {
            if self.is_cancelled() {
                return Err(ProvisionError::Cancelled);
            }

            attempts += 1;
            let attempt_start = Instant::now();
            let remaining = deadline
                .map(|d| d.saturating_duration_since(attempt_start))
                .unwrap_or(Duration::MAX);
            let attempt_timeout = poll_interval
                .max(MIN_ATTEMPT_TIMEOUT)
                .min(remaining.max(Duration::from_millis(1)));

            match self.probe.check(endpoint, attempt_timeout) {
                Ok(()) => {
                    let elapsed = start.elapsed();
                    tracing::debug!(%endpoint, attempts, ?elapsed, "Service ready");
                    return Ok(Readiness { attempts, elapsed });
                }
                Err(reason) => {
                    tracing::debug!(
                        %endpoint,
                        attempt = attempts,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        %reason,
                        "Service not ready"
                    );
                    last_error = Some(reason);
                }
            }

            let now = Instant::now();
            if deadline.is_some_and(|d| now >= d) {
                return Err(ProvisionError::ReadinessTimeout {
                    endpoint: endpoint.to_string(),
                    waited: start.elapsed(),
                    attempts,
                    last_error,
                });
            }

            let pause = match (attempt_start.checked_add(poll_interval), deadline) {
                (Some(next), Some(d)) => next.min(d).saturating_duration_since(now),
                (Some(next), None) => next.saturating_duration_since(now),
                (None, Some(d)) => d.saturating_duration_since(now),
                (None, None) => poll_interval,
            };
            if !self.sleep(pause) {
                return Err(ProvisionError::Cancelled);
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }

    fn sleep(&self, duration: Duration) -> bool {
        match &self.cancel {
            Some(token) => token.sleep(duration),
            None => {
                std::thread::sleep(duration);
                true
            }
        }
    }
}

/// Something the sequencer can block on until an endpoint is ready.
pub trait ReadinessWait {
    /// See [`ReadinessProber::wait_until_ready`].
    fn wait(
        &self,
        endpoint: &ServiceEndpoint,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> Result<Readiness>;
}

impl<P: Probe> ReadinessWait for ReadinessProber<P> {
    fn wait(
        &self,
        endpoint: &ServiceEndpoint,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> Result<Readiness> {
        self.wait_until_ready(endpoint, max_wait, poll_interval)
    }
}

/// Wait on a real network endpoint.
pub fn wait_until_ready(
    endpoint: &ServiceEndpoint,
    max_wait: Duration,
    poll_interval: Duration,
) -> Result<Readiness> {
    ReadinessProber::new().wait_until_ready(endpoint, max_wait, poll_interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readiness::endpoint::Protocol;
    use std::cell::Cell;
    use std::net::TcpListener;
    use std::thread;

    /// Ready from the `ready_on`-th check onward.
    struct ScriptedProbe {
        ready_on: u32,
        calls: Cell<u32>,
    }

    impl ScriptedProbe {
        fn ready_on(n: u32) -> Self {
            Self {
                ready_on: n,
                calls: Cell::new(0),
            }
        }
    }

    impl Probe for ScriptedProbe {
        fn check(&self, _endpoint: &ServiceEndpoint, _timeout: Duration) -> std::result::Result<(), String> {
            let n = self.calls.get() + 1;
            self.calls.set(n);
            if n >= self.ready_on {
                Ok(())
            } else {
                Err("connection refused".to_string())
            }
        }
    }

    fn endpoint() -> ServiceEndpoint {
        ServiceEndpoint::new("db", 3306, Protocol::Mysql)
    }

    fn free_port() -> u16 {
        TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[test]
    fn returns_immediately_when_ready() {
        let prober = ReadinessProber::with_probe(ScriptedProbe::ready_on(1));
        let start = Instant::now();

        let readiness = prober
            .wait_until_ready(&endpoint(), Duration::from_secs(5), Duration::from_secs(1))
            .unwrap();

        assert_eq!(readiness.attempts, 1);
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn polls_until_ready() {
        let prober = ReadinessProber::with_probe(ScriptedProbe::ready_on(4));

        let readiness = prober
            .wait_until_ready(&endpoint(), Duration::from_secs(5), Duration::from_millis(20))
            .unwrap();

        assert_eq!(readiness.attempts, 4);
        assert!(readiness.elapsed >= Duration::from_millis(60));
    }

    #[test]
    fn times_out_no_earlier_than_max_wait() {
        let prober = ReadinessProber::with_probe(ScriptedProbe::ready_on(u32::MAX));
        let start = Instant::now();

        let err = prober
            .wait_until_ready(&endpoint(), Duration::from_millis(250), Duration::from_millis(40))
            .unwrap_err();

        assert!(start.elapsed() >= Duration::from_millis(250));
        match err {
            ProvisionError::ReadinessTimeout {
                attempts,
                last_error,
                ..
            } => {
                assert!(attempts >= 2);
                assert_eq!(last_error.as_deref(), Some("connection refused"));
            }
            other => panic!("expected ReadinessTimeout, got {other:?}"),
        }
    }

    #[test]
    fn zero_max_wait_still_attempts_once() {
        let prober = ReadinessProber::with_probe(ScriptedProbe::ready_on(1));

        let readiness = prober
            .wait_until_ready(&endpoint(), Duration::ZERO, Duration::from_millis(10))
            .unwrap();

        assert_eq!(readiness.attempts, 1);
    }

    #[test]
    fn unbounded_max_wait_polls_without_deadline() {
        let prober = ReadinessProber::with_probe(ScriptedProbe::ready_on(3));

        let readiness = prober
            .wait_until_ready(&endpoint(), Duration::MAX, Duration::from_millis(10))
            .unwrap();

        assert_eq!(readiness.attempts, 3);
    }

    #[test]
    fn huge_poll_interval_is_cut_to_the_deadline() {
        let prober = ReadinessProber::with_probe(ScriptedProbe::ready_on(u32::MAX));
        let start = Instant::now();

        let err = prober
            .wait_until_ready(&endpoint(), Duration::from_millis(100), Duration::MAX)
            .unwrap_err();

        assert!(matches!(err, ProvisionError::ReadinessTimeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn cancellation_stops_waiting() {
        let token = CancellationToken::new();
        let prober =
            ReadinessProber::with_probe(ScriptedProbe::ready_on(u32::MAX)).with_cancellation(token.clone());
        let remote = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(80));
            remote.cancel();
        });

        let err = prober
            .wait_until_ready(&endpoint(), Duration::from_secs(30), Duration::from_millis(20))
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Cancelled));
        handle.join().unwrap();
    }

    #[test]
    fn real_listener_that_appears_late_is_detected_after_it_appears() {
        let port = free_port();
        let appear_after = Duration::from_millis(400);
        let poll = Duration::from_millis(50);

        let handle = thread::spawn(move || {
            thread::sleep(appear_after);
            let listener = TcpListener::bind(("127.0.0.1", port)).unwrap();
            let _ = listener.accept();
        });

        let ep = ServiceEndpoint::new("127.0.0.1", port, Protocol::Tcp);
        let start = Instant::now();
        wait_until_ready(&ep, Duration::from_secs(10), poll).unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= appear_after, "ready before listener existed: {elapsed:?}");
        // One poll interval plus scheduling slack.
        assert!(elapsed < appear_after + poll + Duration::from_millis(500), "{elapsed:?}");
        handle.join().unwrap();
    }

    #[test]
    fn real_listener_that_never_appears_times_out() {
        let ep = ServiceEndpoint::new("127.0.0.1", free_port(), Protocol::Tcp);
        let max_wait = Duration::from_millis(300);
        let start = Instant::now();

        let err = wait_until_ready(&ep, max_wait, Duration::from_millis(50)).unwrap_err();

        assert!(matches!(err, ProvisionError::ReadinessTimeout { .. }));
        assert!(start.elapsed() >= max_wait);
    }
}

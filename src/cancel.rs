//! Cooperative cancellation.
//!
//! A [`CancellationToken`] is shared by the sequencer, the process runner
//! and the readiness prober. It trips either when [`CancellationToken::cancel`]
//! is called or, for tokens created with [`CancellationToken::from_signals`],
//! when the process receives SIGINT or SIGTERM.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Set from the signal handler. Only ever stored to, never cleared.
static SIGNALLED: AtomicBool = AtomicBool::new(false);

/// Slice used when sleeping so cancellation is noticed promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(25);

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    watch_signals: bool,
}

impl CancellationToken {
    /// A token that only trips when cancelled explicitly.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also trips on SIGINT/SIGTERM.
    ///
    /// Installs the signal handlers on first use.
    pub fn from_signals() -> Self {
        install_signal_handlers();
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            watch_signals: true,
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || (self.watch_signals && SIGNALLED.load(Ordering::SeqCst))
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `false` if the sleep was cut short by cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        let start = Instant::now();
        loop {
            if self.is_cancelled() {
                return false;
            }
            let remaining = duration.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return true;
            }
            std::thread::sleep(SLEEP_SLICE.min(remaining));
        }
    }
}

#[cfg(unix)]
extern "C" fn on_signal(_signum: libc::c_int) {
    SIGNALLED.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
fn install_signal_handlers() {
    use std::sync::Once;
    static INSTALL: Once = Once::new();

    INSTALL.call_once(|| {
        let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        // SAFETY: the handler only performs an atomic store, which is async-signal-safe.
        unsafe {
            libc::signal(libc::SIGINT, handler);
            libc::signal(libc::SIGTERM, handler);
        }
        tracing::debug!("Installed SIGINT/SIGTERM handlers");
    });
}

#[cfg(not(unix))]
fn install_signal_handlers() {}

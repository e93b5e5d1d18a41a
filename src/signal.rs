//! SIGINT/SIGTERM -> process-wide shutdown flag.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_: libc::c_int) {
    // only async-signal-safe work here
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Install handlers for SIGINT and SIGTERM.
pub fn install() {
    for sig in [libc::SIGINT, libc::SIGTERM] {
        // SAFETY: the handler only stores to an atomic.
        let prev = unsafe { libc::signal(sig, on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t) };
        if prev == libc::SIG_ERR {
            warn!("Failed to install handler for signal {sig}");
        }
    }
}

/// Flag raised once an interrupt has been received.
pub fn flag() -> &'static AtomicBool {
    &INTERRUPTED
}

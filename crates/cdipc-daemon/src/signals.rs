//! Termination signal handling
//!
//! Handlers are installed without `SA_RESTART`, so a blocking receive is cut
//! short with `EINTR` and the loop gets a chance to look at the flag.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use tracing::debug;

use crate::error::{DaemonError, Result};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_signal: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

/// Route SIGINT, SIGHUP and SIGTERM to the shutdown flag
pub fn install_handlers() -> Result<()> {
    let action = SigAction::new(SigHandler::Handler(on_signal), SaFlags::empty(), SigSet::empty());
    for signal in [Signal::SIGINT, Signal::SIGHUP, Signal::SIGTERM] {
        // SAFETY: the handler only stores to an atomic
        unsafe { sigaction(signal, &action) }.map_err(DaemonError::Signal)?;
    }
    debug!("Installed termination signal handlers");
    Ok(())
}

/// Whether a termination signal has arrived
pub fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

//! SIGINT/SIGTERM handling.
//!
//! The first signal only raises a flag. Commands refuse to start once it is set and the
//! pipeline stops at the next stage boundary, so the mount record still gets unwound.
//! A second signal restores the default disposition and re-raises it.

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use tracing::debug;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static SIGNAL_COUNT: AtomicUsize = AtomicUsize::new(0);
static CAUGHT_SIGNAL: AtomicI32 = AtomicI32::new(0);

fn write_stderr(msg: &[u8]) {
    // write(2) is async-signal-safe; tracing is not.
    unsafe {
        libc::write(2, msg.as_ptr() as *const libc::c_void, msg.len());
    }
}

extern "C" fn handle_signal(sig: libc::c_int) {
    let prev = SIGNAL_COUNT.fetch_add(1, Ordering::SeqCst);

    if prev == 0 {
        INTERRUPTED.store(true, Ordering::SeqCst);
        CAUGHT_SIGNAL.store(sig, Ordering::SeqCst);
        write_stderr(b"\nInterrupt received, finishing current step and unmounting...\n");
        return;
    }

    write_stderr(b"\nForced exit, mounts may remain. Run: prismstrap cleanup\n");
    if let Ok(signal) = Signal::try_from(sig) {
        unsafe {
            let _ = signal::signal(signal, SigHandler::SigDfl);
        }
        let _ = signal::raise(signal);
    }
}

/// Install the handlers for SIGINT and SIGTERM. Calling it again is harmless.
pub fn install_signal_handlers() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(handle_signal),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    for sig in [Signal::SIGINT, Signal::SIGTERM] {
        unsafe {
            signal::sigaction(sig, &action)?;
        }
    }
    debug!("Signal handlers installed");
    Ok(())
}

/// Returns `true` once SIGINT or SIGTERM has been received.
pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Re-raise the caught signal with the default handler so the parent sees the real
/// termination status. No-op when nothing was caught.
pub fn reraise() {
    let sig = CAUGHT_SIGNAL.load(Ordering::SeqCst);
    if sig == 0 {
        return;
    }
    if let Ok(signal) = Signal::try_from(sig) {
        unsafe {
            let _ = signal::signal(signal, SigHandler::SigDfl);
        }
        let _ = signal::raise(signal);
    }
}

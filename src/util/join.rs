//! Bounded thread joins for shutdown paths.

use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, warn};

/// Join `handle`, waiting at most `timeout`.
///
/// Returns `true` if the thread exited (cleanly or by panic) within the
/// budget. On timeout the thread is detached so shutdown never hangs.
pub(crate) fn join_timeout(handle: JoinHandle<()>, timeout: Duration, name: &str) -> bool {
    let (tx, rx) = std::sync::mpsc::channel();
    let waiter = std::thread::spawn(move || {
        let _ = tx.send(handle.join().is_ok());
    });

    match rx.recv_timeout(timeout) {
        Ok(true) => {
            debug!(thread = name, "thread joined");
            let _ = waiter.join();
            true
        }
        Ok(false) => {
            warn!(thread = name, "thread panicked before join");
            let _ = waiter.join();
            true
        }
        Err(_) => {
            warn!(thread = name, "thread did not exit within timeout - detaching");
            false
        }
    }
}

//! `SIGALRM` deadline and `SIGINT` handling, both collapsed into a single
//! `should_stop` polling seam the core driver consumes without depending
//! on any particular signal mechanism itself (see
//! `rowhammer_core::hammer::run_bank_profiled`/`run_huge_page`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Set from the raw `SIGALRM` handler, which (unlike `ctrlc`'s handler) is
/// a bare `extern "C" fn` and cannot capture an `Arc`.
static ALARM_FIRED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_alarm(_signum: libc::c_int) {
    ALARM_FIRED.store(true, Ordering::SeqCst);
}

/// Install `SIGINT` (via `ctrlc`) and, if `deadline_secs > 0`, a `SIGALRM`
/// deadline (via `libc::alarm`). Returns a flag that also reflects `SIGINT`;
/// callers should OR it with [`alarm_fired`] to get the full terminal
/// condition.
pub fn install(deadline_secs: u64) -> Arc<AtomicBool> {
    let interrupted = Arc::new(AtomicBool::new(false));

    let handler_flag = interrupted.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .expect("failed to install SIGINT handler");

    if deadline_secs > 0 {
        unsafe {
            libc::signal(libc::SIGALRM, on_alarm as usize);
            libc::alarm(deadline_secs as libc::c_uint);
        }
    }

    interrupted
}

pub fn alarm_fired() -> bool {
    ALARM_FIRED.load(Ordering::SeqCst)
}

/// Build the `should_stop` closure the core driver polls between outer
/// iterations.
pub fn should_stop_fn(interrupted: Arc<AtomicBool>) -> impl Fn() -> bool {
    move || interrupted.load(Ordering::SeqCst) || alarm_fired()
}

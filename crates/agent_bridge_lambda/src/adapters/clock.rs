use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Headroom kept back from the invocation deadline for the final engine
/// call and for returning the response.
pub const DEADLINE_MARGIN: Duration = Duration::from_secs(10);

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Parks the invocation thread. The poll loop is synchronous by design, so
/// the worker is handed back to the runtime while it waits.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        tokio::task::block_in_place(|| std::thread::sleep(duration));
    }
}

/// Time left before `deadline_ms` (milliseconds since the Unix epoch, as
/// the Lambda runtime reports it), less [`DEADLINE_MARGIN`].
pub fn time_budget(deadline_ms: u64, now: SystemTime) -> Duration {
    let now_ms = now
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as u64);
    Duration::from_millis(deadline_ms.saturating_sub(now_ms)).saturating_sub(DEADLINE_MARGIN)
}

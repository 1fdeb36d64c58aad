use std::future::Future;

/// Drives an SDK future to completion from synchronous handler code running
/// on a multi-threaded Tokio runtime.
pub fn block_on_current<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

//! Cancellation plumbing shared by the pipeline stages.
//!
//! A run carries one `tokio::sync::watch` channel; the sender flips to
//! `true` exactly once. Stage tasks check the flag between attempts and give
//! in-flight external calls a bounded grace period once it flips.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

/// A cancellation signal that never fires, for callers without one.
///
/// The sender is dropped immediately; [`cancelled`] treats a closed channel
/// as never-cancelled.
pub fn never() -> watch::Receiver<bool> {
    let (_tx, rx) = watch::channel(false);
    rx
}

/// Whether cancellation has been requested.
pub fn is_cancelled(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow()
}

/// Resolve when cancellation is requested. If the sender is dropped without
/// cancelling, park forever (the run simply completes).
pub async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Drive `fut` to completion unless cancellation fires first; after the
/// signal, the in-flight future gets `grace` to finish or abort. `None`
/// means the grace period expired.
pub async fn with_grace<F>(fut: F, rx: &watch::Receiver<bool>, grace: Duration) -> Option<F::Output>
where
    F: Future,
{
    tokio::pin!(fut);

    if is_cancelled(rx) {
        return tokio::time::timeout(grace, &mut fut).await.ok();
    }

    let mut cancel_rx = rx.clone();
    tokio::select! {
        out = &mut fut => Some(out),
        _ = cancelled(&mut cancel_rx) => tokio::time::timeout(grace, &mut fut).await.ok(),
    }
}

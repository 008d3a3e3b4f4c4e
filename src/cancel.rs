use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative interrupt flag, checked at the top of each crawl and export
/// loop body.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Sets the flag on the first Ctrl-C instead of terminating the process,
    /// so the caller can still write out what it has accumulated.
    pub fn on_ctrl_c() -> Self {
        let flag = Self::default();
        let handle = flag.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; finishing up");
                handle.cancel();
            }
        });
        flag
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

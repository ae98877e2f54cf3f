use std::time::{Duration, Instant};

use ports::secondary::reactor_port::ReactorPort;
use tokio::runtime::Handle;

/// Reactor backed by the tokio timer wheel.
pub struct TokioReactor {
    handle: Handle,
    epoch: Instant,
}

impl TokioReactor {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            epoch: Instant::now(),
        }
    }
}

impl ReactorPort for TokioReactor {
    fn now_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn schedule(&self, delay_millis: u64, task: Box<dyn FnOnce() + Send>) {
        self.handle.spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_millis)).await;
            task();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn schedule_fires_after_delay() {
        let reactor = TokioReactor::new(Handle::current());
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        reactor.schedule(50, Box::new(move || flag.store(true, Ordering::SeqCst)));

        tokio::time::sleep(Duration::from_millis(49)).await;
        tokio::task::yield_now().await;
        assert!(!fired.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert!(fired.load(Ordering::SeqCst));
    }
}

/// Secondary port for time: a millisecond clock plus one-shot timers.
///
/// The domain's caches never read the system clock; every timestamp
/// and timer goes through this port so tests can drive a virtual
/// clock deterministically.
pub trait ReactorPort: Send + Sync {
    /// Milliseconds since an arbitrary epoch. Monotonic.
    fn now_millis(&self) -> u64;

    /// Run `task` once, `delay_millis` from now. There is no
    /// cancellation; tasks re-check state when they fire.
    fn schedule(&self, delay_millis: u64, task: Box<dyn FnOnce() + Send>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reactor_port_is_object_safe() {
        fn _check(port: &dyn ReactorPort) {
            let _ = port.now_millis();
        }
    }
}

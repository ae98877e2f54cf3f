use std::sync::Mutex;

use ports::secondary::reactor_port::ReactorPort;
use tracing::error;

type Task = Box<dyn FnOnce() + Send>;

/// Virtual-clock reactor for tests.
///
/// Time only moves through [`advance`](Self::advance), which runs due
/// tasks in deadline order with the internal lock released, so tasks
/// may schedule follow-ups (retry timers do).
#[derive(Default)]
pub struct MockReactor {
    inner: Mutex<MockInner>,
}

#[derive(Default)]
struct MockInner {
    now: u64,
    next_seq: u64,
    tasks: Vec<ScheduledTask>,
}

struct ScheduledTask {
    deadline: u64,
    seq: u64,
    task: Task,
}

impl MockReactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `delta_millis`, firing every task
    /// whose deadline falls inside the window, earliest first.
    pub fn advance(&self, delta_millis: u64) {
        let target = match self.inner.lock() {
            Ok(inner) => inner.now + delta_millis,
            Err(_) => {
                error!("mock reactor lock poisoned");
                return;
            }
        };
        loop {
            let due = {
                let Ok(mut inner) = self.inner.lock() else {
                    error!("mock reactor lock poisoned");
                    return;
                };
                let next = inner
                    .tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.deadline <= target)
                    .min_by_key(|(_, t)| (t.deadline, t.seq))
                    .map(|(i, _)| i);
                match next {
                    Some(i) => {
                        let entry = inner.tasks.swap_remove(i);
                        inner.now = inner.now.max(entry.deadline);
                        Some(entry.task)
                    }
                    None => {
                        inner.now = target;
                        None
                    }
                }
            };
            match due {
                Some(task) => task(),
                None => break,
            }
        }
    }

    pub fn pending_tasks(&self) -> usize {
        self.inner.lock().map(|inner| inner.tasks.len()).unwrap_or(0)
    }
}

impl ReactorPort for MockReactor {
    fn now_millis(&self) -> u64 {
        self.inner.lock().map(|inner| inner.now).unwrap_or(0)
    }

    fn schedule(&self, delay_millis: u64, task: Task) {
        let Ok(mut inner) = self.inner.lock() else {
            error!("mock reactor lock poisoned, task dropped");
            return;
        };
        let deadline = inner.now + delay_millis;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.tasks.push(ScheduledTask {
            deadline,
            seq,
            task,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn advance_fires_due_tasks_in_order() {
        let reactor = Arc::new(MockReactor::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        for (delay, tag) in [(30u64, "late"), (10, "early"), (50, "never")] {
            let order = Arc::clone(&order);
            reactor.schedule(delay, Box::new(move || order.lock().unwrap().push(tag)));
        }
        reactor.advance(40);
        assert_eq!(*order.lock().unwrap(), vec!["early", "late"]);
        assert_eq!(reactor.now_millis(), 40);
        assert_eq!(reactor.pending_tasks(), 1);
    }

    #[test]
    fn task_may_reschedule_itself() {
        let reactor = Arc::new(MockReactor::new());
        let fired = Arc::new(AtomicUsize::new(0));

        fn arm(reactor: &Arc<MockReactor>, fired: &Arc<AtomicUsize>) {
            let r = Arc::clone(reactor);
            let f = Arc::clone(fired);
            reactor.schedule(
                10,
                Box::new(move || {
                    f.fetch_add(1, Ordering::SeqCst);
                    if f.load(Ordering::SeqCst) < 3 {
                        arm(&r, &f);
                    }
                }),
            );
        }

        arm(&reactor, &fired);
        reactor.advance(100);
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        assert_eq!(reactor.now_millis(), 100);
    }
}

use std::time::Duration;

use crate::policies::AttemptPolicy;

/// Configuration of a [`WorkerPool`](crate::WorkerPool).
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Initial number of execution slots.
    pub size: usize,

    /// Interval of the assignment tick started by `start()`.
    pub tick: Duration,

    /// Attempt policy applied to every task the pool executes.
    pub attempt: AttemptPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 4,
            tick: Duration::from_millis(10),
            attempt: AttemptPolicy::default(),
        }
    }
}

use std::time::Duration;

/// Runtime configuration for a worker process.
///
/// Constructed with [`Config::default`] and adjusted with the setter
/// methods.
#[derive(Clone, Debug)]
pub struct Config {
    /// Sleep between loop iterations (claim attempts). Default 1s.
    pub tick_interval: Duration,

    /// Seconds of heartbeat silence after which a worker is presumed dead.
    /// Default 300s.
    pub cleanup_timeout: Duration,

    /// Fraction of `tick_interval` worth of jitter applied (downward) to the
    /// sleep between loop iterations, to avoid every worker in a large
    /// fleet hitting the database at the same instant. Purely a load
    /// smoothing knob; it does not change observable task or worker state.
    pub heartbeat_jitter: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            cleanup_timeout: Duration::from_secs(300),
            heartbeat_jitter: 0.25,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn cleanup_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_timeout = timeout;
        self
    }

    pub fn heartbeat_jitter(mut self, jitter: f64) -> Self {
        self.heartbeat_jitter = jitter;
        self
    }
}

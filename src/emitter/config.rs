//! Emitter configuration

use std::time::Duration;

/// Upstream transport and lifecycle monitoring options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitterConfig {
    /// Endpoint of the node's publish-subscribe socket
    pub endpoint: String,

    /// Close the transport if it has not connected within this time
    pub connect_timeout: Duration,

    /// Polling interval of the transport's own lifecycle monitor
    ///
    /// Not used by the emitter; handed to the transport through
    /// `TransportFactory::create`.
    pub monitor_interval: Duration,

    /// Minimum time between two log lines for the same lifecycle event kind
    pub monitor_logging_throttle: Duration,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            endpoint: "tcp://127.0.0.1:7902".to_string(),
            connect_timeout: Duration::from_secs(10),
            monitor_interval: Duration::from_millis(500),
            monitor_logging_throttle: Duration::from_secs(60),
        }
    }
}

impl EmitterConfig {
    /// Create a config for `host:port`
    pub fn with_endpoint(host: &str, port: u16) -> Self {
        Self {
            endpoint: format!("tcp://{}:{}", host, port),
            ..Default::default()
        }
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the monitor polling interval
    pub fn monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    /// Set the lifecycle logging throttle window
    pub fn monitor_logging_throttle(mut self, throttle: Duration) -> Self {
        self.monitor_logging_throttle = throttle;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmitterConfig::default();

        assert_eq!(config.endpoint, "tcp://127.0.0.1:7902");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.monitor_logging_throttle, Duration::from_secs(60));
    }

    #[test]
    fn test_builder_chaining() {
        let config = EmitterConfig::with_endpoint("node.local", 7912)
            .connect_timeout(Duration::from_secs(2))
            .monitor_interval(Duration::from_millis(100))
            .monitor_logging_throttle(Duration::from_secs(5));

        assert_eq!(config.endpoint, "tcp://node.local:7912");
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.monitor_interval, Duration::from_millis(100));
        assert_eq!(config.monitor_logging_throttle, Duration::from_secs(5));
    }
}

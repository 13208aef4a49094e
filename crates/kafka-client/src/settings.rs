use std::time::Duration;

use relay_types::{Error, Result};

/// Connection settings shared by the consumer and the producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Bootstrap brokers (`host:port`)
    pub brokers: Vec<String>,
    /// Topic the consumer subscribes to
    pub source_topic: String,
    /// Topic every record is written to
    pub destination_topic: String,
    /// Consumer group ID
    ///
    /// Committed offsets are stored per group, so restarting with the same
    /// group resumes after the last committed record.
    pub group_id: String,
    /// Bound on establishing a broker connection, also used for the final flush
    pub connect_timeout: Duration,
    /// Consumer group session timeout in milliseconds
    pub session_timeout_ms: u32,
    /// Consumer group heartbeat interval in milliseconds
    pub heartbeat_interval_ms: u32,
    /// librdkafka partitioner name for the producer
    pub partitioner: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9093".to_string()],
            source_topic: "source-topic".to_string(),
            destination_topic: "destination-topic".to_string(),
            group_id: "exporter-group".to_string(),
            connect_timeout: Duration::from_secs(10),
            session_timeout_ms: 30_000,
            heartbeat_interval_ms: 3_000,
            partitioner: "fnv1a_random".to_string(),
        }
    }
}

impl ClientSettings {
    /// Check the settings before any client is built.
    pub fn validate(&self) -> Result<()> {
        if self.brokers.iter().all(|b| b.trim().is_empty()) {
            return Err(Error::InvalidConfig(
                "at least one broker address is required".to_string(),
            ));
        }
        if self.source_topic.trim().is_empty() {
            return Err(Error::InvalidConfig("source topic is empty".to_string()));
        }
        if self.destination_topic.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "destination topic is empty".to_string(),
            ));
        }
        if self.source_topic == self.destination_topic {
            return Err(Error::InvalidConfig(format!(
                "source and destination topic are both '{}'",
                self.source_topic
            )));
        }
        if self.group_id.trim().is_empty() {
            return Err(Error::InvalidConfig("group id is empty".to_string()));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "connect timeout must be greater than zero".to_string(),
            ));
        }
        // librdkafka rejects a heartbeat interval that is not below the session timeout.
        if self.heartbeat_interval_ms >= self.session_timeout_ms {
            return Err(Error::InvalidConfig(format!(
                "heartbeat interval ({} ms) must be lower than session timeout ({} ms)",
                self.heartbeat_interval_ms, self.session_timeout_ms
            )));
        }
        Ok(())
    }

    /// Brokers as a `bootstrap.servers` value, blanks dropped.
    pub fn bootstrap_servers(&self) -> String {
        self.brokers
            .iter()
            .map(|b| b.trim())
            .filter(|b| !b.is_empty())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_reason(settings: &ClientSettings) -> String {
        match settings.validate() {
            Err(Error::InvalidConfig(reason)) => reason,
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = ClientSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.bootstrap_servers(), "localhost:9093");
        assert_eq!(settings.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_bootstrap_servers_skips_blanks() {
        let settings = ClientSettings {
            brokers: vec![
                " broker-1:9093".to_string(),
                "".to_string(),
                "broker-2:9093 ".to_string(),
            ],
            ..Default::default()
        };
        settings.validate().unwrap();
        assert_eq!(settings.bootstrap_servers(), "broker-1:9093,broker-2:9093");
    }

    #[test]
    fn test_rejects_missing_brokers() {
        let settings = ClientSettings {
            brokers: vec!["  ".to_string()],
            ..Default::default()
        };
        assert!(invalid_reason(&settings).contains("broker"));

        let settings = ClientSettings {
            brokers: Vec::new(),
            ..Default::default()
        };
        assert!(invalid_reason(&settings).contains("broker"));
    }

    #[test]
    fn test_rejects_same_source_and_destination() {
        let settings = ClientSettings {
            source_topic: "events".to_string(),
            destination_topic: "events".to_string(),
            ..Default::default()
        };
        assert!(invalid_reason(&settings).contains("'events'"));
    }

    #[test]
    fn test_rejects_empty_topics_and_group() {
        let settings = ClientSettings {
            source_topic: String::new(),
            ..Default::default()
        };
        assert_eq!(invalid_reason(&settings), "source topic is empty");

        let settings = ClientSettings {
            destination_topic: " ".to_string(),
            ..Default::default()
        };
        assert_eq!(invalid_reason(&settings), "destination topic is empty");

        let settings = ClientSettings {
            group_id: String::new(),
            ..Default::default()
        };
        assert_eq!(invalid_reason(&settings), "group id is empty");
    }

    #[test]
    fn test_rejects_heartbeat_not_below_session_timeout() {
        let settings = ClientSettings {
            session_timeout_ms: 3_000,
            heartbeat_interval_ms: 3_000,
            ..Default::default()
        };
        assert!(invalid_reason(&settings).contains("heartbeat"));
    }

    #[test]
    fn test_rejects_zero_connect_timeout() {
        let settings = ClientSettings {
            connect_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(invalid_reason(&settings).contains("connect timeout"));
    }
}

//! Environment configuration shared by all services.
//!
//! Variable names are fixed for operator compatibility; every reader goes
//! through [`env_or`] so defaults live in one place.

use std::env;

/// Topic carrying chat records, partition-keyed by room.
pub const CHAT_TOPIC: &str = "chat-in";

/// Read an environment variable, falling back to `default` when unset or
/// empty.
pub fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Postgres connection string assembled from the `DB_*` variables.
pub fn database_url() -> String {
    format!(
        "postgres://{}:{}@{}:{}/{}?sslmode={}",
        env_or("DB_USER", "postgres"),
        env_or("DB_PASSWORD", "postgres"),
        env_or("DB_HOST", "localhost"),
        env_or("DB_PORT", "5432"),
        env_or("DB_NAME", "chat"),
        env_or("SSL_MODE", "disable"),
    )
}

/// Broker settings shared by the gateway and the persister.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub brokers: String,
    pub consumer_group: String,
    pub dlq_topic: String,
}

impl BrokerConfig {
    pub fn from_env() -> Self {
        Self {
            brokers: env_or("KAFKA_BROKERS", "localhost:9092"),
            consumer_group: env_or("KAFKA_CONSUMER_GROUP", "persist-svc"),
            dlq_topic: env_or("KAFKA_DLQ_TOPIC", "chat-dlq"),
        }
    }
}

pub fn auth_port() -> u16 {
    parse_port("AUTH_PORT", 8080)
}

pub fn gateway_port() -> u16 {
    parse_port("GATEWAY_PORT", 8081)
}

fn parse_port(key: &str, default: u16) -> u16 {
    env_or(key, &default.to_string()).parse().unwrap_or(default)
}

pub fn jwt_secret() -> String {
    env_or("JWT_SECRET", "dev_only_secret")
}

/// Maximum in-memory insert attempts before a record is dead-lettered.
pub fn db_max_retries() -> u32 {
    env_or("DB_MAX_RETRIES", "3").parse().unwrap_or(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_prefers_the_variable_when_set() {
        env::set_var("CONFIG_TEST_PRESENT", "from-env");
        assert_eq!(env_or("CONFIG_TEST_PRESENT", "fallback"), "from-env");
        env::remove_var("CONFIG_TEST_PRESENT");
    }

    #[test]
    fn env_or_falls_back_when_unset_or_empty() {
        assert_eq!(env_or("CONFIG_TEST_MISSING", "fallback"), "fallback");

        env::set_var("CONFIG_TEST_EMPTY", "");
        assert_eq!(env_or("CONFIG_TEST_EMPTY", "fallback"), "fallback");
        env::remove_var("CONFIG_TEST_EMPTY");
    }

    #[test]
    fn database_url_defaults_are_well_formed() {
        let url = database_url();
        assert!(url.starts_with("postgres://"));
        assert!(url.contains("sslmode="));
    }
}

//! Server configuration module
//! Handles runtime parameters for the pair-chat server

use crate::constants::{
    DEFAULT_FILTERED_WORDS, DEFAULT_HOST, DEFAULT_PORT, ROOM_HISTORY_LIMIT, SPAM_MAX_MESSAGES,
    SPAM_WINDOW_SECS,
};
use crate::error::{PairlinkError, Result};
use std::env;
use std::time::Duration;

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of messages retained per room before eviction
    pub room_history_limit: usize,
    /// Sliding window inspected by the spam detector
    pub spam_window: Duration,
    /// Messages admitted per connection within the spam window
    pub spam_max_messages: usize,
    /// Terms masked out of message content, applied in list order
    pub filtered_words: Vec<String>,
    /// Credentials for the admin management API
    pub admin_username: String,
    pub admin_password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        panic!("ServerConfig::default() is not allowed for security reasons. Use ServerConfig::from_env() instead.");
    }
}

impl ServerConfig {
    /// Create a test configuration - DANGEROUS: Only for testing!
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            room_history_limit: ROOM_HISTORY_LIMIT,
            spam_window: Duration::from_secs(SPAM_WINDOW_SECS),
            spam_max_messages: SPAM_MAX_MESSAGES,
            filtered_words: DEFAULT_FILTERED_WORDS.iter().map(|w| w.to_string()).collect(),
            admin_username: "admin".to_string(),
            admin_password: "unit-test-admin-pass-0nly".to_string(),
        }
    }

    /// Validate that the admin password meets security requirements
    fn validate_admin_password(password: &str) -> Result<()> {
        if password.len() < 12 {
            return Err(PairlinkError::Config(
                "Admin password must be at least 12 characters long".to_string(),
            ));
        }

        // Check for insecure default or example values
        let insecure_patterns = ["password", "admin123", "change-this", "default", "12345"];

        for pattern in &insecure_patterns {
            if password.to_lowercase().contains(pattern) {
                return Err(PairlinkError::Config(format!(
                    "Admin password contains insecure pattern '{}'. Please use a secure random password generated with: openssl rand -base64 24",
                    pattern
                )));
            }
        }

        Ok(())
    }

    /// Load configuration from environment variables if available
    pub fn from_env() -> Result<Self> {
        let host = env::var("PAIRLINK_HOST").unwrap_or(DEFAULT_HOST.to_string());
        let port = env::var("PAIRLINK_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let room_history_limit = env::var("PAIRLINK_ROOM_HISTORY_LIMIT")
            .ok()
            .and_then(|h| h.parse().ok())
            .unwrap_or(ROOM_HISTORY_LIMIT);

        let spam_window_secs = env::var("PAIRLINK_SPAM_WINDOW_SECS")
            .ok()
            .and_then(|w| w.parse().ok())
            .unwrap_or(SPAM_WINDOW_SECS);

        let spam_max_messages = env::var("PAIRLINK_SPAM_MAX_MESSAGES")
            .ok()
            .and_then(|m| m.parse().ok())
            .unwrap_or(SPAM_MAX_MESSAGES);

        // Comma-separated override for the redaction list
        let filtered_words = env::var("PAIRLINK_FILTERED_WORDS")
            .map(|raw| {
                raw.split(',')
                    .map(|w| w.trim().to_string())
                    .filter(|w| !w.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| DEFAULT_FILTERED_WORDS.iter().map(|w| w.to_string()).collect());

        let admin_username =
            env::var("PAIRLINK_ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());

        let admin_password = env::var("PAIRLINK_ADMIN_PASSWORD").map_err(|_| {
            PairlinkError::Config(
                "PAIRLINK_ADMIN_PASSWORD environment variable is required for the admin API. \
                 Generate one with: openssl rand -base64 24"
                    .to_string(),
            )
        })?;

        Self::validate_admin_password(&admin_password)?;

        Ok(Self {
            host,
            port,
            room_history_limit,
            spam_window: Duration::from_secs(spam_window_secs),
            spam_max_messages,
            filtered_words,
            admin_username,
            admin_password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "ServerConfig::default() is not allowed for security reasons")]
    fn test_default_panics() {
        let _ = ServerConfig::default();
    }

    #[test]
    fn test_for_testing_works_in_tests() {
        let config = ServerConfig::for_testing();
        assert_eq!(config.spam_max_messages, SPAM_MAX_MESSAGES);
        assert!(!config.filtered_words.is_empty());
    }

    #[test]
    fn test_from_env_requires_admin_password() {
        // Clear any existing env var
        env::remove_var("PAIRLINK_ADMIN_PASSWORD");

        let result = ServerConfig::from_env();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("PAIRLINK_ADMIN_PASSWORD"));
    }

    #[test]
    fn test_weak_admin_password_rejected() {
        assert!(ServerConfig::validate_admin_password("short").is_err());
        assert!(ServerConfig::validate_admin_password("password-123456").is_err());
        assert!(ServerConfig::validate_admin_password("fJ3k-rQ9x-mB7w-zT2n").is_ok());
    }
}

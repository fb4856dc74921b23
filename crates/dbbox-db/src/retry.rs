//! Transient MySQL error retry logic.
//!
//! Statements run through the manager are retried with exponential backoff
//! when they fail in a way a fresh connection may fix: a dropped socket, a
//! server restart, a deadlock victim, or an exhausted pool. SQL errors such as
//! syntax or constraint violations fail on the first attempt.

use std::time::Duration;

use dbbox_config::PoolConfig;
use sqlx::mysql::MySqlDatabaseError;

/// MySQL server and client error numbers worth retrying.
///
/// 1040 too many connections, 1053 server shutdown in progress, 1205 lock wait
/// timeout, 1213 deadlock, 2002/2003 cannot connect, 2006 server gone away,
/// 2013 lost connection during query.
pub const TRANSIENT_ERROR_NUMBERS: [u16; 8] = [1040, 1053, 1205, 1213, 2002, 2003, 2006, 2013];

/// Configuration for retry behavior on transient errors.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,
    /// Initial delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries (backoff is capped here).
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl From<&PoolConfig> for RetryConfig {
    fn from(config: &PoolConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the given failed attempt (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Detect transient sqlx/MySQL errors.
///
/// The predicate is intentionally narrow to avoid retrying genuine SQL or
/// constraint errors.
pub fn is_transient_mysql_error(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db) => db
            .try_downcast_ref::<MySqlDatabaseError>()
            .is_some_and(|mysql| TRANSIENT_ERROR_NUMBERS.contains(&mysql.number())),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let config = RetryConfig {
            max_attempts: 6,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(config.delay_after(1), Duration::from_millis(100));
        assert_eq!(config.delay_after(2), Duration::from_millis(200));
        assert_eq!(config.delay_after(3), Duration::from_millis(400));
        assert_eq!(config.delay_after(4), Duration::from_millis(500));
        assert_eq!(config.delay_after(40), Duration::from_millis(500));
    }

    #[test]
    fn built_from_pool_config() {
        let pool = PoolConfig {
            max_attempts: 5,
            retry_base_delay_ms: 10,
            retry_max_delay_ms: 80,
            ..Default::default()
        };
        let config = RetryConfig::from(&pool);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay, Duration::from_millis(10));
        assert_eq!(config.max_delay, Duration::from_millis(80));
    }

    #[test]
    fn io_and_protocol_errors_are_transient() {
        let io = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        ));
        assert!(is_transient_mysql_error(&io));
        assert!(is_transient_mysql_error(&sqlx::Error::Protocol(
            "unexpected packet".into()
        )));
        assert!(is_transient_mysql_error(&sqlx::Error::PoolTimedOut));
    }

    #[test]
    fn logic_errors_are_not_transient() {
        assert!(!is_transient_mysql_error(&sqlx::Error::RowNotFound));
        assert!(!is_transient_mysql_error(&sqlx::Error::ColumnNotFound(
            "missing".into()
        )));
        assert!(!is_transient_mysql_error(&sqlx::Error::PoolClosed));
    }
}

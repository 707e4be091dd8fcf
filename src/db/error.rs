use std::io;

use thiserror::Error;

/// Driver error normalized to a message plus an optional machine-readable code.
///
/// Database errors carry their SQLSTATE; socket errors carry an errno-style
/// name (`ECONNRESET`, `ETIMEDOUT`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbFailure {
    pub message: String,
    pub code: Option<String>,
}

impl DbFailure {
    pub fn new(message: impl Into<String>, code: Option<&str>) -> Self {
        Self {
            message: message.into(),
            code: code.map(str::to_string),
        }
    }
}

impl From<&sqlx::Error> for DbFailure {
    fn from(err: &sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => Self {
                message: db.message().to_string(),
                code: db.code().map(|c| c.into_owned()),
            },
            sqlx::Error::Io(io_err) => Self::new(err.to_string(), io_error_code(io_err)),
            sqlx::Error::Tls(tls) => Self::new(format!("SSL connection error: {tls}"), None),
            sqlx::Error::PoolTimedOut => Self::new(err.to_string(), Some("ETIMEDOUT")),
            _ => Self::new(err.to_string(), None),
        }
    }
}

fn io_error_code(err: &io::Error) -> Option<&'static str> {
    match err.kind() {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => Some("ECONNRESET"),
        io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
        io::ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
        _ if err.to_string().contains("failed to lookup address") => Some("ENOTFOUND"),
        _ => None,
    }
}

/// Storage-layer error returned by the executor and every repository method
#[derive(Debug, Error)]
pub enum DbError {
    /// Terminal infrastructure or query failure (after any retries)
    #[error("{message}")]
    Query {
        message: String,
        code: Option<String>,
        attempts: u32,
    },

    #[error("{0}")]
    NotFound(String),

    /// Rejected before any statement was issued
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("stored content is not valid JSON: {0}")]
    Decode(String),
}

impl DbError {
    pub fn code(&self) -> Option<&str> {
        match self {
            DbError::Query { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_errors_get_errno_style_codes() {
        let reset = sqlx::Error::Io(io::Error::from(io::ErrorKind::ConnectionReset));
        assert_eq!(DbFailure::from(&reset).code.as_deref(), Some("ECONNRESET"));

        let timeout = sqlx::Error::Io(io::Error::from(io::ErrorKind::TimedOut));
        assert_eq!(DbFailure::from(&timeout).code.as_deref(), Some("ETIMEDOUT"));

        let dns = sqlx::Error::Io(io::Error::other(
            "failed to lookup address information: Name or service not known",
        ));
        assert_eq!(DbFailure::from(&dns).code.as_deref(), Some("ENOTFOUND"));
    }

    #[test]
    fn pool_timeout_counts_as_timeout() {
        let failure = DbFailure::from(&sqlx::Error::PoolTimedOut);
        assert_eq!(failure.code.as_deref(), Some("ETIMEDOUT"));
    }

    #[test]
    fn protocol_errors_have_no_code() {
        let failure = DbFailure::from(&sqlx::Error::Protocol("unexpected message".into()));
        assert_eq!(failure.code, None);
        assert!(failure.message.contains("unexpected message"));
    }

    #[test]
    fn only_query_errors_expose_a_code() {
        let err = DbError::Query {
            message: "duplicate key".into(),
            code: Some("23505".into()),
            attempts: 1,
        };
        assert_eq!(err.code(), Some("23505"));
        assert_eq!(DbError::NotFound("gone".into()).code(), None);
    }
}

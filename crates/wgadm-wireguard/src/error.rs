//! Error types for WireGuard key and configuration handling.

use thiserror::Error;

/// Errors that can occur while handling keys, addresses and config files.
#[derive(Debug, Error)]
pub enum WireGuardError {
    /// Invalid key format.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Invalid base64 encoding.
    #[error("invalid base64 encoding: {0}")]
    InvalidBase64(String),

    /// Invalid key length.
    #[error("invalid key length: expected 32, got {0}")]
    InvalidKeyLength(usize),

    /// Invalid CIDR notation.
    #[error("invalid CIDR: {0}")]
    InvalidCidr(String),

    /// Invalid endpoint.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// A configuration is missing a required value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration file could not be parsed.
    #[error("parse error at line {line}: {message}")]
    ParseError {
        /// 1-based line number, 0 when the problem is not tied to a line.
        line: usize,
        /// What went wrong.
        message: String,
    },
}

impl From<base64::DecodeError> for WireGuardError {
    fn from(err: base64::DecodeError) -> Self {
        Self::InvalidBase64(err.to_string())
    }
}

/// Result type for WireGuard operations.
pub type Result<T> = std::result::Result<T, WireGuardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display_includes_line() {
        let err = WireGuardError::ParseError {
            line: 7,
            message: "unknown section: Foo".into(),
        };
        assert_eq!(err.to_string(), "parse error at line 7: unknown section: Foo");
    }

    #[test]
    fn key_length_display() {
        let err = WireGuardError::InvalidKeyLength(16);
        assert_eq!(err.to_string(), "invalid key length: expected 32, got 16");
    }
}

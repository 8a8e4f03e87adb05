use crate::utils::error::{RelayError, Result};
use std::net::SocketAddr;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(RelayError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_socket_addr(field_name: &str, addr: &str) -> Result<SocketAddr> {
    addr.parse::<SocketAddr>()
        .map_err(|e| RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: addr.to_string(),
            reason: format!("Invalid listen address: {}", e),
        })
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

/// 秘密值驗證：錯誤訊息中不回填原始內容
pub fn validate_secret(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RelayError::MissingConfigError {
            field: field_name.to_string(),
        });
    }
    if value.starts_with("${") && value.ends_with('}') {
        return Err(RelayError::ConfigValidationError {
            field: field_name.to_string(),
            message: "Environment variable placeholder was not resolved".to_string(),
        });
    }
    Ok(())
}

pub fn validate_one_of(field_name: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if !allowed.contains(&value) {
        return Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Allowed values: {}", allowed.join(", ")),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("server.server_url", "https://example.com").is_ok());
        assert!(validate_url("server.server_url", "http://example.com").is_ok());
        assert!(validate_url("server.server_url", "").is_err());
        assert!(validate_url("server.server_url", "invalid-url").is_err());
        assert!(validate_url("server.server_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_socket_addr() {
        assert!(validate_socket_addr("server.url", "0.0.0.0:8080").is_ok());
        assert!(validate_socket_addr("server.url", "[::1]:9000").is_ok());
        assert!(validate_socket_addr("server.url", "localhost").is_err());
    }

    #[test]
    fn test_validate_secret_does_not_echo_value() {
        let err = validate_secret("server.auth_token", "${MISSING_TOKEN}").unwrap_err();
        assert!(!err.to_string().contains("MISSING_TOKEN"));
        assert!(matches!(
            validate_secret("server.auth_token", "   "),
            Err(RelayError::MissingConfigError { ref field }) if field == "server.auth_token"
        ));
        assert!(validate_secret("server.auth_token", "s3cret").is_ok());
    }

    #[test]
    fn test_validate_range_and_one_of() {
        assert!(validate_range("server.max_concurrency", 64u64, 1, 10_000).is_ok());
        assert!(validate_range("server.max_concurrency", 0u64, 1, 10_000).is_err());
        assert!(validate_one_of("logger.format", "json", &["compact", "json"]).is_ok());
        assert!(validate_one_of("logger.format", "pretty", &["compact", "json"]).is_err());
    }
}

//! Core error types used across the system

use thiserror::Error;

/// Core error type for the kernel
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub fn invalid_amount(value: impl Into<String>) -> Self {
        CoreError::InvalidAmount(value.into())
    }

    pub fn invalid_timestamp(value: impl Into<String>) -> Self {
        CoreError::InvalidTimestamp(value.into())
    }
}

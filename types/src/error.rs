//! Parse and validation errors for the fundamental types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid object id: {0}")]
    InvalidObjectId(String),

    #[error("invalid digest: {0}")]
    InvalidDigest(String),
}

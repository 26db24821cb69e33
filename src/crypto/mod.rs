pub mod media_token;
pub mod password;
pub mod token;

pub use media_token::*;
pub use password::*;
pub use token::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid signing key")]
    InvalidKey,

    #[error("Malformed token")]
    MalformedToken,

    #[error("Token signature mismatch")]
    BadSignature,

    #[error("Token expired")]
    Expired,

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

//! Error types for helio-engine operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HelioError {
    /// Malformed, missing or conflicting parameters, or a range that is too long.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The geocoding collaborator found no match, failed, or timed out.
    #[error("Geocoding failed: {0}")]
    GeocodingFailed(String),

    /// Coordinates resolved, but no IANA zone could be determined for them.
    #[error("Timezone resolution failed: {0}")]
    TimezoneResolutionFailed(String),

    /// Enforcing cross-check mode and the remote provider disagrees beyond tolerance.
    #[error("Cross-check failed: {0}")]
    CrossCheckFailed(String),

    /// NaN or overflow inside the solar position algorithm. Always a defect.
    #[error("Internal computation error: {0}")]
    InternalComputation(String),
}

impl HelioError {
    /// HTTP status code the outer request layer reports for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            HelioError::InvalidInput(_) => 400,
            HelioError::GeocodingFailed(_) => 404,
            HelioError::TimezoneResolutionFailed(_) => 422,
            HelioError::CrossCheckFailed(_) | HelioError::InternalComputation(_) => 500,
        }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            HelioError::InvalidInput(_) => "invalid_input",
            HelioError::GeocodingFailed(_) => "geocoding_failed",
            HelioError::TimezoneResolutionFailed(_) => "timezone_resolution_failed",
            HelioError::CrossCheckFailed(_) => "crosscheck_failed",
            HelioError::InternalComputation(_) => "internal_computation_error",
        }
    }
}

/// Failure of an external collaborator call (geocoder, cross-check provider).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("provider timed out after {0} ms")]
    Timeout(u64),

    #[error("provider unreachable: {0}")]
    Unreachable(String),

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// Failure of the persistent cache store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cache store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

/// Convenience alias used throughout helio-engine.
pub type Result<T> = std::result::Result<T, HelioError>;

//! Error type of the crate
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced to the caller of a simulation
#[derive(Debug, Error)]
pub enum Error {
    /// A settings value is missing, malformed or out of bounds
    #[error("invalid setting `{key}`: {message}")]
    Config {
        /// Offending key
        key: String,
        /// What is wrong with it
        message: String,
    },
    /// Rank count and cell counts do not yield a valid process grid
    #[error("domain decomposition failed: {0}")]
    Decomposition(String),
    /// Pressure solver residual exploded or became non-finite
    #[error("pressure solver diverged at iteration {iteration} with residual {residual:e}")]
    Diverged {
        /// Residual at the failing iteration
        residual: f64,
        /// Iteration the divergence was detected in
        iteration: usize,
    },
    /// File system failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Failure of the hdf5 writer
    #[cfg(feature = "hdf5")]
    #[error(transparent)]
    Hdf5(#[from] hdf5::Error),
}

impl Error {
    /// Shorthand for a configuration error
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

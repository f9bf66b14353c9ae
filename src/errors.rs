// Error Handling Module
// Standardized error types for the travel-time pipeline and query engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model read error: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Malformed model: {0}")]
    Malformed(String),

    #[error("Model radii not monotonically non-decreasing at row {row}: {r_prev} > {r}")]
    NotMonotonic { row: usize, r_prev: f64, r: f64 },

    #[error("Radius {r} outside shell {shell} [{r_bot}, {r_top}]")]
    RadiusOutOfShell { r: f64, shell: String, r_bot: f64, r_top: f64 },

    #[error("Degenerate integration interval at z = {z}: slownesses {slow_top} != {slow_bot}")]
    IntegrationDegenerate { z: f64, slow_top: f64, slow_bot: f64 },

    #[error("Boundary {name} not found near target radius {r_target}")]
    BoundaryNotFound { name: String, r_target: f64 },
}

#[derive(Error, Debug)]
pub enum TauIntError {
    #[error("Illegal interval: zero thickness at z = {z} with slownesses {slow_top} and {slow_bot}")]
    IllegalInterval { z: f64, slow_top: f64, slow_bot: f64 },

    #[error("Ray parameter {p} exceeds both layer slownesses {slow_top} and {slow_bot}")]
    RayDoesNotBottom { p: f64, slow_top: f64, slow_bot: f64 },
}

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Root not bracketed on [{a}, {b}]: f(a) = {fa}, f(b) = {fb}")]
    NoBracket { a: f64, b: f64, fa: f64, fb: f64 },

    #[error("No convergence after {iterations} iterations, last interval [{a}, {b}]")]
    NoConvergence { iterations: usize, a: f64, b: f64 },
}

#[derive(Error, Debug)]
pub enum AuxDataError {
    #[error("Auxiliary data read error: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Malformed {file}: {reason}")]
    Malformed { file: String, reason: String },

    #[error("Missing required phase group '{0}'")]
    MissingGroup(String),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Source depth {depth} km outside supported range [0, {max}] km")]
    DepthOutOfRange { depth: f64, max: f64 },

    #[error("Unknown model '{0}'")]
    UnknownModel(String),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Auxiliary data error: {0}")]
    AuxData(#[from] AuxDataError),

    #[error("Session pool poisoned")]
    PoolPoisoned,
}

pub type ModelResult<T> = Result<T, ModelError>;
pub type TauIntResult<T> = Result<T, TauIntError>;
pub type SolverResult<T> = Result<T, SolverError>;
pub type AuxDataResult<T> = Result<T, AuxDataError>;
pub type SessionResult<T> = Result<T, SessionError>;

// Validation helpers shared by the query entry points
pub fn validate_finite(value: f64, name: &str) -> Result<f64, String> {
    if value.is_nan() || value.is_infinite() {
        return Err(format!("{} must be finite, got {}", name, value));
    }
    Ok(value)
}

pub fn validate_bounds(value: f64, min: f64, max: f64, name: &str) -> Result<f64, String> {
    validate_finite(value, name)?;
    if value < min || value > max {
        return Err(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        ));
    }
    Ok(value)
}

pub fn validate_latitude(value: f64) -> Result<f64, String> {
    validate_bounds(value, -90.0, 90.0, "latitude")
}

pub fn validate_longitude(value: f64) -> Result<f64, String> {
    validate_bounds(value, -180.0, 360.0, "longitude")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_bounds() {
        assert!(validate_bounds(10.0, 0.0, 800.0, "depth").is_ok());
        assert!(validate_bounds(-1.0, 0.0, 800.0, "depth").is_err());
        assert!(validate_bounds(f64::NAN, 0.0, 800.0, "depth").is_err());
        assert!(validate_bounds(801.0, 0.0, 800.0, "depth").is_err());
    }

    #[test]
    fn test_validate_latitude_longitude() {
        assert!(validate_latitude(49.0586).is_ok());
        assert!(validate_latitude(-91.0).is_err());
        assert!(validate_longitude(-114.8603).is_ok());
        assert!(validate_longitude(361.0).is_err());
    }
}

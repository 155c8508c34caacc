use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RoutingError {
    #[error("invalid thresholds: low={low}, high={high} (need 0 <= low <= high <= 1)")]
    InvalidThresholds { low: f32, high: f32 },
}

pub type RoutingResult<T> = Result<T, RoutingError>;
